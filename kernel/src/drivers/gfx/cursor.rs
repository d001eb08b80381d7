//! Hardware cursor plane A.

use super::mmio::{Mmio32, RegisterWindow};
use super::regs::{CursorControl, CursorPos, CUR_BASE_A, CUR_CTL_A, CUR_POS_A};
use super::{GfxError, GfxResult};
use crate::mm::{PhysRegion, PAGE_SIZE};

pub const CURSOR_SIZE: usize = 64;
pub const CURSOR_BYTES: usize = CURSOR_SIZE * CURSOR_SIZE * 4;

/// Placeholder image: opaque white.
pub const CURSOR_FILL: u8 = 0xFF;

/// The cursor image must start on a page, fit inside the mapped region and
/// have a graphics address CUR_BASE can hold.
pub fn check_placement(offset: usize, region_len: usize) -> GfxResult<()> {
    base_address(offset, region_len)?;
    let fits = offset
        .checked_add(CURSOR_BYTES)
        .is_some_and(|end| end <= region_len);
    if offset % PAGE_SIZE != 0 || !fits {
        return Err(GfxError::CursorOutOfRange {
            offset,
            len: region_len,
        });
    }
    Ok(())
}

fn base_address(offset: usize, region_len: usize) -> GfxResult<u32> {
    u32::try_from(offset).map_err(|_| GfxError::CursorOutOfRange {
        offset,
        len: region_len,
    })
}

/// Fill the image at `offset`, then point the plane at it and turn it on.
///
/// `offset` is both the byte offset into `memory` and the graphics address,
/// since GTT entry 0 maps the first page of `memory`.
pub fn enable<M: Mmio32>(
    regs: &mut RegisterWindow<M>,
    memory: &mut PhysRegion,
    offset: usize,
    verify: bool,
) -> GfxResult<u32> {
    check_placement(offset, memory.len())?;
    let base = base_address(offset, memory.len())?;
    if !memory.fill(offset, CURSOR_BYTES, CURSOR_FILL) {
        return Err(GfxError::CursorOutOfRange {
            offset,
            len: memory.len(),
        });
    }

    let control = CursorControl::argb64();
    regs.write(CUR_CTL_A, control.encode())?;
    // The base write arms the update
    regs.write(CUR_BASE_A, base)?;

    if verify {
        let readback = regs.read(CUR_CTL_A)?;
        if readback != control.encode() {
            crate::kprintln!(
                "gfx: CUR_CTL_A reads {:#010x}, wrote {:#010x}",
                readback,
                control.encode()
            );
        }
    }

    Ok(base)
}

pub fn set_position<M: Mmio32>(regs: &mut RegisterWindow<M>, pos: CursorPos) -> GfxResult<()> {
    regs.write(CUR_POS_A, pos.encode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::gfx::testing::{Event, FakeBus, FakeDma};
    use crate::mm::DmaAlloc;

    #[test]
    fn test_placement() {
        assert!(check_placement(0, CURSOR_BYTES).is_ok());
        assert!(check_placement(PAGE_SIZE, PAGE_SIZE + CURSOR_BYTES).is_ok());
        assert_eq!(
            check_placement(PAGE_SIZE, CURSOR_BYTES),
            Err(GfxError::CursorOutOfRange { offset: PAGE_SIZE, len: CURSOR_BYTES })
        );
        assert!(check_placement(100, 1 << 20).is_err());
        assert!(check_placement(usize::MAX - PAGE_SIZE + 1, usize::MAX).is_err());
    }

    #[test]
    fn test_placement_needs_32bit_base() {
        let last = (u32::MAX as usize + 1) - PAGE_SIZE;
        assert!(check_placement(last - CURSOR_BYTES, usize::MAX).is_ok());
        assert_eq!(
            check_placement(1 << 32, usize::MAX),
            Err(GfxError::CursorOutOfRange {
                offset: 1 << 32,
                len: usize::MAX,
            })
        );
    }

    #[test]
    fn test_enable_fills_then_programs() {
        let bus = FakeBus::new();
        let mut regs = RegisterWindow::new(bus.mmio(), 4 << 20);
        let mut dma = FakeDma::new(0x4000_0000);
        let mut memory = dma.alloc_contiguous(8 * PAGE_SIZE).unwrap();

        let base = enable(&mut regs, &mut memory, 2 * PAGE_SIZE, true).unwrap();
        assert_eq!(base, 2 * PAGE_SIZE as u32);

        let bytes = memory.as_slice();
        assert!(bytes[..2 * PAGE_SIZE].iter().all(|&b| b == 0));
        assert!(bytes[2 * PAGE_SIZE..2 * PAGE_SIZE + CURSOR_BYTES]
            .iter()
            .all(|&b| b == CURSOR_FILL));

        assert_eq!(
            bus.events(),
            alloc::vec![
                Event::MmioWrite { offset: CUR_CTL_A, value: 0x27 },
                Event::MmioWrite { offset: CUR_BASE_A, value: base },
            ]
        );
    }

    #[test]
    fn test_enable_rejects_offset_outside_region() {
        let bus = FakeBus::new();
        let mut regs = RegisterWindow::new(bus.mmio(), 4 << 20);
        let mut dma = FakeDma::new(0x4000_0000);
        let mut memory = dma.alloc_contiguous(4 * PAGE_SIZE).unwrap();

        assert!(enable(&mut regs, &mut memory, PAGE_SIZE, false).is_err());
        assert!(bus.events().is_empty());
    }

    #[test]
    fn test_set_position() {
        let bus = FakeBus::new();
        let mut regs = RegisterWindow::new(bus.mmio(), 4 << 20);
        set_position(&mut regs, CursorPos { x: 12, y: 34 }).unwrap();
        assert_eq!(regs.read(CUR_POS_A), Ok((34 << 16) | 12));
    }
}
