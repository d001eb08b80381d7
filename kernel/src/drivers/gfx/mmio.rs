//! Bounds-checked access to the device's register window.

use core::ptr;
use x86_64::VirtAddr;

use super::{GfxError, GfxResult};

/// Raw 32-bit accesses at byte offsets into a mapped window.
pub trait Mmio32 {
    fn read32(&self, offset: u32) -> u32;
    fn write32(&mut self, offset: u32, value: u32);
}

/// Volatile accesses through a kernel virtual mapping.
pub struct VolatileMmio {
    base: VirtAddr,
}

impl VolatileMmio {
    /// # Safety
    /// `base` must map the device window uncached for at least as many bytes
    /// as the `RegisterWindow` built on top of it will allow.
    pub unsafe fn new(base: VirtAddr) -> Self {
        Self { base }
    }
}

impl Mmio32 for VolatileMmio {
    #[inline]
    fn read32(&self, offset: u32) -> u32 {
        let addr = (self.base + offset as u64).as_ptr::<u32>();
        unsafe { ptr::read_volatile(addr) }
    }

    #[inline]
    fn write32(&mut self, offset: u32, value: u32) {
        let addr = (self.base + offset as u64).as_mut_ptr::<u32>();
        unsafe { ptr::write_volatile(addr, value) }
    }
}

/// A register window of known size. Offsets must be 4-byte aligned and leave
/// room for the access inside the window.
pub struct RegisterWindow<M> {
    io: M,
    size: u64,
}

impl<M: Mmio32> RegisterWindow<M> {
    pub fn new(io: M, size: u64) -> Self {
        Self { io, size }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    fn check(&self, offset: u32) -> GfxResult<()> {
        if offset % 4 != 0 || offset as u64 + 4 > self.size {
            return Err(GfxError::RegisterOutOfRange {
                offset,
                window: self.size,
            });
        }
        Ok(())
    }

    pub fn read(&self, offset: u32) -> GfxResult<u32> {
        self.check(offset)?;
        Ok(self.io.read32(offset))
    }

    pub fn write(&mut self, offset: u32, value: u32) -> GfxResult<()> {
        self.check(offset)?;
        self.io.write32(offset, value);
        Ok(())
    }

    /// Read-modify-write. Nothing is touched if `offset` is out of range.
    pub fn modify<F>(&mut self, offset: u32, f: F) -> GfxResult<()>
    where
        F: FnOnce(u32) -> u32,
    {
        self.check(offset)?;
        let value = self.io.read32(offset);
        self.io.write32(offset, f(value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::gfx::testing::{Event, FakeBus};

    #[test]
    fn test_in_range_access() {
        let bus = FakeBus::new();
        let mut win = RegisterWindow::new(bus.mmio(), 0x1000);

        win.write(0x0, 0xDEAD_BEEF).unwrap();
        win.write(0xFFC, 7).unwrap();
        assert_eq!(win.read(0x0), Ok(0xDEAD_BEEF));
        assert_eq!(win.read(0xFFC), Ok(7));
        assert_eq!(win.read(0x8), Ok(0));
    }

    #[test]
    fn test_out_of_range_rejected_without_access() {
        let bus = FakeBus::new();
        let mut win = RegisterWindow::new(bus.mmio(), 0x1000);

        let err = GfxError::RegisterOutOfRange { offset: 0x1000, window: 0x1000 };
        assert_eq!(win.write(0x1000, 1), Err(err));
        assert_eq!(win.read(0x1000), Err(err));
        assert_eq!(
            win.write(0x2, 1),
            Err(GfxError::RegisterOutOfRange { offset: 0x2, window: 0x1000 })
        );
        assert!(bus.events().is_empty());
    }

    #[test]
    fn test_modify_keeps_other_bits() {
        let bus = FakeBus::new();
        let mut win = RegisterWindow::new(bus.mmio(), 0x100);
        win.write(0x10, 0b0101).unwrap();
        win.modify(0x10, |v| v | 0b1000).unwrap();

        assert_eq!(win.read(0x10), Ok(0b1101));
        assert_eq!(
            bus.events(),
            alloc::vec![
                Event::MmioWrite { offset: 0x10, value: 0b0101 },
                Event::MmioWrite { offset: 0x10, value: 0b1101 },
            ]
        );
    }

    #[test]
    fn test_modify_out_of_range() {
        let bus = FakeBus::new();
        let mut win = RegisterWindow::new(bus.mmio(), 0x100);
        let mut called = false;
        assert_eq!(
            win.modify(0x100, |v| {
                called = true;
                v
            }),
            Err(GfxError::RegisterOutOfRange { offset: 0x100, window: 0x100 })
        );
        assert!(!called);
        assert!(bus.events().is_empty());
    }
}
