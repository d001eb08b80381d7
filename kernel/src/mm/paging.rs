//! Uncached kernel mappings for device memory.
//!
//! The bootloader's physical-memory window only reaches as far as the memory
//! map does and is write-back cached, so BARs get their own mappings in a
//! fixed window instead.

use x86_64::registers::control::Cr3;
use x86_64::structures::paging::mapper::MapToError;
use x86_64::structures::paging::{
    FrameAllocator, Mapper, OffsetPageTable, Page, PageTable, PageTableFlags, PhysFrame,
    Size4KiB,
};
use x86_64::{PhysAddr, VirtAddr};

use super::PAGE_SIZE;
use crate::util::align_up;

/// Start of the device window. One level-4 slot, well clear of the heap and
/// the bootloader's own mappings.
pub const MMIO_WINDOW_START: u64 = 0xFFFF_A000_0000_0000;
pub const MMIO_WINDOW_SIZE: u64 = 512 * 1024 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// The window has no room left for the request.
    WindowFull,
    /// No frame for an intermediate page table.
    NoMemory,
    /// Something already lives at the chosen address.
    AlreadyMapped,
}

pub fn flags_mmio() -> PageTableFlags {
    PageTableFlags::PRESENT
        | PageTableFlags::WRITABLE
        | PageTableFlags::NO_CACHE
        | PageTableFlags::WRITE_THROUGH
        | PageTableFlags::NO_EXECUTE
}

/// Virtual span a device range occupies in the window: whole pages, with the
/// range's offset into its first page preserved.
pub fn window_span(phys: u64, size: u64) -> (u64, u64) {
    let page = PAGE_SIZE as u64;
    let first = phys & !(page - 1);
    let len = align_up(phys + size, page) - first;
    (first, len)
}

/// Page-table handle plus a bump pointer through the device window.
pub struct MmioMapper {
    inner: OffsetPageTable<'static>,
    next: u64,
}

impl MmioMapper {
    /// # Safety
    /// `phys_offset` must be where the bootloader mapped all physical memory,
    /// and no other mapper may be live.
    pub unsafe fn new(phys_offset: VirtAddr) -> Self {
        let (level_4_table_frame, _) = Cr3::read();
        let virt = phys_offset + level_4_table_frame.start_address().as_u64();
        let level_4_table: &'static mut PageTable = &mut *virt.as_mut_ptr();
        Self {
            inner: OffsetPageTable::new(level_4_table, phys_offset),
            next: MMIO_WINDOW_START,
        }
    }

    /// Map `size` bytes of device memory at `phys` uncached and return the
    /// virtual address of `phys` itself.
    pub fn map(
        &mut self,
        phys: PhysAddr,
        size: u64,
        frames: &mut impl FrameAllocator<Size4KiB>,
    ) -> Result<VirtAddr, MapError> {
        let inner = &mut self.inner;
        place(&mut self.next, phys, size, |virt, frame| {
            let page = Page::<Size4KiB>::containing_address(virt);
            let frame = PhysFrame::<Size4KiB>::containing_address(frame);
            unsafe {
                inner
                    .map_to(page, frame, flags_mmio(), frames)
                    .map_err(|e| match e {
                        MapToError::FrameAllocationFailed => MapError::NoMemory,
                        _ => MapError::AlreadyMapped,
                    })?
                    .flush();
            }
            Ok(())
        })
    }
}

/// Claim the window span for `phys..phys+size` at `*next` and hand each page
/// to `map_page`. The span stays claimed even if a page fails, so a
/// half-mapped range is never reused.
fn place<F>(next: &mut u64, phys: PhysAddr, size: u64, mut map_page: F) -> Result<VirtAddr, MapError>
where
    F: FnMut(VirtAddr, PhysAddr) -> Result<(), MapError>,
{
    let (first, len) = window_span(phys.as_u64(), size);
    let start = *next;
    if start + len > MMIO_WINDOW_START + MMIO_WINDOW_SIZE {
        return Err(MapError::WindowFull);
    }
    *next = start + len;

    let page = PAGE_SIZE as u64;
    for i in 0..len / page {
        map_page(VirtAddr::new(start + i * page), PhysAddr::new(first + i * page))?;
    }

    crate::kprintln!("mm: mmio {:#x}..{:#x} at {:#x}", first, first + len, start);
    Ok(VirtAddr::new(start + (phys.as_u64() - first)))
}
