use bootloader_api::info::{MemoryRegionKind, MemoryRegions};
use x86_64::structures::paging::{FrameAllocator, PhysFrame, Size4KiB};
use x86_64::{PhysAddr, VirtAddr};

use super::{DmaAlloc, PhysRegion, PAGE_SIZE};
use crate::util::align_up;

/// Bump allocator over the bootloader's `Usable` regions.
///
/// Hands out contiguous runs in increasing address order and never frees.
/// Runs are accessed through the bootloader's physical memory mapping.
pub struct RegionAllocator {
    memory_regions: &'static MemoryRegions,
    phys_offset: VirtAddr,
    next: u64,
}

impl RegionAllocator {
    /// # Safety
    /// `memory_regions` must be the boot memory map, `phys_offset` the offset at
    /// which all physical memory is mapped, and nothing else may allocate from
    /// the `Usable` regions.
    pub unsafe fn new(memory_regions: &'static MemoryRegions, phys_offset: VirtAddr) -> Self {
        Self {
            memory_regions,
            phys_offset,
            next: 0,
        }
    }

    /// Reserve `size` bytes (a page multiple) from the first usable region
    /// that still has room above the watermark.
    fn take(&mut self, size: u64) -> Option<u64> {
        let page = PAGE_SIZE as u64;
        for region in self.memory_regions.iter() {
            if region.kind != MemoryRegionKind::Usable {
                continue;
            }
            let start = align_up(region.start.max(self.next), page);
            let end = match start.checked_add(size) {
                Some(end) => end,
                None => continue,
            };
            if end > region.end {
                continue;
            }
            self.next = end;
            return Some(start);
        }
        None
    }
}

impl DmaAlloc for RegionAllocator {
    fn alloc_contiguous(&mut self, size: usize) -> Option<PhysRegion> {
        let size = align_up(size as u64, PAGE_SIZE as u64);
        if size == 0 {
            return None;
        }

        let start = self.take(size)?;
        let phys = PhysAddr::new(start);
        let virt = self.phys_offset + start;
        crate::kprintln!(
            "mm: contiguous {:#x}..{:#x} ({} KiB)",
            start,
            start + size,
            size / 1024
        );
        Some(unsafe { PhysRegion::new(phys, virt, size as usize) })
    }
}

// Page-table frames for device mappings come from the same pool.
unsafe impl FrameAllocator<Size4KiB> for RegionAllocator {
    fn allocate_frame(&mut self) -> Option<PhysFrame<Size4KiB>> {
        let start = self.take(PAGE_SIZE as u64)?;
        let frame = PhysFrame::containing_address(PhysAddr::new(start));
        // Intermediate tables must start out empty
        let virt = self.phys_offset + start;
        unsafe { core::ptr::write_bytes(virt.as_mut_ptr::<u8>(), 0, PAGE_SIZE) };
        Some(frame)
    }
}
