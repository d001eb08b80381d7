//! Physically contiguous memory handed to devices.

use x86_64::{PhysAddr, VirtAddr};

pub mod heap;
pub mod paging;
mod phys;

pub use phys::RegionAllocator;

pub const PAGE_SIZE: usize = 4096;

/// Contiguous physical range plus the kernel mapping used to touch it.
///
/// The owner keeps the pages for as long as it holds the region; there is no
/// free path.
#[derive(Debug)]
pub struct PhysRegion {
    phys: PhysAddr,
    virt: VirtAddr,
    len: usize,
}

impl PhysRegion {
    /// # Safety
    /// `virt..virt+len` must be mapped writable onto `phys..phys+len`, and the
    /// pages must be owned exclusively by the returned value.
    pub unsafe fn new(phys: PhysAddr, virt: VirtAddr, len: usize) -> Self {
        Self { phys, virt, len }
    }

    pub fn phys(&self) -> PhysAddr {
        self.phys
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of whole pages in the region.
    pub fn pages(&self) -> usize {
        self.len / PAGE_SIZE
    }

    /// Physical address of page `index`.
    pub fn page_addr(&self, index: usize) -> Option<PhysAddr> {
        if index < self.pages() {
            Some(self.phys + (index * PAGE_SIZE) as u64)
        } else {
            None
        }
    }

    /// Set `len` bytes from `offset` to `byte`. Returns false (and writes
    /// nothing) if the range is not inside the region.
    #[must_use]
    pub fn fill(&mut self, offset: usize, len: usize, byte: u8) -> bool {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => {}
            _ => return false,
        }
        unsafe {
            core::ptr::write_bytes(self.virt.as_mut_ptr::<u8>().add(offset), byte, len);
        }
        true
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { core::slice::from_raw_parts(self.virt.as_ptr::<u8>(), self.len) }
    }
}

/// Source of device memory.
pub trait DmaAlloc {
    /// `size` bytes (rounded up to whole pages) of page-aligned, physically
    /// contiguous memory, or `None` when no such run is free.
    fn alloc_contiguous(&mut self, size: usize) -> Option<PhysRegion>;
}
