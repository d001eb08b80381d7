//! Kernel heap: a fixed arena in .bss handed to `linked_list_allocator`.
//!
//! Only boot-time bookkeeping (the PCI device list) lives here, so there is
//! no need to map a heap range through the page tables.

use core::ptr::addr_of_mut;

use linked_list_allocator::LockedHeap;

pub const HEAP_SIZE: usize = 1024 * 1024;

#[repr(C, align(4096))]
struct Arena([u8; HEAP_SIZE]);

static mut ARENA: Arena = Arena([0; HEAP_SIZE]);

/// Give the arena to `allocator`.
///
/// # Safety
/// Must be called exactly once, before the first allocation.
pub unsafe fn init_heap(allocator: &LockedHeap) {
    let start = addr_of_mut!(ARENA) as *mut u8;
    allocator.lock().init(start, HEAP_SIZE);
    crate::kprintln!("mm: heap {:#x} ({} KiB)", start as u64, HEAP_SIZE / 1024);
}
