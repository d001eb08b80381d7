//! The real machine behind `gfx::Platform`.

use x86_64::{PhysAddr, VirtAddr};

use crate::arch::pit::PitDelay;
use crate::arch::port::X86Ports;
use crate::arch::{Delay, PortIo};
use crate::drivers::gfx::{GfxError, GfxResult, Platform, VolatileMmio};
use crate::drivers::pci::{Bar, BarSource, LegacyPci, PciAddress};
use crate::mm::paging::MmioMapper;
use crate::mm::{DmaAlloc, PhysRegion, RegionAllocator};

/// Legacy PCI config access, raw ports, the PIT and the boot memory map.
pub struct KernelPlatform {
    pci: LegacyPci,
    ports: X86Ports,
    delay: PitDelay,
    frames: RegionAllocator,
    mapper: MmioMapper,
}

impl KernelPlatform {
    /// # Safety
    /// All physical memory must be mapped at `phys_offset`, `frames` must be
    /// the only allocator of usable memory, and nothing else may edit the
    /// page tables.
    pub unsafe fn new(frames: RegionAllocator, phys_offset: VirtAddr) -> Self {
        Self {
            pci: LegacyPci,
            ports: X86Ports::new(),
            delay: PitDelay,
            frames,
            mapper: MmioMapper::new(phys_offset),
        }
    }
}

impl BarSource for KernelPlatform {
    fn bar(&self, addr: PciAddress, index: u8) -> Bar {
        self.pci.bar(addr, index)
    }
}

impl PortIo for KernelPlatform {
    fn outb(&mut self, port: u16, value: u8) {
        self.ports.outb(port, value);
    }

    fn inb(&mut self, port: u16) -> u8 {
        self.ports.inb(port)
    }
}

impl Delay for KernelPlatform {
    fn delay_ms(&mut self, ms: u64) {
        self.delay.delay_ms(ms);
    }
}

impl DmaAlloc for KernelPlatform {
    fn alloc_contiguous(&mut self, size: usize) -> Option<PhysRegion> {
        self.frames.alloc_contiguous(size)
    }
}

impl Platform for KernelPlatform {
    type Mmio = VolatileMmio;

    fn map_mmio(&mut self, base: PhysAddr, size: u64) -> GfxResult<VolatileMmio> {
        match self.mapper.map(base, size, &mut self.frames) {
            Ok(virt) => Ok(unsafe { VolatileMmio::new(virt) }),
            Err(e) => {
                crate::kprintln!("mm: mapping {:#x} failed: {:?}", base.as_u64(), e);
                Err(GfxError::MapFailed {
                    base: base.as_u64(),
                    size,
                })
            }
        }
    }
}
