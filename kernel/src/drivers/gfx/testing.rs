//! Recording stand-ins for the hardware, shared by the driver's unit tests.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;
use x86_64::{PhysAddr, VirtAddr};

use super::{GfxError, GfxResult, Mmio32, Platform};
use crate::arch::{Delay, PortIo};
use crate::drivers::pci::{Bar, BarSource, PciAddress};
use crate::mm::{DmaAlloc, PhysRegion, PAGE_SIZE};
use crate::util::align_up;

/// Side effects visible to the device, in the order they happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    MmioWrite { offset: u32, value: u32 },
    PortOut { port: u16, value: u8 },
    PortIn { port: u16 },
    Delay { ms: u64 },
    MapMmio { base: u64, size: u64 },
}

#[derive(Default)]
struct BusState {
    regs: BTreeMap<u32, u32>,
    ports: BTreeMap<u16, u8>,
    events: Vec<Event>,
}

/// Register file plus event log, shared between the handles it gives out.
#[derive(Clone, Default)]
pub struct FakeBus {
    state: Rc<RefCell<BusState>>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mmio(&self) -> FakeMmio {
        FakeMmio { bus: self.clone() }
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.borrow().events.clone()
    }

    pub fn record(&self, event: Event) {
        self.state.borrow_mut().events.push(event);
    }

    /// Preload a register without logging a write.
    pub fn set_reg(&self, offset: u32, value: u32) {
        self.state.borrow_mut().regs.insert(offset, value);
    }

    pub fn reg(&self, offset: u32) -> Option<u32> {
        self.state.borrow().regs.get(&offset).copied()
    }

    pub fn set_port(&self, port: u16, value: u8) {
        self.state.borrow_mut().ports.insert(port, value);
    }

    pub fn port(&self, port: u16) -> u8 {
        self.state.borrow().ports.get(&port).copied().unwrap_or(0)
    }
}

pub struct FakeMmio {
    bus: FakeBus,
}

impl Mmio32 for FakeMmio {
    fn read32(&self, offset: u32) -> u32 {
        self.bus.reg(offset).unwrap_or(0)
    }

    fn write32(&mut self, offset: u32, value: u32) {
        let mut state = self.bus.state.borrow_mut();
        state.regs.insert(offset, value);
        state.events.push(Event::MmioWrite { offset, value });
    }
}

/// Hands out heap buffers posing as physical memory from `base` upwards.
pub struct FakeDma {
    /// Calls to `alloc_contiguous`, successful or not.
    pub allocations: usize,
    next: u64,
    buffers: Vec<Box<[u8]>>,
    fail: bool,
}

impl FakeDma {
    pub fn new(base: u64) -> Self {
        Self {
            allocations: 0,
            next: base,
            buffers: Vec::new(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(0)
        }
    }
}

impl DmaAlloc for FakeDma {
    fn alloc_contiguous(&mut self, size: usize) -> Option<PhysRegion> {
        self.allocations += 1;
        if self.fail {
            return None;
        }
        let size = align_up(size as u64, PAGE_SIZE as u64) as usize;
        let mut buffer = vec![0u8; size].into_boxed_slice();
        let virt = VirtAddr::from_ptr(buffer.as_mut_ptr());
        let phys = PhysAddr::new(self.next);
        self.next += size as u64;
        self.buffers.push(buffer);
        Some(unsafe { PhysRegion::new(phys, virt, size) })
    }
}

/// A whole machine: BARs, ports, timer and memory, all recorded on one bus.
pub struct FakePlatform {
    pub bus: FakeBus,
    pub bars: BTreeMap<u8, Bar>,
    pub dma: FakeDma,
    pub map_fails: bool,
}

pub const BAR0_BASE: u64 = 0xF740_0000;
pub const BAR0_SIZE: u64 = 4 * 1024 * 1024;
pub const BAR2_BASE: u64 = 0xE000_0000;
pub const BAR2_SIZE: u64 = 256 * 1024 * 1024;
pub const IO_BASE: u16 = 0xF000;
pub const DMA_BASE: u64 = 0x1_4000_0000;

impl FakePlatform {
    /// BARs of a typical desktop Ivy Bridge.
    pub fn hd4000() -> Self {
        let mut bars = BTreeMap::new();
        bars.insert(
            0,
            Bar::Memory {
                base: BAR0_BASE,
                size: BAR0_SIZE,
                prefetchable: false,
                wide: true,
            },
        );
        bars.insert(
            2,
            Bar::Memory {
                base: BAR2_BASE,
                size: BAR2_SIZE,
                prefetchable: true,
                wide: true,
            },
        );
        bars.insert(4, Bar::Io { port: IO_BASE, size: 64 });
        Self {
            bus: FakeBus::new(),
            bars,
            dma: FakeDma::new(DMA_BASE),
            map_fails: false,
        }
    }
}

impl BarSource for FakePlatform {
    fn bar(&self, _addr: PciAddress, index: u8) -> Bar {
        self.bars.get(&index).copied().unwrap_or(Bar::None)
    }
}

impl PortIo for FakePlatform {
    fn outb(&mut self, port: u16, value: u8) {
        self.bus.set_port(port, value);
        self.bus.record(Event::PortOut { port, value });
    }

    fn inb(&mut self, port: u16) -> u8 {
        self.bus.record(Event::PortIn { port });
        self.bus.port(port)
    }
}

impl Delay for FakePlatform {
    fn delay_ms(&mut self, ms: u64) {
        self.bus.record(Event::Delay { ms });
    }
}

impl DmaAlloc for FakePlatform {
    fn alloc_contiguous(&mut self, size: usize) -> Option<PhysRegion> {
        self.dma.alloc_contiguous(size)
    }
}

impl Platform for FakePlatform {
    type Mmio = FakeMmio;

    fn map_mmio(&mut self, base: PhysAddr, size: u64) -> GfxResult<FakeMmio> {
        if self.map_fails {
            return Err(GfxError::MapFailed {
                base: base.as_u64(),
                size,
            });
        }
        self.bus.record(Event::MapMmio {
            base: base.as_u64(),
            size,
        });
        Ok(self.bus.mmio())
    }
}
