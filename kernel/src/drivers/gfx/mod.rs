//! Intel HD Graphics 4000 (Ivy Bridge GT2, 8086:0162) bring-up.
//!
//! Takes the controller from firmware state to a running cursor plane:
//!
//! 1. `probe`: claim the PCI function (display class, VGA, prog-if 0).
//! 2. `map_apertures`: BAR0 control window (+2 MiB translation table),
//!    BAR2 linear aperture, BAR4 legacy I/O base.
//! 3. `disable_legacy_plane`: VGA sequencer screen-off, settle, VGA_CONTROL.
//! 4. `setup_gtt`: allocate backing memory and map it page by page.
//! 5. `setup_cursor`: 64x64 ARGB cursor at the configured offset.
//!
//! After that `poll` copies the pointer position into CUR_POS_A every tick.
//! Each step refuses to run out of order, so none of them can be repeated.
//!
//! No mode-setting: pipes keep whatever timings the firmware left.

use core::fmt;
use x86_64::PhysAddr;

use crate::arch::{Delay, PortIo};
use crate::drivers::pci::{Bar, BarSource, PciAddress, PciDevice, CLASS_DISPLAY, SUBCLASS_VGA};
use crate::mm::{DmaAlloc, PhysRegion, PAGE_SIZE};
use crate::util::align_up;

pub mod config;
pub mod cursor;
pub mod diag;
pub mod gtt;
pub mod mmio;
pub mod regs;

#[cfg(test)]
pub(crate) mod testing;

pub use config::GfxConfig;
pub use gtt::{CachePolicy, GttEntry};
pub use mmio::{Mmio32, RegisterWindow, VolatileMmio};

use regs::{CursorPos, PipeConf, SeqClocking, SourceSize, VgaControl};

pub const INTEL_VENDOR_ID: u16 = 0x8086;
pub const DEVICE_HD4000: u16 = 0x0162;

/// GTTMMADR: registers in the low 2 MiB, translation table above.
const BAR_GTTMMADR: u8 = 0;
/// GMADR: the linear graphics aperture.
const BAR_GMADR: u8 = 2;
/// IOBASE: index/data pair for register access through I/O space.
const BAR_IOBASE: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GfxError {
    /// A bring-up step was called before its predecessor, or twice.
    OutOfOrder { expected: Stage, found: Stage },
    RegisterOutOfRange { offset: u32, window: u64 },
    /// BAR `index` is missing or of the wrong kind.
    BarMismatch { index: u8 },
    AllocationFailed { size: usize },
    GttOverflow { pages: usize, capacity: usize },
    /// Backing memory the table entries cannot describe.
    AddressOutOfRange { addr: u64 },
    CursorOutOfRange { offset: usize, len: usize },
    /// The platform could not map the register window.
    MapFailed { base: u64, size: u64 },
}

impl fmt::Display for GfxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            GfxError::OutOfOrder { expected, found } => {
                write!(f, "step needs stage {:?}, device is at {:?}", expected, found)
            }
            GfxError::RegisterOutOfRange { offset, window } => {
                write!(f, "register {:#x} outside {:#x}-byte window", offset, window)
            }
            GfxError::BarMismatch { index } => write!(f, "BAR{} missing or wrong kind", index),
            GfxError::AllocationFailed { size } => {
                write!(f, "could not allocate {} MiB of graphics memory", size >> 20)
            }
            GfxError::GttOverflow { pages, capacity } => {
                write!(f, "{} pages do not fit a {}-entry GTT", pages, capacity)
            }
            GfxError::AddressOutOfRange { addr } => {
                write!(f, "address {:#x} not mappable by the GTT", addr)
            }
            GfxError::CursorOutOfRange { offset, len } => {
                write!(f, "cursor at {:#x} does not fit {:#x}-byte region", offset, len)
            }
            GfxError::MapFailed { base, size } => {
                write!(f, "could not map {:#x} bytes at {:#x}", size, base)
            }
        }
    }
}

pub type GfxResult<T> = Result<T, GfxError>;

/// Bring-up progress. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Identified,
    Mapped,
    LegacyDisabled,
    GttProgrammed,
    Running,
}

/// Current pointer coordinates, produced by the input side.
pub trait PointerSource {
    fn position(&self) -> (i32, i32);
}

/// Everything the bring-up sequence needs from the rest of the kernel.
pub trait Platform: BarSource + PortIo + Delay + DmaAlloc {
    type Mmio: Mmio32;

    /// Make `size` bytes of device memory at `base` accessible, uncached.
    fn map_mmio(&mut self, base: PhysAddr, size: u64) -> GfxResult<Self::Mmio>;
}

/// Address ranges read from the BARs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Apertures {
    pub mmio_base: PhysAddr,
    pub mmio_size: u64,
    pub aperture_base: PhysAddr,
    pub aperture_size: u64,
    pub gtt_base: PhysAddr,
    pub io_base: u16,
    pub io_size: u32,
}

/// Outcome of looking at one PCI function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Not a VGA-compatible display controller.
    Ignored,
    /// A VGA controller this driver does not know.
    Unsupported { vendor_id: u16, device_id: u16 },
    Supported,
}

pub fn identify(dev: &PciDevice) -> Probe {
    if dev.class.class_code != CLASS_DISPLAY
        || dev.class.subclass != SUBCLASS_VGA
        || dev.class.prog_if != 0
    {
        return Probe::Ignored;
    }
    if dev.id.vendor_id != INTEL_VENDOR_ID || dev.id.device_id != DEVICE_HD4000 {
        return Probe::Unsupported {
            vendor_id: dev.id.vendor_id,
            device_id: dev.id.device_id,
        };
    }
    Probe::Supported
}

/// Claim `dev` into `slot` if it is the supported controller. The slot is
/// left alone for anything else.
pub fn probe<M: Mmio32>(
    dev: &PciDevice,
    config: GfxConfig,
    slot: &mut Option<GfxDevice<M>>,
) -> Probe {
    let result = identify(dev);
    match result {
        Probe::Ignored => {}
        Probe::Unsupported { vendor_id, device_id } => {
            crate::kprintln!(
                "gfx: graphics controller {:04x}:{:04x} at {} not recognised",
                vendor_id,
                device_id,
                dev.addr
            );
        }
        Probe::Supported => {
            crate::kprintln!("gfx: HD Graphics 4000 at {}", dev.addr);
            *slot = Some(GfxDevice::new(dev.addr, config));
        }
    }
    result
}

/// One graphics controller and everything bring-up gave it.
pub struct GfxDevice<M> {
    bus_id: PciAddress,
    config: GfxConfig,
    stage: Stage,
    apertures: Option<Apertures>,
    regs: Option<RegisterWindow<M>>,
    memory: Option<PhysRegion>,
    cursor_base: Option<u32>,
}

impl<M: Mmio32> GfxDevice<M> {
    pub fn new(bus_id: PciAddress, config: GfxConfig) -> Self {
        Self {
            bus_id,
            config,
            stage: Stage::Identified,
            apertures: None,
            regs: None,
            memory: None,
            cursor_base: None,
        }
    }

    pub fn bus_id(&self) -> PciAddress {
        self.bus_id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn apertures(&self) -> Option<&Apertures> {
        self.apertures.as_ref()
    }

    pub fn regs(&self) -> Option<&RegisterWindow<M>> {
        self.regs.as_ref()
    }

    pub fn memory(&self) -> Option<&PhysRegion> {
        self.memory.as_ref()
    }

    /// Graphics address programmed into CUR_BASE_A.
    pub fn cursor_base(&self) -> Option<u32> {
        self.cursor_base
    }

    /// Active area of pipe A, if the firmware left the pipe running.
    pub fn screen_size(&self) -> Option<SourceSize> {
        let regs = self.regs.as_ref()?;
        let conf = PipeConf::from_bits_retain(regs.read(regs::PIPE_CONF_A).ok()?);
        if !conf.contains(PipeConf::ENABLE) {
            return None;
        }
        regs.read(regs::PIPE_SRCSZ_A).ok().map(SourceSize::decode)
    }

    fn require(&self, stage: Stage) -> GfxResult<()> {
        if self.stage != stage {
            return Err(GfxError::OutOfOrder {
                expected: stage,
                found: self.stage,
            });
        }
        Ok(())
    }

    fn regs_mut(&mut self) -> GfxResult<&mut RegisterWindow<M>> {
        let found = self.stage;
        self.regs.as_mut().ok_or(GfxError::OutOfOrder {
            expected: Stage::Mapped,
            found,
        })
    }

    /// Run the whole bring-up sequence.
    pub fn start<P>(&mut self, platform: &mut P) -> GfxResult<()>
    where
        P: Platform<Mmio = M>,
    {
        self.map_apertures(platform)?;
        if let Some(regs) = self.regs.as_ref() {
            if let Err(e) = diag::dump_port_state(regs) {
                crate::kprintln!("gfx: port dump skipped: {}", e);
            }
        }

        self.disable_legacy_plane(platform)?;
        self.setup_gtt(platform)?;
        self.setup_cursor()?;

        if let Some(regs) = self.regs.as_ref() {
            if let Err(e) = diag::dump_pipe_state(regs) {
                crate::kprintln!("gfx: pipe dump skipped: {}", e);
            }
        }
        Ok(())
    }

    /// Read BARs 0, 2 and 4 and map the control window.
    pub fn map_apertures<P>(&mut self, platform: &mut P) -> GfxResult<()>
    where
        P: Platform<Mmio = M>,
    {
        self.require(Stage::Identified)?;

        crate::kprintln!("gfx: probing PCI config of {}", self.bus_id);

        let (mmio_base, mmio_size) =
            memory_bar(platform.bar(self.bus_id, BAR_GTTMMADR), BAR_GTTMMADR)?;
        let (aperture_base, aperture_size) =
            memory_bar(platform.bar(self.bus_id, BAR_GMADR), BAR_GMADR)?;
        let (io_base, io_size) = match platform.bar(self.bus_id, BAR_IOBASE) {
            Bar::Io { port, size } => (port, size),
            _ => return Err(GfxError::BarMismatch { index: BAR_IOBASE }),
        };

        let apertures = Apertures {
            mmio_base,
            mmio_size,
            aperture_base,
            aperture_size,
            gtt_base: mmio_base + regs::GTT_OFFSET as u64,
            io_base,
            io_size,
        };

        crate::kprintln!(
            "gfx:   GTTMMADR {:#x} ({} MB)",
            mmio_base.as_u64(),
            mmio_size >> 20
        );
        crate::kprintln!(
            "gfx:   GMADR    {:#x} ({} MB)",
            aperture_base.as_u64(),
            aperture_size >> 20
        );
        crate::kprintln!("gfx:   IOBASE   {:#x} ({} bytes)", io_base, io_size);
        crate::kprintln!("gfx:   GTT      {:#x}", apertures.gtt_base.as_u64());

        let mmio = platform.map_mmio(mmio_base, mmio_size)?;
        self.regs = Some(RegisterWindow::new(mmio, mmio_size));
        self.apertures = Some(apertures);
        self.stage = Stage::Mapped;
        Ok(())
    }

    /// Blank the VGA plane and switch it off at the device.
    ///
    /// The settling delay sits between the sequencer write and VGA_CONTROL;
    /// touching VGA_CONTROL while the legacy path is still scanning can leave
    /// the display wedged.
    pub fn disable_legacy_plane<P>(&mut self, platform: &mut P) -> GfxResult<()>
    where
        P: PortIo + Delay,
    {
        self.require(Stage::Mapped)?;

        platform.outb(regs::SR_INDEX, regs::SEQ_CLOCKING);
        let clocking = SeqClocking::from_bits_retain(platform.inb(regs::SR_DATA));
        platform.outb(regs::SR_DATA, (clocking | SeqClocking::SCREEN_OFF).bits());

        platform.delay_ms(self.config.vga_settle_ms);

        self.regs_mut()?
            .write(regs::VGA_CONTROL, VgaControl::DISPLAY_DISABLE.bits())?;

        crate::kprintln!("gfx: VGA plane disabled");
        self.stage = Stage::LegacyDisabled;
        Ok(())
    }

    /// Allocate the backing memory and map all of it through the GTT.
    pub fn setup_gtt<A>(&mut self, dma: &mut A) -> GfxResult<()>
    where
        A: DmaAlloc,
    {
        self.require(Stage::LegacyDisabled)?;

        let size = self.config.backing_size;
        let pages = align_up(size as u64, PAGE_SIZE as u64) as usize / PAGE_SIZE;
        let capacity = gtt::capacity(self.regs_mut()?.size());
        if pages > capacity {
            return Err(GfxError::GttOverflow { pages, capacity });
        }

        // A region from an earlier failed attempt is reused; the allocator
        // never takes memory back.
        let memory = match self.memory.take() {
            Some(memory) => memory,
            None => dma
                .alloc_contiguous(size)
                .ok_or(GfxError::AllocationFailed { size })?,
        };

        let policy = self.config.cache_policy;
        let programmed = gtt::program(self.regs_mut()?, &memory, policy);
        let memory = self.memory.insert(memory);
        let pages = programmed?;

        crate::kprintln!(
            "gfx: GTT maps {} pages at phys {:#x} ({:?})",
            pages,
            memory.phys().as_u64(),
            policy
        );
        self.stage = Stage::GttProgrammed;
        Ok(())
    }

    /// Fill the cursor image and enable cursor plane A.
    pub fn setup_cursor(&mut self) -> GfxResult<()> {
        self.require(Stage::GttProgrammed)?;

        let offset = self.config.cursor_offset;
        let verify = self.config.verify_writes;
        let found = self.stage;
        let (regs, memory) = match (self.regs.as_mut(), self.memory.as_mut()) {
            (Some(regs), Some(memory)) => (regs, memory),
            _ => {
                return Err(GfxError::OutOfOrder {
                    expected: Stage::GttProgrammed,
                    found,
                })
            }
        };
        let base = cursor::enable(regs, memory, offset, verify)?;

        crate::kprintln!("gfx: cursor plane A at {:#x}", base);
        self.cursor_base = Some(base);
        self.stage = Stage::Running;
        Ok(())
    }

    /// Publish the latest pointer position. Call once per polling tick.
    pub fn poll<S>(&mut self, pointer: &S) -> GfxResult<()>
    where
        S: PointerSource + ?Sized,
    {
        self.require(Stage::Running)?;
        let (x, y) = pointer.position();
        cursor::set_position(self.regs_mut()?, CursorPos::from_pointer(x, y))
    }
}

fn memory_bar(bar: Bar, index: u8) -> GfxResult<(PhysAddr, u64)> {
    match bar {
        Bar::Memory { base, size, .. } => PhysAddr::try_new(base)
            .map(|addr| (addr, size))
            .map_err(|_| GfxError::BarMismatch { index }),
        _ => Err(GfxError::BarMismatch { index }),
    }
}
