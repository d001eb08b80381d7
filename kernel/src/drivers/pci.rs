//! PCI (legacy config space via 0xCF8/0xCFC).
//!
//! Bus scan, config space access and BAR decoding. BARs are sized by the
//! usual all-ones probe with memory and I/O decode switched off.

use alloc::vec::Vec;
use bitflags::bitflags;
use core::fmt;
use x86_64::instructions::port::Port;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PciAddress {
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

impl fmt::Display for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}:{:02x}.{:x}", self.bus, self.device, self.function)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PciId {
    pub vendor_id: u16,
    pub device_id: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PciClass {
    pub class_code: u8,
    pub subclass: u8,
    pub prog_if: u8,
    pub revision: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PciDevice {
    pub addr: PciAddress,
    pub id: PciId,
    pub class: PciClass,
    pub header_type: u8,
}

pub const CLASS_DISPLAY: u8 = 0x03;
pub const SUBCLASS_VGA: u8 = 0x00;

bitflags! {
    /// Command register (offset 0x04).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Command: u16 {
        const IO_SPACE = 1 << 0;
        const MEMORY_SPACE = 1 << 1;
        const BUS_MASTER = 1 << 2;
    }
}

/// One decoded base address register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bar {
    Memory {
        base: u64,
        size: u64,
        prefetchable: bool,
        wide: bool,
    },
    Io {
        port: u16,
        size: u32,
    },
    /// Unimplemented, or the upper half of a 64-bit BAR.
    None,
}

/// Decode a BAR from its original value(s) and the value(s) read back after
/// writing all ones. `high`/`high_mask` are only looked at for 64-bit memory
/// BARs.
pub fn decode_bar(low: u32, low_mask: u32, high: u32, high_mask: u32) -> Bar {
    if low & 0x1 == 0x1 {
        let mask = low_mask & 0xFFFF_FFFC;
        if mask == 0 {
            return Bar::None;
        }
        // Only the low 16 bits decode on x86
        let size = (!(mask | 0xFFFF_0000)).wrapping_add(1);
        return Bar::Io {
            port: (low & 0xFFFC) as u16,
            size,
        };
    }

    let wide = (low >> 1) & 0x3 == 0x2;
    let prefetchable = low & 0x8 != 0;
    let (base, mask) = if wide {
        (
            ((high as u64) << 32) | (low & 0xFFFF_FFF0) as u64,
            ((high_mask as u64) << 32) | (low_mask & 0xFFFF_FFF0) as u64,
        )
    } else {
        (
            (low & 0xFFFF_FFF0) as u64,
            0xFFFF_FFFF_0000_0000 | (low_mask & 0xFFFF_FFF0) as u64,
        )
    };
    if mask & 0xFFFF_FFFF == 0 && (!wide || mask == 0) {
        return Bar::None;
    }

    Bar::Memory {
        base,
        size: (!mask).wrapping_add(1),
        prefetchable,
        wide,
    }
}

/// Where the graphics driver gets its BARs from.
pub trait BarSource {
    fn bar(&self, addr: PciAddress, index: u8) -> Bar;
}

const CONFIG_ADDRESS: u16 = 0xCF8;
const CONFIG_DATA: u16 = 0xCFC;

#[inline]
fn config_addr(bus: u8, device: u8, function: u8, offset: u8) -> u32 {
    let bus = bus as u32;
    let device = device as u32;
    let function = function as u32;
    let offset = (offset as u32) & 0xFC;
    (1u32 << 31) | (bus << 16) | (device << 11) | (function << 8) | offset
}

pub fn read_u32(addr: PciAddress, offset: u8) -> u32 {
    unsafe {
        let mut address = Port::<u32>::new(CONFIG_ADDRESS);
        let mut data = Port::<u32>::new(CONFIG_DATA);
        address.write(config_addr(addr.bus, addr.device, addr.function, offset));
        data.read()
    }
}

pub fn write_u32(addr: PciAddress, offset: u8, value: u32) {
    unsafe {
        let mut address = Port::<u32>::new(CONFIG_ADDRESS);
        let mut data = Port::<u32>::new(CONFIG_DATA);
        address.write(config_addr(addr.bus, addr.device, addr.function, offset));
        data.write(value);
    }
}

pub fn read_u16(addr: PciAddress, offset: u8) -> u16 {
    let v = read_u32(addr, offset & 0xFC);
    let shift = ((offset & 2) * 8) as u32;
    ((v >> shift) & 0xFFFF) as u16
}

pub fn write_u16(addr: PciAddress, offset: u8, value: u16) {
    let aligned = offset & 0xFC;
    let mut v = read_u32(addr, aligned);
    let shift = ((offset & 2) * 8) as u32;
    v &= !(0xFFFFu32 << shift);
    v |= (value as u32) << shift;
    write_u32(addr, aligned, v);
}

pub fn read_u8(addr: PciAddress, offset: u8) -> u8 {
    let v = read_u32(addr, offset & 0xFC);
    let shift = ((offset & 3) * 8) as u32;
    ((v >> shift) & 0xFF) as u8
}

pub fn scan() -> Vec<PciDevice> {
    let mut out = Vec::new();
    for bus in 0u16..=255 {
        let bus = bus as u8;
        for device in 0u8..32 {
            let first = PciAddress { bus, device, function: 0 };
            if read_u16(first, 0x00) == 0xFFFF {
                continue;
            }
            let multi = read_u8(first, 0x0E) & 0x80 != 0;
            let functions = if multi { 8 } else { 1 };

            for function in 0u8..functions {
                let addr = PciAddress { bus, device, function };
                let vendor_id = read_u16(addr, 0x00);
                if vendor_id == 0xFFFF {
                    continue;
                }

                out.push(PciDevice {
                    addr,
                    id: PciId {
                        vendor_id,
                        device_id: read_u16(addr, 0x02),
                    },
                    class: PciClass {
                        class_code: read_u8(addr, 0x0B),
                        subclass: read_u8(addr, 0x0A),
                        prog_if: read_u8(addr, 0x09),
                        revision: read_u8(addr, 0x08),
                    },
                    header_type: read_u8(addr, 0x0E),
                });
            }
        }
    }
    out
}

/// Read and size BAR `index` (0..5).
pub fn read_bar(addr: PciAddress, index: u8) -> Bar {
    if index > 5 {
        return Bar::None;
    }
    let offset = 0x10 + index * 4;

    let command = read_u16(addr, 0x04);
    write_u16(
        addr,
        0x04,
        command & !(Command::IO_SPACE | Command::MEMORY_SPACE).bits(),
    );

    let low = read_u32(addr, offset);
    write_u32(addr, offset, 0xFFFF_FFFF);
    let low_mask = read_u32(addr, offset);
    write_u32(addr, offset, low);

    let wide = low & 0x1 == 0 && (low >> 1) & 0x3 == 0x2 && index < 5;
    let (high, high_mask) = if wide {
        let high_offset = offset + 4;
        let high = read_u32(addr, high_offset);
        write_u32(addr, high_offset, 0xFFFF_FFFF);
        let high_mask = read_u32(addr, high_offset);
        write_u32(addr, high_offset, high);
        (high, high_mask)
    } else {
        (0, 0)
    };

    write_u16(addr, 0x04, command);

    decode_bar(low, low_mask, high, high_mask)
}

pub fn enable_bus_mastering(addr: PciAddress) {
    let cmd = Command::from_bits_retain(read_u16(addr, 0x04));
    let new = cmd | Command::IO_SPACE | Command::MEMORY_SPACE | Command::BUS_MASTER;
    write_u16(addr, 0x04, new.bits());
}

/// `BarSource` over the legacy configuration mechanism.
pub struct LegacyPci;

impl BarSource for LegacyPci {
    fn bar(&self, addr: PciAddress, index: u8) -> Bar {
        read_bar(addr, index)
    }
}
