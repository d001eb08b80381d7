//! Graphics translation table (Gen6/Gen7 format).
//!
//! One 32-bit entry per 4 KiB page:
//!
//! ```text
//!  31            12 11     4 3   1  0
//! | addr[31:12]    | addr[39:32] | cache | V |
//! ```

use x86_64::PhysAddr;

use super::mmio::{Mmio32, RegisterWindow};
use super::regs::GTT_OFFSET;
use super::{GfxError, GfxResult};
use crate::mm::{PhysRegion, PAGE_SIZE};
use crate::util::is_aligned;

/// Highest physical address (exclusive) an entry can encode.
pub const ADDRESS_LIMIT: u64 = 1 << 40;

const ENTRY_SIZE: u32 = 4;

/// Cacheability control, bits 3:1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CachePolicy {
    Uncached = 1,
    Llc = 2,
    L3Llc = 3,
}

impl CachePolicy {
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            1 => Some(CachePolicy::Uncached),
            2 => Some(CachePolicy::Llc),
            3 => Some(CachePolicy::L3Llc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GttEntry(u32);

impl GttEntry {
    pub const VALID: u32 = 1 << 0;
    const CACHE_SHIFT: u32 = 1;
    const CACHE_MASK: u32 = 0x7 << Self::CACHE_SHIFT;
    const ADDR_LOW_MASK: u32 = 0xFFFF_F000;
    const ADDR_HIGH_MASK: u32 = 0xFF0;

    /// Valid entry for the page at `addr`. The caller guarantees `addr` is
    /// page aligned and below `ADDRESS_LIMIT`.
    pub fn new(addr: PhysAddr, policy: CachePolicy) -> Self {
        let addr = addr.as_u64();
        let low = addr as u32 & Self::ADDR_LOW_MASK;
        let high = (addr >> 28) as u32 & Self::ADDR_HIGH_MASK;
        GttEntry(low | high | ((policy as u32) << Self::CACHE_SHIFT) | Self::VALID)
    }

    pub const fn from_raw(raw: u32) -> Self {
        GttEntry(raw)
    }

    pub const fn raw(&self) -> u32 {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        self.0 & Self::VALID != 0
    }

    pub fn policy(&self) -> Option<CachePolicy> {
        CachePolicy::from_bits((self.0 & Self::CACHE_MASK) >> Self::CACHE_SHIFT)
    }

    /// Page address with bits 39:32 moved back into place.
    pub fn addr(&self) -> PhysAddr {
        let low = (self.0 & Self::ADDR_LOW_MASK) as u64;
        let high = ((self.0 & Self::ADDR_HIGH_MASK) as u64) << 28;
        PhysAddr::new(high | low)
    }
}

/// Entries that fit in the table half of a control window of `window` bytes.
pub fn capacity(window: u64) -> usize {
    (window.saturating_sub(GTT_OFFSET as u64) / ENTRY_SIZE as u64) as usize
}

/// Map every page of `memory`, in order, starting at entry 0.
///
/// Returns the number of entries written. Nothing is written if the region
/// does not fit the table or cannot be expressed in an entry.
pub fn program<M: Mmio32>(
    regs: &mut RegisterWindow<M>,
    memory: &PhysRegion,
    policy: CachePolicy,
) -> GfxResult<usize> {
    let base = memory.phys().as_u64();
    let pages = memory.pages();

    if !is_aligned(base, PAGE_SIZE as u64) {
        return Err(GfxError::AddressOutOfRange { addr: base });
    }
    let end = base + (pages * PAGE_SIZE) as u64;
    if end > ADDRESS_LIMIT {
        return Err(GfxError::AddressOutOfRange { addr: end });
    }
    let capacity = capacity(regs.size());
    if pages > capacity {
        return Err(GfxError::GttOverflow { pages, capacity });
    }

    let mut offset = GTT_OFFSET;
    for addr in (0..pages).filter_map(|page| memory.page_addr(page)) {
        regs.write(offset, GttEntry::new(addr, policy).raw())?;
        offset += ENTRY_SIZE;
    }

    Ok(pages)
}
