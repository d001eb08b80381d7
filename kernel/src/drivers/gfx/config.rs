use super::gtt::CachePolicy;

/// Build-time knobs for the bring-up sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GfxConfig {
    /// Bytes of backing memory mapped through the GTT. Not read from the
    /// hardware; `setup_gtt` checks it against the table size.
    pub backing_size: usize,
    /// Byte offset of the cursor image inside the backing memory.
    pub cursor_offset: usize,
    pub cache_policy: CachePolicy,
    /// Quiesce time after the legacy screen-off, in milliseconds.
    pub vga_settle_ms: u64,
    /// Read CUR_CTL back after enabling the cursor and log a mismatch.
    pub verify_writes: bool,
}

impl GfxConfig {
    pub const DEFAULT: GfxConfig = GfxConfig {
        backing_size: 512 * 1024 * 1024,
        cursor_offset: 0,
        cache_policy: CachePolicy::Llc,
        vga_settle_ms: 100,
        verify_writes: true,
    };
}

impl Default for GfxConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
