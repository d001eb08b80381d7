//! Register offsets and typed register values for Ivy Bridge display.
//!
//! Offsets are relative to the start of GTTMMADR (BAR0).

use bitflags::bitflags;

// Legacy VGA sequencer (I/O ports)
pub const SR_INDEX: u16 = 0x3C4;
pub const SR_DATA: u16 = 0x3C5;
pub const SEQ_CLOCKING: u8 = 0x01;

// CPU VGA control
pub const VGA_CONTROL: u32 = 0x41000;

// PCH HDMI ports
pub const HDMI_CTL_B: u32 = 0xE1140;
pub const HDMI_CTL_C: u32 = 0xE1150;
pub const HDMI_CTL_D: u32 = 0xE1160;

// Pipe timing (pipe A; pipes B/C are at +PIPE_STRIDE)
pub const PIPE_HTOTAL_A: u32 = 0x60000;
pub const PIPE_HBLANK_A: u32 = 0x60004;
pub const PIPE_HSYNC_A: u32 = 0x60008;
pub const PIPE_VTOTAL_A: u32 = 0x6000C;
pub const PIPE_VBLANK_A: u32 = 0x60010;
pub const PIPE_VSYNC_A: u32 = 0x60014;
pub const PIPE_SRCSZ_A: u32 = 0x6001C;
pub const PIPE_CONF_A: u32 = 0x70008;

// Cursor plane A
pub const CUR_CTL_A: u32 = 0x70080;
pub const CUR_BASE_A: u32 = 0x70084;
pub const CUR_POS_A: u32 = 0x70088;

pub const PIPE_STRIDE: u32 = 0x1000;
pub const PIPE_COUNT: u32 = 3;

/// The translation table lives in the upper half of BAR0.
pub const GTT_OFFSET: u32 = 2 * 1024 * 1024;

bitflags! {
    /// VGA sequencer clocking mode register (SR01).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SeqClocking: u8 {
        const DOT_CLOCK_8 = 1 << 0;
        const SHIFT_LOAD = 1 << 2;
        const DOT_CLOCK_DIV2 = 1 << 3;
        const SHIFT_4 = 1 << 4;
        const SCREEN_OFF = 1 << 5;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VgaControl: u32 {
        const DISPLAY_DISABLE = 1 << 31;
        const BORDER_ENABLE = 1 << 26;
        const CENTERING_MASK = 3 << 24;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PipeConf: u32 {
        const ENABLE = 1 << 31;
        const STATE_ENABLED = 1 << 30;
    }
}

/// Cursor size/format, bits 5 and 2:0 of CUR_CTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CursorMode {
    Disabled = 0x00,
    Argb128 = 0x22,
    Argb256 = 0x23,
    Argb64 = 0x27,
}

impl CursorMode {
    const MASK: u32 = 0x27;

    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits & Self::MASK {
            0x00 => Some(CursorMode::Disabled),
            0x22 => Some(CursorMode::Argb128),
            0x23 => Some(CursorMode::Argb256),
            0x27 => Some(CursorMode::Argb64),
            _ => None,
        }
    }

    /// Edge length in pixels.
    pub fn size(&self) -> usize {
        match self {
            CursorMode::Disabled => 0,
            CursorMode::Argb64 => 64,
            CursorMode::Argb128 => 128,
            CursorMode::Argb256 => 256,
        }
    }
}

/// CUR_CTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorControl {
    pub mode: CursorMode,
    pub gamma: bool,
}

impl CursorControl {
    const GAMMA_ENABLE: u32 = 1 << 26;

    pub const fn argb64() -> Self {
        Self {
            mode: CursorMode::Argb64,
            gamma: false,
        }
    }

    pub fn encode(&self) -> u32 {
        let mut value = self.mode as u32;
        if self.gamma {
            value |= Self::GAMMA_ENABLE;
        }
        value
    }

    pub fn decode(value: u32) -> Option<Self> {
        Some(Self {
            mode: CursorMode::from_bits(value)?,
            gamma: value & Self::GAMMA_ENABLE != 0,
        })
    }

    pub fn enabled(&self) -> bool {
        self.mode != CursorMode::Disabled
    }
}

/// CUR_POS: X in the low half, Y in the high half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorPos {
    pub x: u16,
    pub y: u16,
}

impl CursorPos {
    /// Clamp signed pointer coordinates into the register's range.
    pub fn from_pointer(x: i32, y: i32) -> Self {
        Self {
            x: x.clamp(0, u16::MAX as i32) as u16,
            y: y.clamp(0, u16::MAX as i32) as u16,
        }
    }

    pub fn encode(&self) -> u32 {
        ((self.y as u32) << 16) | self.x as u32
    }

    pub fn decode(value: u32) -> Self {
        Self {
            x: (value & 0xFFFF) as u16,
            y: (value >> 16) as u16,
        }
    }
}

/// A timing register (HTOTAL, HBLANK, ...): two zero-based 16-bit counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingPair {
    /// Active / start, one-based.
    pub low: u32,
    /// Total / end, one-based.
    pub high: u32,
}

impl TimingPair {
    pub fn decode(value: u32) -> Self {
        Self {
            low: (value & 0xFFFF) + 1,
            high: ((value >> 16) & 0xFFFF) + 1,
        }
    }
}

/// PIPE_SRCSZ: width in 27:16, height in 15:0, both zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSize {
    pub width: u32,
    pub height: u32,
}

impl SourceSize {
    pub fn decode(value: u32) -> Self {
        Self {
            width: ((value >> 16) & 0xFFF) + 1,
            height: (value & 0xFFFF) + 1,
        }
    }
}
