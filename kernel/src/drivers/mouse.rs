//! PS/2 mouse (i8042 auxiliary device), polled.
//!
//! Standard 3-byte packets; the decoded motion moves a shared pointer
//! position that the graphics driver republishes to the cursor plane.

use bitflags::bitflags;
use spin::Mutex;
use x86_64::instructions::port::{PortReadOnly, PortWriteOnly};

use crate::drivers::gfx::PointerSource;

const I8042_DATA_PORT: u16 = 0x60;
const I8042_STATUS_PORT: u16 = 0x64;
const I8042_COMMAND_PORT: u16 = 0x64;

const CMD_READ_CONFIG: u8 = 0x20;
const CMD_WRITE_CONFIG: u8 = 0x60;
const CMD_ENABLE_MOUSE: u8 = 0xA8;
const CMD_WRITE_MOUSE: u8 = 0xD4;

const MOUSE_CMD_SET_DEFAULTS: u8 = 0xF6;
const MOUSE_CMD_ENABLE_DATA: u8 = 0xF4;
const MOUSE_ACK: u8 = 0xFA;

bitflags! {
    /// i8042 status register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Status: u8 {
        const OUTPUT_FULL = 1 << 0;
        const INPUT_FULL = 1 << 1;
        const AUX_DATA = 1 << 5;
    }
}

bitflags! {
    /// First byte of a movement packet.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct PacketFlags: u8 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
        const MIDDLE = 1 << 2;
        const ALWAYS_ONE = 1 << 3;
        const X_SIGN = 1 << 4;
        const Y_SIGN = 1 << 5;
        const X_OVERFLOW = 1 << 6;
        const Y_OVERFLOW = 1 << 7;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub x_delta: i16,
    pub y_delta: i16,
    pub left_button: bool,
    pub right_button: bool,
    pub middle_button: bool,
}

/// Reassembles packets from the byte stream.
#[derive(Debug, Clone, Copy)]
pub struct PacketDecoder {
    index: usize,
    bytes: [u8; 3],
}

impl PacketDecoder {
    pub const fn new() -> Self {
        Self {
            index: 0,
            bytes: [0; 3],
        }
    }

    /// Feed one byte; returns an event once a full, non-overflowing packet
    /// has arrived.
    pub fn feed(&mut self, byte: u8) -> Option<MouseEvent> {
        // Resync: the first byte always has bit 3 set
        if self.index == 0 && byte & PacketFlags::ALWAYS_ONE.bits() == 0 {
            return None;
        }

        self.bytes[self.index] = byte;
        self.index += 1;
        if self.index < 3 {
            return None;
        }
        self.index = 0;

        let flags = PacketFlags::from_bits_retain(self.bytes[0]);
        if flags.intersects(PacketFlags::X_OVERFLOW | PacketFlags::Y_OVERFLOW) {
            return None;
        }

        let x_delta = sign_extend(self.bytes[1], flags.contains(PacketFlags::X_SIGN));
        // PS/2 Y grows upwards, the screen grows downwards
        let y_delta = -sign_extend(self.bytes[2], flags.contains(PacketFlags::Y_SIGN));

        Some(MouseEvent {
            x_delta,
            y_delta,
            left_button: flags.contains(PacketFlags::LEFT),
            right_button: flags.contains(PacketFlags::RIGHT),
            middle_button: flags.contains(PacketFlags::MIDDLE),
        })
    }
}

#[inline]
fn sign_extend(value: u8, negative: bool) -> i16 {
    if negative {
        ((value as u16) | 0xFF00) as i16
    } else {
        value as i16
    }
}

/// Pointer position, confined to the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pointer {
    pub x: i32,
    pub y: i32,
    width: i32,
    height: i32,
}

impl Pointer {
    pub const fn new(width: i32, height: i32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn apply(&mut self, event: &MouseEvent) {
        self.move_to(self.x + event.x_delta as i32, self.y + event.y_delta as i32);
    }

    pub fn move_to(&mut self, x: i32, y: i32) {
        self.x = x.clamp(0, (self.width - 1).max(0));
        self.y = y.clamp(0, (self.height - 1).max(0));
    }

    pub fn set_bounds(&mut self, width: i32, height: i32) {
        self.width = width;
        self.height = height;
        self.move_to(self.x, self.y);
    }
}

static DECODER: Mutex<PacketDecoder> = Mutex::new(PacketDecoder::new());
static POINTER: Mutex<Pointer> = Mutex::new(Pointer::new(1024, 768));

fn status() -> Status {
    let mut port: PortReadOnly<u8> = PortReadOnly::new(I8042_STATUS_PORT);
    Status::from_bits_retain(unsafe { port.read() })
}

fn wait_read() -> bool {
    for _ in 0..100_000 {
        if status().contains(Status::OUTPUT_FULL) {
            return true;
        }
        core::hint::spin_loop();
    }
    false
}

fn wait_write() {
    for _ in 0..100_000 {
        if !status().contains(Status::INPUT_FULL) {
            return;
        }
        core::hint::spin_loop();
    }
}

fn send_controller_cmd(cmd: u8) {
    wait_write();
    let mut port: PortWriteOnly<u8> = PortWriteOnly::new(I8042_COMMAND_PORT);
    unsafe { port.write(cmd) };
}

fn write_data(data: u8) {
    wait_write();
    let mut port: PortWriteOnly<u8> = PortWriteOnly::new(I8042_DATA_PORT);
    unsafe { port.write(data) };
}

fn read_data() -> Option<u8> {
    if !wait_read() {
        return None;
    }
    let mut port: PortReadOnly<u8> = PortReadOnly::new(I8042_DATA_PORT);
    Some(unsafe { port.read() })
}

fn send_mouse_cmd(cmd: u8) -> bool {
    send_controller_cmd(CMD_WRITE_MOUSE);
    write_data(cmd);
    read_data() == Some(MOUSE_ACK)
}

/// Enable the auxiliary port and start streaming. IRQ12 stays masked in the
/// controller config; bytes are picked up by `poll()`.
pub fn init() {
    send_controller_cmd(CMD_ENABLE_MOUSE);

    send_controller_cmd(CMD_READ_CONFIG);
    let Some(mut config) = read_data() else {
        crate::kprintln!("mouse: controller did not answer");
        return;
    };
    config &= !0x02; // no IRQ12
    config &= !0x20; // aux clock on
    send_controller_cmd(CMD_WRITE_CONFIG);
    write_data(config);

    if !send_mouse_cmd(MOUSE_CMD_SET_DEFAULTS) {
        crate::kprintln!("mouse: set_defaults failed");
        return;
    }
    if !send_mouse_cmd(MOUSE_CMD_ENABLE_DATA) {
        crate::kprintln!("mouse: enable_data failed");
        return;
    }

    crate::kprintln!("mouse: PS/2 mouse streaming");
}

/// Feed one byte from the auxiliary port.
pub fn process_byte(byte: u8) {
    let event = DECODER.lock().feed(byte);
    if let Some(event) = event {
        POINTER.lock().apply(&event);
    }
}

/// Drain whatever the controller has buffered for the mouse.
pub fn poll() {
    for _ in 0..32 {
        let st = status();
        if !st.contains(Status::OUTPUT_FULL) {
            break;
        }
        let mut port: PortReadOnly<u8> = PortReadOnly::new(I8042_DATA_PORT);
        let byte = unsafe { port.read() };
        if st.contains(Status::AUX_DATA) {
            process_byte(byte);
        }
    }
}

pub fn cursor_position() -> (i32, i32) {
    let p = POINTER.lock();
    (p.x, p.y)
}

pub fn set_screen_bounds(width: i32, height: i32) {
    POINTER.lock().set_bounds(width, height);
}

/// The process-wide pointer, as seen by the cursor plane.
pub struct SharedPointer;

impl PointerSource for SharedPointer {
    fn position(&self) -> (i32, i32) {
        cursor_position()
    }
}
