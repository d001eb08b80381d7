//! 16550 UART on COM1, the sink for `kprint!`/`kprintln!`.
//!
//! Nothing is written until `init()` runs, so early or host-side callers
//! (unit tests) just lose their output.

use bitflags::bitflags;
use core::fmt;
use spin::Mutex;

use crate::arch::port::X86Ports;
use crate::arch::PortIo;

const COM1: u16 = 0x3F8;
const BAUD: u32 = 115_200;
const UART_CLOCK: u32 = 115_200;

// Register offsets from the base port
const REG_DATA: u16 = 0;
const REG_INT_EN: u16 = 1;
const REG_FIFO: u16 = 2;
const REG_LINE_CTRL: u16 = 3;
const REG_MODEM_CTRL: u16 = 4;
const REG_LINE_STATUS: u16 = 5;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct LineControl: u8 {
        const WORD_8 = 0b11;
        const DLAB = 1 << 7;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct LineStatus: u8 {
        const THR_EMPTY = 1 << 5;
    }
}

/// Divisor latch value for `baud`.
const fn divisor(baud: u32) -> u16 {
    (UART_CLOCK / baud) as u16
}

/// One 16550 at `base`, driven through `P`.
pub struct Uart<P> {
    ports: P,
    base: u16,
}

impl<P: PortIo> Uart<P> {
    pub const fn new(ports: P, base: u16) -> Self {
        Self { ports, base }
    }

    fn write_reg(&mut self, reg: u16, value: u8) {
        self.ports.outb(self.base + reg, value);
    }

    /// 8N1 at `BAUD`, FIFO on, interrupts off.
    pub fn init(&mut self) {
        let [lo, hi] = divisor(BAUD).to_le_bytes();
        self.write_reg(REG_INT_EN, 0x00);
        self.write_reg(REG_LINE_CTRL, LineControl::DLAB.bits());
        self.write_reg(REG_DATA, lo);
        self.write_reg(REG_INT_EN, hi);
        self.write_reg(REG_LINE_CTRL, LineControl::WORD_8.bits());
        // Enable, clear both queues, 14-byte trigger
        self.write_reg(REG_FIFO, 0xC7);
        // DTR, RTS, OUT2
        self.write_reg(REG_MODEM_CTRL, 0x0B);
    }

    pub fn write_byte(&mut self, b: u8) {
        let status = self.base + REG_LINE_STATUS;
        while !LineStatus::from_bits_truncate(self.ports.inb(status)).contains(LineStatus::THR_EMPTY) {
            core::hint::spin_loop();
        }
        self.write_reg(REG_DATA, b);
    }
}

impl<P: PortIo> fmt::Write for Uart<P> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for &b in s.as_bytes() {
            if b == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(b);
        }
        Ok(())
    }
}

static SERIAL: Mutex<Option<Uart<X86Ports>>> = Mutex::new(None);

pub fn init() {
    let mut guard = SERIAL.lock();
    if guard.is_none() {
        // COM1 belongs to this module alone
        let mut uart = Uart::new(unsafe { X86Ports::new() }, COM1);
        uart.init();
        *guard = Some(uart);
    }
}

pub fn print(args: fmt::Arguments) {
    use core::fmt::Write;
    if let Some(uart) = SERIAL.lock().as_mut() {
        let _ = uart.write_fmt(args);
    }
}
