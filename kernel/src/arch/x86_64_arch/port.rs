//! `PortIo` over the `in`/`out` instructions.

use x86_64::instructions::port::Port;

use crate::arch::PortIo;

/// Raw access to the whole I/O port space.
pub struct X86Ports {
    _private: (),
}

impl X86Ports {
    /// # Safety
    /// The caller must run at CPL0 and own the ports it will touch; writes go
    /// straight to hardware.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl PortIo for X86Ports {
    #[inline]
    fn outb(&mut self, port: u16, value: u8) {
        let mut p = Port::<u8>::new(port);
        unsafe { p.write(value) };
    }

    #[inline]
    fn inb(&mut self, port: u16) -> u8 {
        let mut p = Port::<u8>::new(port);
        unsafe { p.read() }
    }
}
