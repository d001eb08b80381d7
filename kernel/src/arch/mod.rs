//! Architecture layer: port I/O and the settling-delay timer.
//!
//! Drivers take these through the `PortIo` and `Delay` traits so the bring-up
//! sequence can run against a recording double on the host.

pub mod x86_64_arch;

pub use x86_64_arch::{halt_loop, pit, port};

/// 8-bit legacy port I/O.
pub trait PortIo {
    fn outb(&mut self, port: u16, value: u8);
    fn inb(&mut self, port: u16) -> u8;
}

/// Busy/cooperative wait with no cancellation.
pub trait Delay {
    fn delay_ms(&mut self, ms: u64);
}
