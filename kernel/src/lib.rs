//! HD Graphics 4000 bring-up kernel.
//!
//! The library holds everything that does not need the boot environment, so
//! the driver logic can be unit tested on the host. `main.rs` wires it to the
//! bootloader.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[macro_use]
pub mod util;

pub mod arch;
pub mod drivers;
pub mod mm;
pub mod platform;
pub mod serial;
