//! Kernel print macros and the boot banner.

use core::fmt;

pub fn banner() {
    kprintln!("");
    kprintln!("============================================================");
    kprintln!("  hdgfx (x86_64) - HD Graphics bring-up kernel");
    kprintln!("  build: {} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    kprintln!("============================================================");
    kprintln!("");
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    crate::serial::print(args);
}

#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => ({
        $crate::util::_print(format_args!($($arg)*));
    });
}

#[macro_export]
macro_rules! kprintln {
    () => ($crate::kprint!("\n"));
    ($fmt:expr) => ($crate::kprint!(concat!($fmt, "\n")));
    ($fmt:expr, $($arg:tt)*) => ($crate::kprint!(concat!($fmt, "\n"), $($arg)*));
}

pub use crate::kprintln;

/// Round `value` up to the next multiple of `align` (a power of two).
#[inline]
pub const fn align_up(value: u64, align: u64) -> u64 {
    (value + align - 1) & !(align - 1)
}

#[inline]
pub const fn is_aligned(value: u64, align: u64) -> bool {
    value & (align - 1) == 0
}
