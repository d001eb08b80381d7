//! PIT channel 2 one-shot busy wait.
//!
//! Channel 2 is gated through port 0x61 and its OUT line is readable there,
//! so it can time short waits without interrupts being set up.

use x86_64::instructions::port::Port;

use crate::arch::Delay;

const PIT_CH2: u16 = 0x42;
const PIT_CMD: u16 = 0x43;
const PORT_61: u16 = 0x61;

const PIT_FREQUENCY_HZ: u64 = 1_193_182;

/// Longest single one-shot, kept well under the 16-bit counter limit.
const MAX_CHUNK_MS: u64 = 50;

/// Counter reload value for `ms` milliseconds (`ms` <= `MAX_CHUNK_MS`).
pub const fn ticks_for_ms(ms: u64) -> u16 {
    let ticks = PIT_FREQUENCY_HZ * ms / 1000;
    if ticks == 0 {
        1
    } else if ticks > 0xFFFF {
        0xFFFF
    } else {
        ticks as u16
    }
}

fn one_shot(count: u16) {
    unsafe {
        let mut cmd: Port<u8> = Port::new(PIT_CMD);
        let mut ch2: Port<u8> = Port::new(PIT_CH2);
        let mut gate: Port<u8> = Port::new(PORT_61);

        // Gate on, speaker off
        let saved = gate.read();
        gate.write((saved & 0xFD) | 0x01);

        // Channel 2, lobyte/hibyte, mode 0 (interrupt on terminal count)
        cmd.write(0xB0);
        ch2.write((count & 0xFF) as u8);
        ch2.write((count >> 8) as u8);

        while gate.read() & 0x20 == 0 {
            core::hint::spin_loop();
        }

        gate.write(saved);
    }
}

/// Block for `ms` milliseconds.
pub fn wait_ms(ms: u64) {
    let mut remaining = ms;
    while remaining > 0 {
        let chunk = remaining.min(MAX_CHUNK_MS);
        one_shot(ticks_for_ms(chunk));
        remaining -= chunk;
    }
}

/// `Delay` backed by `wait_ms`.
pub struct PitDelay;

impl Delay for PitDelay {
    fn delay_ms(&mut self, ms: u64) {
        wait_ms(ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_for_ms() {
        assert_eq!(ticks_for_ms(0), 1);
        assert_eq!(ticks_for_ms(1), 1193);
        assert_eq!(ticks_for_ms(50), 59659);
        assert_eq!(ticks_for_ms(MAX_CHUNK_MS), 59659);
    }
}
