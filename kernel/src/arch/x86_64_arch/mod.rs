pub mod pit;
pub mod port;

pub fn halt_loop() -> ! {
    loop {
        x86_64::instructions::hlt();
    }
}
