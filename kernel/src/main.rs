#![no_std]
#![no_main]

use bootloader_api::config::{BootloaderConfig, Mapping};
use bootloader_api::{entry_point, BootInfo};
use linked_list_allocator::LockedHeap;
use x86_64::VirtAddr;

use hdgfx::arch::{self, pit};
use hdgfx::drivers::gfx::{self, GfxConfig, GfxDevice, Probe, VolatileMmio};
use hdgfx::drivers::{mouse, pci};
use hdgfx::mm::{self, RegionAllocator};
use hdgfx::platform::KernelPlatform;
use hdgfx::{kprintln, serial, util};

pub static BOOTLOADER_CONFIG: BootloaderConfig = {
    let mut config = BootloaderConfig::new_default();
    // Backing memory is reached through the physical mapping; BARs get
    // their own uncached mappings.
    config.mappings.physical_memory = Some(Mapping::Dynamic);
    config.kernel_stack_size = 128 * 1024;
    config
};

entry_point!(kernel_main, config = &BOOTLOADER_CONFIG);

#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Cursor refresh period.
const POLL_INTERVAL_MS: u64 = 10;

fn kernel_main(boot_info: &'static mut BootInfo) -> ! {
    serial::init();
    util::banner();

    unsafe { mm::heap::init_heap(&ALLOCATOR) };

    let boot_info: &'static BootInfo = boot_info;
    let Some(offset) = boot_info.physical_memory_offset.into_option() else {
        kprintln!("boot: no physical memory mapping, halting");
        arch::halt_loop();
    };
    let phys_offset = VirtAddr::new(offset);
    kprintln!("boot: physical memory at {:#x}", offset);

    let frames = unsafe { RegionAllocator::new(&boot_info.memory_regions, phys_offset) };
    let mut platform = unsafe { KernelPlatform::new(frames, phys_offset) };

    kprintln!("boot: scanning PCI...");
    let mut slot: Option<GfxDevice<VolatileMmio>> = None;
    for dev in pci::scan() {
        if gfx::probe(&dev, GfxConfig::DEFAULT, &mut slot) == Probe::Supported {
            pci::enable_bus_mastering(dev.addr);
            break;
        }
    }

    let Some(mut gpu) = slot else {
        kprintln!("boot: no supported graphics controller, halting");
        arch::halt_loop();
    };

    if let Err(e) = gpu.start(&mut platform) {
        kprintln!("gfx: bring-up stopped at {:?}: {}", gpu.stage(), e);
        arch::halt_loop();
    }

    mouse::init();
    if let Some(size) = gpu.screen_size() {
        kprintln!("boot: pointer bounds {}x{}", size.width, size.height);
        mouse::set_screen_bounds(size.width as i32, size.height as i32);
    }

    kprintln!("boot: cursor running");
    loop {
        mouse::poll();
        if let Err(e) = gpu.poll(&mouse::SharedPointer) {
            kprintln!("gfx: cursor update failed: {}", e);
            arch::halt_loop();
        }
        pit::wait_ms(POLL_INTERVAL_MS);
    }
}

use core::panic::PanicInfo;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    kprintln!("\n\n!!! KERNEL PANIC !!!");
    kprintln!("message: {}", info.message());
    if let Some(loc) = info.location() {
        kprintln!("at: {}:{}:{}", loc.file(), loc.line(), loc.column());
    }
    kprintln!("halt.");
    arch::halt_loop();
}
