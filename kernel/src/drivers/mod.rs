pub mod gfx;
pub mod mouse;
pub mod pci;
