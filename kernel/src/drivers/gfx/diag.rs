//! Register dumps for bring-up debugging. Read-only.

use super::mmio::{Mmio32, RegisterWindow};
use super::regs::*;
use super::GfxResult;

pub fn dump_port_state<M: Mmio32>(regs: &RegisterWindow<M>) -> GfxResult<()> {
    crate::kprintln!("gfx: HDMI_CTL_B: {:#010x}", regs.read(HDMI_CTL_B)?);
    crate::kprintln!("gfx: HDMI_CTL_C: {:#010x}", regs.read(HDMI_CTL_C)?);
    crate::kprintln!("gfx: HDMI_CTL_D: {:#010x}", regs.read(HDMI_CTL_D)?);
    Ok(())
}

fn dump_timing<M: Mmio32>(regs: &RegisterWindow<M>, name: &str, reg: u32) -> GfxResult<()> {
    let raw = regs.read(reg)?;
    let t = TimingPair::decode(raw);
    crate::kprintln!("    {}: {:08x} {},{}", name, raw, t.low, t.high);
    Ok(())
}

pub fn dump_pipe_state<M: Mmio32>(regs: &RegisterWindow<M>) -> GfxResult<()> {
    for i in 0..PIPE_COUNT {
        let pipe = PIPE_STRIDE * i;
        crate::kprintln!("gfx: pipe {}", i);

        let conf = PipeConf::from_bits_retain(regs.read(PIPE_CONF_A + pipe)?);
        crate::kprintln!(
            "    CONF: {:08x} enabled={}",
            conf.bits(),
            conf.contains(PipeConf::STATE_ENABLED)
        );

        dump_timing(regs, "HTOTAL", PIPE_HTOTAL_A + pipe)?;
        dump_timing(regs, "HBLANK", PIPE_HBLANK_A + pipe)?;
        dump_timing(regs, "HSYNC", PIPE_HSYNC_A + pipe)?;
        dump_timing(regs, "VTOTAL", PIPE_VTOTAL_A + pipe)?;
        dump_timing(regs, "VBLANK", PIPE_VBLANK_A + pipe)?;
        dump_timing(regs, "VSYNC", PIPE_VSYNC_A + pipe)?;

        let raw = regs.read(PIPE_SRCSZ_A + pipe)?;
        let src = SourceSize::decode(raw);
        crate::kprintln!("    SRCSZ: {:08x} {}x{}", raw, src.width, src.height);

        crate::kprintln!("    CUR_CTL: {:08x}", regs.read(CUR_CTL_A + pipe)?);
        crate::kprintln!("    CUR_BASE: {:08x}", regs.read(CUR_BASE_A + pipe)?);
        crate::kprintln!("    CUR_POS: {:08x}", regs.read(CUR_POS_A + pipe)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::gfx::testing::FakeBus;

    #[test]
    fn test_dumps_are_read_only() {
        let bus = FakeBus::new();
        let regs = RegisterWindow::new(bus.mmio(), 4 << 20);
        dump_port_state(&regs).unwrap();
        dump_pipe_state(&regs).unwrap();
        assert!(bus.events().is_empty());
    }

    #[test]
    fn test_dump_needs_full_window() {
        let bus = FakeBus::new();
        let regs = RegisterWindow::new(bus.mmio(), 0x70000);
        assert!(dump_pipe_state(&regs).is_err());
    }
}
