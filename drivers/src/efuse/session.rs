/*++

Licensed under the Apache-2.0 license.

File Name:

    session.rs

Abstract:

    File contains the controller session: lock state, power-down, read
    mode, programming timers and the blank device check.

--*/

use super::controller::EfuseController;
use super::mmio::Mmio;
use super::regs::*;
use crate::cprintln;
use hsm_error::{HsmError, HsmResult};

/// Sense thresholds used for reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    Normal,

    /// Required for every programming session
    Margin,
}

/// Purpose of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpMode {
    Read,
    Program,
}

/// Values of the five controller timing registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgrammingTimers {
    /// Program strobe width
    pub pgm: u32,

    /// Read strobe width
    pub rd: u32,

    /// Margin read strobe width
    pub rdm: u32,

    /// Program strobe setup/hold
    pub tsu_h_ps: u32,

    /// Chip select setup/hold
    pub tsu_h_cs: u32,
}

/// `ceil(ns * ref_clk_hz / 1e9)`
fn cycles(ns: u64, ref_clk_hz: u32) -> u32 {
    let cycles = (ns * u64::from(ref_clk_hz)).div_ceil(NS_PER_SEC);
    u32::try_from(cycles).unwrap_or(u32::MAX)
}

impl ProgrammingTimers {
    /// Compute timer values for a reference clock.
    ///
    /// # Arguments
    ///
    /// * `ref_clk_hz` - Controller reference clock
    ///
    /// # Returns
    ///
    /// `DRIVER_EFUSE_INVALID_PARAM` for a zero clock, otherwise timer values that are
    /// all non-zero
    pub fn from_ref_clock(ref_clk_hz: u32) -> HsmResult<Self> {
        if ref_clk_hz == 0 {
            return Err(HsmError::DRIVER_EFUSE_INVALID_PARAM);
        }
        Ok(Self {
            pgm: cycles(TPGM_NS, ref_clk_hz),
            rd: cycles(TRD_NS, ref_clk_hz),
            rdm: cycles(TRDM_NS, ref_clk_hz),
            tsu_h_ps: cycles(TSU_H_PS_NS, ref_clk_hz),
            tsu_h_cs: cycles(TSU_H_CS_NS, ref_clk_hz),
        })
    }
}

impl<M: Mmio> EfuseController<M> {
    pub fn is_locked(&self) -> bool {
        self.regs.read_reg(WR_LOCK_OFFSET) != WR_LOCK_STATUS_UNLOCKED
    }

    /// Unlock the controller with the passcode.
    pub fn unlock(&mut self) -> HsmResult<()> {
        self.regs.write_reg(WR_LOCK_OFFSET, WR_UNLOCK_PASSCODE);
        if self.regs.read_reg(WR_LOCK_OFFSET) != WR_LOCK_STATUS_UNLOCKED {
            return Err(HsmError::DRIVER_EFUSE_UNLOCK_FAILURE);
        }
        Ok(())
    }

    /// Lock the controller.
    pub fn lock(&mut self) -> HsmResult<()> {
        self.regs.write_reg(WR_LOCK_OFFSET, WR_LOCK_VALUE);
        if self.regs.read_reg(WR_LOCK_OFFSET) != WR_LOCK_STATUS_LOCKED {
            return Err(HsmError::DRIVER_EFUSE_LOCK_FAILURE);
        }
        Ok(())
    }

    /// Bring the fuse macro out of power-down if it is powered down.
    pub fn disable_power_down(&mut self) {
        if self.regs.read_reg(PD_OFFSET) & PD_ENABLE == PD_ENABLE {
            self.regs.settle(self.cfg.settle_spins);
            self.regs.write_reg(PD_OFFSET, 0);
            self.regs.settle(self.cfg.settle_spins);
        }
    }

    /// Select the read sense thresholds.
    pub fn set_read_mode(&mut self, mode: ReadMode) -> HsmResult<()> {
        let val = match mode {
            ReadMode::Normal => Cfg::empty(),
            ReadMode::Margin => Cfg::MARGIN_RD,
        };
        self.regs
            .modify_reg(CFG_OFFSET, Cfg::MARGIN_RD.bits(), val.bits());
        let cfg = Cfg::from_bits_truncate(self.regs.read_reg(CFG_OFFSET));
        if cfg & Cfg::MARGIN_RD != val {
            return Err(HsmError::DRIVER_EFUSE_READ_MODE_FAILURE);
        }
        Ok(())
    }

    pub fn enable_programming(&mut self) {
        self.regs
            .modify_reg(CFG_OFFSET, Cfg::PGM_EN.bits(), Cfg::PGM_EN.bits());
    }

    pub fn disable_programming(&mut self) {
        self.regs.modify_reg(CFG_OFFSET, Cfg::PGM_EN.bits(), 0);
    }

    /// Program the timing registers from the configured reference clock.
    pub fn init_timers(&mut self) -> HsmResult<ProgrammingTimers> {
        let timers = ProgrammingTimers::from_ref_clock(self.cfg.ref_clk_hz)?;
        self.regs.write_reg(TPGM_OFFSET, timers.pgm);
        self.regs.write_reg(TRD_OFFSET, timers.rd);
        self.regs.write_reg(TRDM_OFFSET, timers.rdm);
        self.regs.write_reg(TSU_H_PS_OFFSET, timers.tsu_h_ps);
        self.regs.write_reg(TSU_H_CS_OFFSET, timers.tsu_h_cs);
        Ok(timers)
    }

    /// Fails with `DRIVER_EFUSE_BLANK_DEVICE` unless all three T-bits are set.
    pub fn check_tbits(&self) -> HsmResult<()> {
        let status = Status::from_bits_truncate(self.regs.read_reg(STATUS_OFFSET));
        if !status.contains(Status::TBITS) {
            cprintln!("[efuse] T-bits missing, status 0x{:08x}", status.bits());
            return Err(HsmError::DRIVER_EFUSE_BLANK_DEVICE);
        }
        Ok(())
    }

    /// Open a session.
    ///
    /// # Arguments
    ///
    /// * `op` - Read or program session
    /// * `mode` - Read mode; programming sessions must use `ReadMode::Margin`
    pub fn setup(&mut self, op: OpMode, mode: ReadMode) -> HsmResult<()> {
        if op == OpMode::Program && mode != ReadMode::Margin {
            return Err(HsmError::DRIVER_EFUSE_INVALID_PARAM);
        }
        self.unlock()?;
        self.disable_power_down();
        if op == OpMode::Program {
            self.enable_programming();
        }
        self.set_read_mode(mode)?;
        self.init_timers()?;
        self.regs.write_reg(TEST_CTRL_OFFSET, 0);
        self.check_tbits()
    }

    /// Close a session: normal read mode, programming off, locked.
    ///
    /// Every step runs even if an earlier one fails; the first error is
    /// returned.
    pub fn end_session(&mut self) -> HsmResult<()> {
        let read_mode = self.set_read_mode(ReadMode::Normal);
        self.disable_programming();
        let lock = self.lock();
        read_mode.and(lock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timers_round_up() {
        let timers = ProgrammingTimers::from_ref_clock(33_333_333).unwrap();
        assert_eq!(
            timers,
            ProgrammingTimers {
                pgm: 167,
                rd: 8,
                rdm: 17,
                tsu_h_ps: 7,
                tsu_h_cs: 7,
            }
        );
    }

    #[test]
    fn test_timers_exact_at_1ghz() {
        let timers = ProgrammingTimers::from_ref_clock(1_000_000_000).unwrap();
        assert_eq!(timers.pgm, 5000);
        assert_eq!(timers.rd, 217);
        assert_eq!(timers.rdm, 500);
        assert_eq!(timers.tsu_h_ps, 208);
        assert_eq!(timers.tsu_h_cs, 184);
    }

    #[test]
    fn test_timers_never_zero() {
        for hz in [1, 7, 1_000, 4_000_000, 100_000_000, u32::MAX] {
            let t = ProgrammingTimers::from_ref_clock(hz).unwrap();
            for v in [t.pgm, t.rd, t.rdm, t.tsu_h_ps, t.tsu_h_cs] {
                assert_ne!(v, 0, "zero timer at {hz} Hz");
            }
        }
        assert_eq!(
            ProgrammingTimers::from_ref_clock(0),
            Err(HsmError::DRIVER_EFUSE_INVALID_PARAM)
        );
    }
}
