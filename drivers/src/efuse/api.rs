/*++

Licensed under the Apache-2.0 license.

File Name:

    api.rs

Abstract:

    File contains the public eFuse API: the write orchestrator, the
    standalone protection pass and the cached field reads.

--*/

use super::address::Page;
use super::config::EfuseConfig;
use super::controller::EfuseController;
use super::crc::aes_key_crc;
use super::fields::*;
use super::guard::ControllerGuard;
use super::mmio::Mmio;
use super::programmer::BitFailure;
use super::request::{
    user_fuse_count, BootEnvCtrl, GlitchCfg, IvKind, PpkKind, PufHelperData, SubRequest,
    WriteRequest,
};
use super::session::{OpMode, ReadMode};
use crate::cprintln;
use hsm_error::{HsmError, HsmResult};

/// Progress of the most recent write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    Idle,
    SessionOpen,
    Validating,
    Programming(FieldId),
    CacheReloading,
    ProtectionSynthesizing,

    /// Terminal success; the controller is locked
    Locked,

    /// Terminal failure; bits burned before the failure stay burned
    Failed,
}

/// eFuse API
pub struct Efuse<M: Mmio> {
    ctrl: EfuseController<M>,
    state: WriteState,
}

impl<M: Mmio> Efuse<M> {
    pub fn new(mmio: M, cfg: EfuseConfig) -> Self {
        Self {
            ctrl: EfuseController::new(mmio, cfg),
            state: WriteState::Idle,
        }
    }

    pub fn controller(&self) -> &EfuseController<M> {
        &self.ctrl
    }

    pub fn state(&self) -> WriteState {
        self.state
    }

    /// Bit that stopped the most recent write, if any
    pub fn last_bit_failure(&self) -> Option<BitFailure> {
        self.ctrl.last_bit_failure()
    }

    /// Validate and burn every field of `req`, then burn the protection
    /// bits the new content calls for.
    ///
    /// The controller is locked again on every exit path. Validation errors
    /// are raised before any bit is burned; a programming error stops the
    /// write at the failing bit.
    ///
    /// # Arguments
    ///
    /// * `req` - Fields to burn
    pub fn write(&mut self, req: &WriteRequest) -> HsmResult<()> {
        if req.is_empty() {
            return Err(HsmError::DRIVER_EFUSE_EMPTY_REQUEST);
        }
        let _guard = ControllerGuard::acquire();
        self.ctrl.last_bit_failure = None;
        self.state = WriteState::Idle;
        if let Err(err) = self.check_environment() {
            return self.finish(Err(err));
        }
        let result = self.run_write(req);
        let result = result.and(self.ctrl.end_session());
        self.finish(result)
    }

    /// Burn any protection bits missing for content already in the fuses.
    ///
    /// # Returns
    ///
    /// Number of protection bits burned
    pub fn protect(&mut self) -> HsmResult<u32> {
        let _guard = ControllerGuard::acquire();
        self.ctrl.last_bit_failure = None;
        if let Err(err) = self.check_environment() {
            log_failure(err);
            return Err(err);
        }
        let result = self.run_protect();
        let end = self.ctrl.end_session();
        let result = match result {
            Ok(burned) => end.map(|_| burned),
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            log_failure(err);
        }
        result
    }

    /// Burn revocation ID `id`, 0 based.
    pub fn revoke_id(&mut self, id: u32) -> HsmResult<()> {
        let req = WriteRequest {
            revocation_ids: Some(id_bit(id)?),
            ..Default::default()
        };
        self.write(&req)
    }

    /// Burn off-chip revocation ID `id`, 0 based.
    pub fn revoke_offchip_id(&mut self, id: u32) -> HsmResult<()> {
        let req = WriteRequest {
            offchip_revoke_ids: Some(id_bit(id)?),
            ..Default::default()
        };
        self.write(&req)
    }

    /// Mark a primary public key hash slot invalid.
    pub fn revoke_ppk(&mut self, kind: PpkKind) -> HsmResult<()> {
        let bits = match kind {
            PpkKind::Ppk0 => MiscCtrlBits::PPK0_INVALID,
            PpkKind::Ppk1 => MiscCtrlBits::PPK1_INVALID,
            PpkKind::Ppk2 => MiscCtrlBits::PPK2_INVALID,
        };
        let req = WriteRequest {
            misc_ctrl: Some(bits),
            ..Default::default()
        };
        self.write(&req)
    }

    fn check_environment(&self) -> HsmResult<()> {
        let cfg = self.ctrl.config();
        let Some(sample) = cfg.env_monitor else {
            return Ok(());
        };
        let sample = sample();
        if !cfg.env_limits.contains(&sample) {
            cprintln!(
                "[efuse] Die at {} mC {} mV, not programming",
                sample.temp_millicelsius,
                sample.vccpmc_millivolts
            );
            return Err(HsmError::DRIVER_EFUSE_ENV_OUT_OF_RANGE);
        }
        Ok(())
    }

    fn run_write(&mut self, req: &WriteRequest) -> HsmResult<()> {
        self.state = WriteState::SessionOpen;
        self.ctrl.setup(OpMode::Program, ReadMode::Margin)?;
        cprintln!("[efuse] Programming session open");

        self.state = WriteState::Validating;
        self.ctrl.validate_all(req)?;

        for sub in req.sub_requests() {
            self.state = WriteState::Programming(sub.id);
            self.program_field(&sub)?;
        }

        self.state = WriteState::CacheReloading;
        self.ctrl.reload_cache()?;

        self.state = WriteState::ProtectionSynthesizing;
        self.ctrl.synthesize_protection()?;
        Ok(())
    }

    fn run_protect(&mut self) -> HsmResult<u32> {
        self.ctrl.setup(OpMode::Program, ReadMode::Margin)?;
        self.ctrl.reload_cache()?;
        self.ctrl.synthesize_protection()
    }

    fn finish(&mut self, result: HsmResult<()>) -> HsmResult<()> {
        match result {
            Ok(()) => self.state = WriteState::Locked,
            Err(err) => {
                self.state = WriteState::Failed;
                log_failure(err);
            }
        }
        result
    }

    fn program_field(&mut self, sub: &SubRequest) -> HsmResult<()> {
        let f = sub.field();
        cprintln!("[efuse] Programming field {}", sub.id as u32);
        if let ProgrammedTest::ZeroKeyCrc(kind) = f.programmed_test {
            let key: &[u32; 8] = sub
                .data()
                .try_into()
                .map_err(|_| HsmError::DRIVER_EFUSE_INVALID_PARAM)?;
            self.ctrl.program_rows(f.page, sub.start_row(), key)?;
            self.ctrl.reload_cache()?;
            if !self.ctrl.check_crc(kind, aes_key_crc(key))? {
                cprintln!("[efuse] Key CRC mismatch on field {}", sub.id as u32);
                return Err(HsmError::DRIVER_EFUSE_KEY_CRC_MISMATCH);
            }
            return Ok(());
        }
        for (row, &word) in (sub.start_row()..).zip(sub.data()) {
            if sub.id == FieldId::GlitchCfg {
                self.program_new_bits(f.page, row, word & !GLITCH_WR_LK_MASK)?;
                self.program_new_bits(f.page, row, word & GLITCH_WR_LK_MASK)?;
            } else {
                self.program_new_bits(f.page, row, word)?;
            }
        }
        Ok(())
    }

    /// Burn the bits of `word` the row does not already hold.
    fn program_new_bits(&mut self, page: Page, row: u32, word: u32) -> HsmResult<()> {
        let new = word & !self.ctrl.read_cache_word(page, row)?;
        if new == 0 {
            return Ok(());
        }
        self.ctrl.program_rows(page, row, &[new])
    }

    fn read_rows<const N: usize>(&self, page: Page, start_row: u32) -> HsmResult<[u32; N]> {
        let _guard = ControllerGuard::acquire();
        let mut words = [0u32; N];
        self.ctrl.read_cache_rows(page, start_row, &mut words)?;
        Ok(words)
    }

    fn read_row(&self, row: u32) -> HsmResult<u32> {
        let [word] = self.read_rows::<1>(Page::Page0, row)?;
        Ok(word)
    }

    /// Cached word of page 0 `row`.
    pub fn get_cached_word(&self, row: u32) -> HsmResult<u32> {
        self.read_row(row)
    }

    /// Have the controller compare a key against `expected`.
    pub fn check_crc(&self, kind: CrcKind, expected: u32) -> HsmResult<bool> {
        let _guard = ControllerGuard::acquire();
        self.ctrl.check_crc(kind, expected)
    }

    pub fn read_sec_ctrl_bits(&self) -> HsmResult<SecCtrlBits> {
        Ok(SecCtrlBits::from_bits_truncate(self.read_row(SEC_CTRL_ROW)?))
    }

    pub fn read_misc_ctrl_bits(&self) -> HsmResult<MiscCtrlBits> {
        Ok(MiscCtrlBits::from_bits_truncate(self.read_row(MISC_CTRL_ROW)?))
    }

    pub fn read_glitch_cfg(&self) -> HsmResult<GlitchCfg> {
        let word = self.read_row(GLITCH_ROW)?;
        Ok(GlitchCfg {
            value: word & GLITCH_CFG_VALUE_MASK,
            write_lock: word & GLITCH_WR_LK_MASK != 0,
        })
    }

    pub fn read_iv(&self, kind: IvKind) -> HsmResult<[u32; IV_ROWS as usize]> {
        self.read_rows(Page::Page0, field(kind.field_id()).start_row)
    }

    pub fn read_ppk_hash(&self, kind: PpkKind) -> HsmResult<[u32; PPK_HASH_ROWS as usize]> {
        self.read_rows(Page::Page0, field(kind.field_id()).start_row)
    }

    /// Revocation ID word `idx`, 0 based.
    pub fn read_revocation_id(&self, idx: u32) -> HsmResult<u32> {
        if idx >= REVOCATION_ID_ROWS {
            return Err(HsmError::DRIVER_EFUSE_INVALID_PARAM);
        }
        self.read_row(REVOCATION_ID_START_ROW + idx)
    }

    /// Off-chip revocation ID word `idx`, 0 based.
    pub fn read_offchip_revoke_id(&self, idx: u32) -> HsmResult<u32> {
        if idx >= OFFCHIP_REVOKE_ROWS {
            return Err(HsmError::DRIVER_EFUSE_INVALID_PARAM);
        }
        self.read_row(OFFCHIP_REVOKE_START_ROW + idx)
    }

    pub fn read_sec_misc1_bits(&self) -> HsmResult<SecMisc1Bits> {
        Ok(SecMisc1Bits::from_bits_truncate(self.read_row(SEC_MISC1_ROW)?))
    }

    pub fn read_boot_env_ctrl(&self) -> HsmResult<BootEnvCtrl> {
        Ok(BootEnvCtrl::from_word(self.read_row(BOOT_ENV_CTRL_ROW)?))
    }

    pub fn read_dec_only(&self) -> HsmResult<bool> {
        Ok(self.read_row(DEC_ONLY_ROW)? & DEC_ONLY_MASK != 0)
    }

    /// Read consecutive user fuses.
    ///
    /// # Arguments
    ///
    /// * `start` - Number of the first user fuse, 1 based
    /// * `out` - Receives one word per user fuse
    pub fn read_user_fuses(&self, start: u32, out: &mut [u32]) -> HsmResult<()> {
        user_fuse_count(start, out.len())?;
        let _guard = ControllerGuard::acquire();
        self.ctrl
            .read_cache_rows(Page::Page0, USER_FUSE_START_ROW + start - 1, out)
    }

    pub fn read_puf_helper_data(&self) -> HsmResult<PufHelperData> {
        let syndrome = self.read_rows(Page::Page2, PUF_SYN_START_ROW)?;
        Ok(PufHelperData {
            syndrome,
            chash: self.read_row(PUF_CHASH_ROW)?,
            aux: self.read_row(PUF_AUX_ROW)? & PUF_AUX_MASK,
        })
    }

    /// Device unique identifier.
    pub fn read_dna(&self) -> HsmResult<[u32; DNA_ROWS as usize]> {
        self.read_rows(Page::Page0, DNA_START_ROW)
    }
}

/// Eight revocation words with only bit `id` set.
fn id_bit(id: u32) -> HsmResult<[u32; 8]> {
    let idx = usize::try_from(id / 32).map_err(|_| HsmError::DRIVER_EFUSE_INVALID_PARAM)?;
    let mut words = [0u32; 8];
    *words
        .get_mut(idx)
        .ok_or(HsmError::DRIVER_EFUSE_INVALID_PARAM)? = 1 << (id % 32);
    Ok(words)
}

fn log_failure(err: HsmError) {
    let code = u32::from(err);
    if err.is_integrity_fault() {
        cprintln!("[efuse] Integrity fault 0x{:08x}", code);
    } else if err.is_pre_write() {
        cprintln!("[efuse] Request rejected 0x{:08x}", code);
    } else {
        cprintln!("[efuse] Programming failed 0x{:08x}", code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_bit() {
        assert_eq!(id_bit(0).unwrap(), [1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(id_bit(37).unwrap()[1], 1 << 5);
        assert_eq!(id_bit(255).unwrap()[7], 1 << 31);
        assert_eq!(id_bit(256), Err(HsmError::DRIVER_EFUSE_INVALID_PARAM));
    }
}
