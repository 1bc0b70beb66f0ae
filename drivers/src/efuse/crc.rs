/*++

Licensed under the Apache-2.0 license.

File Name:

    crc.rs

Abstract:

    File contains the CRC used by the controller to check write-only keys
    and the hardware compare primitive.

--*/

use super::controller::EfuseController;
use super::fields::CrcKind;
use super::mmio::{Mmio, WaitStatus};
use super::regs::STATUS_OFFSET;
use hsm_error::{HsmError, HsmResult};

/// Reflected CRC-32C polynomial
const CRC32C_POLY_REFLECTED: u32 = 0x82F6_3B78;

/// Bits of row index folded into the CRC after each key word
const ROW_INDEX_BITS: u32 = 5;

/// CRC of a key whose rows are all zero; the controller reports this
/// value for a blank key slot.
pub const ZERO_KEY_CRC: u32 = 0x6858_A3D5;

fn fold_bits(mut crc: u32, mut data: u32, bits: u32) -> u32 {
    for _ in 0..bits {
        if (data ^ crc) & 1 != 0 {
            crc = (crc >> 1) ^ CRC32C_POLY_REFLECTED;
        } else {
            crc >>= 1;
        }
        data >>= 1;
    }
    crc
}

fn row_crc(crc: u32, data: u32, row_index: u32) -> u32 {
    let crc = fold_bits(crc, data, u32::BITS);
    fold_bits(crc, row_index, ROW_INDEX_BITS)
}

/// Computes the CRC the controller compares against a programmed key.
///
/// Words are consumed last to first; each word is followed by its
/// one-based row index within the key.
///
/// # Arguments
///
/// * `key` - Key words in row order
pub fn aes_key_crc(key: &[u32; 8]) -> u32 {
    key.iter()
        .enumerate()
        .rev()
        .fold(0, |crc, (idx, word)| row_crc(crc, *word, idx as u32 + 1))
}

impl<M: Mmio> EfuseController<M> {
    /// Have the controller compare the CRC of key `kind` with `expected`.
    ///
    /// # Returns
    ///
    /// `true` if the programmed key matches, `DRIVER_EFUSE_CRC_TIMEOUT` if the
    /// compare never completes
    pub fn check_crc(&self, kind: CrcKind, expected: u32) -> HsmResult<bool> {
        self.regs.write_reg(kind.crc_offset(), expected);
        let done = kind.done_mask().bits();
        match self
            .regs
            .wait_for_event(STATUS_OFFSET, done, done, self.cfg.crc_timeout)
        {
            WaitStatus::TimedOut => Err(HsmError::DRIVER_EFUSE_CRC_TIMEOUT),
            WaitStatus::EventSet(status) => Ok(status & kind.pass_mask().bits() != 0),
        }
    }

    /// True if key `kind` is blank.
    pub fn is_key_blank(&self, kind: CrcKind) -> HsmResult<bool> {
        self.check_crc(kind, ZERO_KEY_CRC)
    }
}
