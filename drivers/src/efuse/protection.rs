/*++

Licensed under the Apache-2.0 license.

File Name:

    protection.rs

Abstract:

    File contains the protection map, the protection fuse synthesizer and
    the integrity checks run after every cache reload.

--*/

use super::address::Page;
use super::controller::EfuseController;
use super::fields::*;
use super::mmio::Mmio;
use super::redundant::RedundantRead;
use crate::cprintln;
use hsm_error::{HsmError, HsmResult};

/// Longest row range guarded by a single protection entry
const MAX_GUARDED_ROWS: usize = 24;

/// When a guarded row range counts as committed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionCommit {
    /// Any word is non-zero under the mask
    AnyBit,

    /// Every word holds all bits of the mask
    FullMask,
}

/// Content whose presence requires a protection bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionTrigger {
    Rows {
        page: Page,
        start_row: u32,
        row_count: u32,
        mask: u32,
        commit: ProtectionCommit,
    },

    /// Write-only key, committed if its CRC differs from the zero key CRC
    KeyCrc(CrcKind),
}

/// One row of the protection map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectionEntry {
    pub trigger: ProtectionTrigger,

    /// Bits of the protection row owned by this entry
    pub bits: u32,
}

const fn rows(start_row: u32, row_count: u32, mask: u32) -> ProtectionTrigger {
    ProtectionTrigger::Rows {
        page: Page::Page0,
        start_row,
        row_count,
        mask,
        commit: ProtectionCommit::AnyBit,
    }
}

const MISC_CTRL_PROTECTED: u32 = MiscCtrlBits::PPK0_INVALID.bits()
    | MiscCtrlBits::PPK1_INVALID.bits()
    | MiscCtrlBits::PPK2_INVALID.bits()
    | MiscCtrlBits::CRYPTO_KAT_EN.bits()
    | MiscCtrlBits::GD_ROM_MONITOR_EN.bits();

/// Protection bits of page 0 row 0 and the content that triggers them
pub const PROTECTION_MAP: [ProtectionEntry; 11] = [
    ProtectionEntry {
        trigger: rows(SEC_CTRL_ROW, 1, u32::MAX),
        bits: 0b11 << 0,
    },
    ProtectionEntry {
        trigger: ProtectionTrigger::Rows {
            page: Page::Page0,
            start_row: DEC_ONLY_ROW,
            row_count: 1,
            mask: DEC_ONLY_MASK,
            commit: ProtectionCommit::FullMask,
        },
        bits: 0b11 << 2,
    },
    ProtectionEntry {
        trigger: rows(PPK0_START_ROW, 3 * PPK_HASH_ROWS, u32::MAX),
        bits: 0b11 << 4,
    },
    ProtectionEntry {
        trigger: rows(META_HEADER_IV_START_ROW, IV_ROWS, u32::MAX),
        bits: 0b11 << 6,
    },
    ProtectionEntry {
        trigger: rows(MISC_CTRL_ROW, 1, MISC_CTRL_PROTECTED),
        bits: 1 << 8,
    },
    ProtectionEntry {
        trigger: rows(PUF_CHASH_ROW, 1, u32::MAX),
        bits: 1 << 9,
    },
    ProtectionEntry {
        trigger: ProtectionTrigger::KeyCrc(CrcKind::AesKey),
        bits: 1 << 11,
    },
    ProtectionEntry {
        trigger: ProtectionTrigger::KeyCrc(CrcKind::UserKey0),
        bits: 1 << 12,
    },
    ProtectionEntry {
        trigger: ProtectionTrigger::KeyCrc(CrcKind::UserKey1),
        bits: 1 << 13,
    },
    ProtectionEntry {
        trigger: rows(BOOT_ENV_CTRL_ROW, 1, BOOT_ENV_CTRL_MASK),
        bits: 1 << 14,
    },
    ProtectionEntry {
        trigger: rows(SEC_MISC1_ROW, 1, SEC_MISC1_MASK),
        bits: 1 << 15,
    },
];

/// Snapshot of the content behind a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Guarded {
    Rows {
        words: [u32; MAX_GUARDED_ROWS],
        len: usize,
        mask: u32,
        commit: ProtectionCommit,
    },
    KeyPresent(bool),
}

impl Guarded {
    fn is_committed(&self) -> bool {
        match self {
            Guarded::Rows {
                words,
                len,
                mask,
                commit,
            } => {
                let words = &words[..*len];
                match commit {
                    ProtectionCommit::AnyBit => words.iter().any(|w| w & mask != 0),
                    ProtectionCommit::FullMask => words.iter().all(|w| w & mask == *mask),
                }
            }
            Guarded::KeyPresent(present) => *present,
        }
    }
}

impl<M: Mmio> EfuseController<M> {
    fn read_guarded(&self, trigger: &ProtectionTrigger) -> HsmResult<Guarded> {
        match *trigger {
            ProtectionTrigger::Rows {
                page,
                start_row,
                row_count,
                mask,
                commit,
            } => {
                let len = usize::try_from(row_count)
                    .ok()
                    .filter(|len| *len <= MAX_GUARDED_ROWS)
                    .ok_or(HsmError::DRIVER_EFUSE_INVALID_PARAM)?;
                let mut words = [0u32; MAX_GUARDED_ROWS];
                self.read_cache_rows(page, start_row, &mut words[..len])?;
                Ok(Guarded::Rows {
                    words,
                    len,
                    mask,
                    commit,
                })
            }
            ProtectionTrigger::KeyCrc(kind) => Ok(Guarded::KeyPresent(!self.is_key_blank(kind)?)),
        }
    }

    /// Burn the protection bits of every committed range that lacks them,
    /// then reload the cache.
    ///
    /// # Returns
    ///
    /// Number of protection bits burned; zero when nothing new was committed
    pub fn synthesize_protection(&mut self) -> HsmResult<u32> {
        let current = self.read_cache_word(Page::Page0, PROTECTION_ROW)?;
        let mut wanted = 0;
        for entry in PROTECTION_MAP.iter() {
            if self.read_guarded(&entry.trigger)?.is_committed() {
                wanted |= entry.bits;
            }
        }
        let burn = wanted & !current;
        if burn != 0 {
            cprintln!("[efuse] Burning protection bits 0x{:08x}", burn);
            self.program_rows(Page::Page0, PROTECTION_ROW, &[burn])?;
        }
        self.reload_cache()?;
        Ok(burn.count_ones())
    }

    /// Verify the anchor pattern and that every range marked protected is
    /// still committed. Each value is read twice.
    pub fn protection_checks(&self) -> HsmResult<()> {
        let row = RedundantRead::read(|| self.read_cache_word(Page::Page0, PROTECTION_ROW))?;
        if row & ANCHOR_MASK != ANCHOR_PATTERN {
            cprintln!("[efuse] Anchor bits 0x{:08x}", row & ANCHOR_MASK);
            return Err(HsmError::DRIVER_EFUSE_ANCHOR_BIT_PATTERN);
        }
        for entry in PROTECTION_MAP.iter().filter(|e| row & e.bits != 0) {
            let guarded = RedundantRead::read(|| self.read_guarded(&entry.trigger))?;
            if !guarded.is_committed() {
                cprintln!("[efuse] Protected range 0x{:08x} is empty", entry.bits);
                return Err(HsmError::DRIVER_EFUSE_INTEGRITY_FAILURE);
            }
        }
        Ok(())
    }
}
