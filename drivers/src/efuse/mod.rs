/*++

Licensed under the Apache-2.0 license.

File Name:

    mod.rs

Abstract:

    File contains the eFuse programming and protection driver.

--*/

mod address;
mod api;
mod cache;
mod config;
mod controller;
mod crc;
mod fields;
mod guard;
mod mmio;
mod programmer;
mod protection;
mod redundant;
pub mod regs;
mod request;
mod session;
mod validator;

pub use address::{FuseAddress, Page};
pub use api::{Efuse, WriteState};
pub use config::{EfuseConfig, EnvLimits, EnvSample};
pub use controller::EfuseController;
pub use crc::{aes_key_crc, ZERO_KEY_CRC};
pub use fields::{
    field, is_write_only_row, BootEnvCtrlBits, CrcKind, FieldId, FuseField, MiscCtrlBits,
    ProgrammedTest, SecCtrlBits, SecMisc1Bits, WriteLock, FUSE_FIELDS,
};
pub use mmio::{EfuseRegs, Mmio, RealMmio, WaitStatus};
pub use programmer::BitFailure;
pub use protection::{ProtectionCommit, ProtectionEntry, ProtectionTrigger, PROTECTION_MAP};
pub use redundant::{cfi_launder, RedundantRead};
pub use request::{
    BootEnvCtrl, GlitchCfg, IvKind, Key256, PpkKind, PufHelperData, UserFuses, WriteRequest, PROGRAM_ORDER,
};
pub use session::{OpMode, ProgrammingTimers, ReadMode};

/// Row layout constants
pub mod layout {
    pub use super::fields::{
        AES_KEY_START_ROW, ANCHOR_MASK, ANCHOR_PATTERN, BLK_OBFUS_IV_START_ROW,
        BOOT_ENV_CTRL_ROW, DEC_ONLY_ROW, DNA_START_ROW, GLITCH_ROW, META_HEADER_IV_START_ROW,
        MISC_CTRL_ROW, OFFCHIP_REVOKE_START_ROW, PPK0_START_ROW, PROTECTION_ROW, PUF_AUX_ROW,
        PUF_CHASH_ROW, REVOCATION_ID_START_ROW, SEC_CTRL_ROW, SEC_MISC1_ROW, USER_FUSE_START_ROW,
        USER_KEY0_START_ROW, USER_KEY1_START_ROW,
    };
}
