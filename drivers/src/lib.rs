/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the HSM eFuse driver library.

--*/

#![cfg_attr(not(any(feature = "std", test)), no_std)]

mod efuse;
pub mod printer;
mod wait;

pub use efuse::{
    aes_key_crc, cfi_launder, field, is_write_only_row, BitFailure, BootEnvCtrl, BootEnvCtrlBits,
    CrcKind, Efuse, EfuseConfig, EfuseController, EfuseRegs, EnvLimits, EnvSample, FieldId,
    FuseAddress, FuseField, GlitchCfg, IvKind, Key256, MiscCtrlBits, Mmio, OpMode, Page, PpkKind,
    ProgrammedTest, ProgrammingTimers, ProtectionCommit, ProtectionEntry, ProtectionTrigger,
    PufHelperData, ReadMode, RealMmio, RedundantRead, SecCtrlBits, SecMisc1Bits, UserFuses,
    WaitStatus, WriteLock, WriteRequest, WriteState, FUSE_FIELDS, PROGRAM_ORDER, PROTECTION_MAP,
    ZERO_KEY_CRC,
};
pub use efuse::{layout, regs};
pub use hsm_error::{HsmError, HsmResult};
