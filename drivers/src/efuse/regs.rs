/*++

Licensed under the Apache-2.0 license.

File Name:

    regs.rs

Abstract:

    File contains register offsets and bit definitions for the eFuse
    controller and its cache.

--*/

/// Default base address of the eFuse controller register block
pub const EFUSE_CTRL_BASE_ADDR: u32 = 0xF124_0000;

/// Default base address of the read-only eFuse cache
pub const EFUSE_CACHE_BASE_ADDR: u32 = 0xF125_0000;

pub const WR_LOCK_OFFSET: u32 = 0x00;
pub const CFG_OFFSET: u32 = 0x04;
pub const STATUS_OFFSET: u32 = 0x08;
pub const PGM_ADDR_OFFSET: u32 = 0x0C;
pub const RD_ADDR_OFFSET: u32 = 0x10;
pub const RD_DATA_OFFSET: u32 = 0x14;
pub const TPGM_OFFSET: u32 = 0x18;
pub const TRD_OFFSET: u32 = 0x1C;
pub const TSU_H_PS_OFFSET: u32 = 0x20;
pub const TRDM_OFFSET: u32 = 0x28;
pub const TSU_H_CS_OFFSET: u32 = 0x2C;
pub const ISR_OFFSET: u32 = 0x30;
pub const CACHE_LOAD_OFFSET: u32 = 0x40;
pub const PD_OFFSET: u32 = 0x44;
pub const AES_CRC_OFFSET: u32 = 0x4C;
pub const AES_USR_KEY0_CRC_OFFSET: u32 = 0x50;
pub const AES_USR_KEY1_CRC_OFFSET: u32 = 0x54;
pub const TEST_CTRL_OFFSET: u32 = 0x100;

/// Passcode that unlocks the controller when written to WR_LOCK
pub const WR_UNLOCK_PASSCODE: u32 = 0xDF0D;

/// Any non-passcode value written to WR_LOCK locks the controller
pub const WR_LOCK_VALUE: u32 = 0x0;

/// WR_LOCK readback when the controller is locked
pub const WR_LOCK_STATUS_LOCKED: u32 = 0x1;

/// WR_LOCK readback when the controller is unlocked
pub const WR_LOCK_STATUS_UNLOCKED: u32 = 0x0;

pub const CACHE_LOAD_TRIGGER: u32 = 0x1;
pub const PD_ENABLE: u32 = 0x1;

pub const PAGES: u32 = 3;
pub const ROWS_PER_PAGE: u32 = 256;
pub const COLS_PER_ROW: u32 = 32;

/// Total number of words mirrored by the cache
pub const CACHE_WORDS: u32 = PAGES * ROWS_PER_PAGE;

// Required analog timings of the fuse macro in nanoseconds.
pub const TPGM_NS: u64 = 5000;
pub const TRD_NS: u64 = 217;
pub const TRDM_NS: u64 = 500;
pub const TSU_H_PS_NS: u64 = 208;
pub const TSU_H_CS_NS: u64 = 184;

pub const NS_PER_SEC: u64 = 1_000_000_000;

bitflags::bitflags! {
    /// Controller configuration
    pub struct Cfg : u32 {
        const PGM_EN = 1 << 1;
        const MARGIN_RD = 1 << 2;
    }
}

bitflags::bitflags! {
    /// Controller status
    pub struct Status : u32 {
        const TBIT0 = 1 << 0;
        const TBIT1 = 1 << 1;
        const TBIT2 = 1 << 2;
        const CACHE_DONE = 1 << 5;
        const AES_CRC_PASS = 1 << 6;
        const AES_CRC_DONE = 1 << 7;
        const USER_KEY0_CRC_PASS = 1 << 8;
        const USER_KEY0_CRC_DONE = 1 << 9;
        const USER_KEY1_CRC_PASS = 1 << 10;
        const USER_KEY1_CRC_DONE = 1 << 11;

        const TBITS = Self::TBIT0.bits | Self::TBIT1.bits | Self::TBIT2.bits;
    }
}

bitflags::bitflags! {
    /// Interrupt status, write-1-to-clear
    pub struct Isr : u32 {
        const PGM_DONE = 1 << 0;
        const PGM_ERROR = 1 << 1;
        const RD_DONE = 1 << 2;
        const CACHE_ERROR = 1 << 4;
        const APB_SLVERR = 1 << 31;
    }
}
