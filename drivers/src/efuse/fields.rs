/*++

Licensed under the Apache-2.0 license.

File Name:

    fields.rs

Abstract:

    File contains the declarative table of programmable fuse fields.

--*/

use super::address::Page;
use super::regs::{
    Status, AES_CRC_OFFSET, AES_USR_KEY0_CRC_OFFSET, AES_USR_KEY1_CRC_OFFSET,
};

/// Row holding the protection bits and the anchor pattern
pub const PROTECTION_ROW: u32 = 0;
pub const DNA_START_ROW: u32 = 1;
pub const DNA_ROWS: u32 = 4;
pub const AES_KEY_START_ROW: u32 = 12;
pub const USER_KEY0_START_ROW: u32 = 20;
pub const USER_KEY1_START_ROW: u32 = 28;
pub const KEY_ROWS: u32 = 8;
pub const BOOT_ENV_CTRL_ROW: u32 = 37;
pub const GLITCH_ROW: u32 = 39;
pub const MISC_CTRL_ROW: u32 = 40;
pub const PUF_AUX_ROW: u32 = 41;
pub const PUF_CHASH_ROW: u32 = 42;
pub const SEC_CTRL_ROW: u32 = 43;
pub const REVOCATION_ID_START_ROW: u32 = 48;
pub const REVOCATION_ID_ROWS: u32 = 8;
pub const DEC_ONLY_ROW: u32 = 57;
pub const SEC_MISC1_ROW: u32 = 58;
pub const PPK0_START_ROW: u32 = 64;
pub const PPK1_START_ROW: u32 = 72;
pub const PPK2_START_ROW: u32 = 80;
pub const PPK_HASH_ROWS: u32 = 8;
pub const META_HEADER_IV_START_ROW: u32 = 96;
pub const BLK_OBFUS_IV_START_ROW: u32 = 112;
pub const PLM_IV_START_ROW: u32 = 115;
pub const DATA_PARTITION_IV_START_ROW: u32 = 118;
pub const IV_ROWS: u32 = 3;
/// Row of user fuse 1; user fuse `n` lives at `USER_FUSE_START_ROW + n - 1`
pub const USER_FUSE_START_ROW: u32 = 129;
pub const USER_FUSE_COUNT: u32 = 63;
pub const OFFCHIP_REVOKE_START_ROW: u32 = 201;
pub const OFFCHIP_REVOKE_ROWS: u32 = 8;
pub const PUF_SYN_START_ROW: u32 = 0;
pub const PUF_SYN_ROWS: u32 = 127;

pub const GLITCH_CFG_VALUE_MASK: u32 = 0x7FFF_FFFF;
pub const GLITCH_WR_LK_MASK: u32 = 0x8000_0000;
pub const PUF_AUX_MASK: u32 = 0x00FF_FFFF;
pub const DEC_ONLY_MASK: u32 = 0x0000_FFFF;
pub const SEC_MISC1_MASK: u32 = 0x0000_1FFF;
pub const BOOT_ENV_CTRL_MASK: u32 = 0x003F_FC00;

// Two-bit monitor thresholds of the boot environment control row
pub const SYSMON_TEMP_COLD_SHIFT: u32 = 10;
pub const SYSMON_VOLT_PMC_SHIFT: u32 = 12;
pub const SYSMON_VOLT_PSLP_SHIFT: u32 = 14;
pub const SYSMON_TEMP_HOT_SHIFT: u32 = 17;
pub const SYSMON_THRESHOLD_MAX: u32 = 0b11;

// Anchor bits in the protection row
pub const ANCHOR_0: u32 = 1 << 28;
pub const ANCHOR_1: u32 = 1 << 29;
pub const ANCHOR_2: u32 = 1 << 30;
pub const ANCHOR_3: u32 = 1 << 31;
pub const ANCHOR_MASK: u32 = ANCHOR_0 | ANCHOR_1 | ANCHOR_2 | ANCHOR_3;
pub const ANCHOR_PATTERN: u32 = ANCHOR_3 | ANCHOR_1;

bitflags::bitflags! {
    /// Security control row
    pub struct SecCtrlBits : u32 {
        const AES_DIS = 1 << 0;
        const JTAG_ERR_OUT_DIS = 1 << 1;
        const JTAG_DIS = 1 << 2;
        const PPK0_WR_LK = 1 << 6;
        const PPK1_WR_LK = 1 << 7;
        const PPK2_WR_LK = 1 << 8;
        const AES_CRC_LK = 0b11 << 9;
        const AES_WR_LK = 1 << 11;
        const USER_KEY0_CRC_LK = 1 << 12;
        const USER_KEY0_WR_LK = 1 << 13;
        const USER_KEY1_CRC_LK = 1 << 14;
        const USER_KEY1_WR_LK = 1 << 15;
        const SEC_DBG_DIS = 0b11 << 16;
        const SEC_LOCK_DBG_DIS = 0b11 << 18;
        const BOOT_ENV_WR_LK = 1 << 20;
        const REG_INIT_DIS = 0b11 << 21;
        const PUF_SYN_LK = 1 << 26;
        const PUF_TEST2_DIS = 1 << 27;
        const PUF_DIS = 1 << 28;
    }
}

bitflags::bitflags! {
    /// Miscellaneous control row
    pub struct MiscCtrlBits : u32 {
        const GD_HALT_BOOT_EN = 0b11 << 0;
        const GD_ROM_MONITOR_EN = 1 << 2;
        const HALT_BOOT_ERROR = 0b11 << 3;
        const HALT_BOOT_ENV = 0b11 << 5;
        const PPK0_INVALID = 0b11 << 7;
        const PPK1_INVALID = 0b11 << 9;
        const PPK2_INVALID = 0b11 << 11;
        const LBIST_EN = 1 << 14;
        const CRYPTO_KAT_EN = 1 << 15;
        const SAFETY_MISSION_EN = 1 << 16;
    }
}

bitflags::bitflags! {
    /// Security miscellaneous 1 row
    #[derive(Default)]
    pub struct SecMisc1Bits : u32 {
        const LPD_MBIST_EN = 0b111 << 0;
        const PMC_MBIST_EN = 0b111 << 3;
        const LPD_NOC_SC_EN = 0b111 << 6;
        const SYSMON_VOLT_MON_EN = 0b11 << 9;
        const SYSMON_TEMP_MON_EN = 0b11 << 11;
    }
}

bitflags::bitflags! {
    /// Single-bit enables of the boot environment control row
    #[derive(Default)]
    pub struct BootEnvCtrlBits : u32 {
        const SYSMON_VOLT_SOC = 1 << 16;
        const SYSMON_VOLT_EN = 1 << 20;
        const SYSMON_TEMP_EN = 1 << 21;
    }
}

/// Parts of the boot environment control row that are burned at most once
const BOOT_ENV_SUBFIELDS: [u32; 7] = [
    BootEnvCtrlBits::SYSMON_TEMP_EN.bits(),
    BootEnvCtrlBits::SYSMON_VOLT_EN.bits(),
    BootEnvCtrlBits::SYSMON_VOLT_SOC.bits(),
    SYSMON_THRESHOLD_MAX << SYSMON_TEMP_HOT_SHIFT,
    SYSMON_THRESHOLD_MAX << SYSMON_VOLT_PSLP_SHIFT,
    SYSMON_THRESHOLD_MAX << SYSMON_VOLT_PMC_SHIFT,
    SYSMON_THRESHOLD_MAX << SYSMON_TEMP_COLD_SHIFT,
];

/// Write-only key protected by a hardware CRC compare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrcKind {
    AesKey,
    UserKey0,
    UserKey1,
}

impl CrcKind {
    /// CRC input register offset
    pub fn crc_offset(&self) -> u32 {
        match self {
            CrcKind::AesKey => AES_CRC_OFFSET,
            CrcKind::UserKey0 => AES_USR_KEY0_CRC_OFFSET,
            CrcKind::UserKey1 => AES_USR_KEY1_CRC_OFFSET,
        }
    }

    /// STATUS bit raised when the compare finished
    pub fn done_mask(&self) -> Status {
        match self {
            CrcKind::AesKey => Status::AES_CRC_DONE,
            CrcKind::UserKey0 => Status::USER_KEY0_CRC_DONE,
            CrcKind::UserKey1 => Status::USER_KEY1_CRC_DONE,
        }
    }

    /// STATUS bit raised when the compare matched
    pub fn pass_mask(&self) -> Status {
        match self {
            CrcKind::AesKey => Status::AES_CRC_PASS,
            CrcKind::UserKey0 => Status::USER_KEY0_CRC_PASS,
            CrcKind::UserKey1 => Status::USER_KEY1_CRC_PASS,
        }
    }
}

/// How a field reports that it already holds data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgrammedTest {
    /// Write-only rows: blank iff the key CRC equals the CRC of the zero key
    ZeroKeyCrc(CrcKind),

    /// Blank iff every cache word of the field is zero under its mask
    AllZero,

    /// Flag and ID rows: requested bits are added, zero bits are left alone
    Accumulate,

    /// Bits accumulate, but a request adding bits must repeat every bit
    /// already set
    Revert,

    /// Each listed sub-field is burned at most once; requesting one that
    /// already holds data is refused
    BlankSubfields(&'static [u32]),
}

/// Lock bits guarding a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteLock {
    pub row: u32,

    /// The field is protected if any of these bits is set
    pub mask: u32,
}

/// Field identifiers, in table order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldId {
    AesKey = 0,
    UserKey0,
    UserKey1,
    GlitchCfg,
    MiscCtrl,
    PufAux,
    PufChash,
    SecCtrl,
    RevocationId,
    DecOnly,
    PpkHash0,
    PpkHash1,
    PpkHash2,
    MetaHeaderIv,
    BlkObfusIv,
    PlmIv,
    DataPartitionIv,
    UserFuse,
    PufSyndrome,
    BootEnvCtrl,
    SecMisc1,
    OffChipRevokeId,
}

/// Declarative description of one programmable fuse field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuseField {
    pub id: FieldId,
    pub page: Page,
    pub start_row: u32,
    pub row_count: u32,

    /// Bits of each row owned by the field
    pub mask: u32,

    /// Rows cannot be read back; verification is by CRC only
    pub write_only: bool,
    pub programmed_test: ProgrammedTest,
    pub write_lock: Option<WriteLock>,

    /// Fields that must be programmed or requested alongside this one
    pub depends_on: &'static [FieldId],
}

impl FuseField {
    pub fn end_row(&self) -> u32 {
        self.start_row + self.row_count
    }
}

const fn entry(
    id: FieldId,
    page: Page,
    start_row: u32,
    row_count: u32,
    mask: u32,
    programmed_test: ProgrammedTest,
    write_lock: Option<WriteLock>,
) -> FuseField {
    FuseField {
        id,
        page,
        start_row,
        row_count,
        mask,
        write_only: matches!(programmed_test, ProgrammedTest::ZeroKeyCrc(_)),
        programmed_test,
        write_lock,
        depends_on: &[],
    }
}

const fn sec_ctrl_lock(bits: SecCtrlBits) -> Option<WriteLock> {
    Some(WriteLock {
        row: SEC_CTRL_ROW,
        mask: bits.bits(),
    })
}

const PUF_LOCK: SecCtrlBits = SecCtrlBits::from_bits_truncate(
    SecCtrlBits::PUF_DIS.bits() | SecCtrlBits::PUF_SYN_LK.bits(),
);

/// Every programmable field, indexed by `FieldId as usize`
pub const FUSE_FIELDS: [FuseField; 22] = [
    entry(
        FieldId::AesKey,
        Page::Page0,
        AES_KEY_START_ROW,
        KEY_ROWS,
        u32::MAX,
        ProgrammedTest::ZeroKeyCrc(CrcKind::AesKey),
        sec_ctrl_lock(SecCtrlBits::from_bits_truncate(
            SecCtrlBits::AES_DIS.bits() | SecCtrlBits::AES_WR_LK.bits(),
        )),
    ),
    entry(
        FieldId::UserKey0,
        Page::Page0,
        USER_KEY0_START_ROW,
        KEY_ROWS,
        u32::MAX,
        ProgrammedTest::ZeroKeyCrc(CrcKind::UserKey0),
        sec_ctrl_lock(SecCtrlBits::from_bits_truncate(
            SecCtrlBits::AES_DIS.bits() | SecCtrlBits::USER_KEY0_WR_LK.bits(),
        )),
    ),
    entry(
        FieldId::UserKey1,
        Page::Page0,
        USER_KEY1_START_ROW,
        KEY_ROWS,
        u32::MAX,
        ProgrammedTest::ZeroKeyCrc(CrcKind::UserKey1),
        sec_ctrl_lock(SecCtrlBits::from_bits_truncate(
            SecCtrlBits::AES_DIS.bits() | SecCtrlBits::USER_KEY1_WR_LK.bits(),
        )),
    ),
    entry(
        FieldId::GlitchCfg,
        Page::Page0,
        GLITCH_ROW,
        1,
        GLITCH_CFG_VALUE_MASK | GLITCH_WR_LK_MASK,
        ProgrammedTest::Accumulate,
        Some(WriteLock {
            row: GLITCH_ROW,
            mask: GLITCH_WR_LK_MASK,
        }),
    ),
    entry(
        FieldId::MiscCtrl,
        Page::Page0,
        MISC_CTRL_ROW,
        1,
        u32::MAX,
        ProgrammedTest::Accumulate,
        None,
    ),
    entry(
        FieldId::PufAux,
        Page::Page0,
        PUF_AUX_ROW,
        1,
        PUF_AUX_MASK,
        ProgrammedTest::AllZero,
        sec_ctrl_lock(PUF_LOCK),
    ),
    entry(
        FieldId::PufChash,
        Page::Page0,
        PUF_CHASH_ROW,
        1,
        u32::MAX,
        ProgrammedTest::AllZero,
        sec_ctrl_lock(PUF_LOCK),
    ),
    entry(
        FieldId::SecCtrl,
        Page::Page0,
        SEC_CTRL_ROW,
        1,
        u32::MAX,
        ProgrammedTest::Accumulate,
        None,
    ),
    entry(
        FieldId::RevocationId,
        Page::Page0,
        REVOCATION_ID_START_ROW,
        REVOCATION_ID_ROWS,
        u32::MAX,
        ProgrammedTest::Accumulate,
        None,
    ),
    FuseField {
        depends_on: &[FieldId::AesKey, FieldId::BlkObfusIv],
        ..entry(
            FieldId::DecOnly,
            Page::Page0,
            DEC_ONLY_ROW,
            1,
            DEC_ONLY_MASK,
            ProgrammedTest::AllZero,
            None,
        )
    },
    entry(
        FieldId::PpkHash0,
        Page::Page0,
        PPK0_START_ROW,
        PPK_HASH_ROWS,
        u32::MAX,
        ProgrammedTest::AllZero,
        sec_ctrl_lock(SecCtrlBits::PPK0_WR_LK),
    ),
    entry(
        FieldId::PpkHash1,
        Page::Page0,
        PPK1_START_ROW,
        PPK_HASH_ROWS,
        u32::MAX,
        ProgrammedTest::AllZero,
        sec_ctrl_lock(SecCtrlBits::PPK1_WR_LK),
    ),
    entry(
        FieldId::PpkHash2,
        Page::Page0,
        PPK2_START_ROW,
        PPK_HASH_ROWS,
        u32::MAX,
        ProgrammedTest::AllZero,
        sec_ctrl_lock(SecCtrlBits::PPK2_WR_LK),
    ),
    entry(
        FieldId::MetaHeaderIv,
        Page::Page0,
        META_HEADER_IV_START_ROW,
        IV_ROWS,
        u32::MAX,
        ProgrammedTest::Revert,
        None,
    ),
    entry(
        FieldId::BlkObfusIv,
        Page::Page0,
        BLK_OBFUS_IV_START_ROW,
        IV_ROWS,
        u32::MAX,
        ProgrammedTest::AllZero,
        None,
    ),
    entry(
        FieldId::PlmIv,
        Page::Page0,
        PLM_IV_START_ROW,
        IV_ROWS,
        u32::MAX,
        ProgrammedTest::Revert,
        None,
    ),
    entry(
        FieldId::DataPartitionIv,
        Page::Page0,
        DATA_PARTITION_IV_START_ROW,
        IV_ROWS,
        u32::MAX,
        ProgrammedTest::Revert,
        None,
    ),
    entry(
        FieldId::UserFuse,
        Page::Page0,
        USER_FUSE_START_ROW,
        USER_FUSE_COUNT,
        u32::MAX,
        ProgrammedTest::Revert,
        None,
    ),
    entry(
        FieldId::PufSyndrome,
        Page::Page2,
        PUF_SYN_START_ROW,
        PUF_SYN_ROWS,
        u32::MAX,
        ProgrammedTest::AllZero,
        sec_ctrl_lock(PUF_LOCK),
    ),
    entry(
        FieldId::BootEnvCtrl,
        Page::Page0,
        BOOT_ENV_CTRL_ROW,
        1,
        BOOT_ENV_CTRL_MASK,
        ProgrammedTest::BlankSubfields(&BOOT_ENV_SUBFIELDS),
        sec_ctrl_lock(SecCtrlBits::BOOT_ENV_WR_LK),
    ),
    entry(
        FieldId::SecMisc1,
        Page::Page0,
        SEC_MISC1_ROW,
        1,
        SEC_MISC1_MASK,
        ProgrammedTest::Accumulate,
        None,
    ),
    entry(
        FieldId::OffChipRevokeId,
        Page::Page0,
        OFFCHIP_REVOKE_START_ROW,
        OFFCHIP_REVOKE_ROWS,
        u32::MAX,
        ProgrammedTest::Accumulate,
        None,
    ),
];

/// Table entry of `id`.
pub fn field(id: FieldId) -> &'static FuseField {
    &FUSE_FIELDS[id as usize]
}

/// True if `(page, row)` lies in a write-only key range.
pub fn is_write_only_row(page: Page, row: u32) -> bool {
    FUSE_FIELDS
        .iter()
        .any(|f| f.write_only && f.page == page && (f.start_row..f.end_row()).contains(&row))
}
