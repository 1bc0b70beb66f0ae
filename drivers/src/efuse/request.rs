/*++

Licensed under the Apache-2.0 license.

File Name:

    request.rs

Abstract:

    File contains the write request accepted by the eFuse orchestrator and
    its decomposition into per-field sub-requests.

--*/

use super::fields::*;
use hsm_error::{HsmError, HsmResult};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// 256-bit key, wiped on drop
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct Key256(pub [u32; 8]);

impl From<[u32; 8]> for Key256 {
    fn from(words: [u32; 8]) -> Self {
        Self(words)
    }
}

/// Glitch detector configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlitchCfg {
    /// Detector configuration, bits 30:0
    pub value: u32,

    /// Also burn the configuration write lock
    pub write_lock: bool,
}

impl GlitchCfg {
    pub fn word(&self) -> u32 {
        let lock = if self.write_lock { GLITCH_WR_LK_MASK } else { 0 };
        (self.value & GLITCH_CFG_VALUE_MASK) | lock
    }
}

/// Initialization vector fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IvKind {
    MetaHeader = 0,
    BlkObfus = 1,
    Plm = 2,
    DataPartition = 3,
}

impl IvKind {
    pub fn field_id(&self) -> FieldId {
        match self {
            IvKind::MetaHeader => FieldId::MetaHeaderIv,
            IvKind::BlkObfus => FieldId::BlkObfusIv,
            IvKind::Plm => FieldId::PlmIv,
            IvKind::DataPartition => FieldId::DataPartitionIv,
        }
    }
}

/// Primary public key hash slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PpkKind {
    Ppk0 = 0,
    Ppk1 = 1,
    Ppk2 = 2,
}

impl PpkKind {
    pub fn field_id(&self) -> FieldId {
        match self {
            PpkKind::Ppk0 => FieldId::PpkHash0,
            PpkKind::Ppk1 => FieldId::PpkHash1,
            PpkKind::Ppk2 => FieldId::PpkHash2,
        }
    }
}

/// Consecutive user fuses, numbered from 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserFuses {
    start: u32,
    count: u32,
    data: [u32; USER_FUSE_COUNT as usize],
}

impl UserFuses {
    /// # Arguments
    ///
    /// * `start` - Number of the first user fuse, 1 based
    /// * `data` - One word per user fuse
    ///
    /// # Returns
    ///
    /// `DRIVER_EFUSE_INVALID_PARAM` if the range is empty or runs past the
    /// last user fuse
    pub fn new(start: u32, data: &[u32]) -> HsmResult<Self> {
        let count = user_fuse_count(start, data.len())?;
        let mut words = [0u32; USER_FUSE_COUNT as usize];
        words[..data.len()].copy_from_slice(data);
        Ok(Self {
            start,
            count,
            data: words,
        })
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn data(&self) -> &[u32] {
        &self.data[..self.count as usize]
    }
}

/// Check a 1 based run of user fuses and return its length.
pub(crate) fn user_fuse_count(start: u32, len: usize) -> HsmResult<u32> {
    let count = u32::try_from(len).map_err(|_| HsmError::DRIVER_EFUSE_INVALID_PARAM)?;
    if start == 0 || count == 0 || start > USER_FUSE_COUNT || count > USER_FUSE_COUNT - (start - 1)
    {
        return Err(HsmError::DRIVER_EFUSE_INVALID_PARAM);
    }
    Ok(count)
}

/// Boot environment monitor control
///
/// The enables and each 2-bit threshold are burned at most once. A zero
/// threshold leaves its sub-field blank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootEnvCtrl {
    word: u32,
}

impl BootEnvCtrl {
    /// # Returns
    ///
    /// `DRIVER_EFUSE_INVALID_PARAM` if a threshold does not fit in two bits
    pub fn new(
        enables: BootEnvCtrlBits,
        temp_hot: u32,
        volt_pmc: u32,
        volt_pslp: u32,
        temp_cold: u32,
    ) -> HsmResult<Self> {
        let thresholds = [
            (temp_hot, SYSMON_TEMP_HOT_SHIFT),
            (volt_pmc, SYSMON_VOLT_PMC_SHIFT),
            (volt_pslp, SYSMON_VOLT_PSLP_SHIFT),
            (temp_cold, SYSMON_TEMP_COLD_SHIFT),
        ];
        let mut word = enables.bits();
        for (value, shift) in thresholds {
            if value > SYSMON_THRESHOLD_MAX {
                return Err(HsmError::DRIVER_EFUSE_INVALID_PARAM);
            }
            word |= value << shift;
        }
        Ok(Self { word })
    }

    pub(crate) fn from_word(word: u32) -> Self {
        Self {
            word: word & BOOT_ENV_CTRL_MASK,
        }
    }

    pub fn word(&self) -> u32 {
        self.word
    }

    pub fn enables(&self) -> BootEnvCtrlBits {
        BootEnvCtrlBits::from_bits_truncate(self.word)
    }

    fn threshold(&self, shift: u32) -> u32 {
        (self.word >> shift) & SYSMON_THRESHOLD_MAX
    }

    pub fn temp_hot(&self) -> u32 {
        self.threshold(SYSMON_TEMP_HOT_SHIFT)
    }

    pub fn volt_pmc(&self) -> u32 {
        self.threshold(SYSMON_VOLT_PMC_SHIFT)
    }

    pub fn volt_pslp(&self) -> u32 {
        self.threshold(SYSMON_VOLT_PSLP_SHIFT)
    }

    pub fn temp_cold(&self) -> u32 {
        self.threshold(SYSMON_TEMP_COLD_SHIFT)
    }
}

/// PUF registration output
#[derive(Clone, PartialEq, Eq)]
pub struct PufHelperData {
    pub syndrome: [u32; PUF_SYN_ROWS as usize],
    pub chash: u32,

    /// Auxiliary data, bits 23:0
    pub aux: u32,
}

impl Default for PufHelperData {
    fn default() -> Self {
        Self {
            syndrome: [0; PUF_SYN_ROWS as usize],
            chash: 0,
            aux: 0,
        }
    }
}

/// Fuses to burn in one orchestrator call
///
/// Each present member is one sub-request. Zero bits of any member are
/// never written.
#[derive(Clone, Default)]
pub struct WriteRequest {
    pub glitch_cfg: Option<GlitchCfg>,
    pub aes_key: Option<Key256>,
    pub user_key0: Option<Key256>,
    pub user_key1: Option<Key256>,
    pub ppk_hash: [Option<[u32; PPK_HASH_ROWS as usize]>; 3],
    pub iv: [Option<[u32; IV_ROWS as usize]>; 4],

    /// Restrict boot to encrypted images
    pub dec_only: bool,
    pub revocation_ids: Option<[u32; REVOCATION_ID_ROWS as usize]>,
    pub offchip_revoke_ids: Option<[u32; OFFCHIP_REVOKE_ROWS as usize]>,
    pub misc_ctrl: Option<MiscCtrlBits>,
    pub user_fuses: Option<UserFuses>,
    pub sec_misc1: Option<SecMisc1Bits>,
    pub boot_env_ctrl: Option<BootEnvCtrl>,
    pub puf_helper_data: Option<PufHelperData>,
    pub sec_ctrl: Option<SecCtrlBits>,
}

/// Order in which sub-requests are burned
pub const PROGRAM_ORDER: [FieldId; 22] = [
    FieldId::GlitchCfg,
    FieldId::AesKey,
    FieldId::UserKey0,
    FieldId::UserKey1,
    FieldId::PpkHash0,
    FieldId::PpkHash1,
    FieldId::PpkHash2,
    FieldId::MetaHeaderIv,
    FieldId::BlkObfusIv,
    FieldId::PlmIv,
    FieldId::DataPartitionIv,
    FieldId::DecOnly,
    FieldId::RevocationId,
    FieldId::OffChipRevokeId,
    FieldId::MiscCtrl,
    FieldId::UserFuse,
    FieldId::SecMisc1,
    FieldId::BootEnvCtrl,
    FieldId::PufSyndrome,
    FieldId::PufChash,
    FieldId::PufAux,
    FieldId::SecCtrl,
];

pub(crate) enum Words<'a> {
    Slice(&'a [u32]),
    One([u32; 1]),
}

/// Data destined for one field
pub(crate) struct SubRequest<'a> {
    pub id: FieldId,

    /// First row written, relative to the field start
    pub row_offset: u32,
    words: Words<'a>,
}

impl<'a> SubRequest<'a> {
    fn slice(id: FieldId, words: &'a [u32]) -> Self {
        Self {
            id,
            row_offset: 0,
            words: Words::Slice(words),
        }
    }

    fn one(id: FieldId, word: u32) -> Self {
        Self {
            id,
            row_offset: 0,
            words: Words::One([word]),
        }
    }

    pub fn data(&self) -> &[u32] {
        match &self.words {
            Words::Slice(words) => words,
            Words::One(word) => word,
        }
    }

    pub fn field(&self) -> &'static FuseField {
        field(self.id)
    }

    /// Absolute row of `data()[0]`
    pub fn start_row(&self) -> u32 {
        self.field().start_row + self.row_offset
    }
}

fn key_sub_request(id: FieldId, key: &Option<Key256>) -> Option<SubRequest<'_>> {
    key.as_ref().map(|k| SubRequest::slice(id, &k.0))
}

impl WriteRequest {
    pub(crate) fn sub_request(&self, id: FieldId) -> Option<SubRequest<'_>> {
        match id {
            FieldId::AesKey => key_sub_request(id, &self.aes_key),
            FieldId::UserKey0 => key_sub_request(id, &self.user_key0),
            FieldId::UserKey1 => key_sub_request(id, &self.user_key1),
            FieldId::GlitchCfg => self.glitch_cfg.map(|g| SubRequest::one(id, g.word())),
            FieldId::MiscCtrl => self.misc_ctrl.map(|m| SubRequest::one(id, m.bits())),
            FieldId::SecCtrl => self.sec_ctrl.map(|s| SubRequest::one(id, s.bits())),
            FieldId::PufAux => self
                .puf_helper_data
                .as_ref()
                .map(|p| SubRequest::one(id, p.aux)),
            FieldId::PufChash => self
                .puf_helper_data
                .as_ref()
                .map(|p| SubRequest::one(id, p.chash)),
            FieldId::PufSyndrome => self
                .puf_helper_data
                .as_ref()
                .map(|p| SubRequest::slice(id, &p.syndrome)),
            FieldId::RevocationId => self
                .revocation_ids
                .as_ref()
                .map(|r| SubRequest::slice(id, r)),
            FieldId::OffChipRevokeId => self
                .offchip_revoke_ids
                .as_ref()
                .map(|r| SubRequest::slice(id, r)),
            FieldId::SecMisc1 => self.sec_misc1.map(|m| SubRequest::one(id, m.bits())),
            FieldId::BootEnvCtrl => self.boot_env_ctrl.map(|b| SubRequest::one(id, b.word())),
            FieldId::DecOnly => self.dec_only.then(|| SubRequest::one(id, DEC_ONLY_MASK)),
            FieldId::PpkHash0 | FieldId::PpkHash1 | FieldId::PpkHash2 => {
                let idx = id as usize - FieldId::PpkHash0 as usize;
                self.ppk_hash[idx]
                    .as_ref()
                    .map(|h| SubRequest::slice(id, h))
            }
            FieldId::MetaHeaderIv
            | FieldId::BlkObfusIv
            | FieldId::PlmIv
            | FieldId::DataPartitionIv => {
                let idx = id as usize - FieldId::MetaHeaderIv as usize;
                self.iv[idx].as_ref().map(|iv| SubRequest::slice(id, iv))
            }
            FieldId::UserFuse => self.user_fuses.as_ref().map(|u| SubRequest {
                id,
                row_offset: u.start() - 1,
                words: Words::Slice(u.data()),
            }),
        }
    }

    /// Present sub-requests in programming order.
    pub(crate) fn sub_requests(&self) -> impl Iterator<Item = SubRequest<'_>> {
        PROGRAM_ORDER
            .iter()
            .filter_map(move |id| self.sub_request(*id))
    }

    pub fn contains(&self, id: FieldId) -> bool {
        self.sub_request(id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.sub_requests().next().is_none()
    }
}
