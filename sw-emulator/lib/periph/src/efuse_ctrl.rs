/*++

Licensed under the Apache-2.0 license.

File Name:

    efuse_ctrl.rs

Abstract:

    File contains a model of the eFuse controller, its OTP array and the
    read-only cache that mirrors it.

--*/

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use hsm_emu_bus::testing::{Access, AccessLog};
use hsm_emu_bus::{
    Bus, BusError, ReadOnlyRegister, ReadWriteRegister, Register, RvAddr, RvData, RvSize,
};
use tock_registers::fields::Field;
use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};
use tock_registers::register_bitfields;

register_bitfields! [
    u32,

    /// Programming configuration
    Cfg [
        PGM_EN OFFSET(1) NUMBITS(1) [],
        MARGIN_RD OFFSET(2) NUMBITS(1) [],
    ],

    /// Controller status
    Status [
        TBITS OFFSET(0) NUMBITS(3) [],
        CACHE_DONE OFFSET(5) NUMBITS(1) [],
        AES_CRC_PASS OFFSET(6) NUMBITS(1) [],
        AES_CRC_DONE OFFSET(7) NUMBITS(1) [],
        USER_KEY0_CRC_PASS OFFSET(8) NUMBITS(1) [],
        USER_KEY0_CRC_DONE OFFSET(9) NUMBITS(1) [],
        USER_KEY1_CRC_PASS OFFSET(10) NUMBITS(1) [],
        USER_KEY1_CRC_DONE OFFSET(11) NUMBITS(1) [],
    ],

    /// Interrupt status, write 1 to clear
    Isr [
        PGM_DONE OFFSET(0) NUMBITS(1) [],
        PGM_ERROR OFFSET(1) NUMBITS(1) [],
        RD_DONE OFFSET(2) NUMBITS(1) [],
        CACHE_ERROR OFFSET(4) NUMBITS(1) [],
    ],

    /// Fuse macro power down
    Pd [
        PD OFFSET(0) NUMBITS(1) [],
    ],
];

/// Write-only key slots of the fuse array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySlot {
    Aes,
    User0,
    User1,
}

type StatusField = Field<u32, Status::Register>;

impl KeySlot {
    fn start_row(&self) -> u32 {
        match self {
            KeySlot::Aes => 12,
            KeySlot::User0 => 20,
            KeySlot::User1 => 28,
        }
    }

    /// Done and pass bits of the slot's CRC compare
    fn status(&self) -> (StatusField, StatusField) {
        match self {
            KeySlot::Aes => (Status::AES_CRC_DONE, Status::AES_CRC_PASS),
            KeySlot::User0 => (Status::USER_KEY0_CRC_DONE, Status::USER_KEY0_CRC_PASS),
            KeySlot::User1 => (Status::USER_KEY1_CRC_DONE, Status::USER_KEY1_CRC_PASS),
        }
    }
}

/// Counts programming sessions of every model sharing it
///
/// A session runs from the unlock passcode to the next lock write.
#[derive(Debug, Clone, Default)]
pub struct SessionMonitor {
    counts: Arc<SessionCounts>,
}

#[derive(Debug, Default)]
struct SessionCounts {
    open: AtomicU32,
    max_open: AtomicU32,
    total: AtomicU32,
}

impl SessionMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn enter(&self) {
        let open = self.counts.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.counts.max_open.fetch_max(open, Ordering::SeqCst);
        self.counts.total.fetch_add(1, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.counts.open.fetch_sub(1, Ordering::SeqCst);
    }

    /// Most sessions ever open at once.
    pub fn max_concurrent(&self) -> u32 {
        self.counts.max_open.load(Ordering::SeqCst)
    }

    /// Sessions opened so far.
    pub fn total(&self) -> u32 {
        self.counts.total.load(Ordering::SeqCst)
    }
}

/// A pending cache read corruption
struct Glitch {
    index: u32,
    reads_left: u32,
    xor: u32,
}

/// A key slot whose CRC compares start failing
struct CrcFault {
    slot: KeySlot,
    clean_left: u32,
}

/// eFuse controller model
///
/// Controller registers live at offset 0 of the bus region and the cache
/// at `EmuEfuseCtrl::CACHE_OFFSET`. Program and cache load operations
/// complete on `Bus::poll`.
pub struct EmuEfuseCtrl {
    fuses: Vec<u32>,
    cache: Vec<u32>,
    locked: bool,
    cfg: ReadWriteRegister<Cfg::Register>,
    status: ReadOnlyRegister<Status::Register>,
    isr: ReadWriteRegister<Isr::Register>,
    pd: ReadWriteRegister<Pd::Register>,
    rd_data: ReadOnlyRegister,

    /// TPGM, TRD, TSU_H_PS, TRDM and TSU_H_CS in address order
    timers: [ReadWriteRegister; 5],
    test_ctrl: ReadWriteRegister,

    /// Ticks until the current program or cache load completes
    pgm_ticks: Option<u32>,
    load_ticks: Option<u32>,

    stall_program: bool,
    reject_program: bool,
    stall_read: bool,
    ignore_unlock: bool,
    ignore_lock: bool,
    cache_load_error: bool,
    stuck_bits: Vec<(usize, u32)>,
    crc_fault: Option<CrcFault>,
    parity_rows: Vec<u32>,
    glitch: Option<Glitch>,
    sessions: Option<SessionMonitor>,
    log: AccessLog,
}

impl EmuEfuseCtrl {
    /// Offset of the cache mirror within the bus region
    pub const CACHE_OFFSET: RvAddr = 0x1_0000;

    pub const WR_LOCK: RvAddr = 0x00;
    pub const CFG: RvAddr = 0x04;
    pub const STATUS: RvAddr = 0x08;
    pub const PGM_ADDR: RvAddr = 0x0C;
    pub const RD_ADDR: RvAddr = 0x10;
    pub const RD_DATA: RvAddr = 0x14;
    pub const TPGM: RvAddr = 0x18;
    pub const TRD: RvAddr = 0x1C;
    pub const TSU_H_PS: RvAddr = 0x20;
    pub const TRDM: RvAddr = 0x28;
    pub const TSU_H_CS: RvAddr = 0x2C;
    pub const ISR: RvAddr = 0x30;
    pub const CACHE_LOAD: RvAddr = 0x40;
    pub const PD: RvAddr = 0x44;
    pub const AES_CRC: RvAddr = 0x4C;
    pub const AES_USR_KEY0_CRC: RvAddr = 0x50;
    pub const AES_USR_KEY1_CRC: RvAddr = 0x54;
    pub const TEST_CTRL: RvAddr = 0x100;

    pub const PAGES: u32 = 3;
    pub const ROWS_PER_PAGE: u32 = 256;

    const UNLOCK_PASSCODE: u32 = 0xDF0D;
    const KEY_ROWS: u32 = 8;

    /// Anchor bits of a factory programmed part
    pub const ANCHOR_PATTERN: u32 = 0xA000_0000;

    /// Device unique identifier of a factory programmed part
    pub const DNA: [u32; 4] = [0x4000_1A2B, 0x0C3D_4E5F, 0x6172_8394, 0x00A5_B6C7];

    const PGM_TICKS: u32 = 2;
    const LOAD_TICKS: u32 = 4;

    /// Factory programmed part: T-bits, anchor bits and DNA set, cache
    /// loaded, controller locked and powered down.
    pub fn new() -> Self {
        let words = (Self::PAGES * Self::ROWS_PER_PAGE) as usize;
        let mut ctrl = Self {
            fuses: vec![0; words],
            cache: vec![0; words],
            locked: true,
            cfg: ReadWriteRegister::new(0),
            status: ReadOnlyRegister::new(0),
            isr: ReadWriteRegister::new(0),
            pd: ReadWriteRegister::new(0),
            rd_data: ReadOnlyRegister::new(0),
            timers: std::array::from_fn(|_| ReadWriteRegister::new(0)),
            test_ctrl: ReadWriteRegister::new(0),
            pgm_ticks: None,
            load_ticks: None,
            stall_program: false,
            reject_program: false,
            stall_read: false,
            ignore_unlock: false,
            ignore_lock: false,
            cache_load_error: false,
            stuck_bits: Vec::new(),
            crc_fault: None,
            parity_rows: Vec::new(),
            glitch: None,
            sessions: None,
            log: AccessLog::new(),
        };
        ctrl.pd.reg.write(Pd::PD::SET);
        ctrl.status.reg.write(Status::TBITS::SET);
        ctrl.fuses[0] = Self::ANCHOR_PATTERN;
        ctrl.fuses[1..5].copy_from_slice(&Self::DNA);
        ctrl.load_cache();
        ctrl
    }

    /// Part whose T-bits were never set.
    pub fn blank() -> Self {
        let ctrl = Self::new();
        ctrl.status.reg.modify(Status::TBITS::CLEAR);
        ctrl
    }

    /// Report every unlock and lock of this model to `monitor`.
    pub fn with_session_monitor(mut self, monitor: SessionMonitor) -> Self {
        self.sessions = Some(monitor);
        self
    }

    /// Shared handle to the access log.
    pub fn log(&self) -> AccessLog {
        self.log.clone()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    fn index(page: u32, row: u32) -> usize {
        (page * Self::ROWS_PER_PAGE + row) as usize
    }

    /// Raw fuse row, including write-only key rows.
    pub fn fuse(&self, page: u32, row: u32) -> u32 {
        self.fuses[Self::index(page, row)]
    }

    /// Burn `val` into a fuse row and refresh the cache, as done by
    /// provisioning before the part reaches the driver.
    pub fn burn(&mut self, page: u32, row: u32, val: u32) {
        self.fuses[Self::index(page, row)] |= val;
        self.load_cache();
    }

    /// Burn a key directly into a write-only slot.
    pub fn burn_key(&mut self, slot: KeySlot, key: &[u32; 8]) {
        for (row, word) in (slot.start_row()..).zip(key) {
            self.fuses[Self::index(0, row)] |= *word;
        }
        self.load_cache();
    }

    /// Program operations never complete.
    pub fn stall_program(&mut self) {
        self.stall_program = true;
    }

    /// Program operations raise PGM_ERROR.
    pub fn reject_program(&mut self) {
        self.reject_program = true;
    }

    /// Programming `(page, row, col)` completes without setting the bit.
    pub fn stick_bit_at_zero(&mut self, page: u32, row: u32, col: u32) {
        self.stuck_bits.push((Self::index(page, row), col));
    }

    /// Verify reads never raise RD_DONE.
    pub fn stall_read(&mut self) {
        self.stall_read = true;
    }

    /// CRC compares of `slot` fail once `skip` compares have run.
    pub fn fail_crc(&mut self, slot: KeySlot, skip: u32) {
        self.crc_fault = Some(CrcFault {
            slot,
            clean_left: skip,
        });
    }

    /// The unlock passcode is dropped.
    pub fn ignore_unlock(&mut self) {
        self.ignore_unlock = true;
    }

    /// Lock writes are dropped.
    pub fn ignore_lock(&mut self) {
        self.ignore_lock = true;
    }

    /// Cache loads complete with CACHE_ERROR raised.
    pub fn fail_cache_load(&mut self) {
        self.cache_load_error = true;
    }

    /// Every cache read of `(page, row)` raises CACHE_ERROR.
    pub fn inject_parity_error(&mut self, page: u32, row: u32) {
        self.parity_rows.push(Self::index(page, row) as u32);
    }

    /// Corrupt one future cache read of `(page, row)`.
    ///
    /// # Arguments
    ///
    /// * `page` - Fuse page
    /// * `row` - Row within the page
    /// * `skip` - Number of clean reads of the row before the corrupted one
    /// * `xor` - Bits flipped in the corrupted read
    pub fn glitch_cache_read(&mut self, page: u32, row: u32, skip: u32, xor: u32) {
        self.glitch = Some(Glitch {
            index: Self::index(page, row) as u32,
            reads_left: skip,
            xor,
        });
    }

    fn is_key_row(index: usize) -> bool {
        let first = KeySlot::Aes.start_row() as usize;
        let last = KeySlot::User1.start_row() as usize + Self::KEY_ROWS as usize;
        (first..last).contains(&index)
    }

    fn load_cache(&mut self) {
        for (idx, (cache, fuse)) in self.cache.iter_mut().zip(self.fuses.iter()).enumerate() {
            *cache = if Self::is_key_row(idx) { 0 } else { *fuse };
        }
        self.status.reg.modify(Status::CACHE_DONE::SET);
    }

    fn key_crc(&self, slot: KeySlot) -> u32 {
        let mut crc = 0u32;
        for i in (0..Self::KEY_ROWS).rev() {
            let word = self.fuses[Self::index(0, slot.start_row() + i)];
            crc = crc32c_bits(crc, word, 32);
            crc = crc32c_bits(crc, i + 1, 5);
        }
        crc
    }

    fn check_crc(&mut self, slot: KeySlot, expected: u32) {
        let (done, pass) = slot.status();
        let forced_fail = match &mut self.crc_fault {
            Some(fault) if fault.slot == slot => match fault.clean_left.checked_sub(1) {
                Some(left) => {
                    fault.clean_left = left;
                    false
                }
                None => true,
            },
            _ => false,
        };
        let passed = !forced_fail && self.key_crc(slot) == expected;
        self.status
            .reg
            .modify(pass.val(u32::from(passed)) + done.val(1));
    }

    fn write_lock(&mut self, val: u32) {
        let unlock = val == Self::UNLOCK_PASSCODE;
        if (unlock && self.ignore_unlock) || (!unlock && self.ignore_lock) {
            return;
        }
        if self.locked != unlock {
            return;
        }
        self.locked = !unlock;
        if let Some(monitor) = &self.sessions {
            if unlock {
                monitor.enter();
            } else {
                monitor.exit();
            }
        }
    }

    fn decode(val: u32) -> Option<(usize, u32)> {
        let page = (val >> 13) & 0x3;
        let row = (val >> 5) & 0xFF;
        if page >= Self::PAGES {
            return None;
        }
        Some((Self::index(page, row), val & 0x1F))
    }

    fn start_program(&mut self, val: u32) {
        if self.locked || !self.cfg.reg.is_set(Cfg::PGM_EN) || self.reject_program {
            self.isr.reg.modify(Isr::PGM_ERROR::SET);
            return;
        }
        let Some((index, col)) = Self::decode(val) else {
            self.isr.reg.modify(Isr::PGM_ERROR::SET);
            return;
        };
        if self.stall_program {
            return;
        }
        if !self.stuck_bits.contains(&(index, col)) {
            self.fuses[index] |= 1 << col;
        }
        self.pgm_ticks = Some(Self::PGM_TICKS);
    }

    fn start_read(&mut self, val: u32) {
        let word = match Self::decode(val) {
            Some((index, _)) if !Self::is_key_row(index) => self.fuses[index],
            _ => 0,
        };
        self.rd_data.reg.set(word);
        if !self.stall_read {
            self.isr.reg.modify(Isr::RD_DONE::SET);
        }
    }

    fn timer(&mut self, addr: RvAddr) -> Option<&mut ReadWriteRegister> {
        let idx = match addr {
            Self::TPGM => 0,
            Self::TRD => 1,
            Self::TSU_H_PS => 2,
            Self::TRDM => 3,
            Self::TSU_H_CS => 4,
            _ => return None,
        };
        Some(&mut self.timers[idx])
    }

    fn read_cache(&mut self, offset: RvAddr) -> Result<RvData, BusError> {
        let index = offset / 4;
        let Some(word) = self.cache.get(index as usize).copied() else {
            return Err(BusError::LoadAccessFault);
        };
        if self.parity_rows.contains(&index) {
            self.isr.reg.modify(Isr::CACHE_ERROR::SET);
        }
        match &mut self.glitch {
            Some(glitch) if glitch.index == index => {
                if glitch.reads_left == 0 {
                    let xor = glitch.xor;
                    self.glitch = None;
                    return Ok(word ^ xor);
                }
                glitch.reads_left -= 1;
                Ok(word)
            }
            _ => Ok(word),
        }
    }

    fn read_reg(&mut self, size: RvSize, addr: RvAddr) -> Result<RvData, BusError> {
        if let Some(timer) = self.timer(addr) {
            return timer.read(size);
        }
        match addr {
            Self::WR_LOCK => Ok(u32::from(self.locked)),
            Self::CFG => self.cfg.read(size),
            Self::STATUS => self.status.read(size),
            Self::RD_DATA => self.rd_data.read(size),
            Self::ISR => self.isr.read(size),
            Self::PD => self.pd.read(size),
            Self::TEST_CTRL => self.test_ctrl.read(size),
            Self::PGM_ADDR
            | Self::RD_ADDR
            | Self::CACHE_LOAD
            | Self::AES_CRC
            | Self::AES_USR_KEY0_CRC
            | Self::AES_USR_KEY1_CRC => Ok(0),
            _ => Err(BusError::LoadAccessFault),
        }
    }

    fn write_reg(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), BusError> {
        match addr {
            Self::WR_LOCK => self.write_lock(val),
            Self::ISR => {
                let pending = self.isr.reg.get();
                self.isr.reg.set(pending & !val);
            }
            Self::PGM_ADDR => self.start_program(val),
            Self::RD_ADDR => self.start_read(val),
            Self::AES_CRC => self.check_crc(KeySlot::Aes, val),
            Self::AES_USR_KEY0_CRC => self.check_crc(KeySlot::User0, val),
            Self::AES_USR_KEY1_CRC => self.check_crc(KeySlot::User1, val),
            Self::STATUS => self.status.write(size, val)?,
            Self::RD_DATA => self.rd_data.write(size, val)?,
            _ if self.locked => {}
            Self::CFG => self.cfg.write(size, val)?,
            Self::PD => self.pd.reg.write(Pd::PD.val(val & 1)),
            Self::TEST_CTRL => self.test_ctrl.write(size, val)?,
            Self::CACHE_LOAD if val & 1 != 0 => {
                self.status.reg.modify(Status::CACHE_DONE::CLEAR);
                self.load_ticks = Some(Self::LOAD_TICKS);
            }
            Self::CACHE_LOAD => {}
            _ => match self.timer(addr) {
                Some(timer) => timer.write(size, val)?,
                None => return Err(BusError::StoreAccessFault),
            },
        }
        Ok(())
    }
}

impl Default for EmuEfuseCtrl {
    fn default() -> Self {
        Self::new()
    }
}

fn crc32c_bits(mut crc: u32, mut data: u32, bits: u32) -> u32 {
    for _ in 0..bits {
        let lsb = (crc ^ data) & 1;
        crc >>= 1;
        if lsb != 0 {
            crc ^= 0x82F6_3B78;
        }
        data >>= 1;
    }
    crc
}

impl Bus for EmuEfuseCtrl {
    /// Read data of specified size from given address
    ///
    /// # Arguments
    ///
    /// * `size` - Size of the read
    /// * `addr` - Address to read from
    ///
    /// # Error
    ///
    /// * `BusError::LoadAccessFault` or `BusError::LoadAddrMisaligned`
    fn read(&mut self, size: RvSize, addr: RvAddr) -> Result<RvData, BusError> {
        if size != RvSize::Word {
            return Err(BusError::LoadAccessFault);
        }
        if addr % 4 != 0 {
            return Err(BusError::LoadAddrMisaligned);
        }
        let val = if addr >= Self::CACHE_OFFSET {
            self.read_cache(addr - Self::CACHE_OFFSET)?
        } else {
            self.read_reg(size, addr)?
        };
        self.log.record(Access::Read { addr, val });
        Ok(val)
    }

    /// Write data of specified size to given address
    ///
    /// # Arguments
    ///
    /// * `size` - Size of the write
    /// * `addr` - Address to write
    /// * `val` - Data to write
    ///
    /// # Error
    ///
    /// * `BusError::StoreAccessFault` or `BusError::StoreAddrMisaligned`
    fn write(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), BusError> {
        if size != RvSize::Word || addr >= Self::CACHE_OFFSET {
            return Err(BusError::StoreAccessFault);
        }
        if addr % 4 != 0 {
            return Err(BusError::StoreAddrMisaligned);
        }
        self.log.record(Access::Write { addr, val });
        self.write_reg(size, addr, val)
    }

    fn poll(&mut self) {
        if let Some(ticks) = self.pgm_ticks {
            self.pgm_ticks = ticks.checked_sub(1);
            if ticks == 0 {
                self.isr.reg.modify(Isr::PGM_DONE::SET);
            }
        }
        if let Some(ticks) = self.load_ticks {
            self.load_ticks = ticks.checked_sub(1);
            if ticks == 0 {
                self.load_cache();
                if self.cache_load_error {
                    self.isr.reg.modify(Isr::CACHE_ERROR::SET);
                }
            }
        }
    }
}
