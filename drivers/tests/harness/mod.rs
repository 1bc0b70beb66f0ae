/*++

Licensed under the Apache-2.0 license.

File Name:

    mod.rs

Abstract:

    File contains the harness that runs the eFuse driver against the
    controller model.

--*/

use std::{cell::RefCell, ops::Range, rc::Rc};

use hsm_drivers::regs::{EFUSE_CACHE_BASE_ADDR, EFUSE_CTRL_BASE_ADDR};
use hsm_drivers::{Efuse, EfuseConfig, Mmio};
use hsm_emu_bus::testing::AccessLog;
use hsm_emu_bus::{Bus, RvSize};
use hsm_emu_periph::EmuEfuseCtrl;

/// An MMIO implementation that reads and writes to the controller model.
///
/// Every read advances the model by one tick, so bounded polls in the
/// driver observe in-flight operations completing.
pub struct BusMmio {
    bus: Rc<RefCell<EmuEfuseCtrl>>,
}

impl Mmio for BusMmio {
    /// # Panics
    ///
    /// This function panics if the bus faults.
    fn read_u32(&self, addr: u32) -> u32 {
        let mut bus = self.bus.borrow_mut();
        bus.poll();
        bus.read(RvSize::Word, addr - EFUSE_CTRL_BASE_ADDR).unwrap()
    }

    /// # Panics
    ///
    /// This function panics if the bus faults.
    fn write_u32(&self, addr: u32, val: u32) {
        self.bus
            .borrow_mut()
            .write(RvSize::Word, addr - EFUSE_CTRL_BASE_ADDR, val)
            .unwrap()
    }
}

pub fn test_config() -> EfuseConfig {
    EfuseConfig {
        pgm_timeout: 64,
        read_timeout: 64,
        crc_timeout: 64,
        cache_load_timeout: 256,
        settle_spins: 1,
        ..Default::default()
    }
}

/// Driver wired to a controller model
pub struct TestDevice {
    pub efuse: Efuse<BusMmio>,
    pub hw: Rc<RefCell<EmuEfuseCtrl>>,
    pub log: AccessLog,
}

impl TestDevice {
    pub fn new(ctrl: EmuEfuseCtrl) -> Self {
        Self::with_config(ctrl, test_config())
    }

    pub fn with_config(ctrl: EmuEfuseCtrl, cfg: EfuseConfig) -> Self {
        assert_eq!(
            EFUSE_CACHE_BASE_ADDR - EFUSE_CTRL_BASE_ADDR,
            EmuEfuseCtrl::CACHE_OFFSET
        );
        let log = ctrl.log();
        let hw = Rc::new(RefCell::new(ctrl));
        let mmio = BusMmio { bus: hw.clone() };
        Self {
            efuse: Efuse::new(mmio, cfg),
            hw,
            log,
        }
    }

    pub fn fresh() -> Self {
        Self::new(EmuEfuseCtrl::new())
    }

    /// Program operations issued since the log was last cleared.
    pub fn pgm_writes(&self) -> usize {
        self.log.writes_to(EmuEfuseCtrl::PGM_ADDR)
    }

    /// Program operations aimed at page 0 `rows`.
    pub fn pgm_writes_to_rows(&self, rows: Range<u32>) -> usize {
        self.log
            .values_written_to(EmuEfuseCtrl::PGM_ADDR)
            .iter()
            .filter(|val| (*val >> 13) & 0x3 == 0 && rows.contains(&((*val >> 5) & 0xFF)))
            .count()
    }

    /// Cache reads of page 0 `rows` since the log was last cleared.
    pub fn cache_reads(&self, rows: Range<u32>) -> usize {
        let addr = |row: u32| EmuEfuseCtrl::CACHE_OFFSET + row * 4;
        self.log.reads_in(addr(rows.start)..addr(rows.end))
    }

    pub fn fuse(&self, page: u32, row: u32) -> u32 {
        self.hw.borrow().fuse(page, row)
    }
}
