/*++

Licensed under the Apache-2.0 license.

File Name:

    config.rs

Abstract:

    File contains the platform configuration of the eFuse driver.

--*/

use super::regs::{EFUSE_CACHE_BASE_ADDR, EFUSE_CTRL_BASE_ADDR};

/// Die conditions sampled before a programming session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvSample {
    pub temp_millicelsius: i32,
    pub vccpmc_millivolts: u32,
}

/// Window of die conditions in which fuses may be burned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvLimits {
    pub temp_min_millicelsius: i32,
    pub temp_max_millicelsius: i32,
    pub vccpmc_min_millivolts: u32,
    pub vccpmc_max_millivolts: u32,
}

impl EnvLimits {
    pub fn contains(&self, sample: &EnvSample) -> bool {
        (self.temp_min_millicelsius..=self.temp_max_millicelsius)
            .contains(&sample.temp_millicelsius)
            && (self.vccpmc_min_millivolts..=self.vccpmc_max_millivolts)
                .contains(&sample.vccpmc_millivolts)
    }
}

impl Default for EnvLimits {
    fn default() -> Self {
        Self {
            temp_min_millicelsius: -40_000,
            temp_max_millicelsius: 125_000,
            vccpmc_min_millivolts: 760,
            vccpmc_max_millivolts: 840,
        }
    }
}

/// Platform parameters of the eFuse controller
///
/// Timeouts are poll budgets: the number of times a status register is
/// sampled before the operation is declared timed out.
#[derive(Debug, Clone, Copy)]
pub struct EfuseConfig {
    /// Base address of the controller register block
    pub ctrl_base: u32,

    /// Base address of the cache mirror
    pub cache_base: u32,

    /// Reference clock feeding the controller, in Hz
    pub ref_clk_hz: u32,

    /// Poll budget for a single bit program
    pub pgm_timeout: u32,

    /// Poll budget for a verify read
    pub read_timeout: u32,

    /// Poll budget for a hardware key CRC compare
    pub crc_timeout: u32,

    /// Poll budget for a full cache reload
    pub cache_load_timeout: u32,

    /// Spin iterations around the power-down transition
    pub settle_spins: u32,

    /// Samples the die before programming; `None` skips the check
    pub env_monitor: Option<fn() -> EnvSample>,

    /// Window `env_monitor` samples must fall in
    pub env_limits: EnvLimits,
}

impl Default for EfuseConfig {
    fn default() -> Self {
        Self {
            ctrl_base: EFUSE_CTRL_BASE_ADDR,
            cache_base: EFUSE_CACHE_BASE_ADDR,
            ref_clk_hz: 33_333_333,
            pgm_timeout: 0x1_0000,
            read_timeout: 0x1_0000,
            crc_timeout: 0x1_0000,
            cache_load_timeout: 0x40_0000,
            settle_spins: 100,
            env_monitor: None,
            env_limits: EnvLimits::default(),
        }
    }
}
