/*++

Licensed under the Apache-2.0 license.

File Name:

    controller.rs

Abstract:

    File contains the owned handle to the eFuse controller hardware.

--*/

use super::config::EfuseConfig;
use super::mmio::{EfuseRegs, Mmio};
use super::programmer::BitFailure;

/// Exclusive handle to one eFuse controller and its cache
///
/// Session, programming, cache and CRC primitives are implemented on this
/// type in their own modules. Operations that can burn fuses or change the
/// session take `&mut self`; read-only checks take `&self`.
pub struct EfuseController<M: Mmio> {
    pub(crate) regs: EfuseRegs<M>,
    pub(crate) cfg: EfuseConfig,
    pub(crate) last_bit_failure: Option<BitFailure>,
}

impl<M: Mmio> EfuseController<M> {
    pub fn new(mmio: M, cfg: EfuseConfig) -> Self {
        Self {
            regs: EfuseRegs::new(mmio, cfg.ctrl_base, cfg.cache_base),
            cfg,
            last_bit_failure: None,
        }
    }

    pub fn regs(&self) -> &EfuseRegs<M> {
        &self.regs
    }

    pub fn config(&self) -> &EfuseConfig {
        &self.cfg
    }
}
