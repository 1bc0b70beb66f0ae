/*++

Licensed under the Apache-2.0 license.

File Name:

    programmer.rs

Abstract:

    File contains the bit and row programmers. Bits are only ever driven
    from 0 to 1; a zero in the requested data is never written.

--*/

use super::address::{FuseAddress, Page};
use super::controller::EfuseController;
use super::fields::is_write_only_row;
use super::mmio::{Mmio, WaitStatus};
use super::regs::*;
use crate::cprintln;
use hsm_error::{HsmError, HsmResult};

/// A bit that could not be burned or verified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitFailure {
    pub addr: FuseAddress,
    pub error: HsmError,
}

impl<M: Mmio> EfuseController<M> {
    /// Burn a single bit.
    ///
    /// # Returns
    ///
    /// * `DRIVER_EFUSE_PGM_TIMEOUT` - Neither done nor error was raised in time
    /// * `DRIVER_EFUSE_PGM_REJECTED` - The controller flagged a program error
    pub fn program_bit(&mut self, addr: FuseAddress) -> HsmResult<()> {
        self.regs.write_reg(PGM_ADDR_OFFSET, addr.pgm_addr());
        let events = (Isr::PGM_DONE | Isr::PGM_ERROR).bits();
        let result = match self
            .regs
            .wait_for_any(ISR_OFFSET, events, self.cfg.pgm_timeout)
        {
            WaitStatus::TimedOut => Err(HsmError::DRIVER_EFUSE_PGM_TIMEOUT),
            WaitStatus::EventSet(isr) if isr & Isr::PGM_ERROR.bits() != 0 => {
                Err(HsmError::DRIVER_EFUSE_PGM_REJECTED)
            }
            WaitStatus::EventSet(_) => Ok(()),
        };
        self.regs.write_reg(ISR_OFFSET, events);
        result
    }

    /// Read back a single bit.
    ///
    /// Bits in write-only key rows cannot be read and are reported as
    /// verified without touching the hardware.
    pub fn verify_bit(&self, addr: FuseAddress) -> HsmResult<()> {
        if is_write_only_row(addr.page(), addr.row()) {
            return Ok(());
        }
        self.regs.write_reg(RD_ADDR_OFFSET, addr.rd_addr());
        let done = Isr::RD_DONE.bits();
        if self
            .regs
            .wait_for_event(ISR_OFFSET, done, done, self.cfg.read_timeout)
            == WaitStatus::TimedOut
        {
            return Err(HsmError::DRIVER_EFUSE_READ_TIMEOUT);
        }
        let data = self.regs.read_reg(RD_DATA_OFFSET);
        self.regs.write_reg(ISR_OFFSET, done);
        if data & (1 << addr.col()) == 0 {
            return Err(HsmError::DRIVER_EFUSE_PGM_VERIFY_FAILED);
        }
        Ok(())
    }

    pub fn program_and_verify_bit(&mut self, addr: FuseAddress) -> HsmResult<()> {
        self.program_bit(addr)?;
        self.verify_bit(addr)
    }

    /// Burn every set bit of `data` into consecutive rows.
    ///
    /// # Arguments
    ///
    /// * `page` - Fuse array
    /// * `start_row` - Row receiving `data[0]`
    /// * `data` - Bits to burn; zero bits are left untouched
    ///
    /// # Returns
    ///
    /// The error of the first failing bit, which is also kept with its
    /// address in `last_bit_failure`. Bits burned before it stay burned.
    pub fn program_rows(&mut self, page: Page, start_row: u32, data: &[u32]) -> HsmResult<()> {
        let row_count = u32::try_from(data.len()).map_err(|_| HsmError::DRIVER_EFUSE_INVALID_PARAM)?;
        if start_row.saturating_add(row_count) > ROWS_PER_PAGE {
            return Err(HsmError::DRIVER_EFUSE_INVALID_PARAM);
        }
        for (row, &word) in (start_row..).zip(data.iter()) {
            let mut bits = word;
            while bits != 0 {
                let col = bits.trailing_zeros();
                bits &= bits - 1;
                let addr = FuseAddress::new(page, row, col)?;
                if let Err(err) = self.program_and_verify_bit(addr) {
                    cprintln!(
                        "[efuse] Bit failure page {} row {} col {}: 0x{:08x}",
                        u32::from(page),
                        row,
                        col,
                        u32::from(err)
                    );
                    self.last_bit_failure = Some(BitFailure { addr, error: err });
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// The bit that failed most recently, if any.
    pub fn last_bit_failure(&self) -> Option<BitFailure> {
        self.last_bit_failure
    }
}
