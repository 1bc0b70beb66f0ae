/*++

Licensed under the Apache-2.0 license.

File Name:

    cache.rs

Abstract:

    File contains the cache loader and the checked cache word reads.

--*/

use super::address::{cache_index, Page};
use super::controller::EfuseController;
use super::fields::is_write_only_row;
use super::mmio::{Mmio, WaitStatus};
use super::regs::*;
use crate::cprintln;
use hsm_error::{HsmError, HsmResult};

impl<M: Mmio> EfuseController<M> {
    /// Refresh the cache from the fuse array and re-run the protection
    /// checks against the refreshed contents.
    ///
    /// The controller is unlocked if needed and left unlocked.
    pub fn reload_cache(&mut self) -> HsmResult<()> {
        if self.is_locked() {
            self.unlock()?;
        }
        self.regs.write_reg(CACHE_LOAD_OFFSET, CACHE_LOAD_TRIGGER);
        let done = Status::CACHE_DONE.bits();
        if self.regs.wait_for_event(
            STATUS_OFFSET,
            done,
            done,
            self.cfg.cache_load_timeout,
        ) == WaitStatus::TimedOut
        {
            cprintln!("[efuse] Cache load timed out");
            return Err(HsmError::DRIVER_EFUSE_CACHE_LOAD_TIMEOUT);
        }
        let isr = Isr::from_bits_truncate(self.regs.read_reg(ISR_OFFSET));
        if isr.contains(Isr::CACHE_ERROR) {
            self.regs.write_reg(ISR_OFFSET, Isr::CACHE_ERROR.bits());
            cprintln!("[efuse] Cache load error");
            return Err(HsmError::DRIVER_EFUSE_CACHE_LOAD_FAILURE);
        }
        self.protection_checks()
    }

    /// Read one word of the cache.
    ///
    /// # Returns
    ///
    /// * `DRIVER_EFUSE_INVALID_PARAM` - Row out of range
    /// * `DRIVER_EFUSE_WRITE_ONLY_ROW` - Row belongs to a write-only key
    /// * `DRIVER_EFUSE_CACHE_PARITY` - The read raised a cache error
    pub fn read_cache_word(&self, page: Page, row: u32) -> HsmResult<u32> {
        if row >= ROWS_PER_PAGE {
            return Err(HsmError::DRIVER_EFUSE_INVALID_PARAM);
        }
        if is_write_only_row(page, row) {
            return Err(HsmError::DRIVER_EFUSE_WRITE_ONLY_ROW);
        }
        let val = self.regs.read_cache_raw(cache_index(page, row));
        let isr = Isr::from_bits_truncate(self.regs.read_reg(ISR_OFFSET));
        if isr.contains(Isr::CACHE_ERROR) {
            self.regs.write_reg(ISR_OFFSET, Isr::CACHE_ERROR.bits());
            return Err(HsmError::DRIVER_EFUSE_CACHE_PARITY);
        }
        Ok(val)
    }

    /// Fill `out` with consecutive cache words starting at `start_row`.
    pub fn read_cache_rows(&self, page: Page, start_row: u32, out: &mut [u32]) -> HsmResult<()> {
        for (row, word) in (start_row..).zip(out.iter_mut()) {
            *word = self.read_cache_word(page, row)?;
        }
        Ok(())
    }

    /// True if every row in the range is zero under `mask`.
    pub fn rows_zero(&self, page: Page, start_row: u32, row_count: u32, mask: u32) -> HsmResult<bool> {
        for row in start_row..start_row.saturating_add(row_count) {
            if self.read_cache_word(page, row)? & mask != 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
