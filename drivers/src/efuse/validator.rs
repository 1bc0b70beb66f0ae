/*++

Licensed under the Apache-2.0 license.

File Name:

    validator.rs

Abstract:

    File contains the pre-write validation of a write request. Nothing in
    this file drives a program operation.

--*/

use super::address::Page;
use super::controller::EfuseController;
use super::fields::{field, FuseField, ProgrammedTest};
use super::mmio::Mmio;
use super::redundant::RedundantRead;
use super::request::{SubRequest, WriteRequest};
use crate::cprintln;
use hsm_error::{HsmError, HsmResult};

impl<M: Mmio> EfuseController<M> {
    /// Check every sub-request of `req` before anything is burned.
    ///
    /// # Returns
    ///
    /// * `DRIVER_EFUSE_INVALID_PARAM` - Data outside the field or its mask
    /// * `DRIVER_EFUSE_ALREADY_PROGRAMMED` - Field or requested sub-field must be blank and is not
    /// * `DRIVER_EFUSE_BIT_CANT_REVERT` - Request would clear a set bit
    /// * `DRIVER_EFUSE_FUSE_PROTECTED` - Field write lock is set
    /// * `DRIVER_EFUSE_DEPENDENCY_UNMET` - Prerequisite neither programmed nor requested
    pub fn validate_all(&self, req: &WriteRequest) -> HsmResult<()> {
        for sub in req.sub_requests() {
            if let Err(err) = self.validate(req, &sub) {
                cprintln!(
                    "[efuse] Field {} rejected: 0x{:08x}",
                    sub.id as u32,
                    u32::from(err)
                );
                return Err(err);
            }
        }
        Ok(())
    }

    fn validate(&self, req: &WriteRequest, sub: &SubRequest) -> HsmResult<()> {
        let f = sub.field();
        check_params(f, sub)?;
        if !self.check_programmed(f, sub)? {
            return Ok(());
        }
        self.check_write_lock(f)?;
        for dep in f.depends_on {
            if !req.contains(*dep) && !self.is_field_programmed(field(*dep))? {
                return Err(HsmError::DRIVER_EFUSE_DEPENDENCY_UNMET);
            }
        }
        Ok(())
    }

    /// Apply the programmed test of the field.
    ///
    /// # Returns
    ///
    /// `false` if the request adds no bits to the field and can be skipped
    fn check_programmed(&self, f: &FuseField, sub: &SubRequest) -> HsmResult<bool> {
        match f.programmed_test {
            ProgrammedTest::ZeroKeyCrc(kind) => {
                if !RedundantRead::read(|| self.is_key_blank(kind))? {
                    return Err(HsmError::DRIVER_EFUSE_ALREADY_PROGRAMMED);
                }
                Ok(true)
            }
            ProgrammedTest::AllZero => {
                if !RedundantRead::read(|| self.field_zero(f))? {
                    return Err(HsmError::DRIVER_EFUSE_ALREADY_PROGRAMMED);
                }
                Ok(true)
            }
            _ => self.check_accumulating(f, sub),
        }
    }

    /// Programmed test of the fields whose bits accumulate over writes.
    fn check_accumulating(&self, f: &FuseField, sub: &SubRequest) -> HsmResult<bool> {
        let mut adds_bits = false;
        for (row, &requested) in (sub.start_row()..).zip(sub.data()) {
            let current = self.read_cache_word(f.page, row)? & f.mask;
            let new = requested & !current;
            match f.programmed_test {
                ProgrammedTest::Revert if new != 0 && requested & current != current => {
                    return Err(HsmError::DRIVER_EFUSE_BIT_CANT_REVERT);
                }
                ProgrammedTest::BlankSubfields(subfields)
                    if subfields
                        .iter()
                        .any(|m| requested & m != 0 && current & m != 0) =>
                {
                    return Err(HsmError::DRIVER_EFUSE_ALREADY_PROGRAMMED);
                }
                _ => {}
            }
            adds_bits |= new != 0;
        }
        Ok(adds_bits)
    }

    fn check_write_lock(&self, f: &FuseField) -> HsmResult<()> {
        if let Some(lock) = f.write_lock {
            let word = RedundantRead::read(|| self.read_cache_word(Page::Page0, lock.row))?;
            if word & lock.mask != 0 {
                return Err(HsmError::DRIVER_EFUSE_FUSE_PROTECTED);
            }
        }
        Ok(())
    }

    fn field_zero(&self, f: &FuseField) -> HsmResult<bool> {
        self.rows_zero(f.page, f.start_row, f.row_count, f.mask)
    }

    /// True if the field holds any data.
    pub fn is_field_programmed(&self, f: &FuseField) -> HsmResult<bool> {
        match f.programmed_test {
            ProgrammedTest::ZeroKeyCrc(kind) => Ok(!RedundantRead::read(|| self.is_key_blank(kind))?),
            _ => Ok(!RedundantRead::read(|| self.field_zero(f))?),
        }
    }
}

fn check_params(f: &FuseField, sub: &SubRequest) -> HsmResult<()> {
    let data = sub.data();
    let rows = u32::try_from(data.len()).map_err(|_| HsmError::DRIVER_EFUSE_INVALID_PARAM)?;
    if rows == 0 || sub.row_offset.saturating_add(rows) > f.row_count {
        return Err(HsmError::DRIVER_EFUSE_INVALID_PARAM);
    }
    if data.iter().any(|w| w & !f.mask != 0) {
        return Err(HsmError::DRIVER_EFUSE_INVALID_PARAM);
    }
    let must_be_blank = matches!(
        f.programmed_test,
        ProgrammedTest::ZeroKeyCrc(_) | ProgrammedTest::AllZero
    );
    if must_be_blank && data.iter().all(|w| *w == 0) {
        return Err(HsmError::DRIVER_EFUSE_INVALID_PARAM);
    }
    Ok(())
}
