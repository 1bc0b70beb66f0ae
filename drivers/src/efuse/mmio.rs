/*++

Licensed under the Apache-2.0 license.

File Name:

    mmio.rs

Abstract:

    File contains the register access layer of the eFuse controller:
    raw register reads and writes, cache word reads and bounded polls.

--*/

use crate::wait;

/// 32-bit memory mapped I/O accessor
pub trait Mmio {
    /// Loads the word at `addr`.
    fn read_u32(&self, addr: u32) -> u32;

    /// Stores `val` to `addr`.
    fn write_u32(&self, addr: u32, val: u32);
}

/// Volatile accessor for the physical register space
#[derive(Debug)]
pub struct RealMmio {
    _priv: (),
}

impl RealMmio {
    /// Create a new accessor
    ///
    /// # Safety
    ///
    /// The caller must guarantee every address later passed to this
    /// accessor is a valid, word aligned MMIO location and that no other
    /// code concurrently drives the same peripheral.
    pub const unsafe fn new() -> Self {
        Self { _priv: () }
    }
}

impl Mmio for RealMmio {
    fn read_u32(&self, addr: u32) -> u32 {
        // SAFETY: address validity is the contract of `RealMmio::new`.
        unsafe { core::ptr::read_volatile(addr as usize as *const u32) }
    }

    fn write_u32(&self, addr: u32, val: u32) {
        // SAFETY: address validity is the contract of `RealMmio::new`.
        unsafe { core::ptr::write_volatile(addr as usize as *mut u32, val) }
    }
}

/// Outcome of a bounded poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// Condition met; carries the last register value sampled
    EventSet(u32),
    TimedOut,
}

/// Controller register block and cache region behind one accessor
pub struct EfuseRegs<M: Mmio> {
    mmio: M,
    ctrl_base: u32,
    cache_base: u32,
}

impl<M: Mmio> EfuseRegs<M> {
    pub fn new(mmio: M, ctrl_base: u32, cache_base: u32) -> Self {
        Self {
            mmio,
            ctrl_base,
            cache_base,
        }
    }

    pub fn read_reg(&self, offset: u32) -> u32 {
        self.mmio.read_u32(self.ctrl_base + offset)
    }

    pub fn write_reg(&self, offset: u32, val: u32) {
        self.mmio.write_u32(self.ctrl_base + offset, val)
    }

    /// Read-modify-write of the bits selected by `mask`.
    pub fn modify_reg(&self, offset: u32, mask: u32, val: u32) {
        let cur = self.read_reg(offset);
        self.write_reg(offset, (cur & !mask) | (val & mask));
    }

    /// Raw read of cache word `index` (`page * rows_per_page + row`).
    pub fn read_cache_raw(&self, index: u32) -> u32 {
        self.mmio
            .read_u32(self.cache_base + index * core::mem::size_of::<u32>() as u32)
    }

    /// Wait until `(reg & mask) == expected`.
    ///
    /// # Arguments
    ///
    /// * `offset` - Register offset
    /// * `mask` - Bits to sample
    /// * `expected` - Value the sampled bits must take
    /// * `timeout` - Poll budget
    pub fn wait_for_event(&self, offset: u32, mask: u32, expected: u32, timeout: u32) -> WaitStatus {
        let mut last = 0;
        let set = wait::until(timeout, || {
            last = self.read_reg(offset);
            last & mask == expected
        });
        if set {
            WaitStatus::EventSet(last)
        } else {
            WaitStatus::TimedOut
        }
    }

    /// Wait until any bit of `mask` is set in the register.
    pub fn wait_for_any(&self, offset: u32, mask: u32, timeout: u32) -> WaitStatus {
        let mut last = 0;
        let set = wait::until(timeout, || {
            last = self.read_reg(offset);
            last & mask != 0
        });
        if set {
            WaitStatus::EventSet(last)
        } else {
            WaitStatus::TimedOut
        }
    }

    /// Abstract settle delay of `spins` iterations.
    pub fn settle(&self, spins: u32) {
        wait::spin(spins)
    }
}
