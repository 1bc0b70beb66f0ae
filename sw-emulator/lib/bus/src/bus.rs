/*++

Licensed under the Apache-2.0 license.

File Name:

    bus.rs

Abstract:

    File contains the Bus trait implemented by peripheral models.

--*/

use crate::{RvAddr, RvData, RvSize};

/// Fault raised by a peripheral for an access it does not decode
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BusError {
    LoadAddrMisaligned,
    LoadAccessFault,
    StoreAddrMisaligned,
    StoreAccessFault,
}

/// Register-level view of a peripheral model.
///
/// Addresses are offsets into the peripheral's own region. Reads take
/// `&mut self` because reading a status or cache word can have side
/// effects in the model (access logging, one-shot fault injection).
pub trait Bus {
    /// Load a value of `size` from `addr`.
    ///
    /// # Error
    ///
    /// * `BusError::LoadAccessFault` or `BusError::LoadAddrMisaligned`
    fn read(&mut self, size: RvSize, addr: RvAddr) -> Result<RvData, BusError>;

    /// Store `val` of `size` to `addr`.
    ///
    /// # Error
    ///
    /// * `BusError::StoreAccessFault` or `BusError::StoreAddrMisaligned`
    fn write(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), BusError>;

    /// Advance operations started by earlier writes by one tick.
    fn poll(&mut self) {}
}
