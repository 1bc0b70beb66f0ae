/*++

Licensed under the Apache-2.0 license.

File Name:

    register.rs

Abstract:

    File contains the word-wide register types used by peripheral models.

--*/

use crate::{BusError, RvData, RvSize};
use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::InMemoryRegister;
use tock_registers::RegisterLongName;

pub trait Register {
    /// Size of the register in bytes.
    const SIZE: usize;

    /// Read the register
    ///
    /// # Arguments
    ///
    /// * `size` - Size of the read
    ///
    /// # Error
    ///
    /// * `BusError::LoadAccessFault` - Access is not register wide
    fn read(&self, size: RvSize) -> Result<RvData, BusError>;

    /// Write the register
    ///
    /// # Arguments
    ///
    /// * `size` - Size of the write
    /// * `val` - Data to write
    ///
    /// # Error
    ///
    /// * `BusError::StoreAccessFault` - Access is not register wide or the
    ///   register is read only
    fn write(&mut self, size: RvSize, val: RvData) -> Result<(), BusError>;
}

/// Read Write Register
pub struct ReadWriteRegister<R: RegisterLongName = ()> {
    /// Register
    pub reg: InMemoryRegister<u32, R>,
}

impl<R: RegisterLongName> ReadWriteRegister<R> {
    /// Create an instance of Read Write Register
    pub fn new(val: u32) -> Self {
        Self {
            reg: InMemoryRegister::new(val),
        }
    }
}

impl<R: RegisterLongName> Register for ReadWriteRegister<R> {
    const SIZE: usize = std::mem::size_of::<u32>();

    fn read(&self, size: RvSize) -> Result<RvData, BusError> {
        if size != RvSize::Word {
            Err(BusError::LoadAccessFault)?
        }
        Ok(self.reg.get())
    }

    fn write(&mut self, size: RvSize, val: RvData) -> Result<(), BusError> {
        if size != RvSize::Word {
            Err(BusError::StoreAccessFault)?
        }
        self.reg.set(val);
        Ok(())
    }
}

/// Read Only Register
///
/// The model updates it through `reg`; bus writes fault.
pub struct ReadOnlyRegister<R: RegisterLongName = ()> {
    /// Register
    pub reg: InMemoryRegister<u32, R>,
}

impl<R: RegisterLongName> ReadOnlyRegister<R> {
    /// Create an instance of Read Only Register
    pub fn new(val: u32) -> Self {
        Self {
            reg: InMemoryRegister::new(val),
        }
    }
}

impl<R: RegisterLongName> Register for ReadOnlyRegister<R> {
    const SIZE: usize = std::mem::size_of::<u32>();

    fn read(&self, size: RvSize) -> Result<RvData, BusError> {
        if size != RvSize::Word {
            Err(BusError::LoadAccessFault)?
        }
        Ok(self.reg.get())
    }

    fn write(&mut self, _size: RvSize, _val: RvData) -> Result<(), BusError> {
        Err(BusError::StoreAccessFault)
    }
}
