/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the HSM Emulator Bus library.

--*/
mod bus;
mod register;
pub mod testing;
mod types;

pub use crate::bus::{Bus, BusError};
pub use crate::register::{ReadOnlyRegister, ReadWriteRegister, Register};
pub use crate::types::{RvAddr, RvData, RvSize};
