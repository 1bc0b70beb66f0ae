/*++

Licensed under the Apache-2.0 license.

File Name:

    types.rs

Abstract:

    File contains the data and address types carried on the emulator bus.

--*/

/// Bus data width
pub type RvData = u32;

/// Bus address width
pub type RvAddr = u32;

/// Bus access size
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum RvSize {
    Byte = 1,
    HalfWord = 2,
    Word = 4,
}
