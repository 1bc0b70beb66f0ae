/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the HSM Emulator Peripheral library.

--*/

mod efuse_ctrl;

pub use efuse_ctrl::{EmuEfuseCtrl, KeySlot, SessionMonitor};
