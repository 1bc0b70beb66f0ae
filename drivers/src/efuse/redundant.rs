/*++

Licensed under the Apache-2.0 license.

File Name:

    redundant.rs

Abstract:

    File contains the redundant read helper. Security relevant fuse
    state is sampled twice and a single read is never trusted.

References:
    https://github.com/lowRISC/opentitan/blob/7a61300cf7c409fa68fd892942c1d7b58a7cd4c0/sw/device/lib/base/hardened.h#L260

--*/

use crate::cprintln;
use hsm_error::{HsmError, HsmResult};

/// Launder the value to prevent compiler optimization
///
/// # Arguments
///
/// * `val` - Value to launder
///
/// # Returns
///
/// `T` - Same value
pub fn cfi_launder<T>(val: T) -> T {
    if cfg!(feature = "cfi") {
        core::hint::black_box(val)
    } else {
        val
    }
}

/// Double sampling of a fuse value
pub struct RedundantRead;

impl RedundantRead {
    /// Call `read` twice and require both results to agree.
    ///
    /// # Arguments
    ///
    /// * `read` - Independent read of the value; read errors propagate
    ///
    /// # Returns
    ///
    /// The agreed value, or `DRIVER_EFUSE_INTEGRITY_FAILURE` if the two reads
    /// differ
    pub fn read<T, F>(mut read: F) -> HsmResult<T>
    where
        T: PartialEq + Copy,
        F: FnMut() -> HsmResult<T>,
    {
        let first = cfi_launder(read()?);
        let second = cfi_launder(read()?);
        if first != second {
            cprintln!("[efuse] Redundant read mismatch");
            return Err(HsmError::DRIVER_EFUSE_INTEGRITY_FAILURE);
        }
        Ok(first)
    }
}
