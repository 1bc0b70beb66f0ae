/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the error codes reported by the HSM firmware drivers.

--*/
#![cfg_attr(not(any(feature = "std", test)), no_std)]
use core::convert::From;
use core::num::{NonZeroU32, TryFromIntError};

/// HSM Error Type
/// Derives debug, copy, clone, eq, and partial eq
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct HsmError(pub NonZeroU32);

/// Macro to define error constants ensuring uniqueness
///
/// This macro takes a list of (name, value, doc) tuples and generates
/// constant definitions for each error code.
#[macro_export]
macro_rules! define_error_constants {
    ($(($name:ident, $value:expr, $doc:expr)),* $(,)?) => {
        $(
            #[doc = $doc]
            pub const $name: HsmError = HsmError::new_const($value);
        )*

        #[cfg(test)]
        /// Returns a vector of all defined error constants for testing uniqueness
        pub fn all_constants() -> Vec<(&'static str, u32)> {
            vec![
                $(
                    (stringify!($name), $value),
                )*
            ]
        }
    };
}

impl HsmError {
    /// Create an error; intended to only be used from const contexts, as we don't want
    /// runtime panics if val is zero. The preferred way to get an HsmError from a u32 is to
    /// use `HsmError::try_from()` from the `TryFrom` trait impl.
    const fn new_const(val: u32) -> Self {
        match NonZeroU32::new(val) {
            Some(val) => Self(val),
            None => panic!("HsmError cannot be 0"),
        }
    }

    define_error_constants![
        (
            DRIVER_EFUSE_INVALID_PARAM,
            0x000B0001,
            "eFuse request parameter out of range"
        ),
        (
            DRIVER_EFUSE_EMPTY_REQUEST,
            0x000B0002,
            "eFuse write request carries no sub-request"
        ),
        (
            DRIVER_EFUSE_WRITE_ONLY_ROW,
            0x000B0003,
            "eFuse cache read of a write-only row"
        ),
        (
            DRIVER_EFUSE_UNLOCK_FAILURE,
            0x000B0004,
            "eFuse controller did not unlock"
        ),
        (
            DRIVER_EFUSE_LOCK_FAILURE,
            0x000B0005,
            "eFuse controller did not lock"
        ),
        (
            DRIVER_EFUSE_READ_MODE_FAILURE,
            0x000B0006,
            "eFuse read mode readback mismatch"
        ),
        (
            DRIVER_EFUSE_BLANK_DEVICE,
            0x000B0007,
            "eFuse T-bits not set, device is blank"
        ),
        (
            DRIVER_EFUSE_ENV_OUT_OF_RANGE,
            0x000B0008,
            "Die temperature or supply voltage outside the programming window"
        ),
        (
            DRIVER_EFUSE_ALREADY_PROGRAMMED,
            0x000B0010,
            "eFuse field already programmed"
        ),
        (
            DRIVER_EFUSE_BIT_CANT_REVERT,
            0x000B0011,
            "eFuse request would clear a programmed bit"
        ),
        (
            DRIVER_EFUSE_FUSE_PROTECTED,
            0x000B0012,
            "eFuse field is write locked"
        ),
        (
            DRIVER_EFUSE_DEPENDENCY_UNMET,
            0x000B0013,
            "eFuse field prerequisite neither programmed nor requested"
        ),
        (
            DRIVER_EFUSE_PGM_TIMEOUT,
            0x000B0020,
            "eFuse bit program timed out"
        ),
        (
            DRIVER_EFUSE_PGM_REJECTED,
            0x000B0021,
            "eFuse bit program rejected by hardware"
        ),
        (
            DRIVER_EFUSE_PGM_VERIFY_FAILED,
            0x000B0022,
            "eFuse programmed bit reads back as zero"
        ),
        (
            DRIVER_EFUSE_READ_TIMEOUT,
            0x000B0023,
            "eFuse verify read timed out"
        ),
        (
            DRIVER_EFUSE_KEY_CRC_MISMATCH,
            0x000B0024,
            "eFuse key CRC check failed after programming"
        ),
        (
            DRIVER_EFUSE_CRC_TIMEOUT,
            0x000B0025,
            "eFuse key CRC check timed out"
        ),
        (
            DRIVER_EFUSE_CACHE_LOAD_TIMEOUT,
            0x000B0030,
            "eFuse cache reload timed out"
        ),
        (
            DRIVER_EFUSE_CACHE_LOAD_FAILURE,
            0x000B0031,
            "eFuse cache reload reported an error"
        ),
        (
            DRIVER_EFUSE_CACHE_PARITY,
            0x000B0032,
            "eFuse cache word parity error"
        ),
        (
            DRIVER_EFUSE_INTEGRITY_FAILURE,
            0x000B0040,
            "eFuse protected range redundant reads disagree"
        ),
        (
            DRIVER_EFUSE_ANCHOR_BIT_PATTERN,
            0x000B0041,
            "eFuse anchor bits do not hold the expected pattern"
        ),
    ];

    /// Returns true for errors raised before any fuse is burned. The
    /// request can be corrected and resubmitted.
    pub fn is_pre_write(&self) -> bool {
        [
            Self::DRIVER_EFUSE_INVALID_PARAM,
            Self::DRIVER_EFUSE_EMPTY_REQUEST,
            Self::DRIVER_EFUSE_BLANK_DEVICE,
            Self::DRIVER_EFUSE_ENV_OUT_OF_RANGE,
            Self::DRIVER_EFUSE_ALREADY_PROGRAMMED,
            Self::DRIVER_EFUSE_BIT_CANT_REVERT,
            Self::DRIVER_EFUSE_FUSE_PROTECTED,
            Self::DRIVER_EFUSE_DEPENDENCY_UNMET,
        ]
        .contains(self)
    }

    /// Returns true for the redundant-read and anchor failures that must be
    /// reported as a possible fault injection or tamper event.
    pub fn is_integrity_fault(&self) -> bool {
        *self == Self::DRIVER_EFUSE_INTEGRITY_FAILURE
            || *self == Self::DRIVER_EFUSE_ANCHOR_BIT_PATTERN
    }
}

impl From<core::num::NonZeroU32> for crate::HsmError {
    fn from(val: core::num::NonZeroU32) -> Self {
        crate::HsmError(val)
    }
}

impl From<HsmError> for core::num::NonZeroU32 {
    fn from(val: HsmError) -> Self {
        val.0
    }
}

impl From<HsmError> for u32 {
    fn from(val: HsmError) -> Self {
        core::num::NonZeroU32::from(val).get()
    }
}

impl TryFrom<u32> for HsmError {
    type Error = TryFromIntError;
    fn try_from(val: u32) -> Result<Self, TryFromIntError> {
        NonZeroU32::try_from(val).map(HsmError)
    }
}

pub type HsmResult<T> = Result<T, HsmError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_try_from() {
        assert!(HsmError::try_from(0).is_err());
        assert_eq!(
            Ok(HsmError::DRIVER_EFUSE_ALREADY_PROGRAMMED),
            HsmError::try_from(0x000B0010)
        );
    }

    #[test]
    fn test_error_constants_uniqueness() {
        let constants = HsmError::all_constants();
        let mut error_values = HashSet::new();
        let mut duplicates = Vec::new();

        for (name, value) in constants {
            if !error_values.insert(value) {
                duplicates.push((name, value));
            }
        }

        assert!(
            duplicates.is_empty(),
            "Found duplicate error codes: {:?}",
            duplicates
        );
    }

    #[test]
    fn test_integrity_class() {
        assert!(HsmError::DRIVER_EFUSE_INTEGRITY_FAILURE.is_integrity_fault());
        assert!(HsmError::DRIVER_EFUSE_ANCHOR_BIT_PATTERN.is_integrity_fault());
        assert!(!HsmError::DRIVER_EFUSE_CACHE_PARITY.is_integrity_fault());
        assert_eq!(u32::from(HsmError::DRIVER_EFUSE_PGM_TIMEOUT), 0x000B0020);
        assert!(HsmError::DRIVER_EFUSE_ENV_OUT_OF_RANGE.is_pre_write());
    }

    #[test]
    fn test_pre_write_class() {
        assert!(HsmError::DRIVER_EFUSE_DEPENDENCY_UNMET.is_pre_write());
        assert!(HsmError::DRIVER_EFUSE_FUSE_PROTECTED.is_pre_write());
        assert!(!HsmError::DRIVER_EFUSE_PGM_TIMEOUT.is_pre_write());
        assert!(!HsmError::DRIVER_EFUSE_INTEGRITY_FAILURE.is_pre_write());
    }
}
