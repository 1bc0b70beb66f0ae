/*++

Licensed under the Apache-2.0 license.

File Name:

    wait.rs

Abstract:

    File contains common functions to implement bounded wait routines.

--*/

/// Polls `predicate` until it returns true or `ticks` polls have elapsed.
///
/// # Returns
///
/// `true` if the predicate was satisfied before the budget ran out.
pub fn until<F>(ticks: u32, mut predicate: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..ticks {
        if predicate() {
            return true;
        }
    }
    false
}

/// Busy waits for `count` iterations.
pub fn spin(count: u32) {
    for _ in 0..count {
        core::hint::spin_loop();
    }
}
