/*++

Licensed under the Apache-2.0 license.

File Name:

    guard.rs

Abstract:

    File contains the process wide ownership flag of the eFuse controller.

--*/

use portable_atomic::{AtomicBool, Ordering};

static CONTROLLER_OWNED: AtomicBool = AtomicBool::new(false);

/// Ownership of the eFuse controller, released on drop
pub(crate) struct ControllerGuard {
    _priv: (),
}

impl ControllerGuard {
    /// Spin until no other invocation owns the controller.
    pub(crate) fn acquire() -> Self {
        while CONTROLLER_OWNED
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }
        Self { _priv: () }
    }
}

impl Drop for ControllerGuard {
    fn drop(&mut self) {
        CONTROLLER_OWNED.store(false, Ordering::Release);
    }
}
