/*++

Licensed under the Apache-2.0 license.

File Name:

    access_log.rs

Abstract:

    File contains a shared record of bus accesses made against a
    peripheral model, used for assertions in unit tests.

--*/
use std::{cell::RefCell, ops::Range, rc::Rc};

use crate::{RvAddr, RvData};

/// A single bus access observed by a peripheral model.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Access {
    Read { addr: RvAddr, val: RvData },
    Write { addr: RvAddr, val: RvData },
}

impl Access {
    pub fn addr(&self) -> RvAddr {
        match *self {
            Access::Read { addr, .. } | Access::Write { addr, .. } => addr,
        }
    }
}

/// A log of accesses that can be appended to without `&mut self`.
///
/// Clones share the same underlying buffer, so a test can keep a handle
/// while the peripheral that records into it is owned elsewhere.
///
/// * Example
///
/// ```
/// use hsm_emu_bus::testing::{Access, AccessLog};
///
/// let log = AccessLog::new();
/// log.record(Access::Write { addr: 0x0c, val: 0x25 });
/// assert_eq!(log.writes_to(0x0c), 1);
/// assert_eq!(log.take().len(), 1);
/// assert!(log.take().is_empty());
/// ```
#[derive(Clone, Default)]
pub struct AccessLog {
    entries: Rc<RefCell<Vec<Access>>>,
}

impl AccessLog {
    /// Construct an empty `AccessLog`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, access: Access) {
        self.entries.borrow_mut().push(access);
    }

    /// Removes and returns every access recorded so far.
    pub fn take(&self) -> Vec<Access> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Number of writes made to `addr`.
    pub fn writes_to(&self, addr: RvAddr) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|e| matches!(e, Access::Write { addr: a, .. } if *a == addr))
            .count()
    }

    /// Values written to `addr`, oldest first.
    pub fn values_written_to(&self, addr: RvAddr) -> Vec<RvData> {
        self.entries
            .borrow()
            .iter()
            .filter_map(|e| match *e {
                Access::Write { addr: a, val } if a == addr => Some(val),
                _ => None,
            })
            .collect()
    }

    /// Number of reads whose address falls inside `range`.
    pub fn reads_in(&self, range: Range<RvAddr>) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|e| matches!(e, Access::Read { .. }) && range.contains(&e.addr()))
            .count()
    }
}
