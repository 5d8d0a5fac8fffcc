// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Change notification for recurrences.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::recurrence::Recurrence;

/// A listener notified after every observable mutation of a [`Recurrence`].
pub trait RecurrenceObserver {
    /// Called once per mutating operation, after the state change.
    fn recurrence_updated(&mut self, recurrence: &Recurrence);
}

/// Shared handle under which observers register themselves.
pub type ObserverHandle = Rc<RefCell<dyn RecurrenceObserver>>;

/// Holds non-owning links to registered observers.
///
/// Registration is idempotent and deregistration tolerates unknown
/// listeners. Notification walks the list by index and skips dead links, so
/// a listener may deregister itself (or others) while being notified.
#[derive(Debug, Default)]
pub(crate) struct ObserverRegistry {
    listeners: RefCell<Vec<Weak<RefCell<dyn RecurrenceObserver>>>>,
}

impl ObserverRegistry {
    pub(crate) fn add(&self, observer: &ObserverHandle) {
        let new = Rc::downgrade(observer);
        let mut listeners = self.listeners.borrow_mut();
        if !listeners.iter().any(|w| w.ptr_eq(&new)) {
            listeners.push(new);
        }
    }

    pub(crate) fn remove(&self, observer: &ObserverHandle) {
        let target = Rc::downgrade(observer);
        self.listeners.borrow_mut().retain(|w| !w.ptr_eq(&target));
    }

    pub(crate) fn notify(&self, recurrence: &Recurrence) {
        let mut i = 0;
        loop {
            let link = {
                let listeners = self.listeners.borrow();
                match listeners.get(i) {
                    Some(w) => w.clone(),
                    None => break,
                }
            };
            if let Some(listener) = link.upgrade() {
                // A listener re-triggering notification from inside its own
                // callback is skipped instead of aborting the walk.
                if let Ok(mut listener) = listener.try_borrow_mut() {
                    listener.recurrence_updated(recurrence);
                }
            }
            i += 1;
        }
        self.listeners
            .borrow_mut()
            .retain(|w| w.strong_count() > 0);
    }
}
