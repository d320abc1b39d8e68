//! Last-issued-wins slot for screens that refresh while a previous load is
//! still in flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Superseded,
}

pub struct Latest<T> {
    issued: AtomicU64,
    value: Mutex<Option<T>>,
}

impl<T> Default for Latest<T> {
    fn default() -> Self {
        Self {
            issued: AtomicU64::new(0),
            value: Mutex::new(None),
        }
    }
}

impl<T: Clone> Latest<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Ticket {
        Ticket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.issued.load(Ordering::SeqCst) == ticket.0
    }

    /// Stores `value` if `ticket` is still the most recently issued one.
    pub fn complete(&self, ticket: Ticket, value: T) -> Outcome {
        let Ok(mut slot) = self.value.lock() else {
            return Outcome::Superseded;
        };
        // Checked under the lock so two completions cannot interleave.
        if !self.is_current(ticket) {
            return Outcome::Superseded;
        }
        *slot = Some(value);
        Outcome::Applied
    }

    pub fn current(&self) -> Option<T> {
        self.value.lock().ok().and_then(|slot| slot.clone())
    }

    /// Empties the slot. Loads issued before the call complete as
    /// [`Outcome::Superseded`].
    pub fn clear(&self) {
        if let Ok(mut slot) = self.value.lock() {
            self.issued.fetch_add(1, Ordering::SeqCst);
            *slot = None;
        }
    }
}
