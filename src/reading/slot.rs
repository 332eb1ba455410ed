//! Single-slot handoff between the radio receiver and the uploader.
//!
//! The slot holds at most one pending [`Reading`].  A new arrival replaces
//! an unsent one (latest value wins) but never while an upload owns the
//! slot: [`ReadingSlot::publish`] blocks until the in-flight upload ends.
//! Claiming the slot for upload is one atomic step under the lock, so a
//! reading cannot change between "has data" and "in flight".

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::Reading;

#[derive(Debug, Default)]
struct SlotState {
    pending: Option<Reading>,
    in_flight: bool,
}

/// Result of [`ReadingSlot::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    /// The slot was empty.
    Fresh,
    /// An unsent reading was dropped in favour of this one.
    Superseded,
}

/// Point-in-time view of the slot flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSnapshot {
    pub pending: Option<Reading>,
    pub has_data: bool,
    pub in_flight: bool,
}

#[derive(Debug, Default)]
pub struct ReadingSlot {
    state: Mutex<SlotState>,
    changed: Condvar,
}

impl ReadingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `reading`, waiting first for any in-flight upload to finish.
    pub fn publish(&self, reading: Reading) -> Publish {
        let guard = self.lock();
        let mut state = self
            .changed
            .wait_while(guard, |s| s.in_flight)
            .unwrap_or_else(PoisonError::into_inner);
        let previous = state.pending.replace(reading);
        drop(state);
        self.changed.notify_all();
        if previous.is_some() { Publish::Superseded } else { Publish::Fresh }
    }

    /// Claim the pending reading for upload.
    ///
    /// Returns `None` if the slot is empty or already claimed.  The claim
    /// lasts until the returned guard is dropped, which also empties the
    /// slot.
    pub fn begin_upload(&self) -> Option<InFlight<'_>> {
        let mut state = self.lock();
        if state.in_flight {
            return None;
        }
        let reading = state.pending.clone()?;
        state.in_flight = true;
        Some(InFlight { slot: self, reading })
    }

    /// Block until a reading is ready to upload or `timeout` passes.
    ///
    /// Returns whether a reading is ready.
    pub fn wait_for_data(&self, timeout: Duration) -> bool {
        let guard = self.lock();
        let (state, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |s| s.pending.is_none() || s.in_flight)
            .unwrap_or_else(PoisonError::into_inner);
        state.pending.is_some() && !state.in_flight
    }

    pub fn has_data(&self) -> bool {
        self.lock().pending.is_some()
    }

    pub fn snapshot(&self) -> SlotSnapshot {
        let state = self.lock();
        SlotSnapshot {
            pending: state.pending.clone(),
            has_data: state.pending.is_some(),
            in_flight: state.in_flight,
        }
    }

    fn finish_upload(&self) {
        let mut state = self.lock();
        state.pending = None;
        state.in_flight = false;
        drop(state);
        self.changed.notify_all();
    }
}

/// Exclusive claim on the slot's reading.
#[derive(Debug)]
pub struct InFlight<'a> {
    slot: &'a ReadingSlot,
    reading: Reading,
}

impl InFlight<'_> {
    pub fn reading(&self) -> &Reading {
        &self.reading
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.slot.finish_upload();
    }
}
