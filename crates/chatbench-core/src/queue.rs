// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashSet;

use tokio::sync::Mutex;

use crate::error::QueueError;
use crate::payload::RequestPayload;

struct State {
    pending: Vec<RequestPayload>,
    active: HashSet<String>,
}

/// Concurrent work source with the invariant that at most one payload per
/// `session_id` is in flight at a time.
///
/// A payload with an absent `session_id` is never tracked in `active` and so
/// never excludes, or is excluded by, anything.
pub struct SessionQueue {
    state: Mutex<State>,
}

/// An acquired payload. The caller must release it on every exit path
/// (including error unwinding) via [`SessionQueue::release`].
pub struct QueueHandle {
    payload: RequestPayload,
}

impl QueueHandle {
    pub fn payload(&self) -> &RequestPayload {
        &self.payload
    }

    pub fn into_payload(self) -> RequestPayload {
        self.payload
    }
}

/// Result of [`SessionQueue::get_item`].
pub enum Acquisition {
    /// A payload eligible for dispatch right now.
    Item(QueueHandle),
    /// No eligible payload exists at the moment. `drained` is `true` only
    /// when both the pending list and the active set are empty, meaning no
    /// further item will ever become eligible.
    Exhausted { drained: bool },
}

impl SessionQueue {
    pub fn new(pending: Vec<RequestPayload>) -> Self {
        Self { state: Mutex::new(State { pending, active: HashSet::new() }) }
    }

    /// Scans pending payloads in insertion order and returns the first whose
    /// `session_id` is not currently active. The scan, removal, and
    /// insertion into `active` are atomic with respect to other `get_item`
    /// and `release` calls (single mutex covering both fields).
    pub async fn get_item(&self) -> Acquisition {
        let mut state = self.state.lock().await;

        let pos = state.pending.iter().position(|p| match &p.session_id {
            Some(sid) => !state.active.contains(sid),
            None => true,
        });

        match pos {
            Some(idx) => {
                let payload = state.pending.remove(idx);
                if let Some(sid) = &payload.session_id {
                    state.active.insert(sid.clone());
                }
                Acquisition::Item(QueueHandle { payload })
            }
            None => {
                let drained = state.pending.is_empty() && state.active.is_empty();
                Acquisition::Exhausted { drained }
            }
        }
    }

    /// Releases a handle, removing its session from `active`. Must be called
    /// exactly once per acquired handle.
    ///
    /// Returns `QueueInvariantViolation` (as `QueueError::UnknownSession`) if
    /// the session was not tracked as active — this indicates a bug in the
    /// Pool/Queue pairing, not caller misuse of a well-behaved Pool.
    pub async fn release(&self, handle: QueueHandle) -> Result<(), QueueError> {
        let QueueHandle { payload } = handle;
        if let Some(sid) = payload.session_id {
            let mut state = self.state.lock().await;
            if !state.active.remove(&sid) {
                return Err(QueueError::UnknownSession(Some(sid)));
            }
        }
        Ok(())
    }
}
