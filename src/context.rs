//! Per-connection client context: a name -> intermediate-result map, plus the batch
//! mode state machine of §4.9/§4.11.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::{ExecError, ExecResult};
use crate::value::TypedVec;

/// State of the per-connection batched-select pipeline (§4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Normal,
    Batching,
    Draining,
}

/// A single connection's named-intermediate store.
///
/// The slot map is behind a [`parking_lot::Mutex`] rather than plain interior
/// mutability because batched-select worker threads (§4.9) write into distinct slots
/// of the *same* context concurrently; the mutex is held only around the insert, never
/// across the select/fetch/aggregate work that produces the value (§5 "client-context
/// hash is mutated under a single mutex").
pub struct ClientContext {
    slots: Mutex<HashMap<String, TypedVec>>,
    state: BatchState,
}

impl ClientContext {
    pub fn new() -> Self {
        ClientContext {
            slots: Mutex::new(HashMap::new()),
            state: BatchState::Normal,
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Insert or replace `name`'s intermediate. Replacing an already-present name
    /// drops the prior value (§3: "insertion of an already-present name replaces and
    /// frees the prior Result" — a plain `HashMap::insert` already gives us this).
    pub fn set(&self, name: &str, value: TypedVec) {
        self.slots.lock().insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> ExecResult<TypedVec> {
        self.slots
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| ExecError::ObjectNotFound(name.to_string()))
    }

    /// Enter batch mode (`batch_queries`). Only legal from `Normal`.
    pub fn begin_batch(&mut self) -> ExecResult<()> {
        if self.state != BatchState::Normal {
            return Err(ExecError::IncorrectFormat(
                "batch_queries requires the normal state".into(),
            ));
        }
        self.state = BatchState::Batching;
        Ok(())
    }

    /// Begin draining (`batch_execute` has been issued; tasks are now running).
    /// Only legal from `Batching`.
    pub fn begin_drain(&mut self) -> ExecResult<()> {
        if self.state != BatchState::Batching {
            return Err(ExecError::IncorrectFormat(
                "batch_execute requires the batching state".into(),
            ));
        }
        self.state = BatchState::Draining;
        Ok(())
    }

    /// All queued tasks have completed; return to `Normal`.
    pub fn finish_drain(&mut self) {
        self.state = BatchState::Normal;
    }

    /// True while in `Batching` or `Draining` (writes against a participating table
    /// are forbidden in either state, per §3).
    pub fn is_batch_active(&self) -> bool {
        self.state != BatchState::Normal
    }
}

impl Default for ClientContext {
    fn default() -> Self {
        Self::new()
    }
}
