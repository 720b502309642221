//! Server lifecycle state machine.
//!
//! # State Transitions
//! ```text
//! Unconfigured → Configured: setup
//! Configured   → Listening:  start
//! Listening | Configured → Stopping → Stopped: stop
//! Unconfigured → Stopped:    stop before setup
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Unconfigured = 0,
    Configured = 1,
    Listening = 2,
    Stopping = 3,
    Stopped = 4,
}

impl From<u8> for ServerState {
    fn from(val: u8) -> Self {
        match val {
            1 => ServerState::Configured,
            2 => ServerState::Listening,
            3 => ServerState::Stopping,
            4 => ServerState::Stopped,
            _ => ServerState::Unconfigured,
        }
    }
}

impl ServerState {
    /// True once `stop` has begun.
    pub fn is_stopping_or_stopped(self) -> bool {
        matches!(self, ServerState::Stopping | ServerState::Stopped)
    }
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ServerState::Unconfigured => "unconfigured",
            ServerState::Configured => "configured",
            ServerState::Listening => "listening",
            ServerState::Stopping => "stopping",
            ServerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Shared, lock-free holder of the current [`ServerState`].
///
/// Clones observe the same state; request-path readers (such as the
/// graceful-shutdown guard) only ever load it.
#[derive(Debug, Clone)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(ServerState::Unconfigured as u8)))
    }

    pub fn get(&self) -> ServerState {
        ServerState::from(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: ServerState) {
        let previous = ServerState::from(self.0.swap(state as u8, Ordering::SeqCst));
        if previous != state {
            tracing::trace!(from = %previous, to = %state, "Server state changed");
        }
    }

    /// Move to `to` only if the current state equals `from`.
    /// Returns the state observed before the attempt.
    pub fn transition(&self, from: ServerState, to: ServerState) -> Result<ServerState, ServerState> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(ServerState::from)
            .map_err(ServerState::from)
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
