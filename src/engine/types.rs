//! Engine state types.
//!
//! Defines the state machine for the mirror engine lifecycle.
//!
//! # State Transitions
//!
//! ```text
//!              run()
//! Created ──────────────→ CreatingThread
//!                              │
//!                              │ (thread created or resumed)
//!                              ↓
//!                          Polling ⇄ Processing
//!                              │          │
//!                   shutdown() │          │ (unrecoverable error)
//!                              ↓          ↓
//!                          Stopped     Failed
//! ```
//!
//! # State Descriptions
//!
//! - **Created**: engine constructed, no remote thread yet.
//! - **CreatingThread**: resolving the owner and creating (or resuming)
//!   the remote topic. A fatal error here aborts the run.
//! - **Polling**: waiting for new entries; sleeps a fixed interval between
//!   polls.
//! - **Processing**: mirroring a batch of entries in id order.
//! - **Stopped**: graceful shutdown complete.
//! - **Failed**: terminal error; subsequent entries stay unmirrored until
//!   an operator restarts the run.

/// State of the mirror engine.
///
/// See module docs for the state transition diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Engine created but not started.
    Created,

    /// Creating or resuming the remote thread.
    CreatingThread,

    /// Waiting for new entries in the log.
    Polling,

    /// Mirroring a batch of entries.
    Processing,

    /// Stopped cleanly after a shutdown signal.
    Stopped,

    /// Terminal error; the loop has stopped.
    Failed,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Created => write!(f, "Created"),
            EngineState::CreatingThread => write!(f, "CreatingThread"),
            EngineState::Polling => write!(f, "Polling"),
            EngineState::Processing => write!(f, "Processing"),
            EngineState::Stopped => write!(f, "Stopped"),
            EngineState::Failed => write!(f, "Failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_state_display() {
        assert_eq!(EngineState::Created.to_string(), "Created");
        assert_eq!(EngineState::CreatingThread.to_string(), "CreatingThread");
        assert_eq!(EngineState::Polling.to_string(), "Polling");
        assert_eq!(EngineState::Processing.to_string(), "Processing");
        assert_eq!(EngineState::Stopped.to_string(), "Stopped");
        assert_eq!(EngineState::Failed.to_string(), "Failed");
    }

    #[test]
    fn test_engine_state_equality() {
        assert_eq!(EngineState::Polling, EngineState::Polling);
        assert_ne!(EngineState::Polling, EngineState::Processing);
    }

    #[test]
    fn test_engine_state_copy() {
        let state = EngineState::Failed;
        let copied: EngineState = state;
        assert_eq!(state, copied);
    }
}
