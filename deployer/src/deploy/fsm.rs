//! Finite State Machine for a deployment run

use serde::{Deserialize, Serialize};

/// Run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Options received, type not yet validated
    Init,

    /// Cloning the configuration repository
    Fetching,

    /// Selecting the deployment handler
    Dispatching,

    /// Handler writing artifacts
    Generating,

    /// Handler completed
    Done,

    /// Run aborted
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

/// Run event
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// Configuration repository configured, start fetching
    Fetch,

    /// Type validated (and overlay loaded, if any), pick a handler
    Dispatch,

    /// Handler selected
    Generate,

    /// Handler completed
    Complete,

    /// Any fatal error
    Fail(String),
}

/// Run FSM, one-directional: no retry and no re-entry
#[derive(Debug, Clone)]
pub struct RunFsm {
    state: RunState,
    error: Option<String>,
    history: Vec<RunState>,
}

impl RunFsm {
    /// Create a new FSM in the init state
    pub fn new() -> Self {
        Self {
            state: RunState::Init,
            error: None,
            history: vec![RunState::Init],
        }
    }

    /// Get current state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Every state visited, in order
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: RunEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            (RunState::Init, RunEvent::Fetch) => RunState::Fetching,
            (RunState::Init, RunEvent::Dispatch) => RunState::Dispatching,
            (RunState::Fetching, RunEvent::Dispatch) => RunState::Dispatching,
            (RunState::Dispatching, RunEvent::Generate) => RunState::Generating,
            (RunState::Generating, RunEvent::Complete) => RunState::Done,

            (state, RunEvent::Fail(err)) if !state.is_terminal() => {
                self.error = Some(err.clone());
                RunState::Failed
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        self.history.push(new_state);
        Ok(())
    }
}

impl Default for RunFsm {
    fn default() -> Self {
        Self::new()
    }
}
