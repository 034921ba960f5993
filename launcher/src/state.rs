//! Process-wide lifecycle state.
//!
//! `NotStarted -> SpawningBackend -> Serving -> ShuttingDown -> Terminated`, forward only.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::{LauncherError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LauncherState {
    NotStarted,
    SpawningBackend,
    Serving,
    ShuttingDown,
    Terminated,
}

impl LauncherState {
    pub fn can_transition_to(self, next: LauncherState) -> bool {
        use LauncherState::*;
        matches!(
            (self, next),
            (NotStarted, SpawningBackend)
                | (SpawningBackend, Serving)
                | (Serving, ShuttingDown)
                | (ShuttingDown, Terminated)
        )
    }
}

impl fmt::Display for LauncherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LauncherState::NotStarted => "not-started",
            LauncherState::SpawningBackend => "spawning-backend",
            LauncherState::Serving => "serving",
            LauncherState::ShuttingDown => "shutting-down",
            LauncherState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Shared handle to the lifecycle state. Cloning shares the same cell.
#[derive(Debug, Clone)]
pub struct StateCell {
    inner: Arc<Mutex<LauncherState>>,
}

impl Default for StateCell {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(LauncherState::NotStarted)),
        }
    }
}

impl StateCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> LauncherState {
        *self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Moves to `next`, returning the previous state.
    pub fn advance(&self, next: LauncherState) -> Result<LauncherState> {
        let mut state = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let from = *state;
        if !from.can_transition_to(next) {
            return Err(LauncherError::InvalidTransition { from, to: next });
        }
        *state = next;
        debug!("lifecycle: {} -> {}", from, next);
        Ok(from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_forward_path() {
        let cell = StateCell::new();
        assert_eq!(cell.current(), LauncherState::NotStarted);

        cell.advance(LauncherState::SpawningBackend).unwrap();
        cell.advance(LauncherState::Serving).unwrap();
        cell.advance(LauncherState::ShuttingDown).unwrap();
        let prev = cell.advance(LauncherState::Terminated).unwrap();

        assert_eq!(prev, LauncherState::ShuttingDown);
        assert_eq!(cell.current(), LauncherState::Terminated);
    }

    #[test]
    fn test_no_path_back_to_serving() {
        let cell = StateCell::new();
        cell.advance(LauncherState::SpawningBackend).unwrap();
        cell.advance(LauncherState::Serving).unwrap();
        cell.advance(LauncherState::ShuttingDown).unwrap();

        let err = cell.advance(LauncherState::Serving).unwrap_err();
        assert!(matches!(
            err,
            LauncherError::InvalidTransition {
                from: LauncherState::ShuttingDown,
                to: LauncherState::Serving
            }
        ));
        assert_eq!(cell.current(), LauncherState::ShuttingDown);
    }

    #[test]
    fn test_shutdown_only_from_serving() {
        assert!(!LauncherState::NotStarted.can_transition_to(LauncherState::ShuttingDown));
        assert!(!LauncherState::SpawningBackend.can_transition_to(LauncherState::ShuttingDown));
        assert!(!LauncherState::Serving.can_transition_to(LauncherState::Terminated));
        assert!(LauncherState::Serving.can_transition_to(LauncherState::ShuttingDown));
    }

    #[test]
    fn test_clones_share_state() {
        let cell = StateCell::new();
        let other = cell.clone();
        cell.advance(LauncherState::SpawningBackend).unwrap();
        assert_eq!(other.current(), LauncherState::SpawningBackend);
    }
}
