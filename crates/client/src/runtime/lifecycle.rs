//! Worker lifecycle states.

use serde::{Deserialize, Serialize};
use shellcache_core::Error;

/// Where a worker version is in its lifecycle.
///
/// `uninstalled → installing → installed → activating → active → redundant`,
/// with any in-flight or waiting state able to drop to `redundant` on failure
/// or replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Uninstalled,
    Installing,
    /// Installed and waiting to take control.
    Installed,
    Activating,
    Active,
    /// Failed or superseded. Terminal.
    Redundant,
}

impl WorkerState {
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Uninstalled, Installing)
                | (Installing, Installed)
                | (Installing, Redundant)
                | (Installed, Activating)
                | (Installed, Redundant)
                | (Activating, Active)
                | (Activating, Redundant)
                | (Active, Redundant)
        )
    }

    /// Check if this state allows fetch interception
    pub fn can_intercept_fetch(self) -> bool {
        self == WorkerState::Active
    }

    pub fn is_terminal(self) -> bool {
        self == WorkerState::Redundant
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkerState::Uninstalled => "uninstalled",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
            WorkerState::Redundant => "redundant",
        }
    }

    /// Validated transition.
    pub fn advance(self, next: WorkerState) -> Result<WorkerState, Error> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(Error::InvalidState(format!("cannot move from {} to {}", self, next)))
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
