//! Entry lifecycle transitions
//!
//! ```text
//! NotLoaded ──▶ SetupInProgress ──▶ Loaded ──▶ UnloadInProgress ──▶ NotLoaded
//!                     │  ▲                           │
//!                     ▼  │                           ▼
//!                  SetupError ──▶ UnloadInProgress  FailedUnload
//! ```
//!
//! Failed setups are not retried automatically; the entry sits in
//! `SetupError` until setup is requested again. `FailedUnload` is final.

use crate::entry::ConfigEntryState;
use thiserror::Error;

/// A lifecycle change the state machine does not allow
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot move config entry from {from:?} to {to:?}: {reason}")]
pub struct InvalidTransition {
    pub from: ConfigEntryState,
    pub to: ConfigEntryState,
    pub reason: &'static str,
}

impl ConfigEntryState {
    /// States reachable in one step from `self`
    pub fn next_states(self) -> &'static [ConfigEntryState] {
        use ConfigEntryState::*;

        match self {
            NotLoaded => &[SetupInProgress],
            SetupInProgress => &[Loaded, SetupError],
            SetupError => &[SetupInProgress, UnloadInProgress],
            Loaded => &[UnloadInProgress],
            UnloadInProgress => &[NotLoaded, FailedUnload],
            FailedUnload => &[],
        }
    }

    pub fn can_transition_to(self, to: ConfigEntryState) -> bool {
        self.next_states().contains(&to)
    }

    /// Validate a move to `to`, returning the new state.
    pub fn try_transition(
        self,
        to: ConfigEntryState,
    ) -> Result<ConfigEntryState, InvalidTransition> {
        if self.can_transition_to(to) {
            return Ok(to);
        }
        Err(InvalidTransition {
            from: self,
            to,
            reason: self.rejection(to),
        })
    }

    fn rejection(self, to: ConfigEntryState) -> &'static str {
        use ConfigEntryState::*;

        match (self, to) {
            (FailedUnload, _) => "entry failed to unload and cannot recover",
            (Loaded, SetupInProgress) => "entry is already loaded",
            (SetupInProgress, _) => "setup has not finished",
            (UnloadInProgress, _) => "unload has not finished",
            (_, Loaded) | (_, SetupError) => "only a running setup can finish",
            (_, NotLoaded) | (_, FailedUnload) => "only a running unload can finish",
            (_, UnloadInProgress) => "entry is not loaded",
            _ => "transition not allowed",
        }
    }
}
