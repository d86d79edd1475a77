//! The inactivity tracker and its public prop surface.

mod gesture;
mod inactivity;
mod props;

use chrono::{DateTime, Utc};

/// User activity state.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityState {
    /// User is currently active.
    Active,
    /// No activity was seen for the configured duration; `since` is when the
    /// tracker went inactive.
    Inactive { since: DateTime<Utc> },
}

impl ActivityState {
    pub fn is_active(&self) -> bool {
        matches!(self, ActivityState::Active)
    }
}

pub use gesture::{GestureInterceptor, GesturePhase};
pub use inactivity::{Container, InactivityTracker};
pub use props::{ActionCallback, Props, Style, DEFAULT_TIME_FOR_INACTIVITY};
