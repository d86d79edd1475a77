//! Passive gesture observer installed on the tracker's container.

use std::sync::Weak;

use super::inactivity::Shared;

/// Capture phases the host's responder system asks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    /// A touch started inside the container.
    Start,
    /// A touch moved inside the container.
    Move,
    /// Another responder asked to take over the gesture.
    TerminationRequest,
}

/// Handler the host calls for every capture-phase touch.
///
/// It never claims the gesture, so children keep receiving it.
#[derive(Clone)]
pub struct GestureInterceptor {
    pub(crate) shared: Weak<Shared>,
}

impl GestureInterceptor {
    /// Records the gesture as activity. Always returns `false` (do not capture).
    pub fn should_capture(&self, phase: GesturePhase) -> bool {
        if let Some(shared) = self.shared.upgrade() {
            shared.observe_gesture(phase);
        }
        false
    }

    pub fn on_start_should_capture(&self) -> bool {
        self.should_capture(GesturePhase::Start)
    }

    pub fn on_move_should_capture(&self) -> bool {
        self.should_capture(GesturePhase::Move)
    }

    pub fn on_termination_request(&self) -> bool {
        self.should_capture(GesturePhase::TerminationRequest)
    }
}

impl std::fmt::Debug for GestureInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GestureInterceptor")
            .field("attached", &(self.shared.strong_count() > 0))
            .finish()
    }
}
