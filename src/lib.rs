//! User inactivity tracking for wrapped UI content.
//!
//! An [`InactivityTracker`] hosts arbitrary child content, observes gestures
//! and keyboard visibility changes without consuming them, and reports
//! active/inactive transitions through a callback once no activity has been
//! seen for a configurable duration. Timing is delegated to a pluggable
//! [`TimeoutHandler`] so the same tracker can run on a foreground runtime
//! timer, a background timer thread, or a manually driven clock.

pub mod config;
pub mod error;
pub mod keyboard;
pub mod timer;
pub mod tracker;

use std::sync::{Mutex, MutexGuard};

use tracing::warn;

pub use error::{Error, Result};
pub use keyboard::{KeyboardBus, KeyboardEvent, KeyboardEvents, KeyboardSubscription};
pub use timer::{
    BackgroundTimer, ForegroundTimer, ManualTimer, TimeoutHandler, TimerBackend, TimerHandle,
};
pub use tracker::{ActivityState, GesturePhase, InactivityTracker, Props, Style};

/// Locks a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("Mutex was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}
