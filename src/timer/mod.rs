//! Timeout backends the tracker schedules its inactivity deadline on.

mod background;
mod foreground;
mod manual;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};

pub use background::BackgroundTimer;
pub use foreground::ForegroundTimer;
pub use manual::ManualTimer;

/// One-shot callback run when a timeout elapses.
pub type TimeoutCallback = Box<dyn FnOnce() + Send + 'static>;

/// Opaque reference to a scheduled callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Schedule/cancel strategy used by the tracker.
///
/// Implementations must never run the callback from inside `set_timeout`,
/// and `clear_timeout` must be a no-op for handles that already fired or
/// were already cancelled.
pub trait TimeoutHandler: Send + Sync {
    /// Runs `callback` once after `delay`.
    fn set_timeout(&self, callback: TimeoutCallback, delay: Duration) -> TimerHandle;

    /// Cancels a pending callback.
    fn clear_timeout(&self, handle: TimerHandle);
}

/// Production timer backends selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimerBackend {
    /// Tokio timer on the host runtime; only fires while the runtime is driven.
    #[default]
    Foreground,
    /// Dedicated timer thread that keeps running independently of the host loop.
    Background,
}

impl TimerBackend {
    /// Builds the backend. The foreground variant must be called from within
    /// a tokio runtime.
    pub fn build(self) -> Result<Arc<dyn TimeoutHandler>> {
        let handler: Arc<dyn TimeoutHandler> = match self {
            TimerBackend::Foreground => Arc::new(ForegroundTimer::current()?),
            TimerBackend::Background => Arc::new(BackgroundTimer::new()?),
        };
        Ok(handler)
    }
}

impl FromStr for TimerBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "foreground" => Ok(TimerBackend::Foreground),
            "background" => Ok(TimerBackend::Background),
            other => Err(Error::InvalidConfig(format!(
                "unknown timer backend {other:?} (expected \"foreground\" or \"background\")"
            ))),
        }
    }
}

impl fmt::Display for TimerBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerBackend::Foreground => f.write_str("foreground"),
            TimerBackend::Background => f.write_str("background"),
        }
    }
}

/// Per-backend handle allocator.
#[derive(Debug, Default)]
pub(crate) struct HandleSeq(AtomicU64);

impl HandleSeq {
    pub(crate) fn next(&self) -> TimerHandle {
        TimerHandle(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}
