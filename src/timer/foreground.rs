//! Foreground timer backed by tasks on the host's tokio runtime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use super::{HandleSeq, TimeoutCallback, TimeoutHandler, TimerHandle};
use crate::error::Result;
use crate::lock;

/// Timer that spawns one sleeping task per timeout on a tokio runtime.
///
/// Timeouts only make progress while the runtime is driven, which is the
/// foreground-only guarantee.
pub struct ForegroundTimer {
    /// Runtime captured at construction, if any.
    runtime: Option<Handle>,
    seq: HandleSeq,
    /// Live tasks; an entry is removed by whoever gets to it first (fire or cancel).
    tasks: Arc<Mutex<HashMap<TimerHandle, AbortHandle>>>,
}

impl ForegroundTimer {
    /// Creates a timer bound to the current runtime if there is one.
    ///
    /// Without a runtime the timer looks one up on every `set_timeout` and
    /// silently never fires if none is found.
    pub fn new() -> Self {
        Self::from_runtime(Handle::try_current().ok())
    }

    /// Creates a timer bound to the current runtime, failing outside one.
    pub fn current() -> Result<Self> {
        Ok(Self::from_runtime(Some(Handle::try_current()?)))
    }

    /// Creates a timer bound to an explicit runtime.
    pub fn with_handle(runtime: Handle) -> Self {
        Self::from_runtime(Some(runtime))
    }

    fn from_runtime(runtime: Option<Handle>) -> Self {
        Self {
            runtime,
            seq: HandleSeq::default(),
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of timeouts still waiting to fire.
    pub fn pending(&self) -> usize {
        lock(&self.tasks).len()
    }
}

impl Default for ForegroundTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeoutHandler for ForegroundTimer {
    fn set_timeout(&self, callback: TimeoutCallback, delay: Duration) -> TimerHandle {
        let handle = self.seq.next();

        let Some(runtime) = self.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            warn!("No tokio runtime available, timeout {} will never fire", handle.id());
            return handle;
        };

        let tasks = Arc::clone(&self.tasks);
        // Held across the spawn so the task cannot look itself up before it is registered.
        let mut registry = lock(&self.tasks);
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let still_pending = lock(&tasks).remove(&handle).is_some();
            if still_pending {
                callback();
            }
        });
        registry.insert(handle, task.abort_handle());

        debug!("Scheduled foreground timeout {} in {:?}", handle.id(), delay);
        handle
    }

    fn clear_timeout(&self, handle: TimerHandle) {
        if let Some(task) = lock(&self.tasks).remove(&handle) {
            task.abort();
            debug!("Cleared foreground timeout {}", handle.id());
        }
    }
}

impl Drop for ForegroundTimer {
    fn drop(&mut self) {
        for (_, task) in lock(&self.tasks).drain() {
            task.abort();
        }
    }
}
