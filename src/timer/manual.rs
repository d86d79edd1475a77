//! Virtual clock timer advanced by hand.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use super::{HandleSeq, TimeoutCallback, TimeoutHandler, TimerHandle};
use crate::lock;

#[derive(Default)]
struct VirtualClock {
    now: Duration,
    queue: BTreeMap<(Duration, TimerHandle), TimeoutCallback>,
    deadlines: HashMap<TimerHandle, Duration>,
}

/// Deterministic timer: nothing fires until [`ManualTimer::advance`] moves the
/// virtual clock past a deadline.
#[derive(Default)]
pub struct ManualTimer {
    seq: HandleSeq,
    clock: Mutex<VirtualClock>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation.
    pub fn now(&self) -> Duration {
        lock(&self.clock).now
    }

    /// Number of scheduled callbacks that have not fired or been cleared.
    pub fn pending(&self) -> usize {
        lock(&self.clock).queue.len()
    }

    /// Moves the clock forward, firing due callbacks in deadline order.
    ///
    /// Callbacks run without the clock locked, so they may schedule or clear
    /// timeouts; anything they schedule inside the window fires too.
    pub fn advance(&self, by: Duration) {
        let target = lock(&self.clock).now + by;

        loop {
            let due = {
                let mut clock = lock(&self.clock);
                match clock.queue.first_entry() {
                    Some(entry) if entry.key().0 <= target => {
                        let ((at, handle), callback) = entry.remove_entry();
                        clock.deadlines.remove(&handle);
                        clock.now = at;
                        Some(callback)
                    }
                    _ => None,
                }
            };

            match due {
                Some(callback) => callback(),
                None => break,
            }
        }

        lock(&self.clock).now = target;
    }
}

impl TimeoutHandler for ManualTimer {
    fn set_timeout(&self, callback: TimeoutCallback, delay: Duration) -> TimerHandle {
        let handle = self.seq.next();
        let mut clock = lock(&self.clock);
        let deadline = clock.now + delay;
        clock.deadlines.insert(handle, deadline);
        clock.queue.insert((deadline, handle), callback);
        handle
    }

    fn clear_timeout(&self, handle: TimerHandle) {
        let mut clock = lock(&self.clock);
        if let Some(deadline) = clock.deadlines.remove(&handle) {
            clock.queue.remove(&(deadline, handle));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn log_into(log: &Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> TimeoutCallback {
        let log = Arc::clone(log);
        Box::new(move || log.lock().unwrap().push(label))
    }

    #[test]
    fn fires_only_when_deadline_reached() {
        let timer = ManualTimer::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        timer.set_timeout(log_into(&log, "a"), Duration::from_millis(500));
        timer.advance(Duration::from_millis(499));
        assert!(log.lock().unwrap().is_empty());

        timer.advance(Duration::from_millis(1));
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
        assert_eq!(timer.now(), Duration::from_millis(500));
        assert_eq!(timer.pending(), 0);
    }

    #[test]
    fn fires_in_deadline_order_within_one_advance() {
        let timer = ManualTimer::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        timer.set_timeout(log_into(&log, "late"), Duration::from_millis(300));
        timer.set_timeout(log_into(&log, "early"), Duration::from_millis(100));
        timer.advance(Duration::from_secs(1));

        assert_eq!(*log.lock().unwrap(), vec!["early", "late"]);
    }

    #[test]
    fn cleared_handles_do_not_fire() {
        let timer = ManualTimer::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let handle = timer.set_timeout(log_into(&log, "a"), Duration::from_millis(100));
        timer.clear_timeout(handle);
        timer.clear_timeout(handle);
        timer.advance(Duration::from_secs(1));

        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn callbacks_can_schedule_inside_the_window() {
        let timer = Arc::new(ManualTimer::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let inner_timer = Arc::clone(&timer);
        let inner_log = Arc::clone(&log);
        timer.set_timeout(
            Box::new(move || {
                inner_log.lock().unwrap().push("outer");
                inner_timer.set_timeout(log_into(&inner_log, "inner"), Duration::from_millis(100));
            }),
            Duration::from_millis(100),
        );

        timer.advance(Duration::from_millis(250));
        assert_eq!(*log.lock().unwrap(), vec!["outer", "inner"]);
        assert_eq!(timer.now(), Duration::from_millis(250));
    }
}
