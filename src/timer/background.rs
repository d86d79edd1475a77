//! Background-capable timer running on its own service thread.

use std::collections::{BTreeMap, HashMap};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{HandleSeq, TimeoutCallback, TimeoutHandler, TimerHandle};
use crate::error::{Error, Result};
use crate::lock;

enum Command {
    Schedule {
        handle: TimerHandle,
        deadline: Instant,
        callback: TimeoutCallback,
    },
    Cancel(TimerHandle),
    Shutdown,
}

/// Timer service that keeps firing regardless of whether any async runtime
/// or host event loop is being driven.
///
/// Callbacks run on the service thread, one at a time, in deadline order.
pub struct BackgroundTimer {
    seq: HandleSeq,
    commands: Sender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundTimer {
    /// Starts the timer service thread.
    pub fn new() -> Result<Self> {
        let (commands, rx) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("inactivity-timer".to_string())
            .spawn(move || run_timer_service(rx))
            .map_err(Error::SpawnTimer)?;

        info!("Background timer service started");

        Ok(Self {
            seq: HandleSeq::default(),
            commands,
            worker: Mutex::new(Some(worker)),
        })
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("Background timer service is gone, command dropped");
        }
    }
}

impl TimeoutHandler for BackgroundTimer {
    fn set_timeout(&self, callback: TimeoutCallback, delay: Duration) -> TimerHandle {
        let handle = self.seq.next();
        self.send(Command::Schedule {
            handle,
            deadline: Instant::now() + delay,
            callback,
        });
        handle
    }

    fn clear_timeout(&self, handle: TimerHandle) {
        self.send(Command::Cancel(handle));
    }
}

impl Drop for BackgroundTimer {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);

        if let Some(worker) = lock(&self.worker).take() {
            // The last owner can be dropped from inside a callback on the worker itself.
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                warn!("Background timer thread panicked");
            }
        }
    }
}

/// Service loop: fire everything due, then wait for the next command or deadline.
fn run_timer_service(rx: Receiver<Command>) {
    let mut queue: BTreeMap<(Instant, TimerHandle), TimeoutCallback> = BTreeMap::new();
    let mut deadlines: HashMap<TimerHandle, Instant> = HashMap::new();

    loop {
        let now = Instant::now();
        while let Some(entry) = queue.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let ((_, handle), callback) = entry.remove_entry();
            deadlines.remove(&handle);
            debug!("Background timeout {} fired", handle.id());
            callback();
        }

        let next_deadline = queue.keys().next().map(|(deadline, _)| *deadline);
        let command = match next_deadline {
            Some(deadline) => {
                match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(command) => command,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(command) => command,
                Err(_) => break,
            },
        };

        match command {
            Command::Schedule {
                handle,
                deadline,
                callback,
            } => {
                deadlines.insert(handle, deadline);
                queue.insert((deadline, handle), callback);
            }
            Command::Cancel(handle) => {
                if let Some(deadline) = deadlines.remove(&handle) {
                    queue.remove(&(deadline, handle));
                    debug!("Background timeout {} cleared", handle.id());
                }
            }
            Command::Shutdown => break,
        }
    }

    debug!("Background timer thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_deadline_order() {
        let timer = BackgroundTimer::new().unwrap();
        let (tx, rx) = mpsc::channel();

        let late = tx.clone();
        timer.set_timeout(Box::new(move || late.send("late").unwrap()), Duration::from_millis(80));
        timer.set_timeout(Box::new(move || tx.send("early").unwrap()), Duration::from_millis(20));

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), "early");
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), "late");
    }

    #[test]
    fn cleared_timeout_never_fires() {
        let timer = BackgroundTimer::new().unwrap();
        let (tx, rx) = mpsc::channel::<()>();

        let handle = timer.set_timeout(Box::new(move || tx.send(()).unwrap()), Duration::from_millis(50));
        timer.clear_timeout(handle);
        timer.clear_timeout(handle);

        assert!(rx.recv_timeout(Duration::from_millis(250)).is_err());
    }

    #[test]
    fn drop_stops_pending_timeouts() {
        let timer = BackgroundTimer::new().unwrap();
        let (tx, rx) = mpsc::channel::<()>();

        timer.set_timeout(Box::new(move || tx.send(()).unwrap()), Duration::from_millis(50));
        drop(timer);

        assert!(rx.recv_timeout(Duration::from_millis(250)).is_err());
    }
}
