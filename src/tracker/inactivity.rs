//! Inactivity tracker: activity state, the rearmable timer, and lifecycle.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use super::gesture::{GestureInterceptor, GesturePhase};
use super::props::{ActionCallback, Props, Style};
use super::ActivityState;
use crate::keyboard::{KeyboardEvent, KeyboardSubscription};
use crate::lock;
use crate::timer::{TimeoutHandler, TimerHandle};

/// What caused a reset, for logging.
#[derive(Clone, Copy)]
pub(crate) enum Activity {
    Gesture(GesturePhase),
    Keyboard(KeyboardEvent),
    Programmatic,
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activity::Gesture(GesturePhase::Start) => f.write_str("gesture start"),
            Activity::Gesture(GesturePhase::Move) => f.write_str("gesture move"),
            Activity::Gesture(GesturePhase::TerminationRequest) => {
                f.write_str("gesture termination request")
            }
            Activity::Keyboard(KeyboardEvent::DidShow) => f.write_str("keyboard shown"),
            Activity::Keyboard(KeyboardEvent::DidHide) => f.write_str("keyboard hidden"),
            Activity::Programmatic => f.write_str("programmatic reset"),
        }
    }
}

struct TrackerState {
    active: bool,
    enabled: bool,
    mounted: bool,
    ignore_gestures: bool,
    time_for_inactivity: Duration,
    last_activity: DateTime<Utc>,
    inactive_since: Option<DateTime<Utc>>,
    /// The one live timer, if any.
    pending: Option<TimerHandle>,
    /// Bumped on every arm; a fire carrying an older value is stale.
    generation: u64,
    timer: Arc<dyn TimeoutHandler>,
    on_action: ActionCallback,
}

impl TrackerState {
    fn cancel_timer(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.timer.clear_timeout(handle);
            trace!("Cancelled inactivity timer {}", handle.id());
        }
    }

    /// Returns true if this was an inactive -> active transition.
    fn mark_active(&mut self) -> bool {
        let was_active = self.active;
        self.active = true;
        self.inactive_since = None;
        self.last_activity = Utc::now();
        !was_active
    }

    fn snapshot(&self) -> ActivityState {
        if self.active {
            ActivityState::Active
        } else {
            ActivityState::Inactive {
                since: self.inactive_since.unwrap_or(self.last_activity),
            }
        }
    }

    fn notification(&self) -> Notification {
        Notification {
            callback: Arc::clone(&self.on_action),
            state: self.snapshot(),
        }
    }
}

/// A callback invocation prepared under the state lock and delivered after it is released.
struct Notification {
    callback: ActionCallback,
    state: ActivityState,
}

/// Notifications waiting for delivery, in the order their transitions happened.
///
/// Only one thread drains at a time; others (including re-entrant callbacks)
/// enqueue and leave the rest to the active drainer.
#[derive(Default)]
struct Outbox {
    queue: VecDeque<Notification>,
    draining: bool,
}

/// Clears the draining flag if a callback panics mid-drain.
struct DrainGuard<'a>(&'a Mutex<Outbox>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            lock(self.0).draining = false;
        }
    }
}

/// State shared with timer callbacks, keyboard listeners and gesture interceptors.
///
/// Lock order: `state` before `outbox`.
pub(crate) struct Shared {
    state: Mutex<TrackerState>,
    outbox: Mutex<Outbox>,
    state_tx: broadcast::Sender<ActivityState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        lock(&self.state)
    }

    pub(crate) fn observe_gesture(self: &Arc<Self>, phase: GesturePhase) {
        if self.lock().ignore_gestures {
            return;
        }
        self.reset_due_to_activity(Activity::Gesture(phase));
    }

    /// Cancel, mark active, re-arm. Ignored while disabled or after unmount.
    pub(crate) fn reset_due_to_activity(self: &Arc<Self>, activity: Activity) {
        {
            let mut state = self.lock();
            if !state.mounted || !state.enabled {
                trace!("Ignoring {} while tracking is suspended", activity);
                return;
            }

            state.cancel_timer();
            let became_active = state.mark_active();
            self.arm(&mut state);

            if became_active {
                debug!("User active again after {}", activity);
                self.post(state.notification());
            } else {
                trace!("Timer reset by {}", activity);
                return;
            }
        }
        self.flush();
    }

    fn handle_timeout(&self, generation: u64) {
        {
            let mut state = self.lock();
            if !state.mounted
                || !state.enabled
                || state.pending.is_none()
                || state.generation != generation
            {
                trace!("Dropping stale inactivity timer (generation {})", generation);
                return;
            }

            state.pending = None;
            if !state.active {
                return;
            }
            state.active = false;
            state.inactive_since = Some(Utc::now());
            debug!(
                "User inactive after {:?} without activity",
                state.time_for_inactivity
            );
            self.post(state.notification());
        }
        self.flush();
    }

    /// Schedules a full-duration timer. Callers cancel the previous one first.
    fn arm(self: &Arc<Self>, state: &mut TrackerState) {
        state.generation = state.generation.wrapping_add(1);
        let generation = state.generation;
        let shared = Arc::downgrade(self);

        let handle = state.timer.set_timeout(
            Box::new(move || {
                if let Some(shared) = shared.upgrade() {
                    shared.handle_timeout(generation);
                }
            }),
            state.time_for_inactivity,
        );
        trace!(
            "Armed inactivity timer {} for {:?}",
            handle.id(),
            state.time_for_inactivity
        );
        state.pending = Some(handle);
    }

    /// Queues a notification. Must be called with the state lock held so the
    /// queue order matches the order of transitions.
    fn post(&self, notification: Notification) {
        lock(&self.outbox).queue.push_back(notification);
    }

    /// Delivers queued notifications in order, with no lock held during callbacks.
    fn flush(&self) {
        {
            let mut outbox = lock(&self.outbox);
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }
        let _guard = DrainGuard(&self.outbox);

        loop {
            let next = {
                let mut outbox = lock(&self.outbox);
                match outbox.queue.pop_front() {
                    Some(notification) => notification,
                    None => {
                        outbox.draining = false;
                        return;
                    }
                }
            };

            let active = next.state.is_active();
            // No receivers is fine.
            let _ = self.state_tx.send(next.state);
            (next.callback)(active);
        }
    }
}

/// Styled container descriptor handed to the host for rendering.
#[derive(Debug)]
pub struct Container<'a, C> {
    pub style: &'a Style,
    /// The container must stay in the host's view tree so it keeps receiving touches.
    pub collapsable: bool,
    pub children: &'a C,
    pub gesture_handler: Option<GestureInterceptor>,
}

/// Wraps child content and reports user activity through `on_action`.
///
/// Mounting arms the inactivity timer; dropping the tracker unmounts it.
pub struct InactivityTracker<C> {
    shared: Arc<Shared>,
    props: Props,
    keyboard: Option<KeyboardSubscription>,
    children: C,
}

impl<C> InactivityTracker<C> {
    /// Mounts the tracker around `children`.
    ///
    /// No notification is sent on mount; the first callback is `false` once
    /// the duration elapses without activity.
    pub fn mount(props: Props, children: C) -> Self {
        props.warn_on_zero_duration(None);
        let time_for_inactivity = props.effective_time();
        let active = props.is_active.unwrap_or(true);
        let now = Utc::now();
        let (state_tx, _) = broadcast::channel(16);

        let shared = Arc::new(Shared {
            state: Mutex::new(TrackerState {
                active,
                enabled: props.is_enabled,
                mounted: true,
                ignore_gestures: props.ignore_gestures,
                time_for_inactivity,
                last_activity: now,
                inactive_since: (!active).then_some(now),
                pending: None,
                generation: 0,
                timer: Arc::clone(&props.timeout_handler),
                on_action: Arc::clone(&props.on_action),
            }),
            outbox: Mutex::new(Outbox::default()),
            state_tx,
        });

        {
            let mut state = shared.lock();
            if state.enabled && state.active {
                shared.arm(&mut state);
            }
        }

        let keyboard = subscribe_keyboard(&shared, &props);

        info!(
            "Inactivity tracker mounted (timeout={:?}, enabled={}, keyboard={}, gestures={})",
            time_for_inactivity,
            props.is_enabled,
            keyboard.is_some(),
            !props.ignore_gestures
        );

        Self {
            shared,
            props,
            keyboard,
            children,
        }
    }

    /// Applies new props, re-arming or suspending the timer as needed.
    pub fn update(&mut self, props: Props) {
        props.warn_on_zero_duration(Some(&self.props));
        let time_for_inactivity = props.effective_time();
        let prev = std::mem::replace(&mut self.props, props);

        {
            let mut state = self.shared.lock();
            if !state.mounted {
                return;
            }

            state.on_action = Arc::clone(&self.props.on_action);
            state.ignore_gestures = self.props.ignore_gestures;

            let timer_swapped = !prev.same_timeout_handler(&self.props);
            if timer_swapped {
                state.cancel_timer();
                state.timer = Arc::clone(&self.props.timeout_handler);
            }

            let time_changed = state.time_for_inactivity != time_for_inactivity;
            state.time_for_inactivity = time_for_inactivity;

            if state.enabled != self.props.is_enabled {
                state.enabled = self.props.is_enabled;
                state.cancel_timer();
                if state.enabled {
                    if state.mark_active() {
                        self.shared.post(state.notification());
                    }
                    self.shared.arm(&mut state);
                    info!("Inactivity tracking enabled");
                } else {
                    info!("Inactivity tracking disabled");
                }
            } else if state.enabled && state.active && (time_changed || timer_swapped) {
                state.cancel_timer();
                self.shared.arm(&mut state);
                debug!("Inactivity timer restarted for {:?}", time_for_inactivity);
            }
        }
        self.shared.flush();

        if prev.skip_keyboard != self.props.skip_keyboard || !prev.same_keyboard(&self.props) {
            // Release before re-subscribing so a source never sees two listeners from us.
            self.keyboard = None;
            self.keyboard = subscribe_keyboard(&self.shared, &self.props);
        }

        if self.props.is_active == Some(true) && prev.is_active != Some(true) {
            self.shared.reset_due_to_activity(Activity::Programmatic);
        }
    }

    /// Signals activity from outside the gesture and keyboard paths.
    pub fn reset(&self) {
        self.shared.reset_due_to_activity(Activity::Programmatic);
    }

    /// Feeds a capture-phase gesture. Always returns `false` so the gesture
    /// is left for the children.
    pub fn on_gesture(&self, phase: GesturePhase) -> bool {
        self.shared.observe_gesture(phase);
        false
    }

    /// The gesture handler to install on the container, or `None` when
    /// gestures are ignored.
    pub fn interceptor(&self) -> Option<GestureInterceptor> {
        if self.props.ignore_gestures {
            return None;
        }
        Some(GestureInterceptor {
            shared: Arc::downgrade(&self.shared),
        })
    }

    /// Cancels the pending timer and releases the keyboard subscription.
    /// Safe to call more than once.
    pub fn unmount(&mut self) {
        {
            let mut state = self.shared.lock();
            if !state.mounted {
                return;
            }
            state.mounted = false;
            state.cancel_timer();
        }
        self.keyboard = None;
        info!("Inactivity tracker unmounted");
    }

    pub fn is_mounted(&self) -> bool {
        self.shared.lock().mounted
    }

    pub fn is_active(&self) -> bool {
        self.shared.lock().active
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.lock().enabled
    }

    /// Current state, with the time the user went inactive.
    pub fn state(&self) -> ActivityState {
        self.shared.lock().snapshot()
    }

    /// Time of the last accepted activity event (or mount).
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.shared.lock().last_activity
    }

    pub fn time_for_inactivity(&self) -> Duration {
        self.shared.lock().time_for_inactivity
    }

    pub fn has_pending_timer(&self) -> bool {
        self.shared.lock().pending.is_some()
    }

    /// Subscribe to active/inactive transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<ActivityState> {
        self.shared.state_tx.subscribe()
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn style(&self) -> &Style {
        &self.props.style
    }

    pub fn children(&self) -> &C {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut C {
        &mut self.children
    }

    /// Render description: the styled, non-collapsable container hosting the
    /// children unmodified.
    pub fn view(&self) -> Container<'_, C> {
        Container {
            style: &self.props.style,
            collapsable: false,
            children: &self.children,
            gesture_handler: self.interceptor(),
        }
    }
}

impl<C> Drop for InactivityTracker<C> {
    fn drop(&mut self) {
        self.unmount();
    }
}

fn subscribe_keyboard(shared: &Arc<Shared>, props: &Props) -> Option<KeyboardSubscription> {
    if props.skip_keyboard {
        return None;
    }
    let source = props.keyboard.as_ref()?;
    let shared = Arc::downgrade(shared);

    Some(source.subscribe(Arc::new(move |event: KeyboardEvent| {
        if let Some(shared) = shared.upgrade() {
            shared.reset_due_to_activity(Activity::Keyboard(event));
        }
    })))
}
