//! Configuration surface of an [`InactivityTracker`](super::InactivityTracker).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::config::TrackerConfig;
use crate::keyboard::KeyboardEvents;
use crate::timer::{ForegroundTimer, TimeoutHandler};

/// Receives `true` when the user becomes active again and `false` when the
/// inactivity duration elapses.
pub type ActionCallback = Arc<dyn Fn(bool) + Send + Sync>;

pub const DEFAULT_TIME_FOR_INACTIVITY: Duration = Duration::from_millis(10_000);

/// Appearance of the wrapping container. Has no effect on tracking.
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub flex: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub background_color: Option<String>,
}

impl Style {
    /// Grow to fill the parent.
    pub fn fill_parent() -> Self {
        Self {
            flex: Some(1.0),
            width: None,
            height: None,
            background_color: None,
        }
    }
}

impl Default for Style {
    fn default() -> Self {
        Self::fill_parent()
    }
}

/// Tracker props, supplied at mount and replaced through `update`.
#[derive(Clone)]
pub struct Props {
    /// Inactivity duration; zero falls back to [`DEFAULT_TIME_FOR_INACTIVITY`].
    pub time_for_inactivity: Duration,
    pub on_action: ActionCallback,
    /// Initial activity flag. Switching it to `Some(true)` later forces a reset.
    pub is_active: Option<bool>,
    pub is_enabled: bool,
    pub ignore_gestures: bool,
    pub skip_keyboard: bool,
    pub timeout_handler: Arc<dyn TimeoutHandler>,
    pub keyboard: Option<Arc<dyn KeyboardEvents>>,
    pub style: Style,
}

impl Props {
    pub fn new(on_action: impl Fn(bool) + Send + Sync + 'static) -> Self {
        Self {
            time_for_inactivity: DEFAULT_TIME_FOR_INACTIVITY,
            on_action: Arc::new(on_action),
            is_active: None,
            is_enabled: true,
            ignore_gestures: false,
            skip_keyboard: false,
            timeout_handler: Arc::new(ForegroundTimer::new()),
            keyboard: None,
            style: Style::default(),
        }
    }

    /// Props seeded from the `[tracker]` config section.
    pub fn from_config(
        config: &TrackerConfig,
        on_action: impl Fn(bool) + Send + Sync + 'static,
    ) -> Self {
        let mut props = Self::new(on_action)
            .time_for_inactivity(config.time_for_inactivity())
            .enabled(config.enabled)
            .ignore_gestures(config.ignore_gestures)
            .skip_keyboard(config.skip_keyboard);
        props.is_active = config.initial_active;
        props
    }

    pub fn time_for_inactivity(mut self, duration: Duration) -> Self {
        self.time_for_inactivity = duration;
        self
    }

    pub fn is_active(mut self, active: bool) -> Self {
        self.is_active = Some(active);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.is_enabled = enabled;
        self
    }

    pub fn ignore_gestures(mut self, ignore: bool) -> Self {
        self.ignore_gestures = ignore;
        self
    }

    pub fn skip_keyboard(mut self, skip: bool) -> Self {
        self.skip_keyboard = skip;
        self
    }

    pub fn timeout_handler(mut self, handler: Arc<dyn TimeoutHandler>) -> Self {
        self.timeout_handler = handler;
        self
    }

    pub fn keyboard(mut self, source: Arc<dyn KeyboardEvents>) -> Self {
        self.keyboard = Some(source);
        self
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn on_action(mut self, on_action: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.on_action = Arc::new(on_action);
        self
    }

    pub(crate) fn effective_time(&self) -> Duration {
        if self.time_for_inactivity.is_zero() {
            DEFAULT_TIME_FOR_INACTIVITY
        } else {
            self.time_for_inactivity
        }
    }

    /// Warns when the duration becomes zero, not on every update that keeps it zero.
    pub(crate) fn warn_on_zero_duration(&self, previous: Option<&Props>) {
        let was_zero = previous.is_some_and(|p| p.time_for_inactivity.is_zero());
        if self.time_for_inactivity.is_zero() && !was_zero {
            warn!(
                "time_for_inactivity is zero, using default of {:?}",
                DEFAULT_TIME_FOR_INACTIVITY
            );
        }
    }

    pub(crate) fn same_timeout_handler(&self, other: &Props) -> bool {
        Arc::ptr_eq(&self.timeout_handler, &other.timeout_handler)
    }

    pub(crate) fn same_keyboard(&self, other: &Props) -> bool {
        match (&self.keyboard, &other.keyboard) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Props")
            .field("time_for_inactivity", &self.time_for_inactivity)
            .field("is_active", &self.is_active)
            .field("is_enabled", &self.is_enabled)
            .field("ignore_gestures", &self.ignore_gestures)
            .field("skip_keyboard", &self.skip_keyboard)
            .field("keyboard", &self.keyboard.is_some())
            .field("style", &self.style)
            .finish_non_exhaustive()
    }
}
