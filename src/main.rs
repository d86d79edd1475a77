//! user-inactivity demo host
//!
//! Wraps a text panel in an inactivity tracker and drives it from stdin so the
//! active/inactive transitions can be watched in the log. One command per line:
//! `tap`, `move`, `kb show`, `kb hide`, `active`, `enable`, `disable`,
//! `time <ms>`, `status`, `quit`.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use user_inactivity::config::{Config, LogFormat};
use user_inactivity::keyboard::{KeyboardBus, KeyboardEvent};
use user_inactivity::tracker::{ActivityState, GesturePhase, InactivityTracker, Props};

/// Application version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Content hosted inside the tracker.
#[derive(Debug)]
struct Panel {
    text: String,
}

/// Commands read from stdin.
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Gesture(GesturePhase),
    Keyboard(KeyboardEvent),
    ForceActive,
    Enable(bool),
    Time(Duration),
    Status,
    Quit,
}

fn parse_command(line: &str) -> Result<Command> {
    let mut words = line.split_whitespace();
    let command = match (words.next(), words.next()) {
        (None, _) | (Some("tap"), None) => Command::Gesture(GesturePhase::Start),
        (Some("move"), None) => Command::Gesture(GesturePhase::Move),
        (Some("kb"), Some("show")) => Command::Keyboard(KeyboardEvent::DidShow),
        (Some("kb"), Some("hide")) => Command::Keyboard(KeyboardEvent::DidHide),
        (Some("active"), None) => Command::ForceActive,
        (Some("enable"), None) => Command::Enable(true),
        (Some("disable"), None) => Command::Enable(false),
        (Some("time"), Some(ms)) => {
            let ms: u64 = ms.parse().with_context(|| format!("Invalid duration: {ms:?}"))?;
            Command::Time(Duration::from_millis(ms))
        }
        (Some("status"), None) => Command::Status,
        (Some("quit"), None) | (Some("exit"), None) => Command::Quit,
        _ => bail!("Unknown command: {line:?}"),
    };
    Ok(command)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let config_path = std::env::args().nth(1).map(PathBuf::from);

    // Load configuration
    let config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;
    config.validate()?;

    init_tracing(&config.logging.level, config.logging.format)?;

    info!("Starting user-inactivity v{}", VERSION);
    info!(
        "Configuration loaded: timeout={:?}, timer backend={}",
        config.tracker.time_for_inactivity(),
        config.timer.backend
    );

    let timer = config
        .timer
        .backend
        .build()
        .context("Failed to start timer backend")?;
    let keyboard = Arc::new(KeyboardBus::new());

    let mut props = Props::from_config(&config.tracker, |active| {
        info!("onAction({})", active);
    })
    .timeout_handler(timer)
    .keyboard(keyboard.clone());

    let mut tracker = InactivityTracker::mount(
        props.clone(),
        Panel {
            text: "Put your app here".to_string(),
        },
    );
    let mut activity_rx = tracker.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    info!("stdin closed");
                    break;
                };
                let command = match parse_command(&line) {
                    Ok(command) => command,
                    Err(e) => {
                        warn!("{}", e);
                        continue;
                    }
                };
                match command {
                    Command::Gesture(phase) => {
                        tracker.on_gesture(phase);
                    }
                    Command::Keyboard(event) => keyboard.emit(event),
                    Command::ForceActive => {
                        // Toggle through false so the change to true is observed.
                        props = props.is_active(false);
                        tracker.update(props.clone());
                        props = props.is_active(true);
                        tracker.update(props.clone());
                    }
                    Command::Enable(enabled) => {
                        props = props.enabled(enabled);
                        tracker.update(props.clone());
                    }
                    Command::Time(duration) => {
                        props = props.time_for_inactivity(duration);
                        tracker.update(props.clone());
                    }
                    Command::Status => {
                        let view = tracker.view();
                        info!(
                            "{:?} (enabled={}, last activity {}, timer pending={}) hosting {:?} with {:?}",
                            tracker.state(),
                            tracker.is_enabled(),
                            tracker.last_activity(),
                            tracker.has_pending_timer(),
                            view.children.text,
                            view.style
                        );
                    }
                    Command::Quit => break,
                }
            }
            Ok(state) = activity_rx.recv() => {
                match state {
                    ActivityState::Active => info!("User activity resumed"),
                    ActivityState::Inactive { since } => info!("User inactive since {}", since),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received");
                break;
            }
        }
    }

    tracker.unmount();
    info!("Goodbye!");
    Ok(())
}

/// Initialize tracing subscriber with the given log level.
fn init_tracing(level: &str, format: LogFormat) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().json().with_thread_names(true))
            .try_init()?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("").unwrap(), Command::Gesture(GesturePhase::Start));
        assert_eq!(parse_command("move").unwrap(), Command::Gesture(GesturePhase::Move));
        assert_eq!(
            parse_command("kb hide").unwrap(),
            Command::Keyboard(KeyboardEvent::DidHide)
        );
        assert_eq!(
            parse_command("time 2500").unwrap(),
            Command::Time(Duration::from_millis(2500))
        );
        assert_eq!(parse_command("disable").unwrap(), Command::Enable(false));
        assert_eq!(parse_command("exit").unwrap(), Command::Quit);
    }

    #[test]
    fn rejects_unknown_and_malformed() {
        assert!(parse_command("dance").is_err());
        assert!(parse_command("time soon").is_err());
        assert!(parse_command("kb flip").is_err());
    }
}
