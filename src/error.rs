//! Error type for the fallible edges of the crate (configuration, timer backends).

use std::path::PathBuf;

/// Errors raised while loading configuration or building a timer backend.
///
/// The tracker itself never fails; these only surface from setup code.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read config file {path:?}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file")]
    ParseConfig(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("foreground timer requires a running tokio runtime")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    #[error("failed to spawn background timer thread")]
    SpawnTimer(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
