pub mod check;
pub mod completions;
pub mod list;
pub mod run;

use std::path::Path;

use logster_config::{ConfigError, LogsterConfig};
use logster_core::LogsterError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] LogsterError),

    #[error("{0}")]
    Usage(String),

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Helper: built-in parsers overlaid with the user's config.
pub fn load_config(path: Option<&Path>) -> Result<LogsterConfig, CliError> {
    Ok(logster_config::resolve(path)?)
}
