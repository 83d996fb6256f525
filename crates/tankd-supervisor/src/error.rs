use std::path::PathBuf;

use tankd_control::ParamsError;

/// Errors from the params persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("params file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("params file {path} is invalid: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Invalid(#[from] ParamsError),
}

/// Errors from instance lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// `start` while a child is already running.
    #[error("control loop is already running")]
    AlreadyRunning,

    /// `stop` while no child is running.
    #[error("control loop is not running")]
    NotRunning,

    #[error(transparent)]
    Params(#[from] ParamsError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to spawn control loop child: {0}")]
    Spawn(std::io::Error),
}
