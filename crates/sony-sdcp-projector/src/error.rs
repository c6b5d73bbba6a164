//! Error types for the integration

use thiserror::Error;

use crate::client::ClientError;
use crate::commands::UnknownCommand;
use crate::executor::ExecutorError;
use crate::options::OptionsError;

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors returned to callers of the remote entity and its services
#[derive(Debug, Error)]
pub enum RemoteError {
    /// A command name outside the catalog; nothing was sent
    #[error("invalid command '{0}'")]
    InvalidCommand(String),

    #[error("num_repeats must be at least 1, got {0}")]
    InvalidRepeats(i64),

    #[error("invalid service data: {0}")]
    InvalidServiceData(String),

    #[error("unknown service '{0}'")]
    UnknownService(String),

    #[error("config entry '{0}' is not loaded")]
    EntryNotLoaded(String),
}

impl From<UnknownCommand> for RemoteError {
    fn from(err: UnknownCommand) -> Self {
        RemoteError::InvalidCommand(err.0)
    }
}

/// Errors from setting up a config entry
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("config entry has no valid '{key}'")]
    MissingHost { key: &'static str },

    #[error("config entry has no unique id")]
    MissingUniqueId,

    #[error("config entry '{0}' is already set up")]
    AlreadySetUp(String),

    #[error("invalid options: {0}")]
    Options(#[from] OptionsError),

    #[error("failed to create projector client for {host}: {source}")]
    Client {
        host: String,
        #[source]
        source: ClientError,
    },

    #[error("failed to save device registry: {0}")]
    Storage(#[from] ha_registries::StorageError),
}

/// Failure of one off-loaded projector call
#[derive(Debug, Error)]
pub enum CallError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}
