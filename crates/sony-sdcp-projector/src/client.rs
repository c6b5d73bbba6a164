//! Projector client seam
//!
//! The SDCP wire protocol lives outside this crate. The integration talks to a
//! projector through [`ProjectorClient`], whose calls block on network I/O and
//! are therefore always run through the [`Executor`](crate::executor::Executor).

use std::io;
use std::sync::Arc;
use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

/// Errors reported by a projector client
#[derive(Debug, Error)]
pub enum ClientError {
    /// The projector refused the TCP connection (usually powered down hard)
    #[error("connection refused by {host}")]
    ConnectionRefused { host: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The projector answered with something the client could not use
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    pub fn is_connection_refused(&self) -> bool {
        match self {
            ClientError::ConnectionRefused { .. } => true,
            ClientError::Io(e) => e.kind() == io::ErrorKind::ConnectionRefused,
            ClientError::Protocol(_) => false,
        }
    }
}

/// Blocking control surface of a single projector.
///
/// Every setter returns `Ok(true)` when the projector acknowledged the
/// change and `Ok(false)` when it answered but did not apply it.
pub trait ProjectorClient: Send + Sync {
    fn get_power(&self) -> ClientResult<bool>;

    fn set_power(&self, on: bool) -> ClientResult<bool>;

    fn set_hdmi_input(&self, input: u8) -> ClientResult<bool>;

    fn set_screen(&self, category: &str, mode: &str) -> ClientResult<bool>;
}

/// Builds one client per configured host
pub trait ClientFactory: Send + Sync {
    fn create(&self, host: &str) -> ClientResult<Arc<dyn ProjectorClient>>;
}

impl<F> ClientFactory for F
where
    F: Fn(&str) -> ClientResult<Arc<dyn ProjectorClient>> + Send + Sync,
{
    fn create(&self, host: &str) -> ClientResult<Arc<dyn ProjectorClient>> {
        self(host)
    }
}
