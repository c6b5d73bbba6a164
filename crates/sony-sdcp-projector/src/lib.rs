//! Sony SDCP projector integration
//!
//! Exposes a networked Sony projector as a remote entity:
//!
//! - [`commands`]: the closed command catalog and what each command does
//! - [`remote`]: the remote entity and its platform setup
//! - [`config_flow`]: the host-collecting config flow
//! - [`integration`]: entry setup and unload, service routing
//!
//! The SDCP protocol itself is behind the [`ProjectorClient`] trait; the
//! embedding application supplies a [`ClientFactory`].
//!
//! ```ignore
//! let projector = Arc::new(SonySdcpProjector::new(factory).with_device_registry(devices));
//! projector.register(&entries, &flows);
//!
//! let flow = flows.start_flow("sony_sdcp_projector").await?;
//! flows.progress_flow(&flow.flow_id, Some(json!({"host": "10.0.0.5"}))).await?;
//! ```

pub mod client;
pub mod commands;
pub mod config_flow;
pub mod constants;
pub mod error;
pub mod executor;
pub mod integration;
pub mod options;
pub mod remote;
pub mod runtime;
pub mod services;

pub use client::{ClientError, ClientFactory, ClientResult, ProjectorClient};
pub use commands::{
    AspectRatio, Command, CommandAction, PicturePosition, ScreenSetting, UnknownCommand,
};
pub use config_flow::{entry_title, is_host_valid, SdcpConfigFlow};
pub use constants::{CONF_HOST, DOMAIN};
pub use error::{CallError, RemoteError, RemoteResult, SetupError};
pub use executor::{Executor, ExecutorError};
pub use integration::SonySdcpProjector;
pub use options::{OptionsError, SdcpOptions};
pub use remote::{RemoteState, SonySdcpRemote};
pub use runtime::EntryContext;
pub use services::RemoteServiceCall;
