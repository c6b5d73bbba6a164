//! Remote services
//!
//! Service data arrives as loose JSON; it is parsed into a
//! [`RemoteServiceCall`] up front so that nothing reaches the projector
//! unless the whole call is valid.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::commands::Command;
use crate::constants::DEFAULT_NUM_REPEATS;
use crate::error::{RemoteError, RemoteResult};
use crate::remote::SonySdcpRemote;

pub const SERVICE_TURN_ON: &str = "turn_on";
pub const SERVICE_TURN_OFF: &str = "turn_off";
pub const SERVICE_SEND_COMMAND: &str = "send_command";
pub const SERVICE_UPDATE: &str = "update";

pub const ATTR_COMMAND: &str = "command";
pub const ATTR_NUM_REPEATS: &str = "num_repeats";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for Vec<String> {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(command) => vec![command],
            OneOrMany::Many(commands) => commands,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendCommandData {
    command: OneOrMany,
    #[serde(default = "default_num_repeats")]
    num_repeats: i64,
}

fn default_num_repeats() -> i64 {
    i64::from(DEFAULT_NUM_REPEATS)
}

/// A validated call against a remote entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteServiceCall {
    TurnOn,
    TurnOff,
    Update,
    SendCommand {
        commands: Vec<Command>,
        num_repeats: u32,
    },
}

impl RemoteServiceCall {
    pub fn parse(service: &str, data: &Value) -> RemoteResult<Self> {
        match service {
            SERVICE_TURN_ON => Ok(RemoteServiceCall::TurnOn),
            SERVICE_TURN_OFF => Ok(RemoteServiceCall::TurnOff),
            SERVICE_UPDATE => Ok(RemoteServiceCall::Update),
            SERVICE_SEND_COMMAND => {
                let data: SendCommandData = serde_json::from_value(data.clone())
                    .map_err(|e| RemoteError::InvalidServiceData(e.to_string()))?;

                let num_repeats = u32::try_from(data.num_repeats)
                    .ok()
                    .filter(|n| *n >= 1)
                    .ok_or(RemoteError::InvalidRepeats(data.num_repeats))?;
                let commands = Command::parse_all(Vec::<String>::from(data.command))?;

                Ok(RemoteServiceCall::SendCommand {
                    commands,
                    num_repeats,
                })
            }
            other => Err(RemoteError::UnknownService(other.to_string())),
        }
    }

    pub fn service(&self) -> &'static str {
        match self {
            RemoteServiceCall::TurnOn => SERVICE_TURN_ON,
            RemoteServiceCall::TurnOff => SERVICE_TURN_OFF,
            RemoteServiceCall::Update => SERVICE_UPDATE,
            RemoteServiceCall::SendCommand { .. } => SERVICE_SEND_COMMAND,
        }
    }

    /// Run the call against an entity
    pub async fn dispatch(self, remote: &mut SonySdcpRemote) -> RemoteResult<()> {
        debug!("Calling remote.{} on {}", self.service(), remote.entity_id());
        match self {
            RemoteServiceCall::TurnOn => remote.turn_on().await,
            RemoteServiceCall::TurnOff => remote.turn_off().await,
            RemoteServiceCall::Update => remote.update().await,
            RemoteServiceCall::SendCommand {
                commands,
                num_repeats,
            } => return remote.send_commands(&commands, num_repeats).await,
        }
        Ok(())
    }
}
