//! Remote platform
//!
//! One [`SonySdcpRemote`] entity per configured projector. The entity caches
//! power and availability, refreshes them on demand, and plays catalog
//! commands against the projector client.

use ha_registries::{DeviceIdentifier, DeviceInfo, DeviceRegistry};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::client::{ClientResult, ProjectorClient};
use crate::commands::{Command, CommandAction};
use crate::constants::{DEFAULT_NAME, DOMAIN, MANUFACTURER, MODEL, PLATFORM};
use crate::error::{CallError, RemoteError, RemoteResult, SetupError};
use crate::executor::Executor;
use crate::runtime::EntryContext;

pub const STATE_ON: &str = "on";
pub const STATE_OFF: &str = "off";
pub const STATE_UNKNOWN: &str = "unknown";
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// Serializable view of the entity, shaped like a state-machine entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteState {
    pub entity_id: String,
    pub state: String,
    pub attributes: HashMap<String, Value>,
}

/// Remote entity controlling one projector
pub struct SonySdcpRemote {
    client: Arc<dyn ProjectorClient>,
    executor: Executor,
    settle_delay: Duration,
    unique_id: String,
    entity_id: String,
    name: String,
    device_info: DeviceInfo,
    power: Option<bool>,
    available: bool,
}

impl SonySdcpRemote {
    pub fn new(
        client: Arc<dyn ProjectorClient>,
        executor: Executor,
        unique_id: impl Into<String>,
        settle_delay: Duration,
    ) -> Self {
        let unique_id = unique_id.into();
        let device_info = DeviceInfo::new(DeviceIdentifier::new(DOMAIN, &unique_id))
            .with_name(DEFAULT_NAME)
            .with_manufacturer(MANUFACTURER)
            .with_model(MODEL);

        Self {
            client,
            executor,
            settle_delay,
            entity_id: entity_id_for(&unique_id),
            unique_id,
            name: DEFAULT_NAME.to_string(),
            device_info,
            power: None,
            available: false,
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    /// Cached power; None until the first successful query or power change
    pub fn is_on(&self) -> Option<bool> {
        self.power
    }

    pub fn available(&self) -> bool {
        self.available
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    pub fn state(&self) -> &'static str {
        if !self.available {
            return STATE_UNAVAILABLE;
        }
        match self.power {
            Some(true) => STATE_ON,
            Some(false) => STATE_OFF,
            None => STATE_UNKNOWN,
        }
    }

    pub fn snapshot(&self) -> RemoteState {
        let mut attributes = HashMap::new();
        attributes.insert("friendly_name".to_string(), json!(self.name));
        attributes.insert("supported_commands".to_string(), json!(Command::names()));

        RemoteState {
            entity_id: self.entity_id.clone(),
            state: self.state().to_string(),
            attributes,
        }
    }

    /// Refresh power and availability from the projector.
    ///
    /// Failures only mark the entity unavailable; the cached power is kept.
    pub async fn update(&mut self) {
        tokio::time::sleep(self.settle_delay).await;

        debug!("Querying power state of {}", self.unique_id);
        match self.call(|client| client.get_power()).await {
            Ok(on) => {
                self.power = Some(on);
                self.available = true;
            }
            Err(CallError::Client(e)) if e.is_connection_refused() => {
                error!("Projector {} refused the connection: {}", self.unique_id, e);
                self.available = false;
            }
            Err(e) => {
                error!("Failed to query projector {}: {}", self.unique_id, e);
                self.available = false;
            }
        }
    }

    pub async fn turn_on(&mut self) {
        self.set_power(true).await;
    }

    pub async fn turn_off(&mut self) {
        self.set_power(false).await;
    }

    async fn set_power(&mut self, on: bool) {
        let target = if on { STATE_ON } else { STATE_OFF };
        debug!("Turning projector {} {}", self.unique_id, target);

        match self.call(move |client| client.set_power(on)).await {
            Ok(true) => self.power = Some(on),
            Ok(false) => error!(
                "Projector {} did not acknowledge power {}",
                self.unique_id, target
            ),
            Err(e) => error!(
                "Failed to turn projector {} {}: {}",
                self.unique_id, target, e
            ),
        }
    }

    /// Send catalog commands by name.
    ///
    /// All names are checked before anything is sent.
    pub async fn send_command<S: AsRef<str>>(
        &mut self,
        commands: &[S],
        num_repeats: u32,
    ) -> RemoteResult<()> {
        let commands = Command::parse_all(commands)?;
        self.send_commands(&commands, num_repeats).await
    }

    /// Play `commands` in order, `num_repeats` times over.
    ///
    /// Individual failures are logged and do not stop the sequence.
    pub async fn send_commands(
        &mut self,
        commands: &[Command],
        num_repeats: u32,
    ) -> RemoteResult<()> {
        if num_repeats == 0 {
            return Err(RemoteError::InvalidRepeats(0));
        }

        debug!(
            "Sending {} command(s) x{} to projector {}",
            commands.len(),
            num_repeats,
            self.unique_id
        );
        for _ in 0..num_repeats {
            for command in commands {
                self.execute(*command).await;
            }
        }
        Ok(())
    }

    async fn execute(&mut self, command: Command) {
        debug!("Executing {} on projector {}", command, self.unique_id);

        let result = match command.action() {
            CommandAction::TurnOn => return self.turn_on().await,
            CommandAction::TurnOff => return self.turn_off().await,
            CommandAction::HdmiInput(input) => {
                self.call(move |client| client.set_hdmi_input(input)).await
            }
            CommandAction::Screen(setting) => {
                self.call(move |client| client.set_screen(setting.category(), setting.mode()))
                    .await
            }
        };

        match result {
            Ok(true) => debug!("Command {} accepted by {}", command, self.unique_id),
            Ok(false) => error!("Command {} was rejected by {}", command, self.unique_id),
            Err(e) => error!("Command {} failed on {}: {}", command, self.unique_id, e),
        }
    }

    /// Run one client call on the executor
    async fn call<T, F>(&self, job: F) -> Result<T, CallError>
    where
        F: FnOnce(&dyn ProjectorClient) -> ClientResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let client = Arc::clone(&self.client);
        Ok(self.executor.run(move || job(client.as_ref())).await??)
    }
}

/// `remote.sony_sdcp_projector_<slug of unique id>`
pub fn entity_id_for(unique_id: &str) -> String {
    let mut slug = String::with_capacity(unique_id.len());
    for c in unique_id.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_matches('_');

    if slug.is_empty() {
        format!("{}.{}", PLATFORM, DOMAIN)
    } else {
        format!("{}.{}_{}", PLATFORM, DOMAIN, slug)
    }
}

/// Create the entity for an entry, refresh it once, and attach its device.
pub async fn setup_entry(
    ctx: &EntryContext,
    devices: Option<&DeviceRegistry>,
) -> Result<SonySdcpRemote, SetupError> {
    if ctx.unique_id.is_empty() {
        return Err(SetupError::MissingUniqueId);
    }

    let mut remote = SonySdcpRemote::new(
        Arc::clone(&ctx.client),
        ctx.executor.clone(),
        &ctx.unique_id,
        ctx.options.settle_delay(),
    );

    remote.update().await;

    if let Some(devices) = devices {
        let device = devices.get_or_create(&ctx.entry_id, remote.device_info());
        if let Err(e) = devices.save().await {
            devices.remove_config_entry(&ctx.entry_id);
            return Err(e.into());
        }
        debug!("Linked {} to device {}", remote.entity_id(), device.id);
    }

    info!(
        "Added {} for {} ({})",
        remote.entity_id(),
        ctx.host,
        remote.state()
    );
    Ok(remote)
}

/// Tear down the entity for an entry.
///
/// The executor is closed, so later calls on a leftover handle to the entity
/// fail without reaching the projector.
pub fn unload_entry(ctx: &EntryContext, remote: &SonySdcpRemote) {
    ctx.executor.close();
    debug!("Removed {} for entry {}", remote.entity_id(), ctx.entry_id);
}
