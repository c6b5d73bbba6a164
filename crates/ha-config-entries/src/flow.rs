//! Config Flows
//!
//! A config flow is a small wizard that collects user input step by step and
//! ends in either a new [`ConfigEntry`] or an abort. Integrations implement
//! [`ConfigFlow`]; the [`FlowManager`] tracks flows in progress, persists
//! created entries and sets them up.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::entry::ConfigEntry;
use crate::manager::{ConfigEntries, ConfigEntriesError};

/// Abort reason used when the unique id is already configured
pub const ABORT_ALREADY_CONFIGURED: &str = "already_configured";

/// Flow errors
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("No config flow registered for {0}")]
    UnknownHandler(String),

    #[error("Flow not found: {0}")]
    UnknownFlow(String),

    #[error("Unknown step: {0}")]
    UnknownStep(String),

    #[error(transparent)]
    Entries(#[from] ConfigEntriesError),
}

pub type FlowResultOrError = Result<FlowResult, FlowError>;

/// Form field schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub required: bool,
}

impl FormField {
    pub fn required_string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: "string".to_string(),
            required: true,
        }
    }
}

/// Result of running a single flow step
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowResult {
    /// Show (or re-show) a form
    Form {
        step_id: String,
        data_schema: Vec<FormField>,
        errors: HashMap<String, String>,
    },
    /// Finish by creating a config entry
    CreateEntry {
        title: String,
        data: HashMap<String, serde_json::Value>,
    },
    /// Finish without creating anything
    Abort { reason: String },
}

impl FlowResult {
    pub fn form(step_id: impl Into<String>, data_schema: Vec<FormField>) -> Self {
        FlowResult::Form {
            step_id: step_id.into(),
            data_schema,
            errors: HashMap::new(),
        }
    }

    pub fn abort(reason: impl Into<String>) -> Self {
        FlowResult::Abort {
            reason: reason.into(),
        }
    }

    /// Whether the flow is finished after this result
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FlowResult::Form { .. })
    }
}

/// Per-flow context handed to every step
pub struct FlowContext {
    domain: String,
    unique_id: Option<String>,
    entries: Arc<ConfigEntries>,
}

impl FlowContext {
    pub fn new(domain: impl Into<String>, entries: Arc<ConfigEntries>) -> Self {
        Self {
            domain: domain.into(),
            unique_id: None,
            entries,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn unique_id(&self) -> Option<&str> {
        self.unique_id.as_deref()
    }

    /// Set the unique id the created entry will carry
    pub fn set_unique_id(&mut self, unique_id: impl Into<String>) {
        self.unique_id = Some(unique_id.into());
    }

    /// Abort result if an entry of this domain already has the unique id
    pub fn abort_if_unique_id_configured(&self) -> Option<FlowResult> {
        let unique_id = self.unique_id.as_deref()?;
        self.entries
            .get_by_unique_id(&self.domain, unique_id)
            .map(|_| FlowResult::abort(ABORT_ALREADY_CONFIGURED))
    }
}

/// An integration's config flow
#[async_trait]
pub trait ConfigFlow: Send + Sync {
    /// Schema version stamped on created entries
    fn version(&self) -> u32 {
        1
    }

    /// Run one step. `user_input` is None when the step is first shown.
    async fn step(
        &mut self,
        step_id: &str,
        user_input: Option<serde_json::Value>,
        ctx: &mut FlowContext,
    ) -> FlowResultOrError;
}

/// Builds a fresh flow instance for a domain
pub type FlowFactory = Arc<dyn Fn() -> Box<dyn ConfigFlow> + Send + Sync>;

/// Response returned to flow callers
#[derive(Debug, Clone, Serialize)]
pub struct FlowResponse {
    pub flow_id: String,
    pub handler: String,
    #[serde(flatten)]
    pub result: FlowResult,
    /// The created entry (for create_entry)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<ConfigEntry>,
}

struct ActiveFlow {
    handler: String,
    flow: Box<dyn ConfigFlow>,
    context: FlowContext,
    current_step: String,
}

/// Manages configuration flows in progress
pub struct FlowManager {
    entries: Arc<ConfigEntries>,
    factories: DashMap<String, FlowFactory>,
    flows: RwLock<HashMap<String, ActiveFlow>>,
}

impl FlowManager {
    pub fn new(entries: Arc<ConfigEntries>) -> Self {
        Self {
            entries,
            factories: DashMap::new(),
            flows: RwLock::new(HashMap::new()),
        }
    }

    /// Register the flow factory for a domain
    pub fn register(&self, domain: &str, factory: FlowFactory) {
        self.factories.insert(domain.to_string(), factory);
        debug!("Registered config flow for domain: {}", domain);
    }

    /// Start a new flow at its `user` step
    pub async fn start_flow(&self, handler: &str) -> Result<FlowResponse, FlowError> {
        let factory = self
            .factories
            .get(handler)
            .map(|f| Arc::clone(f.value()))
            .ok_or_else(|| FlowError::UnknownHandler(handler.to_string()))?;

        let active = ActiveFlow {
            handler: handler.to_string(),
            flow: factory(),
            context: FlowContext::new(handler, Arc::clone(&self.entries)),
            current_step: "user".to_string(),
        };
        let flow_id = Ulid::new().to_string();

        info!("Starting config flow {} for {}", flow_id, handler);
        self.run_step(flow_id, active, None).await
    }

    /// Continue a flow with user input for its current step
    pub async fn progress_flow(
        &self,
        flow_id: &str,
        user_input: Option<serde_json::Value>,
    ) -> Result<FlowResponse, FlowError> {
        // Taken out of the map so no lock is held while the step runs
        let active = self
            .flows
            .write()
            .await
            .remove(flow_id)
            .ok_or_else(|| FlowError::UnknownFlow(flow_id.to_string()))?;

        debug!(
            "Progressing flow {} for {} at step {}",
            flow_id, active.handler, active.current_step
        );
        self.run_step(flow_id.to_string(), active, user_input).await
    }

    /// Drop a flow in progress
    pub async fn abort_flow(&self, flow_id: &str) -> Result<(), FlowError> {
        self.flows
            .write()
            .await
            .remove(flow_id)
            .map(|_| ())
            .ok_or_else(|| FlowError::UnknownFlow(flow_id.to_string()))
    }

    /// Flows currently waiting for input
    pub async fn list_flows(&self) -> Vec<serde_json::Value> {
        let flows = self.flows.read().await;
        flows
            .iter()
            .map(|(flow_id, flow)| {
                serde_json::json!({
                    "flow_id": flow_id,
                    "handler": flow.handler,
                    "step_id": flow.current_step,
                    "context": {
                        "source": "user",
                        "unique_id": flow.context.unique_id(),
                    }
                })
            })
            .collect()
    }

    async fn run_step(
        &self,
        flow_id: String,
        mut active: ActiveFlow,
        user_input: Option<serde_json::Value>,
    ) -> Result<FlowResponse, FlowError> {
        let step_id = active.current_step.clone();
        let result = active
            .flow
            .step(&step_id, user_input, &mut active.context)
            .await?;

        let mut entry = None;
        let result = match result {
            FlowResult::Form { step_id, data_schema, errors } => {
                active.current_step = step_id.clone();
                let form = FlowResult::Form {
                    step_id,
                    data_schema,
                    errors,
                };
                let handler = active.handler.clone();
                self.flows.write().await.insert(flow_id.clone(), active);
                return Ok(FlowResponse {
                    flow_id,
                    handler,
                    result: form,
                    entry: None,
                });
            }
            FlowResult::CreateEntry { title, data } => {
                match self.create_entry(&active, &title, data.clone()).await {
                    Ok(created) => {
                        entry = Some(created);
                        FlowResult::CreateEntry { title, data }
                    }
                    Err(ConfigEntriesError::AlreadyExists { .. }) => {
                        FlowResult::abort(ABORT_ALREADY_CONFIGURED)
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            abort @ FlowResult::Abort { .. } => abort,
        };

        info!("Flow {} finished: {:?}", flow_id, result);
        Ok(FlowResponse {
            flow_id,
            handler: active.handler,
            result,
            entry,
        })
    }

    async fn create_entry(
        &self,
        active: &ActiveFlow,
        title: &str,
        data: HashMap<String, serde_json::Value>,
    ) -> Result<ConfigEntry, ConfigEntriesError> {
        let mut entry = ConfigEntry::new(&active.handler, title)
            .with_data(data)
            .with_version(active.flow.version(), 1);
        if let Some(unique_id) = active.context.unique_id() {
            entry = entry.with_unique_id(unique_id);
        }

        let entry = self.entries.add(entry).await?;

        // A failed setup leaves the entry in SetupError; the flow still succeeded
        if let Err(e) = self.entries.setup(&entry.entry_id).await {
            warn!("Setup of new entry {} failed: {}", entry.entry_id, e);
        }

        Ok(self.entries.get(&entry.entry_id).unwrap_or(entry))
    }
}
