//! Config flow
//!
//! A single `user` step asking for the projector host. The host doubles as
//! the entry's unique id, so each projector can be added once.

use async_trait::async_trait;
use ha_config_entries::{
    ConfigFlow, FlowContext, FlowError, FlowResult, FlowResultOrError, FormField,
};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::OnceLock;
use tracing::debug;

use crate::constants::{CONF_HOST, MODEL};

pub const STEP_USER: &str = "user";
pub const ERROR_INVALID_HOST: &str = "invalid_host";

const MAX_HOST_LEN: usize = 255;

static LABEL_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

fn label_pattern() -> Option<&'static Regex> {
    LABEL_PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").ok())
        .as_ref()
}

/// Whether `host` is an IP address or a well-formed hostname.
pub fn is_host_valid(host: &str) -> bool {
    if host.parse::<IpAddr>().is_ok() {
        return true;
    }
    if host.len() > MAX_HOST_LEN {
        return false;
    }
    // Looks like a malformed address rather than a name
    if host.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return false;
    }

    let host = host.strip_suffix('.').unwrap_or(host);
    let Some(label) = label_pattern() else {
        return false;
    };
    host.split('.').all(|part| label.is_match(part))
}

/// Title given to entries created by the flow
pub fn entry_title(host: &str) -> String {
    format!("{} ({})", MODEL, host)
}

fn user_schema() -> Vec<FormField> {
    vec![FormField::required_string(CONF_HOST)]
}

#[derive(Debug, Default)]
pub struct SdcpConfigFlow;

impl SdcpConfigFlow {
    pub fn new() -> Self {
        Self
    }

    async fn step_user(
        &mut self,
        user_input: Option<Value>,
        ctx: &mut FlowContext,
    ) -> FlowResultOrError {
        let Some(input) = user_input else {
            return Ok(FlowResult::form(STEP_USER, user_schema()));
        };

        let host = input.get(CONF_HOST).and_then(Value::as_str);
        let Some(host) = host.filter(|host| is_host_valid(host)) else {
            debug!("Rejected projector host {:?}", input.get(CONF_HOST));
            let mut errors = HashMap::new();
            errors.insert(CONF_HOST.to_string(), ERROR_INVALID_HOST.to_string());
            return Ok(FlowResult::Form {
                step_id: STEP_USER.to_string(),
                data_schema: user_schema(),
                errors,
            });
        };

        ctx.set_unique_id(host);
        if let Some(abort) = ctx.abort_if_unique_id_configured() {
            return Ok(abort);
        }

        let mut data = HashMap::new();
        data.insert(CONF_HOST.to_string(), Value::String(host.to_string()));
        Ok(FlowResult::CreateEntry {
            title: entry_title(host),
            data,
        })
    }
}

#[async_trait]
impl ConfigFlow for SdcpConfigFlow {
    async fn step(
        &mut self,
        step_id: &str,
        user_input: Option<Value>,
        ctx: &mut FlowContext,
    ) -> FlowResultOrError {
        match step_id {
            STEP_USER => self.step_user(user_input, ctx).await,
            other => Err(FlowError::UnknownStep(other.to_string())),
        }
    }
}
