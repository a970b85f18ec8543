//! Configuration document validation.
//!
//! Validation is pure and accumulating: every violated rule is reported,
//! not just the first one. Two entry points exist:
//!
//! - [`validate_config`] checks a typed [`GlobalConfig`]
//! - [`validate_document`] checks a raw JSON document before it is
//!   converted, so type mistakes (e.g. `"debug": "yes"`) are reported as
//!   validation errors instead of deserialization failures

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::{GlobalConfig, Transport};

pub const SERVER_URL_REQUIRED: &str = "Server URL is required";
pub const SERVER_URL_INVALID: &str = "Invalid server URL format";
pub const TRANSPORT_INVALID: &str = "Transport must be either \"stdio\" or \"http\"";
pub const DEBUG_NOT_BOOLEAN: &str = "Debug must be a boolean value";
pub const SERVERS_NOT_OBJECT: &str = "mcpServers must be an object keyed by server id";

/// Outcome of validating a configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// Convert into a `Result`, carrying the full error list on failure.
    pub fn into_result(self) -> Result<(), ConfigValidationError> {
        if self.is_valid {
            Ok(())
        } else {
            Err(ConfigValidationError::new(self.errors))
        }
    }
}

/// A configuration document violated one or more rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid configuration: {}", .errors.join("; "))]
pub struct ConfigValidationError {
    /// Every violated rule, in check order.
    pub errors: Vec<String>,
}

impl ConfigValidationError {
    pub fn new(errors: Vec<String>) -> Self {
        Self { errors }
    }

    /// A single-rule failure.
    pub fn single(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
        }
    }
}

/// Validate a typed configuration document.
pub fn validate_config(config: &GlobalConfig) -> ValidationReport {
    let mut errors = Vec::new();
    check_server_url(Some(config.server_url.as_str()), &mut errors);
    // transport and debug are enforced by the type system here
    ValidationReport::from_errors(errors)
}

/// Validate a raw JSON configuration document.
pub fn validate_document(doc: &Value) -> ValidationReport {
    let Some(root) = doc.as_object() else {
        return ValidationReport::from_errors(vec![
            "Configuration must be a JSON object".to_string(),
        ]);
    };

    let mut errors = Vec::new();

    match root.get("serverUrl") {
        None | Some(Value::Null) => errors.push(SERVER_URL_REQUIRED.to_string()),
        Some(Value::String(url)) => check_server_url(Some(url), &mut errors),
        Some(_) => errors.push(SERVER_URL_INVALID.to_string()),
    }

    match root.get("transport") {
        None | Some(Value::Null) => {}
        Some(Value::String(t)) if t.is_empty() || Transport::ALLOWED.contains(&t.as_str()) => {}
        Some(_) => errors.push(TRANSPORT_INVALID.to_string()),
    }

    if root.get("debug").is_some_and(|d| !d.is_boolean()) {
        errors.push(DEBUG_NOT_BOOLEAN.to_string());
    }

    match root.get("mcpServers") {
        None => {}
        Some(Value::Object(servers)) => {
            for (id, entry) in servers {
                check_server_entry(id, entry, &mut errors);
            }
        }
        Some(_) => errors.push(SERVERS_NOT_OBJECT.to_string()),
    }

    ValidationReport::from_errors(errors)
}

/// Validate a raw document and convert it into a typed [`GlobalConfig`].
///
/// Explicit `null`s and an empty `transport` are accepted by validation and
/// treated as absent here.
pub fn parse_document(doc: &Value) -> Result<GlobalConfig, ConfigValidationError> {
    validate_document(doc).into_result()?;

    let mut normalized = doc.clone();
    if let Some(root) = normalized.as_object_mut() {
        root.retain(|_, v| !v.is_null());
        if root.get("transport").and_then(Value::as_str) == Some("") {
            root.remove("transport");
        }
        if let Some(Value::Object(servers)) = root.get_mut("mcpServers") {
            for entry in servers.values_mut() {
                if let Some(fields) = entry.as_object_mut() {
                    fields.retain(|_, v| !v.is_null());
                }
            }
        }
    }

    serde_json::from_value(normalized).map_err(|e| ConfigValidationError::single(e.to_string()))
}

fn check_server_url(url: Option<&str>, errors: &mut Vec<String>) {
    match url.map(str::trim) {
        None | Some("") => errors.push(SERVER_URL_REQUIRED.to_string()),
        Some(url) => {
            if url::Url::parse(url).is_err() {
                errors.push(SERVER_URL_INVALID.to_string());
            }
        }
    }
}

fn check_server_entry(id: &str, entry: &Value, errors: &mut Vec<String>) {
    let Some(fields) = entry.as_object() else {
        errors.push(format!("Server '{id}' must be an object"));
        return;
    };

    for key in ["name", "command", "cwd"] {
        if !is_optional_string(fields, key) {
            errors.push(format!("Server '{id}': {key} must be a string"));
        }
    }

    if let Some(args) = fields.get("args").filter(|a| !a.is_null()) {
        let all_strings = args
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string));
        if !all_strings {
            errors.push(format!("Server '{id}': args must be an array of strings"));
        }
    }

    if let Some(env) = fields.get("env").filter(|e| !e.is_null()) {
        let all_strings = env
            .as_object()
            .is_some_and(|vars| vars.values().all(Value::is_string));
        if !all_strings {
            errors.push(format!(
                "Server '{id}': env must map variable names to strings"
            ));
        }
    }

    if fields
        .get("autoStart")
        .is_some_and(|a| !a.is_null() && !a.is_boolean())
    {
        errors.push(format!("Server '{id}': autoStart must be a boolean"));
    }
}

fn is_optional_string(fields: &Map<String, Value>, key: &str) -> bool {
    matches!(fields.get(key), None | Some(Value::Null | Value::String(_)))
}
