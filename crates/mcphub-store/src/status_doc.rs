//! On-disk shape of the running-status document.
//!
//! Current format:
//! ```json
//! { "version": 1, "servers": { "fs": true, "git": false } }
//! ```
//!
//! Two legacy shapes are still read and migrated on initialization:
//! a bare `{ "<id>": bool }` map and an array of running ids.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use mcphub_core::StatusMap;

/// Version written by this release.
pub const STATUS_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDocument {
    pub version: u32,
    #[serde(default)]
    pub servers: StatusMap,
}

impl StatusDocument {
    pub const fn new(servers: StatusMap) -> Self {
        Self {
            version: STATUS_VERSION,
            servers,
        }
    }
}

impl Default for StatusDocument {
    fn default() -> Self {
        Self::new(StatusMap::new())
    }
}

/// A decoded status document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedStatus {
    pub servers: StatusMap,
    /// The document was in a legacy shape and should be rewritten.
    pub legacy: bool,
}

/// Decode any supported status shape.
///
/// Returns the reason on failure; the caller attaches the path.
pub fn decode(value: Value) -> Result<DecodedStatus, String> {
    if value
        .as_object()
        .is_some_and(|fields| fields.contains_key("version"))
    {
        let doc: StatusDocument = serde_json::from_value(value).map_err(|e| e.to_string())?;
        if doc.version > STATUS_VERSION {
            return Err(format!(
                "unsupported status document version {}",
                doc.version
            ));
        }
        return Ok(DecodedStatus {
            servers: doc.servers,
            legacy: false,
        });
    }

    match value {
        Value::Object(fields) => {
            let mut servers = StatusMap::new();
            for (id, running) in fields {
                let Value::Bool(running) = running else {
                    return Err(format!("status for '{id}' is not a boolean"));
                };
                servers.insert(id, running);
            }
            Ok(DecodedStatus {
                servers,
                legacy: true,
            })
        }
        Value::Array(items) => {
            let mut servers = StatusMap::new();
            for item in items {
                let Value::String(id) = item else {
                    return Err("running id list must contain only strings".to_string());
                };
                servers.insert(id, true);
            }
            Ok(DecodedStatus {
                servers,
                legacy: true,
            })
        }
        other => Err(format!("unexpected status document: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_current_shape() {
        let decoded = decode(json!({ "version": 1, "servers": { "a": true, "b": false } })).unwrap();
        assert!(!decoded.legacy);
        assert_eq!(decoded.servers.get("a"), Some(&true));
        assert_eq!(decoded.servers.get("b"), Some(&false));
    }

    #[test]
    fn test_legacy_map() {
        let decoded = decode(json!({ "a": true })).unwrap();
        assert!(decoded.legacy);
        assert_eq!(decoded.servers.get("a"), Some(&true));
    }

    #[test]
    fn test_legacy_id_list() {
        let decoded = decode(json!(["a", "b"])).unwrap();
        assert!(decoded.legacy);
        assert_eq!(decoded.servers.len(), 2);
        assert!(decoded.servers.values().all(|running| *running));
    }

    #[test]
    fn test_rejects_non_boolean_status() {
        assert!(decode(json!({ "a": "yes" })).is_err());
        assert!(decode(json!({ "version": 1, "servers": { "a": 1 } })).is_err());
        assert!(decode(json!(42)).is_err());
    }

    #[test]
    fn test_rejects_future_version() {
        assert!(decode(json!({ "version": 2, "servers": {} })).is_err());
    }
}
