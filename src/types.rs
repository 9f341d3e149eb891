//! Plan, import and metadata types exchanged with the host.
//!
//! These are the ergonomic counterparts of the protobuf messages in
//! [`crate::generated`]; the server converts between the two.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A change to a single top-level attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// Name of the attribute that changed.
    pub path: String,
    /// The value before the change, `None` when the attribute is new.
    pub before: Option<Value>,
    /// The value after the change, `None` when the attribute goes away.
    pub after: Option<Value>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// A change that sets a previously absent attribute.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// A change that drops an attribute.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// A change from one value to another.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

fn encode_optional(value: Option<Value>) -> Vec<u8> {
    value
        .and_then(|v| serde_json::to_vec(&v).ok())
        .unwrap_or_default()
}

impl From<AttributeChange> for crate::generated::AttributeChange {
    fn from(change: AttributeChange) -> Self {
        Self {
            path: change.path,
            before: encode_optional(change.before),
            after: encode_optional(change.after),
        }
    }
}

/// Compare two state objects attribute by attribute.
///
/// `null` and missing are the same thing. Attributes named in `ignore` are
/// skipped. Changes come out sorted by attribute name.
pub fn diff_states(before: &Value, after: &Value, ignore: &[&str]) -> Vec<AttributeChange> {
    let empty = serde_json::Map::new();
    let before = before.as_object().unwrap_or(&empty);
    let after = after.as_object().unwrap_or(&empty);

    let mut names: Vec<&String> = before.keys().chain(after.keys()).collect();
    names.sort();
    names.dedup();

    names
        .into_iter()
        .filter(|name| !ignore.contains(&name.as_str()))
        .filter_map(|name| {
            let old = before.get(name).filter(|v| !v.is_null());
            let new = after.get(name).filter(|v| !v.is_null());
            match (old, new) {
                (None, None) => None,
                (Some(a), Some(b)) if a == b => None,
                (None, Some(b)) => Some(AttributeChange::added(name.clone(), b.clone())),
                (Some(a), None) => Some(AttributeChange::removed(name.clone(), a.clone())),
                (Some(a), Some(b)) => {
                    Some(AttributeChange::modified(name.clone(), a.clone(), b.clone()))
                },
            }
        })
        .collect()
}

/// The result of a plan operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The state the resource will have once the plan is applied.
    pub planned_state: Value,
    /// Attributes that differ from the prior state.
    pub changes: Vec<AttributeChange>,
    /// Whether applying the plan destroys and recreates the resource.
    pub requires_replace: bool,
}

impl PlanResult {
    /// A plan that leaves the resource as it is.
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// A plan with changes.
    pub fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Whether applying the plan does anything.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty() || self.requires_replace
    }
}

/// A resource brought under management by `ImportResourceState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// Identity-only state; the host reads the rest.
    pub state: Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Provider metadata returned by GetMetadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource type names served by the provider.
    pub resources: Vec<String>,
    /// Server capabilities.
    pub capabilities: ServerCapabilities,
}

/// Server capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// Whether the provider supports planning destroy operations.
    pub plan_destroy: bool,
}

/// The protocol version for the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// The handshake prefix output by providers.
pub const HANDSHAKE_PREFIX: &str = "HEMMER_PROVIDER";

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_change_constructors() {
        let added = AttributeChange::added("name", json!("syslog"));
        assert!(added.before.is_none());
        assert_eq!(added.after, Some(json!("syslog")));

        let removed = AttributeChange::removed("name", json!("old"));
        assert_eq!(removed.before, Some(json!("old")));
        assert!(removed.after.is_none());

        let modified = AttributeChange::modified("collector_id", json!(1), json!(2));
        assert_eq!(modified.before, Some(json!(1)));
        assert_eq!(modified.after, Some(json!(2)));
    }

    #[test]
    fn test_attribute_change_to_proto() {
        let proto: crate::generated::AttributeChange =
            AttributeChange::added("description", json!("firewall")).into();
        assert_eq!(proto.path, "description");
        assert!(proto.before.is_empty());
        assert_eq!(proto.after, b"\"firewall\"".to_vec());
    }

    #[test]
    fn test_diff_states() {
        let before = json!({"name": "a", "category": "x", "token": "t", "description": null});
        let after = json!({"name": "b", "host_name": "h", "token": "u", "description": null});

        let changes = diff_states(&before, &after, &["token"]);
        assert_eq!(
            changes,
            vec![
                AttributeChange::removed("category", json!("x")),
                AttributeChange::added("host_name", json!("h")),
                AttributeChange::modified("name", json!("a"), json!("b")),
            ]
        );
    }

    #[test]
    fn test_diff_states_from_nothing() {
        let changes = diff_states(&Value::Null, &json!({"name": "a", "id": null}), &[]);
        assert_eq!(changes, vec![AttributeChange::added("name", json!("a"))]);
    }

    #[test]
    fn test_plan_result() {
        let no_change = PlanResult::no_change(json!({"id": "123"}));
        assert!(!no_change.has_changes());

        let replace = PlanResult::with_changes(
            json!({"id": "123", "name": "new"}),
            vec![AttributeChange::modified("name", json!("old"), json!("new"))],
            true,
        );
        assert!(replace.has_changes());
        assert_eq!(replace.changes.len(), 1);
    }

    #[test]
    fn test_protocol_constants() {
        assert_eq!(PROTOCOL_VERSION, 1);
        assert_eq!(HANDSHAKE_PREFIX, "HEMMER_PROVIDER");
    }
}
