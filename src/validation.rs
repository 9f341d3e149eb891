//! Validation of JSON configuration against a [`Schema`].
//!
//! This runs in `ValidateResourceConfig`, before any call reaches the
//! SumoLogic API, so invalid filter types or missing collector ids surface as
//! diagnostics pointing at the offending attribute.
//!
//! # Example
//!
//! ```
//! use hemmer_provider_sumologic::schema::{Attribute, Schema};
//! use hemmer_provider_sumologic::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute("collector_id", Attribute::required_int64());
//!
//! assert!(validate(&schema, &json!({"name": "syslog", "collector_id": 12})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "syslog", "collector_id": "12"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("collector_id".to_string()));
//! ```

use crate::schema::{Attribute, AttributeType, Block, Diagnostic, NestedBlock, Schema};
use serde_json::Value;

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics for any validation errors found; an empty
/// list means the value is valid.
///
/// - Required attributes must be present and non-null
/// - Computed-only attributes are skipped (the provider sets these)
/// - Attribute types must match the schema
/// - Strings with allowed values must be one of them
/// - Attributes unknown to the schema are rejected
/// - Nested list blocks are validated item by item against their limits
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Validate a JSON value against a schema, returning the diagnostics as an error.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            let diagnostic =
                Diagnostic::error("Expected object").with_detail(format!("Got {}", value_type_name(value)));
            diagnostics.push(if path.is_empty() {
                diagnostic
            } else {
                diagnostic.with_attribute(path)
            });
            return;
        },
    };

    for (name, attr) in &block.attributes {
        validate_attribute(attr, obj.get(name), &join_path(path, name), diagnostics);
    }

    for (name, nested) in &block.blocks {
        validate_nested_block(nested, obj.get(name), &join_path(path, name), diagnostics);
    }

    let mut unknown: Vec<_> = obj
        .keys()
        .filter(|key| !block.attributes.contains_key(*key) && !block.blocks.contains_key(*key))
        .collect();
    unknown.sort();
    for key in unknown {
        let attr_path = join_path(path, key);
        diagnostics.push(
            Diagnostic::error(format!("Unsupported attribute '{}'", attr_path))
                .with_detail("This attribute is not defined by the schema")
                .with_attribute(attr_path),
        );
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            if validate_attribute_type(&attr.attr_type, v, path, diagnostics) {
                validate_allowed_values(attr, v, path, diagnostics);
            }
        },
    }
}

/// Returns false when a type error was recorded.
fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> bool {
    let ok = match attr_type {
        AttributeType::String => value.is_string(),
        AttributeType::Int64 => is_int64(value),
        AttributeType::Bool => value.is_boolean(),
        AttributeType::List(element_type) => match value.as_array() {
            Some(arr) => {
                let mut all_ok = true;
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    all_ok &= validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
                return all_ok;
            },
            None => false,
        },
    };

    if !ok {
        diagnostics.push(type_error(path, type_name(attr_type), value));
    }
    ok
}

fn validate_allowed_values(
    attr: &Attribute,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.allowed_values.is_empty() {
        return;
    }
    if let Some(s) = value.as_str() {
        if !attr.allowed_values.iter().any(|allowed| allowed == s) {
            diagnostics.push(
                Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                    .with_detail(format!(
                        "Expected one of [{}], got \"{}\"",
                        attr.allowed_values.join(", "),
                        s
                    ))
                    .with_attribute(path),
            );
        }
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s)",
                        path, nested.min_items
                    ))
                    .with_attribute(path),
                );
            }
        },
        Some(Value::Array(arr)) => {
            let len = arr.len() as u32;

            if len < nested.min_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s), got {}",
                        path, nested.min_items, len
                    ))
                    .with_attribute(path),
                );
            }

            // max_items of 0 means unlimited
            if nested.max_items > 0 && len > nested.max_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' allows at most {} item(s), got {}",
                        path, nested.max_items, len
                    ))
                    .with_attribute(path),
                );
            }

            for (i, item) in arr.iter().enumerate() {
                validate_block(&nested.block, item, &format!("{}.{}", path, i), diagnostics);
            }
        },
        Some(v) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
        },
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_name(attr_type: &AttributeType) -> &'static str {
    match attr_type {
        AttributeType::String => "string",
        AttributeType::Int64 => "int64",
        AttributeType::Bool => "bool",
        AttributeType::List(_) => "list",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => n.as_i64().is_some(),
        Value::Number(n) => n
            .as_f64()
            .map(|f| f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64)
            .unwrap_or(false),
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, value_type_name(got)))
        .with_attribute(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeFlags, Block, NestedBlock};
    use serde_json::json;

    fn filters_schema() -> Schema {
        Schema::v0().with_block(
            "filters",
            NestedBlock::list(
                Block::new()
                    .with_attribute("name", Attribute::required_string())
                    .with_attribute(
                        "filter_type",
                        Attribute::required_string()
                            .with_allowed_values(["Exclude", "Include", "Hash", "Mask", "Forward"]),
                    )
                    .with_attribute("regexp", Attribute::required_string())
                    .with_attribute("mask", Attribute::optional_string()),
            ),
        )
    }

    #[test]
    fn test_validate_required_string() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(validate(&schema, &json!({"name": "syslog"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("name".to_string()));

        assert_eq!(validate(&schema, &json!({"name": null})).len(), 1);

        let diagnostics = validate(&schema, &json!({"name": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validate_optional_attribute() {
        let schema = Schema::v0().with_attribute("cutoff_timestamp", Attribute::optional_int64());

        assert!(validate(&schema, &json!({"cutoff_timestamp": 1_500_000_000})).is_empty());
        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"cutoff_timestamp": null})).is_empty());
        assert_eq!(validate(&schema, &json!({"cutoff_timestamp": "soon"})).len(), 1);
    }

    #[test]
    fn test_validate_computed_attribute_skipped() {
        let schema = Schema::v0().with_attribute("token", Attribute::computed_string());

        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"token": 123})).is_empty());
    }

    #[test]
    fn test_validate_int64() {
        let schema = Schema::v0().with_attribute("collector_id", Attribute::required_int64());

        assert!(validate(&schema, &json!({"collector_id": 42})).is_empty());
        assert!(validate(&schema, &json!({"collector_id": 42.0})).is_empty());
        assert_eq!(validate(&schema, &json!({"collector_id": 42.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"collector_id": "42"})).len(), 1);
    }

    #[test]
    fn test_validate_list_attribute() {
        let schema = Schema::v0().with_attribute(
            "tags",
            Attribute::new(
                AttributeType::list(AttributeType::String),
                AttributeFlags::optional(),
            ),
        );

        assert!(validate(&schema, &json!({"tags": ["a", "b"]})).is_empty());

        let diagnostics = validate(&schema, &json!({"tags": ["a", 1]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("tags.1".to_string()));
    }

    #[test]
    fn test_validate_filter_type_allowed_values() {
        let schema = filters_schema();

        let ok = json!({"filters": [
            {"name": "drop debug", "filter_type": "Exclude", "regexp": ".*DEBUG.*"},
            {"name": "hide card", "filter_type": "Mask", "regexp": "(\\d{16})", "mask": "XXXX"}
        ]});
        assert!(validate(&schema, &ok).is_empty());

        let bad = json!({"filters": [
            {"name": "drop debug", "filter_type": "Exclude", "regexp": ".*DEBUG.*"},
            {"name": "oops", "filter_type": "Drop", "regexp": ".*"}
        ]});
        let diagnostics = validate(&schema, &bad);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("filters.1.filter_type".to_string())
        );
        assert!(diagnostics[0]
            .detail
            .as_deref()
            .unwrap_or_default()
            .contains("Exclude, Include, Hash, Mask, Forward"));
    }

    #[test]
    fn test_allowed_values_are_case_sensitive() {
        let bad = json!({"filters": [{"name": "f", "filter_type": "exclude", "regexp": ".*"}]});
        assert_eq!(validate(&filters_schema(), &bad).len(), 1);
    }

    #[test]
    fn test_validate_nested_block_errors() {
        let schema = filters_schema();

        let diagnostics = validate(&schema, &json!({"filters": [{"filter_type": "Hash"}]}));
        let mut attrs: Vec<_> = diagnostics
            .iter()
            .filter_map(|d| d.attribute.clone())
            .collect();
        attrs.sort();
        assert_eq!(attrs, vec!["filters.0.name", "filters.0.regexp"]);

        let diagnostics = validate(&schema, &json!({"filters": "Exclude"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected list"));
    }

    #[test]
    fn test_validate_max_items() {
        let schema = Schema::v0().with_block(
            "default_date_formats",
            NestedBlock::list(Block::new().with_attribute("format", Attribute::required_string()))
                .with_max_items(1),
        );

        let diagnostics = validate(
            &schema,
            &json!({"default_date_formats": [{"format": "a"}, {"format": "b"}]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at most 1"));
    }

    #[test]
    fn test_validate_unknown_attribute() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        let diagnostics = validate(&schema, &json!({"name": "syslog", "nmae": "typo"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("nmae".to_string()));
    }

    #[test]
    fn test_validate_result_helper() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(validate_result(&schema, &json!({"name": "syslog"})).is_ok());
        assert_eq!(validate_result(&schema, &json!({})).unwrap_err().len(), 1);
    }

    #[test]
    fn test_validate_root_not_object() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        let diagnostics = validate(&schema, &json!("not an object"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected object"));
    }
}
