//! Input contracts checked before a tool is executed.
//!
//! Contracts are expressed in a subset of JSON Schema: `type`, `properties`,
//! `required`, `additionalProperties` (a boolean or a schema), `enum` and
//! `items`, nested to any depth. Unknown schema keywords are ignored. Violations carry the JSON
//! pointer of the offending value so callers can report them precisely.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ToolError, ToolResult};

/// JSON value kinds understood by [`Schema::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    /// JSON object.
    Object,
    /// JSON array.
    Array,
    /// JSON string.
    String,
    /// Any JSON number.
    Number,
    /// A number without a fractional part.
    Integer,
    /// `true` or `false`.
    Boolean,
    /// `null`.
    Null,
}

impl SchemaType {
    fn admits(self, value: &Value) -> bool {
        match self {
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|n| n.fract() == 0.0)
            }
            Self::Boolean => value.is_boolean(),
            Self::Null => value.is_null(),
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Null => "null",
        };
        f.write_str(name)
    }
}

/// One node of an input schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schema {
    /// Required JSON kind, if constrained.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<SchemaType>,
    /// Schemas for named object properties.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Schema>,
    /// Properties that must be present.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// Rule for properties not listed in [`Schema::properties`].
    #[serde(
        rename = "additionalProperties",
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_properties: Option<AdditionalProperties>,
    /// Closed set of accepted values.
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
    /// Schema applied to every array element.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    /// Free-form description, ignored by validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Value of `additionalProperties`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    /// `true` admits unlisted properties, `false` rejects them.
    Allowed(bool),
    /// Unlisted properties must satisfy this schema.
    Schema(Box<Schema>),
}

impl Schema {
    fn check(&self, value: &Value, path: &str, violations: &mut Vec<Violation>) {
        if let Some(kind) = self.kind {
            if !kind.admits(value) {
                violations.push(Violation::new(
                    path,
                    format!("expected {kind}, found {}", kind_of(value)),
                ));
                return;
            }
        }

        if let Some(allowed) = &self.allowed {
            if !allowed.contains(value) {
                violations.push(Violation::new(path, "value is not one of the allowed options"));
            }
        }

        if let Value::Object(map) = value {
            for name in &self.required {
                if !map.contains_key(name) {
                    violations.push(Violation::new(
                        &pointer(path, name),
                        "required property is missing",
                    ));
                }
            }
            for (name, child) in map {
                let child_path = pointer(path, name);
                match (self.properties.get(name), &self.additional_properties) {
                    (Some(schema), _) => schema.check(child, &child_path, violations),
                    (None, Some(AdditionalProperties::Schema(schema))) => {
                        schema.check(child, &child_path, violations);
                    }
                    (None, Some(AdditionalProperties::Allowed(false))) => {
                        violations.push(Violation::new(&child_path, "unexpected property"));
                    }
                    (None, _) => {}
                }
            }
        }

        if let (Value::Array(elements), Some(items)) = (value, &self.items) {
            for (index, element) in elements.iter().enumerate() {
                items.check(element, &pointer(path, &index.to_string()), violations);
            }
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn pointer(base: &str, segment: &str) -> String {
    let escaped = segment.replace('~', "~0").replace('/', "~1");
    format!("{base}/{escaped}")
}

/// A single argument violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// JSON pointer to the offending value; empty for the root.
    pub path: String,
    /// What was wrong with it.
    pub message: String,
}

impl Violation {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_owned(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Declared shape of the arguments a tool accepts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputContract {
    schema: Schema,
}

impl InputContract {
    /// Contract that accepts any arguments.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Wraps an already constructed schema.
    #[must_use]
    pub const fn new(schema: Schema) -> Self {
        Self { schema }
    }

    /// Parses a contract from a JSON Schema document.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidContract`] when the document does not fit
    /// the supported schema subset.
    pub fn from_json_schema(schema: &Value) -> ToolResult<Self> {
        Schema::deserialize(schema)
            .map(Self::new)
            .map_err(|err| ToolError::InvalidContract {
                reason: err.to_string(),
            })
    }

    /// Returns the root schema.
    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns `true` when the contract places no constraint on arguments.
    #[must_use]
    pub fn is_permissive(&self) -> bool {
        self.schema == Schema::default()
    }

    /// Validates `args`, returning every violation found.
    ///
    /// # Errors
    ///
    /// Returns the list of violations when `args` does not satisfy the
    /// contract.
    pub fn validate(&self, args: &Value) -> Result<(), Vec<Violation>> {
        let mut violations = Vec::new();
        self.schema.check(args, "", &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn calc_contract() -> InputContract {
        InputContract::from_json_schema(&json!({
            "type": "object",
            "properties": {
                "expression": { "type": "string" },
                "precision": { "type": "integer" },
                "mode": { "enum": ["exact", "approx"] }
            },
            "required": ["expression"],
            "additionalProperties": false
        }))
        .unwrap()
    }

    #[test]
    fn permissive_contract_accepts_anything() {
        let contract = InputContract::any();
        assert!(contract.is_permissive());
        assert!(contract.validate(&json!(null)).is_ok());
        assert!(contract.validate(&json!({"x": [1, 2]})).is_ok());
    }

    #[test]
    fn accepts_conforming_arguments() {
        let contract = calc_contract();
        assert!(contract
            .validate(&json!({"expression": "2+2", "precision": 3, "mode": "exact"}))
            .is_ok());
    }

    #[test]
    fn reports_every_violation_with_pointer() {
        let violations = calc_contract()
            .validate(&json!({"precision": 1.5, "mode": "guess", "extra": true}))
            .unwrap_err();

        let message = |path: &str| {
            violations
                .iter()
                .find(|v| v.path == path)
                .map(|v| v.message.clone())
                .unwrap_or_default()
        };
        assert_eq!(violations.len(), 4);
        assert!(message("/expression").contains("missing"));
        assert!(message("/extra").contains("unexpected"));
        assert!(message("/mode").contains("allowed"));
        assert!(message("/precision").contains("expected integer"));
    }

    #[test]
    fn wrong_root_type_stops_descent() {
        let violations = calc_contract().validate(&json!(["2+2"])).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].to_string(), "(root): expected object, found array");
    }

    #[test]
    fn checks_array_items_and_escapes_pointer() {
        let contract = InputContract::from_json_schema(&json!({
            "type": "object",
            "properties": {
                "a/b": { "type": "array", "items": { "type": "number" } }
            }
        }))
        .unwrap();

        let violations = contract.validate(&json!({"a/b": [1, "two", 3]})).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "/a~1b/1");
    }

    #[test]
    fn integral_floats_count_as_integers() {
        let contract = InputContract::new(Schema {
            kind: Some(SchemaType::Integer),
            ..Schema::default()
        });
        assert!(contract.validate(&json!(4.0)).is_ok());
        assert!(contract.validate(&json!(4.5)).is_err());
    }

    #[test]
    fn unlisted_properties_follow_additional_schema() {
        let contract = InputContract::from_json_schema(&json!({
            "type": "object",
            "properties": { "name": { "type": "string" } },
            "additionalProperties": { "type": "number" }
        }))
        .unwrap();

        assert!(contract.validate(&json!({"name": "x", "width": 3})).is_ok());
        let violations = contract
            .validate(&json!({"name": "x", "width": "wide"}))
            .unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "/width");
        assert!(violations[0].message.contains("expected number"));
    }

    #[test]
    fn rejects_malformed_additional_properties() {
        let err = InputContract::from_json_schema(&json!({"additionalProperties": "no"}))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidContract { .. }));
    }

    #[test]
    fn rejects_malformed_schema() {
        let err = InputContract::from_json_schema(&json!({"type": "tuple"})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidContract { .. }));
    }
}
