use std::fmt;

use serde_json::Value;

use crate::name::{Classification, SchemaName};
use crate::registry::{SchemaDocument, SchemaRegistry};

/// Why a payload passed the gate without a blocking check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advisory {
    /// Neither topic nor payload shape identified a schema.
    SchemaIndeterminate,
    /// The schema was resolved but is not loaded in the registry.
    SchemaNotLoaded(SchemaName),
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::SchemaIndeterminate => f.write_str("could not determine schema type"),
            Advisory::SchemaNotLoaded(name) => {
                write!(f, "no schema loaded for {name}, skipping validation")
            }
        }
    }
}

/// Location of the offending node inside a payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstancePath(Vec<String>);

impl InstancePath {
    /// Parse a JSON pointer such as `/metadata/asset/id`.
    pub fn from_pointer(pointer: &str) -> Self {
        Self(
            pointer
                .split('/')
                .skip(1)
                .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for InstancePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("root");
        }
        f.write_str(&self.0.join("."))
    }
}

/// First schema violation found in a payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub schema: SchemaName,
    pub message: String,
    pub path: InstancePath,
    /// Value of the violated keyword in the schema, when it can be resolved.
    pub expected: Option<Value>,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} validation failed at {}: {}",
            self.schema, self.path, self.message
        )?;
        if let Some(expected) = &self.expected {
            write!(f, " (expected {expected})")?;
        }
        Ok(())
    }
}

/// Verdict of the validation gate.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Accepted,
    /// Soft pass, the payload may be published but the caller must report it.
    Advisory(Advisory),
    Rejected(Rejection),
}

impl ValidationOutcome {
    pub fn permits_publish(&self) -> bool {
        !matches!(self, ValidationOutcome::Rejected(_))
    }

    pub fn advisory(&self) -> Option<Advisory> {
        match self {
            ValidationOutcome::Advisory(advisory) => Some(*advisory),
            _ => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            ValidationOutcome::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }
}

/// Validate `payload` against the schema its classification resolved to.
///
/// Blocks only when the classification is resolved and the schema is loaded.
pub fn validate(
    payload: &Value,
    classification: Classification,
    registry: &SchemaRegistry,
) -> ValidationOutcome {
    let Some(name) = classification.schema() else {
        return ValidationOutcome::Advisory(Advisory::SchemaIndeterminate);
    };
    let Some(document) = registry.lookup(name) else {
        return ValidationOutcome::Advisory(Advisory::SchemaNotLoaded(name));
    };

    match first_violation(document, payload) {
        Some(rejection) => ValidationOutcome::Rejected(rejection),
        None => ValidationOutcome::Accepted,
    }
}

pub(crate) fn first_violation(document: &SchemaDocument, payload: &Value) -> Option<Rejection> {
    let error = document.validator().iter_errors(payload).next()?;

    let schema_pointer = error.schema_path().to_string();
    let instance_pointer = error.instance_path().to_string();

    Some(Rejection {
        schema: document.name(),
        message: error.to_string(),
        path: InstancePath::from_pointer(&instance_pointer),
        expected: document.raw().pointer(&schema_pointer).cloned(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const MEASUREMENT_SCHEMA: &str = r#"{
        "type": "object",
        "required": ["timestamp", "type", "value", "unit"],
        "properties": {
            "timestamp": { "type": "string" },
            "type": {
                "type": "object",
                "required": ["id", "name"],
                "properties": {
                    "id": { "type": "integer" },
                    "name": { "type": "string" }
                }
            },
            "value": { "type": "number" },
            "unit": { "type": "string", "minLength": 1 }
        }
    }"#;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::from_embedded(&[(SchemaName::Measurement, MEASUREMENT_SCHEMA)]).unwrap()
    }

    fn measurement() -> Value {
        json!({
            "timestamp": "2024-05-01T10:00:00Z",
            "type": { "id": 1, "name": "Bearing Temperature" },
            "value": 72.4,
            "unit": "°C"
        })
    }

    #[test]
    fn complete_payload_is_accepted() {
        let outcome = validate(
            &measurement(),
            Classification::Resolved(SchemaName::Measurement),
            &registry(),
        );
        assert_eq!(outcome, ValidationOutcome::Accepted);
        assert!(outcome.permits_publish());
    }

    #[test]
    fn removing_any_required_field_is_rejected() {
        let registry = registry();
        for field in ["timestamp", "type", "value", "unit"] {
            let mut payload = measurement();
            payload.as_object_mut().unwrap().remove(field);

            let outcome = validate(
                &payload,
                Classification::Resolved(SchemaName::Measurement),
                &registry,
            );
            let rejection = outcome.rejection().expect("missing field must reject");
            assert!(rejection.path.is_root(), "path for {field}: {}", rejection.path);
            assert!(rejection.message.contains(field), "{}", rejection.message);
            assert_eq!(
                rejection.expected,
                Some(json!(["timestamp", "type", "value", "unit"]))
            );
            assert!(!outcome.permits_publish());
        }
    }

    #[test]
    fn nested_violation_reports_segment_path_and_constraint() {
        let mut payload = measurement();
        payload["type"]["id"] = json!("one");

        let outcome = validate(
            &payload,
            Classification::Resolved(SchemaName::Measurement),
            &registry(),
        );
        let rejection = outcome.rejection().unwrap();
        assert_eq!(rejection.path.segments(), ["type", "id"]);
        assert_eq!(rejection.path.to_string(), "type.id");
        assert_eq!(rejection.expected, Some(json!("integer")));
        assert_eq!(rejection.schema, SchemaName::Measurement);
    }

    #[test]
    fn unknown_classification_is_advisory() {
        let outcome = validate(&json!({"anything": 1}), Classification::Unknown, &registry());
        assert_eq!(outcome.advisory(), Some(Advisory::SchemaIndeterminate));
        assert!(outcome.permits_publish());
    }

    #[test]
    fn unloaded_schema_is_advisory() {
        let outcome = validate(
            &json!({"value": "not checked"}),
            Classification::Resolved(SchemaName::Kpi),
            &registry(),
        );
        assert_eq!(
            outcome.advisory(),
            Some(Advisory::SchemaNotLoaded(SchemaName::Kpi))
        );
        assert!(outcome.permits_publish());
    }

    #[test]
    fn instance_path_unescapes_pointer_segments() {
        let path = InstancePath::from_pointer("/a~1b/c~0d/0");
        assert_eq!(path.segments(), ["a/b", "c~d", "0"]);
        assert_eq!(InstancePath::from_pointer("").to_string(), "root");
    }

    #[test]
    fn rejection_display_includes_expected_constraint() {
        let rejection = Rejection {
            schema: SchemaName::Count,
            message: "-1 is less than the minimum of 0".to_string(),
            path: InstancePath::from_pointer("/value"),
            expected: Some(json!(0)),
        };
        assert_eq!(
            rejection.to_string(),
            "count validation failed at value: -1 is less than the minimum of 0 (expected 0)"
        );
    }
}
