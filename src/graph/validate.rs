//! Best-effort schema-fit validation between producers and consumers.
//!
//! When a consumer declares an `input_schema` and one of its dependencies
//! declares an `output_schema`, every required consumer field must be
//! supplied by the producer with a compatible declared type. Mismatches
//! are warnings unless strict mode is requested.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::spec::NodeConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub code: String,
    pub message: String,
    /// Producer side of the edge, when the diagnostic concerns one.
    pub source_id: Option<String>,
    /// Consumer node the diagnostic is anchored to.
    pub node_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Error)
    }
}

/// Check producer/consumer schema compatibility across every dependency
/// edge. In strict mode mismatches are errors and fail the report.
pub fn validate_schemas(nodes: &[NodeConfig], strict: bool) -> ValidationReport {
    let mut diagnostics = Vec::new();
    let level = if strict {
        DiagnosticLevel::Error
    } else {
        DiagnosticLevel::Warning
    };

    for consumer in nodes {
        let Some(input_schema) = consumer.input_schema() else {
            continue;
        };
        for dep in consumer.dependencies() {
            let Some(producer) = nodes.iter().find(|n| n.id() == dep) else {
                continue;
            };
            let Some(output_schema) = producer.output_schema() else {
                continue;
            };
            for mismatch in schema_mismatches(output_schema, input_schema) {
                diagnostics.push(Diagnostic {
                    level,
                    code: "SchemaMismatch".into(),
                    message: mismatch,
                    source_id: Some(producer.id().to_string()),
                    node_id: Some(consumer.id().to_string()),
                });
            }
        }
    }

    let is_valid = !diagnostics
        .iter()
        .any(|d| d.level == DiagnosticLevel::Error);
    ValidationReport {
        is_valid,
        diagnostics,
    }
}

fn schema_mismatches(producer: &Value, consumer: &Value) -> Vec<String> {
    let mut out = Vec::new();

    let required: Vec<&str> = consumer
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let consumer_props = consumer.get("properties").and_then(Value::as_object);
    let producer_props = producer.get("properties").and_then(Value::as_object);

    for field in required {
        let supplied = producer_props.and_then(|p| p.get(field));
        let Some(supplied) = supplied else {
            out.push(format!("required field '{}' is not produced", field));
            continue;
        };
        let expected_ty = consumer_props
            .and_then(|p| p.get(field))
            .and_then(|s| s.get("type"))
            .and_then(Value::as_str);
        let supplied_ty = supplied.get("type").and_then(Value::as_str);
        if let (Some(expected), Some(supplied)) = (expected_ty, supplied_ty) {
            if !types_compatible(supplied, expected) {
                out.push(format!(
                    "field '{}' has type '{}', expected '{}'",
                    field, supplied, expected
                ));
            }
        }
    }

    out
}

fn types_compatible(supplied: &str, expected: &str) -> bool {
    supplied == expected || (supplied == "integer" && expected == "number")
}
