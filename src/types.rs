//! Common types used throughout entity-pager
//!
//! Shared type aliases and small enums used by more than one module.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

// ============================================================================
// Field Values
// ============================================================================

/// Render a field value the way it appears on the right-hand side of a
/// `<field><op><value>` filter expression.
pub fn value_literal(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// Compare two field values the way the Entity Store orders them:
/// numerically when both sides read as numbers, lexically otherwise.
pub fn compare_values(a: &JsonValue, b: &JsonValue) -> Ordering {
    let (left, right) = (value_literal(a), value_literal(b));
    compare_literals(&left, &right)
}

/// Compare two filter literals, numerically when both parse as numbers.
pub fn compare_literals(left: &str, right: &str) -> Ordering {
    match (left.trim().parse::<f64>(), right.trim().parse::<f64>()) {
        (Ok(l), Ok(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
        _ => left.cmp(right),
    }
}
