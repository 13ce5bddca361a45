//! Query descriptors and listing parameters
//!
//! A [`QueryDescriptor`] is the immutable description of a listing request:
//! the resource path plus the [`ListParameters`] understood by the Entity Store
//! (`start`, `limit`, `fields`, `orderby`, `order`, `total`) and any
//! store-specific passthrough options, which are forwarded opaquely.

use crate::error::{Error, Result};
use crate::types::{value_literal, JsonValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Sort direction of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending (smallest first)
    #[default]
    Asc,
    /// Descending (largest first)
    Desc,
}

impl SortOrder {
    /// Check if this is a descending order
    pub fn is_descending(self) -> bool {
        matches!(self, Self::Desc)
    }

    /// Wire representation (`asc` / `desc`)
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Asc),
            "desc" | "descending" => Ok(Self::Desc),
            other => Err(Error::config(format!(
                "Unknown sort order '{other}' (expected asc or desc)"
            ))),
        }
    }
}

/// Parameters of a single listing call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListParameters {
    /// Offset of the first entity to return
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,

    /// Maximum number of entities per page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,

    /// Filter expressions (`<field><op><value>`), ANDed together
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,

    /// Field to order by
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orderby: Option<String>,

    /// Sort direction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<SortOrder>,

    /// Ask the store to compute a total count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<bool>,

    /// Store-specific passthrough options (e.g. a data shape toggle)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, JsonValue>,
}

/// Keys a continuation call may never alter
const STRUCTURAL_KEYS: [&str; 4] = ["start", "fields", "orderby", "order"];

impl ListParameters {
    /// Create empty parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the start offset
    #[must_use]
    pub fn start(mut self, start: i64) -> Self {
        self.start = Some(start);
        self
    }

    /// Set the page size
    #[must_use]
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Add a filter expression
    #[must_use]
    pub fn field(mut self, expression: impl Into<String>) -> Self {
        self.fields
            .get_or_insert_with(Vec::new)
            .push(expression.into());
        self
    }

    /// Set the order field
    #[must_use]
    pub fn orderby(mut self, field: impl Into<String>) -> Self {
        self.orderby = Some(field.into());
        self
    }

    /// Set the sort direction
    #[must_use]
    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = Some(order);
        self
    }

    /// Request a total count
    #[must_use]
    pub fn total(mut self, total: bool) -> Self {
        self.total = Some(total);
        self
    }

    /// Set a passthrough option
    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Build parameters from an untyped JSON mapping.
    ///
    /// Known keys are typed; everything else becomes a passthrough option.
    pub fn from_json(value: &JsonValue) -> Result<Self> {
        let JsonValue::Object(map) = value else {
            return Err(Error::config("Listing parameters must be a JSON object"));
        };

        let mut params = Self::new();
        for (key, value) in map {
            match key.as_str() {
                "start" => params.start = Some(as_integer(key, value)?),
                "limit" => params.limit = Some(as_integer(key, value)?),
                "fields" => {
                    let expressions = match value {
                        JsonValue::Array(items) => items.iter().map(value_literal).collect(),
                        JsonValue::String(s) => vec![s.clone()],
                        _ => return Err(invalid_value(key)),
                    };
                    params.fields = Some(expressions);
                }
                "orderby" => params.orderby = Some(value_literal(value)),
                "order" => params.order = Some(value_literal(value).parse()?),
                "total" => {
                    params.total = Some(match value {
                        JsonValue::Bool(b) => *b,
                        JsonValue::String(s) => s == "true" || s == "1",
                        JsonValue::Number(n) => n.as_i64().is_some_and(|n| n != 0),
                        _ => return Err(invalid_value(key)),
                    });
                }
                _ => {
                    params.options.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(params)
    }

    /// Filter expressions, empty when none are set
    pub fn filters(&self) -> &[String] {
        self.fields.as_deref().unwrap_or_default()
    }

    /// Sort direction, defaulting to ascending
    pub fn sort_order(&self) -> SortOrder {
        self.order.unwrap_or_default()
    }

    /// Effective page size given the store's default
    pub fn effective_limit(&self, default: i64) -> i64 {
        self.limit.unwrap_or(default)
    }

    /// Render as query pairs in wire format.
    ///
    /// Filter expressions are sent as repeated `fields[]` pairs.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(start) = self.start {
            pairs.push(("start".to_string(), start.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        for expression in self.filters() {
            pairs.push(("fields[]".to_string(), expression.clone()));
        }
        if let Some(orderby) = &self.orderby {
            pairs.push(("orderby".to_string(), orderby.clone()));
        }
        if let Some(order) = self.order {
            pairs.push(("order".to_string(), order.to_string()));
        }
        if let Some(total) = self.total {
            pairs.push(("total".to_string(), total.to_string()));
        }
        for (key, value) in &self.options {
            pairs.push((key.clone(), value_literal(value)));
        }
        pairs
    }

    /// Check that `extra` only touches parameters a continuation may change.
    ///
    /// `start` can never be passed; `fields`, `orderby` and `order` may only be
    /// repeated with their current value.
    pub fn validate_continuation(&self, extra: &ListParameters) -> Result<()> {
        let mut rejected = Vec::new();
        if extra.start.is_some() {
            rejected.push(STRUCTURAL_KEYS[0]);
        }
        if extra.fields.is_some() && extra.filters() != self.filters() {
            rejected.push(STRUCTURAL_KEYS[1]);
        }
        if extra.orderby.is_some() && extra.orderby != self.orderby {
            rejected.push(STRUCTURAL_KEYS[2]);
        }
        if extra.order.is_some_and(|order| order != self.sort_order()) {
            rejected.push(STRUCTURAL_KEYS[3]);
        }
        if rejected.is_empty() {
            Ok(())
        } else {
            Err(Error::invalid_parameters(rejected))
        }
    }

    /// Merge validated continuation parameters into this live copy.
    ///
    /// The change persists for every later call until overridden again.
    pub fn apply_continuation(&mut self, extra: &ListParameters) {
        if let Some(limit) = extra.limit {
            self.limit = Some(limit);
        }
        if let Some(total) = extra.total {
            self.total = Some(total);
        }
        for (key, value) in &extra.options {
            self.options.insert(key.clone(), value.clone());
        }
    }
}

fn as_integer(key: &str, value: &JsonValue) -> Result<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().ok_or_else(|| invalid_value(key)),
        JsonValue::String(s) => s.trim().parse().map_err(|_| invalid_value(key)),
        _ => Err(invalid_value(key)),
    }
}

fn invalid_value(key: &str) -> Error {
    Error::config(format!("Invalid value for listing parameter '{key}'"))
}

/// Immutable description of a listing request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryDescriptor {
    /// Resource path (e.g. `database/12/profiles`)
    pub resource: String,
    /// Base parameters as passed by the caller
    #[serde(default)]
    pub parameters: ListParameters,
}

impl QueryDescriptor {
    /// Create a descriptor, rejecting an empty resource path
    pub fn new(resource: impl Into<String>, parameters: ListParameters) -> Result<Self> {
        let resource = resource.into();
        if resource.trim().is_empty() {
            return Err(Error::config("Resource path must not be empty"));
        }
        Ok(Self {
            resource,
            parameters,
        })
    }
}
