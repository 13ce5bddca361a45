//! In-memory Entity Store
//!
//! A fake backend with the same listing semantics as the remote API:
//! filter expressions, ordering, `start`/`limit` windows and optional totals.
//! Entities can be inserted or removed between calls to play the role of
//! other actors mutating the collection mid-walk.

use super::types::{Entity, EntityId, EntityStore, ListResponse, ID_FIELD};
use crate::error::{Error, Result};
use crate::query::ListParameters;
use crate::types::{compare_literals, compare_values, value_literal, JsonValue};
use async_trait::async_trait;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tokio::sync::RwLock;

/// Page size applied when a request carries no `limit`
pub const DEFAULT_PAGE_SIZE: i64 = 100;

static FILTER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_][\w.]*)\s*(==|!=|<>|>=|<=|=|>|<)(.*)$")
        .expect("Invalid filter regex")
});

/// Comparison operator of a filter expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

/// A parsed `<field><op><value>` filter expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterExpression {
    pub field: String,
    pub op: FilterOp,
    pub value: String,
}

impl FilterExpression {
    /// Parse a filter expression
    pub fn parse(expression: &str) -> Result<Self> {
        let invalid = || Error::InvalidFilter {
            expression: expression.to_string(),
        };
        let caps = FILTER_REGEX.captures(expression).ok_or_else(invalid)?;
        let op = match &caps[2] {
            "==" | "=" => FilterOp::Equal,
            "!=" | "<>" => FilterOp::NotEqual,
            ">" => FilterOp::Greater,
            ">=" => FilterOp::GreaterOrEqual,
            "<" => FilterOp::Less,
            "<=" => FilterOp::LessOrEqual,
            _ => return Err(invalid()),
        };
        Ok(Self {
            field: caps[1].to_string(),
            op,
            value: caps[3].trim().to_string(),
        })
    }

    /// Check whether an entity satisfies this expression
    pub fn matches(&self, entity: &Entity) -> bool {
        let actual = entity
            .value(&self.field)
            .map(|v| value_literal(&v))
            .unwrap_or_default();
        let ordering = compare_literals(&actual, &self.value);
        match self.op {
            FilterOp::Equal => ordering == Ordering::Equal,
            FilterOp::NotEqual => ordering != Ordering::Equal,
            FilterOp::Greater => ordering == Ordering::Greater,
            FilterOp::GreaterOrEqual => ordering != Ordering::Less,
            FilterOp::Less => ordering == Ordering::Less,
            FilterOp::LessOrEqual => ordering != Ordering::Greater,
        }
    }
}

/// A listing request as the store received it
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub resource: String,
    pub parameters: ListParameters,
}

#[derive(Debug, Default)]
struct Collections {
    resources: HashMap<String, Vec<Entity>>,
    requests: Vec<RecordedRequest>,
}

/// Shared, mutable in-memory collection store
///
/// Clones share the same collections.
#[derive(Debug, Clone)]
pub struct InMemoryEntityStore {
    inner: Arc<RwLock<Collections>>,
    implicit_order_key: Option<String>,
    default_limit: i64,
}

impl Default for InMemoryEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEntityStore {
    /// Create an empty store ordering by ID by default
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Collections::default())),
            implicit_order_key: Some(ID_FIELD.to_string()),
            default_limit: DEFAULT_PAGE_SIZE,
        }
    }

    /// Create a store seeded with one resource
    pub fn with_entities(resource: impl Into<String>, entities: Vec<Entity>) -> Self {
        let mut collections = Collections::default();
        collections.resources.insert(resource.into(), entities);
        Self {
            inner: Arc::new(RwLock::new(collections)),
            ..Self::new()
        }
    }

    /// Override the implicit order key (`None`: no implicit unique key)
    #[must_use]
    pub fn with_implicit_order_key(mut self, key: Option<&str>) -> Self {
        self.implicit_order_key = key.map(ToString::to_string);
        self
    }

    /// Override the default page size
    #[must_use]
    pub fn with_default_limit(mut self, limit: i64) -> Self {
        self.default_limit = limit;
        self
    }

    /// Add an entity to a resource (creating the resource if needed)
    pub async fn insert(&self, resource: &str, entity: Entity) {
        let mut inner = self.inner.write().await;
        inner
            .resources
            .entry(resource.to_string())
            .or_default()
            .push(entity);
    }

    /// Remove an entity, returning whether it existed
    pub async fn remove(&self, resource: &str, id: &EntityId) -> bool {
        let mut inner = self.inner.write().await;
        let Some(entities) = inner.resources.get_mut(resource) else {
            return false;
        };
        let before = entities.len();
        entities.retain(|e| &e.id != id);
        entities.len() != before
    }

    /// Number of entities in a resource
    pub async fn len(&self, resource: &str) -> usize {
        let inner = self.inner.read().await;
        inner.resources.get(resource).map_or(0, Vec::len)
    }

    /// Every request received so far
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.read().await.requests.clone()
    }

    /// The most recent request
    pub async fn last_request(&self) -> Option<RecordedRequest> {
        self.inner.read().await.requests.last().cloned()
    }

    fn sort(&self, entities: &mut [Entity], parameters: &ListParameters) {
        let order_field = parameters
            .orderby
            .clone()
            .or_else(|| self.implicit_order_key.clone());
        let descending = parameters.sort_order().is_descending();

        entities.sort_by(|a, b| {
            let by_field = order_field.as_deref().map_or(Ordering::Equal, |field| {
                let left = a.value(field).unwrap_or(JsonValue::Null);
                let right = b.value(field).unwrap_or(JsonValue::Null);
                compare_values(&left, &right)
            });
            let by_field = if descending { by_field.reverse() } else { by_field };
            by_field.then_with(|| compare_literals(a.id.as_str(), b.id.as_str()))
        });
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn list(&self, resource: &str, parameters: &ListParameters) -> Result<ListResponse> {
        let filters = parameters
            .filters()
            .iter()
            .map(|expression| FilterExpression::parse(expression))
            .collect::<Result<Vec<_>>>()?;

        let mut matching = {
            let mut inner = self.inner.write().await;
            inner.requests.push(RecordedRequest {
                resource: resource.to_string(),
                parameters: parameters.clone(),
            });
            let entities = inner
                .resources
                .get(resource)
                .ok_or_else(|| Error::http_status(404, format!("No such resource: {resource}")))?;
            entities
                .iter()
                .filter(|entity| filters.iter().all(|f| f.matches(entity)))
                .cloned()
                .collect::<Vec<_>>()
        };

        self.sort(&mut matching, parameters);

        let start = parameters.start.unwrap_or(0);
        let limit = parameters.effective_limit(self.default_limit);
        let total = parameters
            .total
            .unwrap_or(false)
            .then_some(matching.len() as i64);

        let data: Vec<Entity> = if start < 0 || limit <= 0 {
            Vec::new()
        } else {
            matching
                .into_iter()
                .skip(start as usize)
                .take(limit as usize)
                .collect()
        };

        Ok(ListResponse {
            start,
            limit,
            count: data.len() as i64,
            data,
            total,
        })
    }

    fn implicit_order_key(&self) -> Option<&str> {
        self.implicit_order_key.as_deref()
    }
}
