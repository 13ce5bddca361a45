//! Entity Store types and traits
//!
//! The Entity Store is the remote collection API the pager walks. It is
//! consumed only through [`EntityStore::list`].

use crate::error::{Error, Result};
use crate::query::ListParameters;
use crate::types::{JsonObject, JsonValue};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::Arc;

/// Name of the identifier field on every entity
pub const ID_FIELD: &str = "ID";

/// Stable identifier of an entity
///
/// Stores send IDs either as strings or as integers; both decode into the
/// same textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Create an ID from any displayable value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Textual form of the ID
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => Self(s),
            RawId::Signed(n) => Self(n.to_string()),
            RawId::Unsigned(n) => Self(n.to_string()),
        })
    }
}

/// A record returned by a listing call
///
/// Opaque to the pager apart from its [`ID_FIELD`] and the value of the
/// configured order field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identifier
    #[serde(rename = "ID")]
    pub id: EntityId,

    /// Everything else the store sent
    #[serde(flatten)]
    pub data: JsonObject,
}

impl Entity {
    /// Create an entity with no field values
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            data: JsonObject::new(),
        }
    }

    /// Add a field value
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.data.insert(field.into(), value.into());
        self
    }

    /// Value of a field.
    ///
    /// The ID field is addressable by name. Other fields are looked up at the
    /// top level first, then inside a nested `fields` object.
    pub fn value(&self, field: &str) -> Option<JsonValue> {
        if field.eq_ignore_ascii_case(ID_FIELD) {
            return Some(JsonValue::String(self.id.to_string()));
        }
        self.data
            .get(field)
            .or_else(|| self.data.get("fields")?.as_object()?.get(field))
            .cloned()
    }
}

/// Raw response of a listing call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse {
    /// Offset the store applied
    #[serde(default)]
    pub start: i64,
    /// Page size the store applied
    #[serde(default)]
    pub limit: i64,
    /// Number of entities in `data`
    #[serde(default)]
    pub count: i64,
    /// The page
    pub data: Vec<Entity>,
    /// Total matching entities, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
}

impl ListResponse {
    /// Decode a listing response body
    pub fn from_json(body: JsonValue) -> Result<Self> {
        if !body.get("data").is_some_and(JsonValue::is_array) {
            return Err(Error::decode("listing response has no 'data' array"));
        }
        serde_json::from_value(body).map_err(|e| Error::decode(e.to_string()))
    }
}

/// The listing contract of the remote collection API
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Fetch one page of `resource` with the given parameters
    async fn list(&self, resource: &str, parameters: &ListParameters) -> Result<ListResponse>;

    /// Field the store orders by when no `orderby` is given, if it is known to
    /// hold unique values
    fn implicit_order_key(&self) -> Option<&str> {
        Some(ID_FIELD)
    }
}

#[async_trait]
impl<S: EntityStore + ?Sized> EntityStore for Arc<S> {
    async fn list(&self, resource: &str, parameters: &ListParameters) -> Result<ListResponse> {
        (**self).list(resource, parameters).await
    }

    fn implicit_order_key(&self) -> Option<&str> {
        (**self).implicit_order_key()
    }
}
