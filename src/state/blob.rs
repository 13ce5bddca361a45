//! Exported pagination state
//!
//! A [`StateBlob`] is the versioned, serialized form of a
//! [`PaginationState`]. Importing one restores a walk exactly where it was
//! exported, in the same or another process.

use super::types::PaginationState;
use crate::error::{Error, Result};
use crate::types::JsonValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Format version written by [`PaginationState::export`]
pub const STATE_VERSION: u32 = 1;

/// Serialized pagination state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateBlob(String);

impl StateBlob {
    /// Wrap a serialized state without checking it
    pub fn new(contents: impl Into<String>) -> Self {
        Self(contents.into())
    }

    /// Serialized contents
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take the serialized contents
    pub fn into_string(self) -> String {
        self.0
    }

    /// Parse into a JSON value (for embedding in other documents)
    pub fn to_value(&self) -> Result<JsonValue> {
        serde_json::from_str(&self.0).map_err(|e| Error::invalid_blob(e.to_string()))
    }

    /// Build from a JSON value
    pub fn from_value(value: &JsonValue) -> Result<Self> {
        Ok(Self(serde_json::to_string(value)?))
    }
}

impl fmt::Display for StateBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for StateBlob {
    fn from(contents: String) -> Self {
        Self(contents)
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    exported_at: DateTime<Utc>,
    state: &'a PaginationState,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope {
    #[allow(dead_code)]
    version: u32,
    #[allow(dead_code)]
    exported_at: DateTime<Utc>,
    state: PaginationState,
}

impl PaginationState {
    /// Serialize this state.
    ///
    /// Without `include_fetched_entities` the last batch is dropped and the
    /// fetched-ID set is reduced to its size, so the blob no longer contains
    /// entity data. Without `include_filter_values` the filter expressions are
    /// dropped and must be restored with [`PaginationState::restore_filters`]
    /// before the walk can continue. A listing without filters has nothing to
    /// redact and stays continuable as is.
    pub fn export(
        &self,
        include_fetched_entities: bool,
        include_filter_values: bool,
    ) -> Result<StateBlob> {
        let mut state = self.clone();
        if !include_fetched_entities {
            state.last_batch = None;
            state.tracker = state.tracker.without_ids();
        }
        let has_filters =
            !state.descriptor.parameters.filters().is_empty() || !state.live.filters().is_empty();
        if !include_filter_values && has_filters && !state.filters_redacted {
            state.descriptor.parameters.fields = None;
            state.live.fields = None;
            state.filters_redacted = true;
        }

        let envelope = EnvelopeRef {
            version: STATE_VERSION,
            exported_at: Utc::now(),
            state: &state,
        };
        Ok(StateBlob(serde_json::to_string(&envelope)?))
    }

    /// Restore a state from a blob, rejecting anything malformed
    pub fn import(blob: &StateBlob) -> Result<Self> {
        let value = blob.to_value()?;
        let version = value
            .get("version")
            .and_then(JsonValue::as_u64)
            .ok_or_else(|| Error::invalid_blob("missing format version"))?;
        if version != u64::from(STATE_VERSION) {
            return Err(Error::invalid_blob(format!(
                "unsupported format version {version} (expected {STATE_VERSION})"
            )));
        }

        let envelope: Envelope =
            serde_json::from_value(value).map_err(|e| Error::invalid_blob(e.to_string()))?;
        envelope.state.validate()?;
        Ok(envelope.state)
    }
}
