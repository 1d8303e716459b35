//! Domain Entities - Core business objects
//!
//! These entities represent the core concepts of the relay domain.
//! They have no external dependencies and contain only business logic.

use crate::domain::services::digest;
use crate::domain::value_objects::{ArtifactDigest, BusinessKey, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Date property value: a start date with an optional end.
///
/// Values are kept in the store's own ISO-8601 text form so that a
/// forward pass writes back exactly what it read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl DateRange {
    pub fn starting(start: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: None,
            time_zone: None,
        }
    }
}

/// Typed projection of a record in either store.
///
/// Store A ("request" records) and store B ("stock" records) share the
/// same shape once decoded through their schema; which role a record plays
/// depends on the direction of the pass that reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRecord {
    pub id: RecordId,
    /// `None` when the key property is absent or blank.
    pub business_key: Option<BusinessKey>,
    /// Outstanding sync obligation.
    pub sync_flag: bool,
    pub quantity: Option<f64>,
    pub request_date: Option<DateRange>,
}

impl StoreRecord {
    pub fn new(id: impl Into<String>, business_key: &str) -> Self {
        Self {
            id: RecordId::new(id),
            business_key: BusinessKey::parse(business_key),
            sync_flag: false,
            quantity: None,
            request_date: None,
        }
    }

    pub fn flagged(mut self) -> Self {
        self.sync_flag = true;
        self
    }

    pub fn with_quantity(mut self, quantity: f64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_request_date(mut self, date: DateRange) -> Self {
        self.request_date = Some(date);
        self
    }
}

/// Operation on a single field of a partial update.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchOp<T> {
    /// Field is omitted from the update.
    Keep,
    /// Field is written with a value.
    Set(T),
    /// Field is written as an explicit null.
    Clear,
}

impl<T> PatchOp<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, PatchOp::Keep)
    }

    fn apply(&self, slot: &mut Option<T>)
    where
        T: Clone,
    {
        match self {
            PatchOp::Keep => {}
            PatchOp::Set(v) => *slot = Some(v.clone()),
            PatchOp::Clear => *slot = None,
        }
    }
}

impl<T> Default for PatchOp<T> {
    fn default() -> Self {
        PatchOp::Keep
    }
}

/// Partial-field update sent to a store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldPatch {
    pub quantity: PatchOp<f64>,
    pub request_date: PatchOp<DateRange>,
    pub sync_flag: PatchOp<bool>,
}

impl FieldPatch {
    /// Forward transform: copy the payload, writing only non-null fields.
    pub fn propagate(quantity: Option<f64>, request_date: Option<DateRange>) -> Self {
        Self {
            quantity: quantity.map_or(PatchOp::Keep, PatchOp::Set),
            request_date: request_date.map_or(PatchOp::Keep, PatchOp::Set),
            sync_flag: PatchOp::Keep,
        }
    }

    /// Reverse transform: explicitly null the payload fields.
    pub fn clear_payload() -> Self {
        Self {
            quantity: PatchOp::Clear,
            request_date: PatchOp::Clear,
            sync_flag: PatchOp::Keep,
        }
    }

    /// Commit signal: the record's obligation has been fulfilled.
    pub fn reset_flag() -> Self {
        Self {
            sync_flag: PatchOp::Set(false),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.quantity.is_keep() && self.request_date.is_keep() && self.sync_flag.is_keep()
    }

    /// Apply the patch to a decoded record.
    pub fn apply(&self, record: &mut StoreRecord) {
        self.quantity.apply(&mut record.quantity);
        self.request_date.apply(&mut record.request_date);
        match &self.sync_flag {
            PatchOp::Keep => {}
            PatchOp::Set(flag) => record.sync_flag = *flag,
            PatchOp::Clear => record.sync_flag = false,
        }
    }
}

/// A generated report ready to be sent to the chat endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryArtifact {
    pub name: String,
    pub content: Vec<u8>,
}

impl DeliveryArtifact {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn digest(&self) -> ArtifactDigest {
        digest(&self.content, &self.name)
    }
}

/// Metadata remembered about a successfully delivered artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentCacheEntry {
    pub name: String,
    #[serde(rename = "sent_at_ms", with = "chrono::serde::ts_milliseconds")]
    pub sent_at: DateTime<Utc>,
}

impl SentCacheEntry {
    pub fn new(name: impl Into<String>, sent_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            sent_at,
        }
    }

    /// Whether the entry has outlived `ttl` at instant `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.sent_at > ttl
    }
}
