//! Record Store Port
//!
//! Defines the query/update interface of one record store.
//! Implementations decode raw store payloads into typed records at the boundary.

use crate::domain::entities::{FieldPatch, StoreRecord};
use crate::domain::value_objects::{BusinessKey, RecordId};
use crate::error::Result;
use async_trait::async_trait;

/// Field a query may filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    BusinessKey,
    SyncFlag,
}

/// Equality filter issued against a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EqualityFilter {
    BusinessKey(BusinessKey),
    SyncFlag(bool),
}

impl EqualityFilter {
    pub fn field(&self) -> RecordField {
        match self {
            EqualityFilter::BusinessKey(_) => RecordField::BusinessKey,
            EqualityFilter::SyncFlag(_) => RecordField::SyncFlag,
        }
    }

    /// Whether a decoded record satisfies the filter.
    pub fn matches(&self, record: &StoreRecord) -> bool {
        match self {
            EqualityFilter::BusinessKey(key) => record.business_key.as_ref() == Some(key),
            EqualityFilter::SyncFlag(flag) => record.sync_flag == *flag,
        }
    }
}

/// One of the two record stores being reconciled.
///
/// This is an outbound port. Query faults mean the store is unavailable
/// and are raised; write failures are per-record and reported as `false`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Human-readable store name for logs and errors.
    fn name(&self) -> &str;

    /// Return every record matching `filter`, in store-native order.
    async fn query(&self, filter: &EqualityFilter) -> Result<Vec<StoreRecord>>;

    /// Apply a partial update. Returns `true` only on an acknowledged success.
    async fn update(&self, id: &RecordId, patch: &FieldPatch) -> bool;
}
