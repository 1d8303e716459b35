//! Record Matcher Service
//!
//! Resolves a record's counterpart in the opposite store by exact
//! business-key equality.

use crate::domain::entities::StoreRecord;
use crate::domain::ports::{EqualityFilter, RecordStore};
use crate::domain::value_objects::BusinessKey;
use crate::error::Result;

pub struct RecordMatcher;

impl RecordMatcher {
    /// Query `store` for every record whose business key equals `key`.
    ///
    /// The list is returned as the store ordered it. An empty list means
    /// "no counterpart" and is not an error.
    pub async fn find_counterparts(
        store: &dyn RecordStore,
        key: &BusinessKey,
    ) -> Result<Vec<StoreRecord>> {
        store.query(&EqualityFilter::BusinessKey(key.clone())).await
    }

    /// First match wins: when the key is not unique within `store`, only
    /// the first record in store-native order is used.
    pub async fn find_counterpart(
        store: &dyn RecordStore,
        key: &BusinessKey,
    ) -> Result<Option<StoreRecord>> {
        let matches = Self::find_counterparts(store, key).await?;
        if matches.len() > 1 {
            tracing::warn!(
                store = store.name(),
                business_key = %key,
                count = matches.len(),
                "business key is not unique, using first match"
            );
        }
        Ok(matches.into_iter().next())
    }
}
