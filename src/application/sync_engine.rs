//! Sync Engine - Flag-triggered record synchronization
//!
//! Runs one directional pass between the two record stores:
//! 1. Queries the origin store for records with `sync_flag = true`
//! 2. Resolves each record's counterpart by business key
//! 3. Applies the direction's transform to the counterpart
//! 4. Resets the origin flag only after the counterpart write succeeded
//!
//! A record whose pipeline fails keeps its flag and is retried by the next
//! pass. Re-applying a transform is idempotent.

use crate::domain::entities::{FieldPatch, StoreRecord};
use crate::domain::ports::{EqualityFilter, RecordStore};
use crate::domain::services::{
    Disposition, FailureReason, RecordMatcher, SkipReason, WorkQueue,
};
use crate::domain::value_objects::SyncDirection;
use crate::error::Result;
use std::sync::Arc;

/// Advisory outcome counts of one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub direction: SyncDirection,
    pub flagged: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Synchronizes store A ("source") and store B ("target").
pub struct SyncEngine {
    source: Arc<dyn RecordStore>,
    target: Arc<dyn RecordStore>,
}

impl SyncEngine {
    pub fn new(source: Arc<dyn RecordStore>, target: Arc<dyn RecordStore>) -> Self {
        Self { source, target }
    }

    /// `(origin, counterpart)` stores for a direction.
    fn stores(&self, direction: SyncDirection) -> (&dyn RecordStore, &dyn RecordStore) {
        match direction {
            SyncDirection::Forward => (self.source.as_ref(), self.target.as_ref()),
            SyncDirection::Reverse => (self.target.as_ref(), self.source.as_ref()),
        }
    }

    /// Run one pass in `direction`.
    ///
    /// Fails only when the flagged-record query fails; every per-record
    /// problem is tallied in the report and the pass moves on.
    pub async fn run_sync_pass(&self, direction: SyncDirection) -> Result<PassReport> {
        let (origin, counterpart) = self.stores(direction);

        tracing::info!(
            "{} pass starting: {} -> {}",
            direction,
            origin.name(),
            counterpart.name()
        );

        let flagged = origin
            .query(&EqualityFilter::SyncFlag(true))
            .await
            .map_err(|e| {
                tracing::error!("{} pass aborted: {}", direction, e);
                e
            })?;

        if flagged.is_empty() {
            tracing::info!("{} pass: no flagged records in {}", direction, origin.name());
        }

        let mut queue = WorkQueue::from_flagged(flagged);
        while let Some(ticket) = queue.claim_next() {
            match Self::process(direction, origin, counterpart, &ticket.record).await {
                Disposition::Committed => queue.commit(ticket),
                other => queue.release(ticket, other),
            }
        }

        let (succeeded, failed, skipped) = queue.tally();
        let report = PassReport {
            direction,
            flagged: queue.len(),
            succeeded,
            failed,
            skipped,
        };

        tracing::info!(
            "{} pass complete: succeeded={} failed={} skipped={} still_flagged={}",
            direction,
            report.succeeded,
            report.failed,
            report.skipped,
            queue.outstanding()
        );

        Ok(report)
    }

    /// Payload written onto the counterpart of `record`.
    pub fn transform(
        direction: SyncDirection,
        record: &StoreRecord,
    ) -> std::result::Result<FieldPatch, SkipReason> {
        match direction {
            SyncDirection::Forward => {
                if record.quantity.is_none() {
                    // Not blocking: the date alone is still propagated.
                    tracing::debug!(record_id = %record.id, "quantity is empty");
                }
                match &record.request_date {
                    Some(date) => Ok(FieldPatch::propagate(record.quantity, Some(date.clone()))),
                    None => Err(SkipReason::MissingRequestDate),
                }
            }
            SyncDirection::Reverse => Ok(FieldPatch::clear_payload()),
        }
    }

    async fn process(
        direction: SyncDirection,
        origin: &dyn RecordStore,
        counterpart: &dyn RecordStore,
        record: &StoreRecord,
    ) -> Disposition {
        let Some(key) = record.business_key.as_ref() else {
            return Self::skip(record, SkipReason::MissingKey);
        };

        let patch = match Self::transform(direction, record) {
            Ok(patch) => patch,
            Err(reason) => return Self::skip(record, reason),
        };

        let matched = match RecordMatcher::find_counterpart(counterpart, key).await {
            Ok(Some(matched)) => matched,
            Ok(None) => return Self::skip(record, SkipReason::NoCounterpart),
            Err(e) => {
                tracing::warn!(
                    record_id = %record.id,
                    business_key = %key,
                    "counterpart lookup failed: {}",
                    e
                );
                return Disposition::Failed(FailureReason::LookupFailed);
            }
        };

        if !counterpart.update(&matched.id, &patch).await {
            tracing::warn!(
                record_id = %record.id,
                business_key = %key,
                counterpart_id = %matched.id,
                "counterpart write failed, flag left set"
            );
            return Disposition::Failed(FailureReason::CounterpartWriteFailed);
        }

        if !origin.update(&record.id, &FieldPatch::reset_flag()).await {
            tracing::warn!(
                record_id = %record.id,
                business_key = %key,
                "flag reset failed, record stays eligible"
            );
            return Disposition::Failed(FailureReason::FlagResetFailed);
        }

        tracing::debug!(
            record_id = %record.id,
            business_key = %key,
            counterpart_id = %matched.id,
            "{} sync committed",
            direction
        );
        Disposition::Committed
    }

    fn skip(record: &StoreRecord, reason: SkipReason) -> Disposition {
        tracing::info!(record_id = %record.id, "skipped: {}", reason.as_str());
        Disposition::Skipped(reason)
    }
}
