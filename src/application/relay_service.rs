//! Relay Service - One invocation of the relay
//!
//! Runs the forward and reverse synchronization passes, each independent of
//! the other, then drains the outbox through the delivery pipeline.

use crate::application::delivery_pipeline::{DeliveryOutcome, DeliveryPipeline};
use crate::application::sync_engine::{PassReport, SyncEngine};
use crate::domain::ports::ArtifactSource;
use crate::domain::value_objects::SyncDirection;
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;

/// Outcome counts of one outbox drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub deduplicated: usize,
    pub failed: usize,
    /// Delivered artifacts removed from the outbox.
    pub discarded: usize,
}

/// Everything one cycle did. Advisory only.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub passes: Vec<PassReport>,
    /// Directions whose flagged-record query failed.
    pub aborted: Vec<SyncDirection>,
    pub delivery: Option<DeliveryReport>,
}

/// How the outbox is drained.
#[derive(Debug, Clone)]
pub struct OutboxSettings {
    /// Pause between consecutive sends.
    pub send_interval: Duration,
    /// Remove artifacts from the outbox once delivered.
    pub delete_after_send: bool,
}

impl Default for OutboxSettings {
    fn default() -> Self {
        Self {
            send_interval: Duration::from_secs(2),
            delete_after_send: false,
        }
    }
}

struct Outbox {
    pipeline: DeliveryPipeline,
    source: Arc<dyn ArtifactSource>,
    settings: OutboxSettings,
}

pub struct RelayService {
    sync: Option<SyncEngine>,
    outbox: Option<Outbox>,
}

impl RelayService {
    /// Create a service; pass `None` to leave synchronization disabled.
    pub fn new(sync: Option<SyncEngine>) -> Self {
        Self { sync, outbox: None }
    }

    /// Enable outbox delivery.
    pub fn with_outbox(
        mut self,
        pipeline: DeliveryPipeline,
        source: Arc<dyn ArtifactSource>,
        settings: OutboxSettings,
    ) -> Self {
        self.outbox = Some(Outbox {
            pipeline,
            source,
            settings,
        });
        self
    }

    /// Run one full cycle. Never fails as a whole: a query fault aborts
    /// only its own direction, and an unreadable outbox is logged.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        if let Some(engine) = &self.sync {
            for direction in SyncDirection::all() {
                match engine.run_sync_pass(direction).await {
                    Ok(pass) => report.passes.push(pass),
                    Err(_) => report.aborted.push(direction),
                }
            }
        }

        if self.outbox.is_some() {
            match self.deliver_outbox().await {
                Ok(delivery) => report.delivery = Some(delivery),
                Err(e) => tracing::error!("outbox unavailable: {}", e),
            }
        }

        report
    }

    /// Deliver every staged artifact in order.
    ///
    /// Fails only when the outbox cannot be listed.
    pub async fn deliver_outbox(&self) -> Result<DeliveryReport> {
        let mut report = DeliveryReport::default();
        let Some(outbox) = &self.outbox else {
            return Ok(report);
        };

        let staged = outbox.source.list()?;
        if staged.is_empty() {
            tracing::info!("outbox is empty");
            return Ok(report);
        }

        tracing::info!("delivering {} artifacts", staged.len());

        for (i, item) in staged.iter().enumerate() {
            if i > 0 && !outbox.settings.send_interval.is_zero() {
                tokio::time::sleep(outbox.settings.send_interval).await;
            }

            let outcome = outbox.pipeline.deliver(&item.artifact).await;
            match &outcome {
                DeliveryOutcome::Sent { .. } => report.sent += 1,
                DeliveryOutcome::Deduplicated => report.deduplicated += 1,
                DeliveryOutcome::Failed { .. } => report.failed += 1,
            }

            if outcome.is_success() && outbox.settings.delete_after_send {
                match outbox.source.discard(item) {
                    Ok(()) => {
                        tracing::debug!("removed {} from outbox", item.handle);
                        report.discarded += 1;
                    }
                    Err(e) => tracing::warn!("could not remove {}: {}", item.handle, e),
                }
            }
        }

        tracing::info!(
            "outbox drained: sent={} deduplicated={} failed={} discarded={}",
            report.sent,
            report.deduplicated,
            report.failed,
            report.discarded
        );

        Ok(report)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::adapters::outbound::SqliteCacheTier;
    use crate::application::delivery_pipeline::RetryPolicy;
    use crate::application::sent_record_cache::{CachePolicy, SentRecordCache};
    use crate::domain::entities::{DeliveryArtifact, FieldPatch, StoreRecord};
    use crate::domain::ports::{
        DeliveryTransport, EqualityFilter, RecordStore, StagedArtifact, TransportResponse,
    };
    use crate::domain::value_objects::{IdempotencyKey, RecordId};
    use crate::error::RelayError;
    use crate::infrastructure::SystemClock;
    use async_trait::async_trait;
    use std::sync::Mutex;

    // ===== Mock Implementations =====

    struct MockStore {
        name: &'static str,
        records: Mutex<Vec<StoreRecord>>,
        query_fails: bool,
    }

    impl MockStore {
        fn new(name: &'static str, records: Vec<StoreRecord>) -> Self {
            Self {
                name,
                records: Mutex::new(records),
                query_fails: false,
            }
        }

        fn unreachable(name: &'static str) -> Self {
            Self {
                query_fails: true,
                ..Self::new(name, vec![])
            }
        }
    }

    #[async_trait]
    impl RecordStore for MockStore {
        fn name(&self) -> &str {
            self.name
        }

        async fn query(&self, filter: &EqualityFilter) -> crate::error::Result<Vec<StoreRecord>> {
            if self.query_fails {
                return Err(RelayError::query(self.name, "unreachable"));
            }
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| filter.matches(r))
                .cloned()
                .collect())
        }

        async fn update(&self, id: &RecordId, patch: &FieldPatch) -> bool {
            let mut records = self.records.lock().unwrap();
            match records.iter_mut().find(|r| &r.id == id) {
                Some(record) => {
                    patch.apply(record);
                    true
                }
                None => false,
            }
        }
    }

    struct MockOutbox {
        staged: Mutex<Vec<StagedArtifact>>,
        discard_fails: bool,
    }

    impl MockOutbox {
        fn with(names: &[&str]) -> Self {
            let staged = names
                .iter()
                .map(|n| StagedArtifact {
                    handle: n.to_string(),
                    artifact: DeliveryArtifact::new(*n, format!("<p>{}</p>", n).into_bytes()),
                })
                .collect();
            Self {
                staged: Mutex::new(staged),
                discard_fails: false,
            }
        }

        fn remaining(&self) -> usize {
            self.staged.lock().unwrap().len()
        }
    }

    impl ArtifactSource for MockOutbox {
        fn list(&self) -> crate::error::Result<Vec<StagedArtifact>> {
            Ok(self.staged.lock().unwrap().clone())
        }

        fn discard(&self, staged: &StagedArtifact) -> crate::error::Result<()> {
            if self.discard_fails {
                return Err(RelayError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only",
                )));
            }
            self.staged
                .lock()
                .unwrap()
                .retain(|s| s.handle != staged.handle);
            Ok(())
        }
    }

    /// Accepts everything except names listed in `rejected`.
    struct MockTransport {
        rejected: Vec<&'static str>,
        sent: Mutex<Vec<String>>,
    }

    impl MockTransport {
        fn accepting() -> Self {
            Self {
                rejected: vec![],
                sent: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl DeliveryTransport for MockTransport {
        async fn send(
            &self,
            artifact: &DeliveryArtifact,
            _key: &IdempotencyKey,
        ) -> crate::error::Result<TransportResponse> {
            self.sent.lock().unwrap().push(artifact.name.clone());
            if self.rejected.contains(&artifact.name.as_str()) {
                Ok(TransportResponse::new(400, "bad request"))
            } else {
                Ok(TransportResponse::new(200, "{}"))
            }
        }
    }

    fn pipeline(transport: Arc<MockTransport>) -> DeliveryPipeline {
        let cache = SentRecordCache::new(
            Arc::new(SqliteCacheTier::volatile_in_memory().unwrap()),
            Arc::new(SqliteCacheTier::open_in_memory().unwrap()),
            Arc::new(SystemClock),
            CachePolicy::default(),
        );
        DeliveryPipeline::new(transport, Arc::new(cache), RetryPolicy::testing(), "relay")
    }

    fn fast(delete_after_send: bool) -> OutboxSettings {
        OutboxSettings {
            send_interval: Duration::ZERO,
            delete_after_send,
        }
    }

    #[tokio::test]
    async fn test_cycle_runs_both_directions() {
        let source = Arc::new(MockStore::new(
            "requests",
            vec![StoreRecord::new("a1", "X1").flagged()],
        ));
        let target = Arc::new(MockStore::new(
            "stock",
            vec![StoreRecord::new("b1", "X1").flagged()],
        ));
        let service = RelayService::new(Some(SyncEngine::new(source, target)));

        let report = service.run_cycle().await;

        assert_eq!(report.passes.len(), 2);
        assert_eq!(report.passes[0].direction, SyncDirection::Forward);
        assert_eq!(report.passes[1].direction, SyncDirection::Reverse);
        assert!(report.aborted.is_empty());
        assert!(report.delivery.is_none());
    }

    #[tokio::test]
    async fn test_query_fault_aborts_only_its_direction() {
        let source = Arc::new(MockStore::unreachable("requests"));
        let target = Arc::new(MockStore::new(
            "stock",
            vec![StoreRecord::new("b1", "X1").flagged()],
        ));
        let service = RelayService::new(Some(SyncEngine::new(source, target.clone())));

        let report = service.run_cycle().await;

        assert_eq!(report.aborted, vec![SyncDirection::Forward]);
        assert_eq!(report.passes.len(), 1);
        assert_eq!(report.passes[0].direction, SyncDirection::Reverse);
    }

    #[tokio::test]
    async fn test_outbox_delivered_and_discarded() {
        let transport = Arc::new(MockTransport::accepting());
        let outbox = Arc::new(MockOutbox::with(&["a.html", "b.html"]));
        let service = RelayService::new(None).with_outbox(
            pipeline(transport.clone()),
            outbox.clone(),
            fast(true),
        );

        let report = service.deliver_outbox().await.unwrap();

        assert_eq!(report.sent, 2);
        assert_eq!(report.discarded, 2);
        assert_eq!(outbox.remaining(), 0);
        assert_eq!(*transport.sent.lock().unwrap(), vec!["a.html", "b.html"]);
    }

    #[tokio::test]
    async fn test_outbox_kept_without_delete_flag() {
        let transport = Arc::new(MockTransport::accepting());
        let outbox = Arc::new(MockOutbox::with(&["a.html"]));
        let service =
            RelayService::new(None).with_outbox(pipeline(transport), outbox.clone(), fast(false));

        let first = service.deliver_outbox().await.unwrap();
        let second = service.deliver_outbox().await.unwrap();

        assert_eq!(first.sent, 1);
        assert_eq!(second.deduplicated, 1);
        assert_eq!(second.sent, 0);
        assert_eq!(outbox.remaining(), 1);
    }

    #[tokio::test]
    async fn test_failed_artifact_stays_in_outbox() {
        let transport = Arc::new(MockTransport {
            rejected: vec!["bad.html"],
            sent: Mutex::new(vec![]),
        });
        let outbox = Arc::new(MockOutbox::with(&["bad.html", "good.html"]));
        let service =
            RelayService::new(None).with_outbox(pipeline(transport), outbox.clone(), fast(true));

        let report = service.deliver_outbox().await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.sent, 1);
        assert_eq!(report.discarded, 1);
        assert_eq!(outbox.remaining(), 1);
    }

    #[tokio::test]
    async fn test_discard_failure_is_not_fatal() {
        let transport = Arc::new(MockTransport::accepting());
        let outbox = Arc::new(MockOutbox {
            discard_fails: true,
            ..MockOutbox::with(&["a.html", "b.html"])
        });
        let service =
            RelayService::new(None).with_outbox(pipeline(transport), outbox.clone(), fast(true));

        let report = service.deliver_outbox().await.unwrap();

        assert_eq!(report.sent, 2);
        assert_eq!(report.discarded, 0);
    }
}
