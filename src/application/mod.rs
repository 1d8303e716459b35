//! Application layer: the relay's use cases.

pub mod delivery_pipeline;
pub mod relay_service;
pub mod sent_record_cache;
pub mod sync_engine;

pub use delivery_pipeline::{DeliveryOutcome, DeliveryPipeline, RetryPolicy};
pub use relay_service::{CycleReport, DeliveryReport, OutboxSettings, RelayService};
pub use sent_record_cache::{CachePolicy, SentRecordCache, SentTable, StorageTier};
pub use sync_engine::{PassReport, SyncEngine};
