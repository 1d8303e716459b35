//! record-relay Library
//!
//! Flag-triggered record synchronization between two record stores, and
//! idempotent delivery of generated reports to a chat endpoint.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;

// Re-export commonly used types
pub use application::{
    CachePolicy, CycleReport, DeliveryOutcome, DeliveryPipeline, DeliveryReport, OutboxSettings,
    PassReport, RelayService, RetryPolicy, SentRecordCache, SyncEngine,
};
pub use config::{load_config, Config, KeyKind, StoreSchema};
pub use domain::entities::{DateRange, DeliveryArtifact, FieldPatch, PatchOp, StoreRecord};
pub use domain::ports::{ArtifactSource, CacheTier, Clock, DeliveryTransport, RecordStore};
pub use domain::services::digest;
pub use domain::value_objects::{ArtifactDigest, BusinessKey, IdempotencyKey, RecordId, SyncDirection};
pub use error::{RelayError, Result};
