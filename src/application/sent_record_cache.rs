//! Sent-Record Cache
//!
//! Remembers which artifacts were delivered recently so a rerun does not
//! send them again. The whole table is serialized as JSON into one of two
//! tiers: a volatile tier with its own short expiry while the table is
//! small, and a durable tier once it grows past the size threshold. Reads
//! merge both tiers, so a copy left behind in one tier never hides what
//! the other holds.
//!
//! Deduplication is best effort. Any read or parse failure yields an empty
//! table, and the worst outcome is a resend.

use crate::domain::entities::SentCacheEntry;
use crate::domain::ports::{CacheTier, Clock};
use crate::domain::value_objects::ArtifactDigest;
use crate::error::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Serialized form: digest -> last-sent metadata.
pub type SentTable = BTreeMap<ArtifactDigest, SentCacheEntry>;

/// Tiering and expiry settings.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// Key the table is stored under in both tiers.
    pub storage_key: String,
    /// Logical lifetime of an entry.
    pub ttl: chrono::Duration,
    /// Expiry handed to the volatile tier; shorter than `ttl`.
    pub volatile_expiry: Duration,
    /// Serialized tables at or above this many bytes go to the durable tier.
    pub size_threshold: usize,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            storage_key: "relay_sent_cache".to_string(),
            ttl: chrono::Duration::hours(24),
            volatile_expiry: Duration::from_secs(6 * 3600),
            size_threshold: 90_000,
        }
    }
}

/// Tier a table was written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageTier {
    Volatile,
    Durable,
}

pub struct SentRecordCache {
    volatile: Arc<dyn CacheTier>,
    durable: Arc<dyn CacheTier>,
    clock: Arc<dyn Clock>,
    policy: CachePolicy,
}

impl SentRecordCache {
    pub fn new(
        volatile: Arc<dyn CacheTier>,
        durable: Arc<dyn CacheTier>,
        clock: Arc<dyn Clock>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            volatile,
            durable,
            clock,
            policy,
        }
    }

    /// Read the live table as the union of both tiers.
    ///
    /// A digest present in both keeps its most recent send. Entries older
    /// than the TTL are dropped on the way out.
    pub fn load(&self) -> SentTable {
        let mut table = self.read_table(self.durable.as_ref());
        for (digest, entry) in self.read_table(self.volatile.as_ref()) {
            match table.get(&digest) {
                Some(existing) if existing.sent_at >= entry.sent_at => {}
                _ => {
                    table.insert(digest, entry);
                }
            }
        }

        let now = self.clock.now();
        let before = table.len();
        table.retain(|_, entry| !entry.is_expired(now, self.policy.ttl));
        if table.len() < before {
            tracing::debug!("sent cache evicted {} expired entries", before - table.len());
        }
        table
    }

    fn read_table(&self, tier: &dyn CacheTier) -> SentTable {
        let raw = match tier.get(&self.policy.storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return SentTable::new(),
            Err(e) => {
                tracing::warn!("sent cache tier {} read failed: {}", tier.name(), e);
                return SentTable::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!("sent cache tier {} unreadable, ignoring: {}", tier.name(), e);
            SentTable::new()
        })
    }

    /// Return the entry for `digest` if it was sent within the TTL.
    pub fn lookup(&self, digest: &ArtifactDigest) -> Option<SentCacheEntry> {
        self.load().remove(digest)
    }

    /// Record a successful delivery at the current time and persist.
    pub fn mark_sent(&self, digest: &ArtifactDigest, name: &str) {
        let mut table = self.load();
        table.insert(digest.clone(), SentCacheEntry::new(name, self.clock.now()));
        if let Err(e) = self.persist(&table) {
            tracing::warn!(digest = %digest, "sent cache not saved: {}", e);
        }
    }

    /// Serialize `table` into the tier its size calls for.
    pub fn persist(&self, table: &SentTable) -> Result<StorageTier> {
        let json = serde_json::to_string(table)?;

        if json.len() < self.policy.size_threshold {
            self.volatile.put(
                &self.policy.storage_key,
                &json,
                Some(self.policy.volatile_expiry),
            )?;
            Ok(StorageTier::Volatile)
        } else {
            tracing::debug!(
                "sent cache is {} bytes, writing to {}",
                json.len(),
                self.durable.name()
            );
            self.durable.put(&self.policy.storage_key, &json, None)?;
            Ok(StorageTier::Durable)
        }
    }
}
