//! Cache Tier Port
//!
//! A key/value slot the sent-record cache serializes its table into.

use crate::error::Result;
use std::time::Duration;

/// Storage tier for the serialized sent-record table.
///
/// The volatile tier expires values on its own schedule; the durable tier
/// ignores `expiry` and keeps values until overwritten.
pub trait CacheTier: Send + Sync {
    fn name(&self) -> &str;

    /// Read the value stored under `key`, if present and not expired.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &str, expiry: Option<Duration>) -> Result<()>;
}
