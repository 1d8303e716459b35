//! Clock Port

use chrono::{DateTime, Utc};

/// Source of wall-clock time; replaced by a fixed clock in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
