//! SQLite Cache Tiers
//!
//! Both tiers of the sent-record table live in SQLite so they outlive the
//! process. The volatile tier keeps slots in `volatile_slots` and honours
//! the expiry it is given, evicting lazily on read. The durable tier keeps
//! slots in `cache_slots` until overwritten and ignores the expiry hint.

use crate::domain::ports::CacheTier;
use crate::error::Result;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retention {
    Volatile,
    Durable,
}

impl Retention {
    fn table(self) -> &'static str {
        match self {
            Self::Volatile => "volatile_slots",
            Self::Durable => "cache_slots",
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Volatile => "volatile",
            Self::Durable => "durable",
        }
    }
}

pub struct SqliteCacheTier {
    conn: Mutex<Connection>,
    retention: Retention,
}

impl SqliteCacheTier {
    /// Open (or create) the durable tier in the database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_connection(Connection::open(path.as_ref())?, Retention::Durable)
    }

    /// Open (or create) the expiring volatile tier in the database file.
    pub fn open_volatile(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_connection(Connection::open(path.as_ref())?, Retention::Volatile)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, Retention::Durable)
    }

    pub fn volatile_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, Retention::Volatile)
    }

    fn with_connection(conn: Connection, retention: Retention) -> Result<Self> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                expires_at INTEGER
            )",
            retention.table()
        ))?;
        Ok(Self {
            conn: Mutex::new(conn),
            retention,
        })
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl CacheTier for SqliteCacheTier {
    fn name(&self) -> &str {
        self.retention.name()
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let table = self.retention.table();
        let slot = conn
            .query_row(
                &format!("SELECT value, expires_at FROM {} WHERE key = ?1", table),
                params![key],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?)),
            )
            .optional()?;

        match slot {
            Some((_, Some(expires_at))) if now_millis() >= expires_at => {
                conn.execute(
                    &format!("DELETE FROM {} WHERE key = ?1", table),
                    params![key],
                )?;
                tracing::debug!("{} tier evicted expired {}", self.name(), key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value)),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &str, expiry: Option<Duration>) -> Result<()> {
        let now = now_millis();
        let expires_at = match self.retention {
            Retention::Volatile => expiry.map(|ttl| {
                let ttl = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
                now.saturating_add(ttl)
            }),
            Retention::Durable => None,
        };

        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO {} (key, value, updated_at, expires_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                    updated_at = excluded.updated_at, expires_at = excluded.expires_at",
                self.retention.table()
            ),
            params![key, value, now, expires_at],
        )?;
        tracing::debug!("{} tier stored {} ({} bytes)", self.name(), key, value.len());
        Ok(())
    }
}
