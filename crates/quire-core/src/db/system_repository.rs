//! System key/value repository (sync cursor)

use crate::error::{Error, Result};
use libsql::Connection;

/// Server wall-clock time of the last successful sync
pub const LAST_SYNC_TIME_KEY: &str = "last_sync_time";
/// Highest USN the replica has fully absorbed
pub const LAST_MAX_USN_KEY: &str = "last_max_usn";

/// Persisted sync cursor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCursor {
    pub last_sync_time: i64,
    pub last_max_usn: i64,
}

/// Trait for system table operations (async)
#[allow(async_fn_in_trait)]
pub trait SystemRepository {
    /// Read an integer value, `None` when the key was never written
    async fn get_int(&self, key: &str) -> Result<Option<i64>>;

    /// Write an integer value
    async fn set_int(&self, key: &str, value: i64) -> Result<()>;

    /// Load the sync cursor; missing keys read as zero
    async fn load_cursor(&self) -> Result<SyncCursor> {
        Ok(SyncCursor {
            last_sync_time: self.get_int(LAST_SYNC_TIME_KEY).await?.unwrap_or(0),
            last_max_usn: self.get_int(LAST_MAX_USN_KEY).await?.unwrap_or(0),
        })
    }

    /// Persist the sync cursor
    async fn save_cursor(&self, cursor: SyncCursor) -> Result<()> {
        self.set_int(LAST_SYNC_TIME_KEY, cursor.last_sync_time)
            .await?;
        self.set_int(LAST_MAX_USN_KEY, cursor.last_max_usn).await
    }
}

/// libSQL implementation of `SystemRepository`
pub struct LibSqlSystemRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSystemRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SystemRepository for LibSqlSystemRepository<'_> {
    async fn get_int(&self, key: &str) -> Result<Option<i64>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM system WHERE key = ?", [key])
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let value: String = row.get(0)?;
        value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Database(format!("system key '{key}' is not an integer: {value}")))
    }

    async fn set_int(&self, key: &str, value: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO system (key, value) VALUES (?, ?)",
                [key, value.to_string().as_str()],
            )
            .await?;
        Ok(())
    }
}
