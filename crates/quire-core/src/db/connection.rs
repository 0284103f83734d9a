//! Database connection management

use crate::error::Result;
use libsql::{Builder, Connection, Database as LibSqlDatabase, Transaction};
use std::ops::Deref;
use std::path::Path;

use super::migrations;

/// Database wrapper for a local libSQL replica
pub struct Database {
    _db: LibSqlDatabase,
    conn: Connection,
}

impl Database {
    /// Open a local database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        Self::from_libsql(db).await
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::from_libsql(db).await
    }

    async fn from_libsql(db: LibSqlDatabase) -> Result<Self> {
        let conn = db.connect()?;
        let database = Self { _db: db, conn };
        database.configure().await?;
        migrations::run(&database.conn).await?;
        Ok(database)
    }

    /// Configure `SQLite` for a single-writer local replica
    async fn configure(&self) -> Result<()> {
        // In-memory databases reject WAL; ignore the error there
        self.conn
            .execute("PRAGMA journal_mode = WAL;", ())
            .await
            .ok();
        self.conn
            .execute("PRAGMA synchronous = NORMAL;", ())
            .await
            .ok();
        Ok(())
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Open a unit of work spanning everything until [`Session::finish`].
    pub async fn begin(&self) -> Result<Session> {
        let tx = self.conn.transaction().await?;
        Ok(Session { tx })
    }
}

/// One open local transaction.
///
/// `finish` is the single commit point. Dropping a session without finishing
/// it rolls the transaction back, so an early `?` never leaves partial work.
pub struct Session {
    tx: Transaction,
}

impl Session {
    /// Connection scoped to this transaction
    pub fn connection(&self) -> &Connection {
        &self.tx
    }

    /// Commit when `outcome` is `Ok`, roll back otherwise, and hand the
    /// outcome back to the caller.
    pub async fn finish<T>(self, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.tx.commit().await?;
                Ok(value)
            }
            Err(error) => {
                if let Err(rollback_error) = self.tx.rollback().await {
                    tracing::warn!("Rollback failed after error ({error}): {rollback_error}");
                }
                Err(error)
            }
        }
    }
}

impl Deref for Session {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.tx
    }
}
