//! Sync engine: pull the server change log, reconcile it with the local
//! replica, then publish local changes, all inside one local transaction.

pub mod conflict;
pub mod fragment;
pub mod publish;
pub mod reconcile;
pub mod tombstone;

#[cfg(test)]
pub(crate) mod testing;

use libsql::Connection;

use crate::client::{DeltaClient, SyncState};
use crate::db::{
    BookRepository, Database, LibSqlBookRepository, LibSqlNoteRepository,
    LibSqlSystemRepository, NoteRepository, SyncCursor, SystemRepository, LAST_SYNC_TIME_KEY,
};
use crate::error::{Error, Result, SyncContext};

pub use fragment::{fetch_fragments, get_sync_list, SyncList};
pub use publish::{send_changes, PublishReport, PushAction, UsnRace};
pub use reconcile::MergeStats;
pub use tombstone::TombstoneStats;

/// Caller supplied knobs for one sync round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Rebuild from USN 0 regardless of the cursor
    pub full: bool,
}

/// How the pull phase of a round runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Full,
    Step { after_usn: i64 },
    UpToDate,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full sync"),
            Self::Step { after_usn } => write!(f, "step sync after usn {after_usn}"),
            Self::UpToDate => write!(f, "up to date"),
        }
    }
}

/// Pick the pull strategy for a round.
pub const fn decide_sync_mode(cursor: SyncCursor, server: &SyncState, force_full: bool) -> SyncMode {
    if force_full || cursor.last_sync_time < server.full_sync_before {
        SyncMode::Full
    } else if cursor.last_max_usn != server.max_usn {
        SyncMode::Step {
            after_usn: cursor.last_max_usn,
        }
    } else {
        SyncMode::UpToDate
    }
}

/// Summary of a committed sync round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub mode: SyncMode,
    pub merged: MergeStats,
    pub tombstones: TombstoneStats,
    pub pushed_books: usize,
    pub pushed_notes: usize,
    pub dropped_local: usize,
    /// A concurrent writer forced an extra step sync
    pub caught_up: bool,
    /// Cursor persisted by the round
    pub cursor: SyncCursor,
}

impl SyncReport {
    fn new(mode: SyncMode) -> Self {
        Self {
            mode,
            merged: MergeStats::default(),
            tombstones: TombstoneStats::default(),
            pushed_books: 0,
            pushed_notes: 0,
            dropped_local: 0,
            caught_up: false,
            cursor: SyncCursor::default(),
        }
    }

    fn add_publish(&mut self, publish: &PublishReport) {
        self.pushed_books += publish.pushed_books;
        self.pushed_notes += publish.pushed_notes;
        self.dropped_local += publish.dropped_local;
    }
}

/// Run one sync round against `client`.
///
/// Everything commits together; on error the replica, cursor included, is
/// left exactly as it was.
pub async fn sync(db: &Database, client: &impl DeltaClient, options: SyncOptions) -> Result<SyncReport> {
    let session = db.begin().await?;
    let outcome = run_round(session.connection(), client, options).await;
    let report = session.finish(outcome).await?;

    tracing::info!(
        "Sync finished ({}): {} books and {} notes merged, {} conflicts, {} books and {} notes pushed",
        report.mode,
        report.merged.books,
        report.merged.notes,
        report.merged.conflicts,
        report.pushed_books,
        report.pushed_notes
    );
    Ok(report)
}

async fn run_round(
    conn: &Connection,
    client: &impl DeltaClient,
    options: SyncOptions,
) -> Result<SyncReport> {
    let system = LibSqlSystemRepository::new(conn);
    let cursor = system.load_cursor().await.stage("reading sync cursor")?;
    let server = client
        .get_sync_state()
        .await
        .stage("fetching sync state")?;

    let mode = decide_sync_mode(cursor, &server, options.full);
    tracing::info!(
        "Starting {mode} (local usn {}, server usn {})",
        cursor.last_max_usn,
        server.max_usn
    );

    let mut report = SyncReport::new(mode);
    match mode {
        SyncMode::Full => full_sync(conn, client, &mut report)
            .await
            .stage("running full sync")?,
        SyncMode::Step { after_usn } => step_sync(conn, client, after_usn, &mut report)
            .await
            .stage("running step sync")?,
        SyncMode::UpToDate => system
            .set_int(LAST_SYNC_TIME_KEY, server.current_time)
            .await
            .stage("recording sync time")?,
    }

    let published = send_changes(conn, client)
        .await
        .stage("sending local changes")?;
    report.add_publish(&published);

    if published.is_behind {
        tracing::warn!("Fell behind another writer; running one catch-up step sync");
        report.caught_up = true;

        let after_usn = system.load_cursor().await?.last_max_usn;
        step_sync(conn, client, after_usn, &mut report)
            .await
            .stage("running catch-up step sync")?;

        if has_dirty_resources(conn).await? {
            let retry = send_changes(conn, client)
                .await
                .stage("sending catch-up changes")?;
            report.add_publish(&retry);
            if let Some(race) = retry.race {
                return Err(Error::ConcurrentWriter {
                    expected: race.expected,
                    actual: race.actual,
                });
            }
        }
    }

    report.cursor = system.load_cursor().await?;
    Ok(report)
}

/// Pull everything after `after_usn` and merge it.
async fn step_sync(
    conn: &Connection,
    client: &impl DeltaClient,
    after_usn: i64,
    report: &mut SyncReport,
) -> Result<()> {
    let list = get_sync_list(client, after_usn).await?;
    report.merged += reconcile::apply_step(conn, &list).await?;

    let system = LibSqlSystemRepository::new(conn);
    let previous = system.load_cursor().await?;
    system
        .save_cursor(SyncCursor {
            last_sync_time: list.max_current_time,
            last_max_usn: previous.last_max_usn.max(list.max_usn),
        })
        .await
}

/// Rebuild the replica's view of the server from USN 0.
async fn full_sync(conn: &Connection, client: &impl DeltaClient, report: &mut SyncReport) -> Result<()> {
    let list = get_sync_list(client, 0).await?;
    report.tombstones = tombstone::clean_local(conn, &list).await?;
    report.merged += reconcile::apply_full(conn, &list).await?;

    LibSqlSystemRepository::new(conn)
        .save_cursor(SyncCursor {
            last_sync_time: list.max_current_time,
            last_max_usn: list.max_usn,
        })
        .await
}

async fn has_dirty_resources(conn: &Connection) -> Result<bool> {
    let books = LibSqlBookRepository::new(conn).list_dirty().await?;
    if !books.is_empty() {
        return Ok(true);
    }
    Ok(!LibSqlNoteRepository::new(conn).list_dirty().await?.is_empty())
}
