//! Pushing dirty local resources to the server.

use libsql::Connection;

use crate::client::DeltaClient;
use crate::db::{
    BookRepository, LibSqlBookRepository, LibSqlNoteRepository, LibSqlSystemRepository,
    NoteRepository, SystemRepository, LAST_MAX_USN_KEY,
};
use crate::error::{Result, SyncContext};

/// What a dirty resource needs from the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushAction {
    /// Never synced and already deleted: nothing to tell the server
    DropLocal,
    Create,
    Update,
    Delete,
}

impl PushAction {
    pub const fn for_resource(usn: i64, deleted: bool) -> Self {
        match (usn == 0, deleted) {
            (true, true) => Self::DropLocal,
            (true, false) => Self::Create,
            (false, true) => Self::Delete,
            (false, false) => Self::Update,
        }
    }
}

/// USN the publisher expected next versus the one the server assigned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsnRace {
    pub expected: i64,
    pub actual: i64,
}

/// Outcome of one publishing pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Another writer took a USN between our pushes
    pub is_behind: bool,
    /// First gap observed, when `is_behind`
    pub race: Option<UsnRace>,
    pub pushed_books: usize,
    pub pushed_notes: usize,
    pub dropped_local: usize,
}

/// Tracks `last_max_usn` while pushing and flags gaps.
struct UsnTracker<'a> {
    system: LibSqlSystemRepository<'a>,
    last_max_usn: i64,
    report: PublishReport,
}

impl<'a> UsnTracker<'a> {
    async fn load(conn: &'a Connection) -> Result<Self> {
        let system = LibSqlSystemRepository::new(conn);
        let last_max_usn = system.load_cursor().await?.last_max_usn;
        Ok(Self {
            system,
            last_max_usn,
            report: PublishReport::default(),
        })
    }

    async fn record(&mut self, usn: i64) -> Result<()> {
        let expected = self.last_max_usn + 1;
        if usn == expected {
            self.last_max_usn = usn;
            self.system.set_int(LAST_MAX_USN_KEY, usn).await?;
            return Ok(());
        }

        tracing::warn!("Server assigned usn {usn}, expected {expected}: another writer is active");
        self.report.is_behind = true;
        self.report.race.get_or_insert(UsnRace {
            expected,
            actual: usn,
        });
        Ok(())
    }
}

/// Push every dirty book, then every dirty note.
pub async fn send_changes(conn: &Connection, client: &impl DeltaClient) -> Result<PublishReport> {
    let mut tracker = UsnTracker::load(conn).await?;

    send_books(conn, client, &mut tracker).await?;
    send_notes(conn, client, &mut tracker).await?;

    let report = tracker.report;
    tracing::info!(
        "Pushed {} books and {} notes ({} dropped locally)",
        report.pushed_books,
        report.pushed_notes,
        report.dropped_local
    );
    Ok(report)
}

async fn send_books(
    conn: &Connection,
    client: &impl DeltaClient,
    tracker: &mut UsnTracker<'_>,
) -> Result<()> {
    let books = LibSqlBookRepository::new(conn);

    for book in books.list_dirty().await? {
        let stage = format!("pushing book {}", book.uuid);
        let action = PushAction::for_resource(book.usn, book.deleted);
        tracing::debug!("{action:?} book {} ({})", book.uuid, book.label);

        let usn = match action {
            PushAction::DropLocal => {
                books.hard_delete(&book.uuid).await?;
                tracker.report.dropped_local += 1;
                continue;
            }
            PushAction::Create => {
                let created = client.create_book(&book.label).await.stage(&stage)?;
                books
                    .mark_synced(&book.uuid, &created.uuid, created.usn)
                    .await?;
                created.usn
            }
            PushAction::Update => {
                let usn = client
                    .update_book(&book.uuid, &book.label)
                    .await
                    .stage(&stage)?;
                books.mark_synced(&book.uuid, &book.uuid, usn).await?;
                usn
            }
            PushAction::Delete => {
                let usn = client.delete_book(&book.uuid).await.stage(&stage)?;
                books.hard_delete(&book.uuid).await?;
                usn
            }
        };

        tracker.report.pushed_books += 1;
        tracker.record(usn).await?;
    }
    Ok(())
}

async fn send_notes(
    conn: &Connection,
    client: &impl DeltaClient,
    tracker: &mut UsnTracker<'_>,
) -> Result<()> {
    let notes = LibSqlNoteRepository::new(conn);

    for note in notes.list_dirty().await? {
        let stage = format!("pushing note {}", note.uuid);
        let action = PushAction::for_resource(note.usn, note.deleted);
        tracing::debug!("{action:?} note {}", note.uuid);

        let usn = match action {
            PushAction::DropLocal => {
                notes.hard_delete(&note.uuid).await?;
                tracker.report.dropped_local += 1;
                continue;
            }
            PushAction::Create => {
                let created = client
                    .create_note(&note.book_uuid, &note.body)
                    .await
                    .stage(&stage)?;
                notes
                    .mark_synced(&note.uuid, &created.uuid, created.usn)
                    .await?;
                created.usn
            }
            PushAction::Update => {
                let usn = client
                    .update_note(&note.uuid, &note.book_uuid, &note.body, note.public)
                    .await
                    .stage(&stage)?;
                notes.mark_synced(&note.uuid, &note.uuid, usn).await?;
                usn
            }
            PushAction::Delete => {
                let usn = client.delete_note(&note.uuid).await.stage(&stage)?;
                notes.hard_delete(&note.uuid).await?;
                usn
            }
        };

        tracker.report.pushed_notes += 1;
        tracker.record(usn).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, SyncCursor};
    use crate::sync::testing::{local_book, local_note, FakeDeltaClient};
    use pretty_assertions::assert_eq;

    async fn setup(last_max_usn: i64) -> Database {
        let db = Database::open_in_memory().await.unwrap();
        LibSqlSystemRepository::new(db.connection())
            .save_cursor(SyncCursor {
                last_sync_time: 1,
                last_max_usn,
            })
            .await
            .unwrap();
        db
    }

    async fn last_max_usn(db: &Database) -> i64 {
        LibSqlSystemRepository::new(db.connection())
            .load_cursor()
            .await
            .unwrap()
            .last_max_usn
    }

    #[test]
    fn push_action_table() {
        assert_eq!(PushAction::for_resource(0, true), PushAction::DropLocal);
        assert_eq!(PushAction::for_resource(0, false), PushAction::Create);
        assert_eq!(PushAction::for_resource(4, true), PushAction::Delete);
        assert_eq!(PushAction::for_resource(4, false), PushAction::Update);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn creates_rewrite_uuids_books_first() {
        let db = setup(0).await;
        let client = FakeDeltaClient::new();
        let books = LibSqlBookRepository::new(db.connection());
        let notes = LibSqlNoteRepository::new(db.connection());

        let book = books.create("js").await.unwrap();
        let note = notes.create(&book.uuid, "closures").await.unwrap();

        let report = send_changes(db.connection(), &client).await.unwrap();

        assert!(!report.is_behind);
        assert_eq!(report.pushed_books, 1);
        assert_eq!(report.pushed_notes, 1);
        assert_eq!(client.calls(), vec!["create_book js", "create_note server-1"]);

        assert!(books.get(&book.uuid).await.unwrap().is_none());
        let synced_book = books.get("server-1").await.unwrap().unwrap();
        assert_eq!(synced_book.usn, 1);
        assert!(!synced_book.dirty);

        assert!(notes.get(&note.uuid).await.unwrap().is_none());
        let synced_note = notes.get("server-2").await.unwrap().unwrap();
        assert_eq!(synced_note.book_uuid, "server-1");
        assert_eq!(synced_note.usn, 2);
        assert!(!synced_note.dirty);

        assert_eq!(last_max_usn(&db).await, 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn deletes_and_local_drops() {
        let db = setup(5).await;
        let client = FakeDeltaClient::new();
        client.seed_book("b1", "js");
        client.seed_note("n1", "b1", "old");
        client.advance_usn_to(5);

        let books = LibSqlBookRepository::new(db.connection());
        let notes = LibSqlNoteRepository::new(db.connection());
        books.insert(&local_book("b1", "js", 1, false)).await.unwrap();
        notes
            .insert(&local_note("n1", "b1", "old", 2, false))
            .await
            .unwrap();
        notes.mark_deleted("n1").await.unwrap();
        let draft = notes.create("b1", "never pushed").await.unwrap();
        notes.mark_deleted(&draft.uuid).await.unwrap();

        let report = send_changes(db.connection(), &client).await.unwrap();

        assert_eq!(report.pushed_notes, 1);
        assert_eq!(report.dropped_local, 1);
        assert_eq!(client.calls(), vec!["delete_note n1"]);
        assert!(notes.get("n1").await.unwrap().is_none());
        assert!(notes.get(&draft.uuid).await.unwrap().is_none());
        assert!(client.note("n1").unwrap().deleted);
        assert_eq!(last_max_usn(&db).await, 6);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn usn_gap_marks_behind_without_advancing_cursor() {
        let db = setup(0).await;
        let client = FakeDeltaClient::new();
        client.seed_book("b1", "js");
        client.seed_note("n1", "b1", "v1");
        client.advance_usn_to(10);

        let books = LibSqlBookRepository::new(db.connection());
        let notes = LibSqlNoteRepository::new(db.connection());
        books.insert(&local_book("b1", "js", 1, false)).await.unwrap();
        notes
            .insert(&local_note("n1", "b1", "v1", 2, false))
            .await
            .unwrap();
        notes.update_body("n1", "v2").await.unwrap();

        LibSqlSystemRepository::new(db.connection())
            .set_int(LAST_MAX_USN_KEY, 10)
            .await
            .unwrap();
        client.inject_concurrent_writes(["other"]);

        let report = send_changes(db.connection(), &client).await.unwrap();

        assert!(report.is_behind);
        assert_eq!(
            report.race,
            Some(UsnRace {
                expected: 11,
                actual: 12
            })
        );
        assert_eq!(last_max_usn(&db).await, 10);

        let pushed = notes.get("n1").await.unwrap().unwrap();
        assert_eq!(pushed.usn, 12);
        assert!(!pushed.dirty);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn client_failure_surfaces_with_stage() {
        let db = setup(0).await;
        let client = FakeDeltaClient::new();
        client.fail_on("create_book");

        LibSqlBookRepository::new(db.connection())
            .create("js")
            .await
            .unwrap();

        let error = send_changes(db.connection(), &client).await.unwrap_err();
        assert!(error.to_string().contains("pushing book"));
        assert!(matches!(error.root(), crate::Error::Client(_)));
    }
}
