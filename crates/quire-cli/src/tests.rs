use std::path::PathBuf;

use pretty_assertions::assert_eq;
use quire_core::db::{
    BookRepository, Database, LibSqlBookRepository, LibSqlNoteRepository, NoteRepository, SyncCursor,
};
use quire_core::sync::{MergeStats, SyncMode, SyncReport, TombstoneStats};
use quire_core::{Book, Note};
use tempfile::TempDir;

use crate::commands::add::add_note;
use crate::commands::common::{
    book_labels, default_editor, format_note_lines, format_relative_time, normalize_content,
    normalize_note_identifier, note_preview, open_database, resolve_book, resolve_db_path,
    resolve_note,
};
use crate::commands::config::merge_config_values;
use crate::commands::list::run_list;
use crate::commands::remove::{remove_book, remove_note};
use crate::commands::sync::format_sync_report;
use crate::config::CliConfig;
use crate::error::CliError;

#[test]
fn normalize_content_trims_and_rejects_empty() {
    assert_eq!(normalize_content("  hello  "), Some("hello".to_string()));
    assert_eq!(normalize_content(" \n\t "), None);
}

#[test]
fn normalize_content_keeps_multiline_text() {
    assert_eq!(
        normalize_content("line 1\nline 2\n"),
        Some("line 1\nline 2".to_string())
    );
}

#[test]
fn default_editor_is_defined() {
    assert!(!default_editor().is_empty());
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
}

#[test]
fn note_preview_truncates_with_ellipsis() {
    let note = Note::new("book", "a fairly long first line\nsecond line");
    assert_eq!(note_preview(&note, 10), "a fairl...");
    assert_eq!(note_preview(&note, 80), "a fairly long first line");
}

#[test]
fn normalize_note_identifier_rejects_empty() {
    assert!(matches!(
        normalize_note_identifier("   "),
        Err(CliError::EmptyNoteId)
    ));
    assert_eq!(normalize_note_identifier(" abc ").unwrap(), "abc");
}

#[test]
fn resolve_db_path_prefers_explicit_path() {
    let explicit = PathBuf::from("/tmp/explicit-quire.db");
    assert_eq!(resolve_db_path(Some(explicit.clone())).unwrap(), explicit);
}

#[test]
fn merge_config_values_keeps_stored_values_unless_overridden() {
    let stored = CliConfig {
        api_endpoint: Some("https://old.example.com".to_string()),
        api_key: Some("old-key".to_string()),
        ..CliConfig::default()
    };

    let merged = merge_config_values(
        stored,
        Some(" https://api.example.com/ ".to_string()),
        None,
        Some(5),
    );

    assert_eq!(merged.api_endpoint.as_deref(), Some("https://api.example.com"));
    assert_eq!(merged.api_key.as_deref(), Some("old-key"));
    assert_eq!(merged.timeout_secs, 5);
}

#[test]
fn format_sync_report_lists_only_nonzero_counts() {
    let report = SyncReport {
        mode: SyncMode::Step { after_usn: 4 },
        merged: MergeStats {
            notes: 2,
            conflicts: 1,
            ..MergeStats::default()
        },
        tombstones: TombstoneStats::default(),
        pushed_books: 0,
        pushed_notes: 1,
        dropped_local: 0,
        caught_up: false,
        cursor: SyncCursor::default(),
    };

    assert_eq!(
        format_sync_report(&report),
        vec![
            "Sync completed (step sync after usn 4)".to_string(),
            "  pulled 0 books and 2 notes".to_string(),
            "  pushed 0 books and 1 notes".to_string(),
            "  1 notes have conflicts to resolve by hand".to_string(),
        ]
    );
}

#[tokio::test(flavor = "current_thread")]
async fn add_note_creates_book_once() {
    let (_dir, db) = temp_database().await;

    let first = add_note(&db, "rust", "ownership").await.unwrap();
    let second = add_note(&db, " rust ", "borrowing").await.unwrap();
    assert_eq!(first.book_uuid, second.book_uuid);

    let books = LibSqlBookRepository::new(db.connection()).list().await.unwrap();
    assert_eq!(books.len(), 1);
    assert!(books[0].dirty);
    assert_eq!(books[0].usn, 0);
}

#[tokio::test(flavor = "current_thread")]
async fn add_note_rejects_label_with_whitespace() {
    let (_dir, db) = temp_database().await;

    let error = add_note(&db, "two words", "body").await.unwrap_err();
    assert!(matches!(error, CliError::Core(quire_core::Error::InvalidInput(_))));
}

#[tokio::test(flavor = "current_thread")]
async fn resolve_note_supports_exact_and_prefix_id() {
    let (_dir, db) = temp_database().await;
    seed_note(&db, "11111111-1111-7111-8111-111111111111", "Note A").await;
    seed_note(&db, "11111111-1111-7111-8111-222222222222", "Note B").await;

    let by_exact = resolve_note("11111111-1111-7111-8111-111111111111", &db)
        .await
        .unwrap();
    assert_eq!(by_exact.body, "Note A");

    let by_prefix = resolve_note("11111111-1111-7111-8111-2", &db).await.unwrap();
    assert_eq!(by_prefix.body, "Note B");
}

#[tokio::test(flavor = "current_thread")]
async fn resolve_note_rejects_ambiguous_prefix() {
    let (_dir, db) = temp_database().await;
    seed_note(&db, "aaaaaaaa-aaaa-7aaa-8aaa-aaaaaaaaaaaa", "Left").await;
    seed_note(&db, "aaaaaaaa-aaaa-7aaa-8aaa-bbbbbbbbbbbb", "Right").await;

    let error = resolve_note("aaaaaaaa-aaaa-7aaa-8aaa", &db).await.unwrap_err();
    assert!(matches!(error, CliError::AmbiguousNoteId(_)));
}

#[tokio::test(flavor = "current_thread")]
async fn resolve_note_rejects_missing_note() {
    let (_dir, db) = temp_database().await;

    let error = resolve_note("does-not-exist", &db).await.unwrap_err();
    assert!(matches!(error, CliError::NoteNotFound(_)));
}

#[tokio::test(flavor = "current_thread")]
async fn remove_note_soft_deletes_by_prefix() {
    let (_dir, db) = temp_database().await;
    seed_note(&db, "cccccccc-cccc-7ccc-8ccc-cccccccccccc", "Gone soon").await;

    let uuid = remove_note(&db, "cccccccc").await.unwrap();
    assert_eq!(uuid, "cccccccc-cccc-7ccc-8ccc-cccccccccccc");

    let note = LibSqlNoteRepository::new(db.connection())
        .get(&uuid)
        .await
        .unwrap()
        .unwrap();
    assert!(note.deleted);
    assert!(note.dirty);

    let error = resolve_note("cccccccc", &db).await.unwrap_err();
    assert!(matches!(error, CliError::NoteNotFound(_)));
}

#[tokio::test(flavor = "current_thread")]
async fn remove_book_soft_deletes_its_notes() {
    let (_dir, db) = temp_database().await;
    let note = add_note(&db, "scratch", "temporary").await.unwrap();

    remove_book(&db, "scratch").await.unwrap();

    let error = resolve_book("scratch", &db).await.unwrap_err();
    assert!(matches!(error, CliError::BookNotFound(_)));

    let stored = LibSqlNoteRepository::new(db.connection())
        .get(&note.uuid)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.deleted);
    assert_eq!(stored.body, "");
}

#[tokio::test(flavor = "current_thread")]
async fn format_note_lines_show_book_label() {
    let (_dir, db) = temp_database().await;
    add_note(&db, "ideas", "Build a sync engine").await.unwrap();

    let notes = LibSqlNoteRepository::new(db.connection())
        .list(None, 10)
        .await
        .unwrap();
    let labels = book_labels(&db).await.unwrap();
    let lines = format_note_lines(&notes, &labels);

    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("ideas"));
    assert!(lines[0].contains("Build a sync engine"));
}

#[tokio::test(flavor = "current_thread")]
async fn run_list_rejects_unknown_book() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("quire.db");

    let error = run_list(Some("missing"), 10, false, &db_path)
        .await
        .unwrap_err();
    assert!(matches!(error, CliError::BookNotFound(_)));
    assert!(db_path.exists());
}

async fn temp_database() -> (TempDir, Database) {
    let dir = TempDir::new().unwrap();
    let db = open_database(&dir.path().join("quire.db")).await.unwrap();
    (dir, db)
}

async fn seed_note(db: &Database, uuid: &str, body: &str) {
    let books = LibSqlBookRepository::new(db.connection());
    let book = match books.find_by_label("inbox").await.unwrap() {
        Some(book) => book,
        None => {
            let book = Book::new("inbox");
            books.insert(&book).await.unwrap();
            book
        }
    };

    let mut note = Note::new(book.uuid, body);
    note.uuid = uuid.to_string();
    LibSqlNoteRepository::new(db.connection())
        .insert(&note)
        .await
        .unwrap();
}
