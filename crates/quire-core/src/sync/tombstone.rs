//! Removing local resources the server has no trace of (full sync only).

use libsql::Connection;

use super::fragment::SyncList;
use super::reconcile::sync_delete_book;
use crate::db::{BookRepository, LibSqlBookRepository, LibSqlNoteRepository, NoteRepository};
use crate::error::{Result, SyncContext};

/// Rows removed by one cleaning pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TombstoneStats {
    pub notes: usize,
    pub books: usize,
}

/// Whether a resource the server has no record of may be dropped. Only a
/// never-synced creation still waiting for its first push is protected.
const fn is_removable(usn: i64, dirty: bool) -> bool {
    usn != 0 || !dirty
}

/// Drop every local note and book absent from a full server list.
pub async fn clean_local(conn: &Connection, list: &SyncList) -> Result<TombstoneStats> {
    let mut stats = TombstoneStats::default();

    let notes = LibSqlNoteRepository::new(conn);
    for note in notes.list_all().await? {
        if list.notes.contains_key(&note.uuid) || list.expunged_notes.contains(&note.uuid) {
            continue;
        }
        if is_removable(note.usn, note.dirty) {
            tracing::debug!("Removing note {} absent from the server", note.uuid);
            notes.hard_delete(&note.uuid).await?;
            stats.notes += 1;
        }
    }

    let books = LibSqlBookRepository::new(conn);
    for book in books.list_all().await? {
        if list.books.contains_key(&book.uuid) || list.expunged_books.contains(&book.uuid) {
            continue;
        }
        if is_removable(book.usn, book.dirty)
            && sync_delete_book(conn, &book.uuid)
                .await
                .stage(format!("removing book {}", book.uuid))?
        {
            tracing::debug!("Removed book {} absent from the server", book.uuid);
            stats.books += 1;
        }
    }

    Ok(stats)
}
