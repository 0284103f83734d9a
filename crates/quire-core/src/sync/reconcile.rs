//! Applying server state to the local replica.

use libsql::Connection;

use super::conflict::{book_conflict_block, render_body_conflict};
use super::fragment::SyncList;
use crate::client::{RemoteBook, RemoteNote};
use crate::db::{BookRepository, LibSqlBookRepository, LibSqlNoteRepository, NoteRepository};
use crate::error::{Error, Result, SyncContext};
use crate::models::{Note, CONFLICTS_BOOK_LABEL};

/// Counters for one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub books: usize,
    pub notes: usize,
    pub expunged_notes: usize,
    pub expunged_books: usize,
    pub renamed_books: usize,
    pub conflicts: usize,
}

impl std::ops::AddAssign for MergeStats {
    fn add_assign(&mut self, other: Self) {
        self.books += other.books;
        self.notes += other.notes;
        self.expunged_notes += other.expunged_notes;
        self.expunged_books += other.expunged_books;
        self.renamed_books += other.renamed_books;
        self.conflicts += other.conflicts;
    }
}

/// Apply an incremental list: every resource in it is merged.
pub async fn apply_step(conn: &Connection, list: &SyncList) -> Result<MergeStats> {
    let mut stats = MergeStats::default();

    for book in list.books.values() {
        step_sync_book(conn, book, &mut stats)
            .await
            .stage(format!("merging book {}", book.uuid))?;
    }
    for note in list.notes.values() {
        step_sync_note(conn, note, &mut stats)
            .await
            .stage(format!("merging note {}", note.uuid))?;
    }
    apply_expunged(conn, list, &mut stats).await?;

    Ok(stats)
}

/// Apply a full list: only resources the replica lacks or holds an older
/// USN for are merged.
pub async fn apply_full(conn: &Connection, list: &SyncList) -> Result<MergeStats> {
    let mut stats = MergeStats::default();

    for book in list.books.values() {
        full_sync_book(conn, book, &mut stats)
            .await
            .stage(format!("merging book {}", book.uuid))?;
    }
    for note in list.notes.values() {
        full_sync_note(conn, note, &mut stats)
            .await
            .stage(format!("merging note {}", note.uuid))?;
    }
    apply_expunged(conn, list, &mut stats).await?;

    Ok(stats)
}

async fn apply_expunged(conn: &Connection, list: &SyncList, stats: &mut MergeStats) -> Result<()> {
    let notes = LibSqlNoteRepository::new(conn);
    for uuid in &list.expunged_notes {
        let Some(local) = notes.get(uuid).await? else {
            continue;
        };
        if local.dirty {
            tracing::debug!("Keeping expunged note {uuid}: it has local changes");
            continue;
        }
        notes.hard_delete(uuid).await?;
        stats.expunged_notes += 1;
    }

    for uuid in &list.expunged_books {
        if sync_delete_book(conn, uuid)
            .await
            .stage(format!("expunging book {uuid}"))?
        {
            stats.expunged_books += 1;
        }
    }
    Ok(())
}

pub async fn step_sync_book(
    conn: &Connection,
    incoming: &RemoteBook,
    stats: &mut MergeStats,
) -> Result<()> {
    merge_book(conn, incoming, stats).await
}

pub async fn full_sync_book(
    conn: &Connection,
    incoming: &RemoteBook,
    stats: &mut MergeStats,
) -> Result<()> {
    let books = LibSqlBookRepository::new(conn);
    match books.get(&incoming.uuid).await? {
        Some(local) if incoming.usn <= local.usn => Ok(()),
        _ => merge_book(conn, incoming, stats).await,
    }
}

pub async fn step_sync_note(
    conn: &Connection,
    incoming: &RemoteNote,
    stats: &mut MergeStats,
) -> Result<()> {
    merge_note(conn, incoming, stats).await
}

pub async fn full_sync_note(
    conn: &Connection,
    incoming: &RemoteNote,
    stats: &mut MergeStats,
) -> Result<()> {
    let notes = LibSqlNoteRepository::new(conn);
    match notes.get(&incoming.uuid).await? {
        Some(local) if incoming.usn <= local.usn => Ok(()),
        _ => merge_note(conn, incoming, stats).await,
    }
}

/// Merge a server book into the replica. The server copy wins; a different
/// local book holding the same label is renamed out of the way first.
pub async fn merge_book(
    conn: &Connection,
    incoming: &RemoteBook,
    stats: &mut MergeStats,
) -> Result<()> {
    let books = LibSqlBookRepository::new(conn);
    let local = books.get(&incoming.uuid).await?;
    if local.as_ref().is_some_and(|local| local.usn >= incoming.usn) {
        return Ok(());
    }

    if !incoming.deleted {
        if let Some(existing) = books.find_by_label(&incoming.label).await? {
            if existing.uuid != incoming.uuid {
                let label = resolve_label(&books, &incoming.label).await?;
                tracing::warn!(
                    "Book label '{}' taken by server book {}; renaming local book to '{label}'",
                    incoming.label,
                    incoming.uuid
                );
                books.rename(&existing.uuid, &label).await?;
                stats.renamed_books += 1;
            }
        }
    }

    let merged = incoming.to_local();
    match local {
        Some(_) => books.overwrite(&incoming.uuid, &merged).await?,
        None => books.insert(&merged).await?,
    }
    tracing::debug!("Merged book {} (usn {})", incoming.uuid, incoming.usn);
    stats.books += 1;
    Ok(())
}

/// Lowest `{label}_N` (N >= 2) no book row uses yet.
async fn resolve_label(books: &impl BookRepository, label: &str) -> Result<String> {
    let mut suffix = 2;
    loop {
        let candidate = format!("{label}_{suffix}");
        if !books.label_exists(&candidate).await? {
            return Ok(candidate);
        }
        suffix += 1;
    }
}

/// Merge a server note into the replica.
pub async fn merge_note(
    conn: &Connection,
    incoming: &RemoteNote,
    stats: &mut MergeStats,
) -> Result<()> {
    let notes = LibSqlNoteRepository::new(conn);
    let books = LibSqlBookRepository::new(conn);

    let local = notes.get(&incoming.uuid).await?;
    if local.as_ref().is_some_and(|local| local.usn >= incoming.usn) {
        return Ok(());
    }

    match books.get(&incoming.book_uuid).await? {
        Some(book) if book.deleted => {
            tracing::debug!(
                "Skipping note {}: book {} is deleted locally",
                incoming.uuid,
                book.uuid
            );
            return Ok(());
        }
        Some(_) => {}
        None if incoming.deleted && local.is_none() => return Ok(()),
        None if incoming.deleted => {}
        None => {
            return Err(Error::InconsistentData(format!(
                "note {} references missing book {}",
                incoming.uuid, incoming.book_uuid
            )));
        }
    }

    let Some(local) = local else {
        notes.insert(&incoming.to_local()).await?;
        stats.notes += 1;
        return Ok(());
    };

    let merged = if local.deleted {
        incoming.to_local()
    } else {
        let (merged, conflicted) = merge_note_fields(conn, &local, incoming).await?;
        if conflicted {
            tracing::warn!("Conflict while merging note {}", incoming.uuid);
            stats.conflicts += 1;
        }
        merged
    };

    notes.overwrite(&merged).await?;
    tracing::debug!("Merged note {} (usn {})", incoming.uuid, incoming.usn);
    stats.notes += 1;
    Ok(())
}

/// Field by field merge of a live local note with its server copy.
///
/// Returns the merged note and whether conflict markers were written.
pub async fn merge_note_fields(
    conn: &Connection,
    local: &Note,
    incoming: &RemoteNote,
) -> Result<(Note, bool)> {
    if !local.dirty {
        return Ok((incoming.to_local(), false));
    }

    // Unpushed edits outlive a server delete; the next push revives the note
    if incoming.deleted {
        tracing::warn!(
            "Note {} was deleted on the server but has local changes; keeping it",
            local.uuid
        );
        let kept = Note {
            usn: incoming.usn,
            edited_on: local.edited_on.max(incoming.edited_on),
            deleted: false,
            dirty: true,
            ..local.clone()
        };
        return Ok((kept, false));
    }

    let mut conflicted = false;
    let mut body = if local.body == incoming.body {
        local.body.clone()
    } else {
        conflicted = true;
        render_body_conflict(&local.body, &incoming.body)
    };

    let mut book_uuid = local.book_uuid.clone();
    if local.book_uuid != incoming.book_uuid {
        let books = LibSqlBookRepository::new(conn);
        let local_label = book_label(&books, &local.book_uuid).await?;
        let server_label = book_label(&books, &incoming.book_uuid).await?;
        body = format!("{}{body}", book_conflict_block(&local_label, &server_label));
        book_uuid = conflicts_book_uuid(&books).await?;
        conflicted = true;
    }

    let merged = Note {
        uuid: local.uuid.clone(),
        book_uuid,
        body,
        added_on: local.added_on,
        edited_on: local.edited_on.max(incoming.edited_on),
        usn: incoming.usn,
        public: local.public,
        deleted: false,
        dirty: true,
    };
    Ok((merged, conflicted))
}

async fn book_label(books: &impl BookRepository, uuid: &str) -> Result<String> {
    Ok(books
        .get(uuid)
        .await?
        .map_or_else(|| uuid.to_string(), |book| book.label))
}

async fn conflicts_book_uuid(books: &impl BookRepository) -> Result<String> {
    if let Some(book) = books.find_by_label(CONFLICTS_BOOK_LABEL).await? {
        return Ok(book.uuid);
    }
    Ok(books.create(CONFLICTS_BOOK_LABEL).await?.uuid)
}

/// Remove a book the server no longer knows about.
///
/// A book still holding notes with local changes is kept and flagged so the
/// next push creates it again. Returns whether the book was removed.
pub async fn sync_delete_book(conn: &Connection, uuid: &str) -> Result<bool> {
    let books = LibSqlBookRepository::new(conn);
    let notes = LibSqlNoteRepository::new(conn);

    if books.get(uuid).await?.is_none() {
        return Ok(false);
    }

    if notes.any_dirty_in_book(uuid).await? {
        // The one place a usn moves backwards: usn 0 makes the publisher
        // create the book again instead of updating a row the server dropped
        tracing::debug!("Keeping book {uuid}: it holds notes with local changes");
        books.mark_unsynced(uuid).await?;
        return Ok(false);
    }

    notes.hard_delete_by_book(uuid).await?;
    books.hard_delete(uuid).await?;
    Ok(true)
}
