//! Note repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use crate::error::{Error, Result};
use crate::models::Note;
use libsql::{params, Connection};

/// Trait for note storage operations (async)
#[allow(async_fn_in_trait)]
pub trait NoteRepository {
    /// Create a new local note (dirty, never synced)
    async fn create(&self, book_uuid: &str, body: &str) -> Result<Note>;

    /// Insert a fully specified note row
    async fn insert(&self, note: &Note) -> Result<()>;

    /// Get a note by uuid, including soft-deleted ones
    async fn get(&self, uuid: &str) -> Result<Option<Note>>;

    /// List live notes, most recently edited first
    async fn list(&self, book_uuid: Option<&str>, limit: usize) -> Result<Vec<Note>>;

    /// List every note row
    async fn list_all(&self) -> Result<Vec<Note>>;

    /// List notes with unsynced local changes
    async fn list_dirty(&self) -> Result<Vec<Note>>;

    /// List live note uuids starting with `prefix`
    async fn list_uuids_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<String>>;

    /// Whether any note filed under the book has unsynced changes
    async fn any_dirty_in_book(&self, book_uuid: &str) -> Result<bool>;

    /// Edit the body locally and mark the note dirty
    async fn update_body(&self, uuid: &str, body: &str) -> Result<Note>;

    /// Overwrite every field of the note stored under `note.uuid`
    async fn overwrite(&self, note: &Note) -> Result<()>;

    /// Record a server acknowledgement: new uuid, usn, and clear dirty
    async fn mark_synced(&self, uuid: &str, new_uuid: &str, usn: i64) -> Result<()>;

    /// Soft delete: empty body, flag deleted and dirty
    async fn mark_deleted(&self, uuid: &str) -> Result<()>;

    /// Remove the row outright
    async fn hard_delete(&self, uuid: &str) -> Result<()>;

    /// Remove every note filed under the book
    async fn hard_delete_by_book(&self, book_uuid: &str) -> Result<()>;
}

/// libSQL implementation of `NoteRepository`
pub struct LibSqlNoteRepository<'a> {
    conn: &'a Connection,
}

const NOTE_COLUMNS: &str = "uuid, book_uuid, body, added_on, edited_on, usn, public, deleted, dirty";

impl<'a> LibSqlNoteRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a note from a database row
    fn parse_note(row: &libsql::Row) -> Result<Note> {
        Ok(Note {
            uuid: row.get(0)?,
            book_uuid: row.get(1)?,
            body: row.get(2)?,
            added_on: row.get(3)?,
            edited_on: row.get(4)?,
            usn: row.get(5)?,
            public: row.get::<i64>(6)? != 0,
            deleted: row.get::<i64>(7)? != 0,
            dirty: row.get::<i64>(8)? != 0,
        })
    }

    async fn query_notes(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<Note>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next().await? {
            notes.push(Self::parse_note(&row)?);
        }
        Ok(notes)
    }
}

impl NoteRepository for LibSqlNoteRepository<'_> {
    async fn create(&self, book_uuid: &str, body: &str) -> Result<Note> {
        if body.trim().is_empty() {
            return Err(Error::InvalidInput("note body cannot be empty".to_string()));
        }

        let note = Note::new(book_uuid, body);
        self.insert(&note).await?;
        Ok(note)
    }

    async fn insert(&self, note: &Note) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO notes (uuid, book_uuid, body, added_on, edited_on, usn, public, deleted, dirty)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    note.uuid.as_str(),
                    note.book_uuid.as_str(),
                    note.body.as_str(),
                    note.added_on,
                    note.edited_on,
                    note.usn,
                    i64::from(note.public),
                    i64::from(note.deleted),
                    i64::from(note.dirty)
                ],
            )
            .await?;
        Ok(())
    }

    async fn get(&self, uuid: &str) -> Result<Option<Note>> {
        let sql = format!("SELECT {NOTE_COLUMNS} FROM notes WHERE uuid = ?");
        Ok(self.query_notes(&sql, [uuid]).await?.into_iter().next())
    }

    async fn list(&self, book_uuid: Option<&str>, limit: usize) -> Result<Vec<Note>> {
        let order = "ORDER BY MAX(added_on, edited_on) DESC LIMIT ?";
        let limit = limit as i64;
        match book_uuid {
            Some(book_uuid) => {
                let sql = format!(
                    "SELECT {NOTE_COLUMNS} FROM notes WHERE deleted = 0 AND book_uuid = ? {order}"
                );
                self.query_notes(&sql, params![book_uuid, limit])
                    .await
            }
            None => {
                let sql = format!("SELECT {NOTE_COLUMNS} FROM notes WHERE deleted = 0 {order}");
                self.query_notes(&sql, [limit]).await
            }
        }
    }

    async fn list_all(&self) -> Result<Vec<Note>> {
        let sql = format!("SELECT {NOTE_COLUMNS} FROM notes ORDER BY uuid ASC");
        self.query_notes(&sql, ()).await
    }

    async fn list_dirty(&self) -> Result<Vec<Note>> {
        let sql = format!("SELECT {NOTE_COLUMNS} FROM notes WHERE dirty = 1 ORDER BY rowid ASC");
        self.query_notes(&sql, ()).await
    }

    async fn list_uuids_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<String>> {
        let pattern = format!("{}%", prefix.replace(['%', '_'], ""));
        let limit = limit as i64;
        let mut rows = self
            .conn
            .query(
                "SELECT uuid FROM notes WHERE deleted = 0 AND uuid LIKE ? ORDER BY uuid LIMIT ?",
                params![pattern, limit],
            )
            .await?;

        let mut uuids = Vec::new();
        while let Some(row) = rows.next().await? {
            uuids.push(row.get::<String>(0)?);
        }
        Ok(uuids)
    }

    async fn any_dirty_in_book(&self, book_uuid: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT EXISTS(SELECT 1 FROM notes WHERE book_uuid = ? AND dirty = 1)",
                [book_uuid],
            )
            .await?;
        Ok(match rows.next().await? {
            Some(row) => row.get::<i64>(0)? != 0,
            None => false,
        })
    }

    async fn update_body(&self, uuid: &str, body: &str) -> Result<Note> {
        if body.trim().is_empty() {
            return Err(Error::InvalidInput("note body cannot be empty".to_string()));
        }

        let now = crate::util::now_millis();
        let rows = self
            .conn
            .execute(
                "UPDATE notes SET body = ?, edited_on = ?, dirty = 1 WHERE uuid = ? AND deleted = 0",
                params![body, now, uuid],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("note {uuid}")));
        }

        self.get(uuid)
            .await?
            .ok_or_else(|| Error::NotFound(format!("note {uuid}")))
    }

    async fn overwrite(&self, note: &Note) -> Result<()> {
        self.conn
            .execute(
                "UPDATE notes SET book_uuid = ?, body = ?, added_on = ?, edited_on = ?, usn = ?,
                 public = ?, deleted = ?, dirty = ? WHERE uuid = ?",
                params![
                    note.book_uuid.as_str(),
                    note.body.as_str(),
                    note.added_on,
                    note.edited_on,
                    note.usn,
                    i64::from(note.public),
                    i64::from(note.deleted),
                    i64::from(note.dirty),
                    note.uuid.as_str()
                ],
            )
            .await?;
        Ok(())
    }

    async fn mark_synced(&self, uuid: &str, new_uuid: &str, usn: i64) -> Result<()> {
        self.conn
            .execute(
                "UPDATE notes SET uuid = ?, usn = ?, dirty = 0 WHERE uuid = ?",
                params![new_uuid, usn, uuid],
            )
            .await?;
        Ok(())
    }

    async fn mark_deleted(&self, uuid: &str) -> Result<()> {
        let now = crate::util::now_millis();
        let rows = self
            .conn
            .execute(
                "UPDATE notes SET deleted = 1, dirty = 1, body = '', edited_on = ?
                 WHERE uuid = ? AND deleted = 0",
                params![now, uuid],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("note {uuid}")));
        }
        Ok(())
    }

    async fn hard_delete(&self, uuid: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM notes WHERE uuid = ?", [uuid])
            .await?;
        Ok(())
    }

    async fn hard_delete_by_book(&self, book_uuid: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM notes WHERE book_uuid = ?", [book_uuid])
            .await?;
        Ok(())
    }
}
