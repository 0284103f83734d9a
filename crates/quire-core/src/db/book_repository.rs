//! Book repository implementation

use crate::error::{Error, Result};
use crate::models::{validate_label, Book};
use libsql::{params, Connection};

/// Trait for book storage operations (async)
#[allow(async_fn_in_trait)]
pub trait BookRepository {
    /// Create a new local book (dirty, never synced)
    async fn create(&self, label: &str) -> Result<Book>;

    /// Insert a fully specified book row
    async fn insert(&self, book: &Book) -> Result<()>;

    /// Get a book by uuid, including soft-deleted ones
    async fn get(&self, uuid: &str) -> Result<Option<Book>>;

    /// Find the live (non-deleted) book with the given label
    async fn find_by_label(&self, label: &str) -> Result<Option<Book>>;

    /// Whether any book row, live or deleted, carries the label
    async fn label_exists(&self, label: &str) -> Result<bool>;

    /// List live books ordered by label
    async fn list(&self) -> Result<Vec<Book>>;

    /// List every book row
    async fn list_all(&self) -> Result<Vec<Book>>;

    /// List books with unsynced local changes
    async fn list_dirty(&self) -> Result<Vec<Book>>;

    /// Rename a book and mark it dirty
    async fn rename(&self, uuid: &str, label: &str) -> Result<()>;

    /// Overwrite the synced fields of the book stored under `uuid`
    async fn overwrite(&self, uuid: &str, book: &Book) -> Result<()>;

    /// Record a server acknowledgement: new uuid, usn, and clear dirty
    async fn mark_synced(&self, uuid: &str, new_uuid: &str, usn: i64) -> Result<()>;

    /// Forget the server identity so the next push creates the book anew
    async fn mark_unsynced(&self, uuid: &str) -> Result<()>;

    /// Soft delete a book and every note filed under it
    async fn mark_deleted(&self, uuid: &str) -> Result<()>;

    /// Remove the row outright
    async fn hard_delete(&self, uuid: &str) -> Result<()>;
}

/// libSQL implementation of `BookRepository`
pub struct LibSqlBookRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlBookRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_book(row: &libsql::Row) -> Result<Book> {
        Ok(Book {
            uuid: row.get(0)?,
            label: row.get(1)?,
            usn: row.get(2)?,
            deleted: row.get::<i64>(3)? != 0,
            dirty: row.get::<i64>(4)? != 0,
        })
    }

    async fn query_books(&self, sql: &str, params: impl libsql::params::IntoParams) -> Result<Vec<Book>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut books = Vec::new();
        while let Some(row) = rows.next().await? {
            books.push(Self::parse_book(&row)?);
        }
        Ok(books)
    }
}

const BOOK_COLUMNS: &str = "uuid, label, usn, deleted, dirty";

impl BookRepository for LibSqlBookRepository<'_> {
    async fn create(&self, label: &str) -> Result<Book> {
        let label = validate_label(label)?;
        if self.find_by_label(&label).await?.is_some() {
            return Err(Error::InvalidInput(format!("book '{label}' already exists")));
        }

        let book = Book::new(label);
        self.insert(&book).await?;
        Ok(book)
    }

    async fn insert(&self, book: &Book) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO books (uuid, label, usn, deleted, dirty) VALUES (?, ?, ?, ?, ?)",
                params![
                    book.uuid.as_str(),
                    book.label.as_str(),
                    book.usn,
                    i64::from(book.deleted),
                    i64::from(book.dirty)
                ],
            )
            .await?;
        Ok(())
    }

    async fn get(&self, uuid: &str) -> Result<Option<Book>> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE uuid = ?");
        Ok(self.query_books(&sql, [uuid]).await?.into_iter().next())
    }

    async fn find_by_label(&self, label: &str) -> Result<Option<Book>> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE label = ? AND deleted = 0");
        Ok(self.query_books(&sql, [label]).await?.into_iter().next())
    }

    async fn label_exists(&self, label: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT EXISTS(SELECT 1 FROM books WHERE label = ?)",
                [label],
            )
            .await?;
        Ok(match rows.next().await? {
            Some(row) => row.get::<i64>(0)? != 0,
            None => false,
        })
    }

    async fn list(&self) -> Result<Vec<Book>> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE deleted = 0 ORDER BY label ASC");
        self.query_books(&sql, ()).await
    }

    async fn list_all(&self) -> Result<Vec<Book>> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books ORDER BY uuid ASC");
        self.query_books(&sql, ()).await
    }

    async fn list_dirty(&self) -> Result<Vec<Book>> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE dirty = 1 ORDER BY rowid ASC");
        self.query_books(&sql, ()).await
    }

    async fn rename(&self, uuid: &str, label: &str) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE books SET label = ?, dirty = 1 WHERE uuid = ?",
                [label, uuid],
            )
            .await?;
        if rows == 0 {
            return Err(Error::NotFound(format!("book {uuid}")));
        }
        Ok(())
    }

    async fn overwrite(&self, uuid: &str, book: &Book) -> Result<()> {
        self.conn
            .execute(
                "UPDATE books SET uuid = ?, label = ?, usn = ?, deleted = ? WHERE uuid = ?",
                params![
                    book.uuid.as_str(),
                    book.label.as_str(),
                    book.usn,
                    i64::from(book.deleted),
                    uuid
                ],
            )
            .await?;
        Ok(())
    }

    async fn mark_synced(&self, uuid: &str, new_uuid: &str, usn: i64) -> Result<()> {
        self.conn
            .execute(
                "UPDATE books SET uuid = ?, usn = ?, dirty = 0 WHERE uuid = ?",
                params![new_uuid, usn, uuid],
            )
            .await?;
        if new_uuid != uuid {
            self.conn
                .execute(
                    "UPDATE notes SET book_uuid = ? WHERE book_uuid = ?",
                    [new_uuid, uuid],
                )
                .await?;
        }
        Ok(())
    }

    async fn mark_unsynced(&self, uuid: &str) -> Result<()> {
        self.conn
            .execute("UPDATE books SET usn = 0, dirty = 1 WHERE uuid = ?", [uuid])
            .await?;
        Ok(())
    }

    async fn mark_deleted(&self, uuid: &str) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE books SET deleted = 1, dirty = 1 WHERE uuid = ? AND deleted = 0",
                [uuid],
            )
            .await?;
        if rows == 0 {
            return Err(Error::NotFound(format!("book {uuid}")));
        }

        let now = crate::util::now_millis();
        self.conn
            .execute(
                "UPDATE notes SET deleted = 1, dirty = 1, body = '', edited_on = ?
                 WHERE book_uuid = ? AND deleted = 0",
                params![now, uuid],
            )
            .await?;
        Ok(())
    }

    async fn hard_delete(&self, uuid: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM books WHERE uuid = ?", [uuid])
            .await?;
        Ok(())
    }
}
