//! Local store for quire

mod book_repository;
mod connection;
mod migrations;
mod note_repository;
mod system_repository;

pub use book_repository::{BookRepository, LibSqlBookRepository};
pub use connection::{Database, Session};
pub use note_repository::{LibSqlNoteRepository, NoteRepository};
pub use system_repository::{
    LibSqlSystemRepository, SyncCursor, SystemRepository, LAST_MAX_USN_KEY, LAST_SYNC_TIME_KEY,
};
