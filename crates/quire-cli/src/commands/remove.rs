use std::path::Path;

use quire_core::db::{
    BookRepository, Database, LibSqlBookRepository, LibSqlNoteRepository, NoteRepository,
};

use crate::commands::common::{
    normalize_note_identifier, open_database, resolve_book, resolve_note,
};
use crate::error::CliError;

pub async fn run_remove(
    id: Option<&str>,
    book: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;

    if let Some(label) = book {
        let uuid = remove_book(&db, label).await?;
        println!("{uuid}");
        return Ok(());
    }

    let normalized_id = normalize_note_identifier(id.unwrap_or_default())?;
    let uuid = remove_note(&db, &normalized_id).await?;
    println!("{uuid}");
    Ok(())
}

/// Soft delete a note so the next sync tells the server.
pub async fn remove_note(db: &Database, note_query: &str) -> Result<String, CliError> {
    let note = resolve_note(note_query, db).await?;
    LibSqlNoteRepository::new(db.connection())
        .mark_deleted(&note.uuid)
        .await?;
    Ok(note.uuid)
}

/// Soft delete a book together with every note filed under it.
pub async fn remove_book(db: &Database, label: &str) -> Result<String, CliError> {
    let book = resolve_book(label, db).await?;

    let session = db.begin().await?;
    let outcome = LibSqlBookRepository::new(session.connection())
        .mark_deleted(&book.uuid)
        .await;
    session.finish(outcome).await?;

    Ok(book.uuid)
}
