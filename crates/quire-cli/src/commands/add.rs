use std::path::Path;

use quire_core::db::{
    BookRepository, Database, LibSqlBookRepository, LibSqlNoteRepository, NoteRepository,
};
use quire_core::models::validate_label;
use quire_core::Note;

use crate::commands::common::{open_database, resolve_note_content};
use crate::error::CliError;

pub async fn run_add(
    book: &str,
    content_parts: &[String],
    db_path: &Path,
) -> Result<(), CliError> {
    let content = resolve_note_content(content_parts)?;

    let db = open_database(db_path).await?;
    let note = add_note(&db, book, &content).await?;

    println!("{}", note.uuid);
    Ok(())
}

/// File a new note under `label`, creating the book when it does not exist.
pub async fn add_note(db: &Database, label: &str, content: &str) -> Result<Note, CliError> {
    let label = validate_label(label)?;

    let session = db.begin().await?;
    let outcome = async {
        let books = LibSqlBookRepository::new(session.connection());
        let book = match books.find_by_label(&label).await? {
            Some(book) => book,
            None => books.create(&label).await?,
        };
        LibSqlNoteRepository::new(session.connection())
            .create(&book.uuid, content)
            .await
    }
    .await;

    Ok(session.finish(outcome).await?)
}
