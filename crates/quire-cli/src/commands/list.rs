use std::path::Path;

use quire_core::db::{BookRepository, LibSqlBookRepository, LibSqlNoteRepository, NoteRepository};

use crate::commands::common::{
    book_labels, book_to_list_item, format_note_lines, note_to_list_item, open_database,
    resolve_book, BookListItem, NoteListItem,
};
use crate::error::CliError;

pub async fn run_list(
    book: Option<&str>,
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let book_uuid = match book {
        Some(label) => Some(resolve_book(label, &db).await?.uuid),
        None => None,
    };

    let notes = LibSqlNoteRepository::new(db.connection())
        .list(book_uuid.as_deref(), limit)
        .await?;
    let labels = book_labels(&db).await?;

    if as_json {
        let json_items = notes
            .iter()
            .map(|note| note_to_list_item(note, &labels))
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_note_lines(&notes, &labels) {
            println!("{line}");
        }
    }

    Ok(())
}

pub async fn run_books(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let books = LibSqlBookRepository::new(db.connection()).list().await?;

    if as_json {
        let json_items = books
            .iter()
            .map(book_to_list_item)
            .collect::<Vec<BookListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for book in &books {
            let marker = if book.dirty { "*" } else { "" };
            println!("{}{marker}", book.label);
        }
    }

    Ok(())
}
