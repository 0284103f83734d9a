use std::path::Path;

use quire_core::db::{LibSqlNoteRepository, NoteRepository};

use crate::commands::common::{
    capture_editor_input_with_initial, normalize_note_identifier, open_database, resolve_note,
};
use crate::error::CliError;

pub async fn run_edit(id: &str, db_path: &Path) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let db = open_database(db_path).await?;
    let note = resolve_note(&normalized_id, &db).await?;

    let Some(edited_content) = capture_editor_input_with_initial(&note.body)? else {
        return Err(CliError::EmptyEditedContent);
    };

    if edited_content == note.body {
        println!("{}", note.uuid);
        return Ok(());
    }

    let updated = LibSqlNoteRepository::new(db.connection())
        .update_body(&note.uuid, &edited_content)
        .await?;
    println!("{}", updated.uuid);
    Ok(())
}
