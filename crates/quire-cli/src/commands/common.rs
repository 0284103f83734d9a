use std::collections::HashMap;
use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use quire_core::db::{
    BookRepository, Database, LibSqlBookRepository, LibSqlNoteRepository, NoteRepository,
};
use quire_core::util::now_millis;
use quire_core::{Book, Note};
use serde::Serialize;

use crate::error::CliError;

pub const DB_PATH_ENV: &str = "QUIRE_DB_PATH";

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub uuid: String,
    pub book: String,
    pub preview: String,
    pub body: String,
    pub added_on: i64,
    pub edited_on: i64,
    pub relative_time: String,
    pub dirty: bool,
}

#[derive(Debug, Serialize)]
pub struct BookListItem {
    pub uuid: String,
    pub label: String,
    pub usn: i64,
    pub dirty: bool,
}

pub async fn resolve_note(note_query: &str, db: &Database) -> Result<Note, CliError> {
    let repo = LibSqlNoteRepository::new(db.connection());
    if let Some(note) = repo.get(note_query).await? {
        if !note.deleted {
            return Ok(note);
        }
    }

    let matching_ids = repo.list_uuids_by_prefix(note_query, 3).await?;

    match matching_ids.as_slice() {
        [] => Err(CliError::NoteNotFound(note_query.to_string())),
        [uuid] => repo
            .get(uuid)
            .await?
            .ok_or_else(|| CliError::NoteNotFound(note_query.to_string())),
        _ => {
            let options = matching_ids
                .iter()
                .map(|id| short_id(id))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousNoteId(format!(
                "ID prefix '{note_query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub async fn resolve_book(label: &str, db: &Database) -> Result<Book, CliError> {
    LibSqlBookRepository::new(db.connection())
        .find_by_label(label.trim())
        .await?
        .ok_or_else(|| CliError::BookNotFound(label.trim().to_string()))
}

/// Labels of every book, keyed by uuid
pub async fn book_labels(db: &Database) -> Result<HashMap<String, String>, CliError> {
    let books = LibSqlBookRepository::new(db.connection()).list_all().await?;
    Ok(books
        .into_iter()
        .map(|book| (book.uuid, book.label))
        .collect())
}

fn short_id(id: &str) -> String {
    id.chars().take(13).collect()
}

fn note_timestamp(note: &Note) -> i64 {
    note.added_on.max(note.edited_on)
}

pub fn format_note_lines(notes: &[Note], labels: &HashMap<String, String>) -> Vec<String> {
    let now_ms = now_millis();
    notes
        .iter()
        .map(|note| {
            let short_id = short_id(&note.uuid);
            let book = labels.get(&note.book_uuid).map_or("?", String::as_str);
            let preview = note_preview(note, 40);
            let relative_time = format_relative_time(note_timestamp(note), now_ms);
            let marker = if note.dirty { "*" } else { " " };

            format!("{short_id:<13}{marker} {book:<12}  {preview:<40}  {relative_time}")
        })
        .collect()
}

pub fn note_to_list_item(note: &Note, labels: &HashMap<String, String>) -> NoteListItem {
    let now_ms = now_millis();

    NoteListItem {
        uuid: note.uuid.clone(),
        book: labels.get(&note.book_uuid).cloned().unwrap_or_default(),
        preview: note_preview(note, 80),
        body: note.body.clone(),
        added_on: note.added_on,
        edited_on: note.edited_on,
        relative_time: format_relative_time(note_timestamp(note), now_ms),
        dirty: note.dirty,
    }
}

pub fn book_to_list_item(book: &Book) -> BookListItem {
    BookListItem {
        uuid: book.uuid.clone(),
        label: book.label.clone(),
        usn: book.usn,
        dirty: book.dirty,
    }
}

pub fn note_preview(note: &Note, max_chars: usize) -> String {
    let first_line = note.title_preview(usize::MAX);
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

const MINUTE_MS: i64 = 60_000;

/// Coarsest unit first, so the first fitting unit wins.
const RELATIVE_TIME_UNITS: [(i64, &str); 6] = [
    (365 * 24 * 60 * MINUTE_MS, "y"),
    (30 * 24 * 60 * MINUTE_MS, "mo"),
    (7 * 24 * 60 * MINUTE_MS, "w"),
    (24 * 60 * MINUTE_MS, "d"),
    (60 * MINUTE_MS, "h"),
    (MINUTE_MS, "m"),
];

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let elapsed = now_ms.saturating_sub(timestamp_ms);
    RELATIVE_TIME_UNITS
        .iter()
        .find(|(unit_ms, _)| elapsed >= *unit_ms)
        .map_or_else(
            || "just now".to_string(),
            |(unit_ms, suffix)| format!("{}{suffix} ago", elapsed / unit_ms),
        )
}

pub fn resolve_note_content(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }

    if let Some(content) = capture_editor_input()? {
        return Ok(content);
    }

    Err(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    normalize_content(id).ok_or(CliError::EmptyNoteId)
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input() -> Result<Option<String>, CliError> {
    capture_editor_input_with_initial("")
}

/// Open `initial_content` in the user's editor and return what was saved.
pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let scratch_path = scratch_note_path();
    std::fs::write(&scratch_path, initial_content)?;

    let edited = launch_editor(&preferred_editor(), &scratch_path)
        .and_then(|()| std::fs::read_to_string(&scratch_path).map_err(CliError::from));
    let _ = std::fs::remove_file(&scratch_path);

    Ok(normalize_content(&edited?))
}

/// Run `editor` on `file_path`. The editor value may carry arguments,
/// e.g. `code --wait`.
pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    let mut words = editor.split_whitespace();
    let program = words
        .next()
        .ok_or_else(|| CliError::EditorFailed("editor command is empty".to_string()))?;

    let status = Command::new(program)
        .args(words)
        .arg(file_path)
        .status()
        .map_err(|error| CliError::EditorFailed(format!("cannot start `{editor}`: {error}")))?;
    if status.success() {
        Ok(())
    } else {
        Err(CliError::EditorFailed(format!("`{editor}` exited with {status}")))
    }
}

pub fn preferred_editor() -> String {
    ["VISUAL", "EDITOR"]
        .iter()
        .find_map(|key| quire_core::util::normalize_text_option(env::var(key).ok()))
        .unwrap_or_else(|| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

fn scratch_note_path() -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos());
    env::temp_dir().join(format!("quire-note-{}-{nanos}.md", std::process::id()))
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os(DB_PATH_ENV).map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("quire").join("quire.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

pub async fn open_database(path: &Path) -> Result<Database, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    Ok(Database::open(path).await?)
}
