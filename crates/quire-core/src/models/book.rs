//! Book model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Label of the book that collects notes whose book move conflicted.
pub const CONFLICTS_BOOK_LABEL: &str = "conflicts";

/// A book (notebook) grouping notes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// Durable identity; rewritten once when the server issues its own uuid
    pub uuid: String,
    /// Display label, unique among non-deleted local books
    pub label: String,
    /// Last USN known to the server, 0 when never synced
    pub usn: i64,
    /// Soft delete flag for sync
    pub deleted: bool,
    /// Has local changes the server has not acknowledged
    pub dirty: bool,
}

impl Book {
    /// Create a new, never-synced book
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::now_v7().to_string(),
            label: label.into(),
            usn: 0,
            deleted: false,
            dirty: true,
        }
    }
}

/// Validate a user supplied book label.
pub fn validate_label(label: &str) -> crate::Result<String> {
    let label = label.trim();
    if label.is_empty() {
        return Err(crate::Error::InvalidInput(
            "book label cannot be empty".to_string(),
        ));
    }
    if label.chars().any(char::is_whitespace) {
        return Err(crate::Error::InvalidInput(format!(
            "book label '{label}' cannot contain whitespace"
        )));
    }
    Ok(label.to_string())
}
