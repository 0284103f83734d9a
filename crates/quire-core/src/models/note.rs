//! Note model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A note in the local replica
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Durable identity; rewritten once when the server issues its own uuid
    pub uuid: String,
    /// Book the note is filed under
    pub book_uuid: String,
    /// Plain text content
    pub body: String,
    /// Creation timestamp (Unix ms)
    pub added_on: i64,
    /// Last edit timestamp (Unix ms)
    pub edited_on: i64,
    /// Last USN known to the server, 0 when never synced
    pub usn: i64,
    /// Visible to others on the server
    pub public: bool,
    /// Soft delete flag for sync
    pub deleted: bool,
    /// Has local changes the server has not acknowledged
    pub dirty: bool,
}

impl Note {
    /// Create a new, never-synced note in the given book
    #[must_use]
    pub fn new(book_uuid: impl Into<String>, body: impl Into<String>) -> Self {
        let now = crate::util::now_millis();
        Self {
            uuid: Uuid::now_v7().to_string(),
            book_uuid: book_uuid.into(),
            body: body.into(),
            added_on: now,
            edited_on: 0,
            usn: 0,
            public: false,
            deleted: false,
            dirty: true,
        }
    }

    /// Whether the server has ever acknowledged this note
    #[must_use]
    pub const fn is_synced(&self) -> bool {
        self.usn > 0
    }

    /// Get first line as title preview, truncated to `max_len` characters
    #[must_use]
    pub fn title_preview(&self, max_len: usize) -> String {
        self.body
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(max_len)
            .collect()
    }
}
