//! Delta client: the server side of the sync protocol.
//!
//! The engine only talks to the [`DeltaClient`] trait. [`HttpDeltaClient`]
//! is the reqwest-backed implementation used by the CLI.

mod http;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Book, Note};

pub use http::HttpDeltaClient;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid client configuration: {0}")]
    InvalidConfiguration(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {0}")]
    Api(String),
    #[error("Invalid response payload: {0}")]
    InvalidPayload(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Server answer to `GET /sync/state`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// Replicas whose last sync predates this must run a full sync
    pub full_sync_before: i64,
    /// Highest USN assigned in the account
    pub max_usn: i64,
    /// Server wall clock
    pub current_time: i64,
}

/// One page of the server change log.
///
/// `frag_max_usn == 0` marks the end of the log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFragment {
    #[serde(rename = "fragment_max_usn")]
    pub frag_max_usn: i64,
    pub user_max_usn: i64,
    pub current_time: i64,
    #[serde(default)]
    pub notes: Vec<RemoteNote>,
    #[serde(default)]
    pub books: Vec<RemoteBook>,
    #[serde(default)]
    pub expunged_notes: Vec<String>,
    #[serde(default)]
    pub expunged_books: Vec<String>,
}

/// Server copy of a note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNote {
    pub uuid: String,
    pub book_uuid: String,
    #[serde(default)]
    pub body: String,
    pub added_on: i64,
    #[serde(default)]
    pub edited_on: i64,
    pub usn: i64,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl RemoteNote {
    /// Local row mirroring the server copy, with no pending changes
    #[must_use]
    pub fn to_local(&self) -> Note {
        Note {
            uuid: self.uuid.clone(),
            book_uuid: self.book_uuid.clone(),
            body: self.body.clone(),
            added_on: self.added_on,
            edited_on: self.edited_on,
            usn: self.usn,
            public: self.public,
            deleted: self.deleted,
            dirty: false,
        }
    }
}

/// Server copy of a book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteBook {
    pub uuid: String,
    pub label: String,
    pub usn: i64,
    #[serde(default)]
    pub deleted: bool,
}

impl RemoteBook {
    /// Local row mirroring the server copy, with no pending changes
    #[must_use]
    pub fn to_local(&self) -> Book {
        Book {
            uuid: self.uuid.clone(),
            label: self.label.clone(),
            usn: self.usn,
            deleted: self.deleted,
            dirty: false,
        }
    }
}

/// Identity and USN the server assigned to a newly created resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedResource {
    pub uuid: String,
    pub usn: i64,
}

/// Remote operations consumed by the sync engine.
///
/// Every write returns the USN the server assigned to it.
#[allow(async_fn_in_trait)]
pub trait DeltaClient {
    async fn get_sync_state(&self) -> ClientResult<SyncState>;

    /// Page of changes with USN strictly greater than `after_usn`
    async fn get_sync_fragment(&self, after_usn: i64) -> ClientResult<SyncFragment>;

    async fn create_book(&self, label: &str) -> ClientResult<CreatedResource>;

    async fn update_book(&self, uuid: &str, label: &str) -> ClientResult<i64>;

    async fn delete_book(&self, uuid: &str) -> ClientResult<i64>;

    async fn create_note(&self, book_uuid: &str, body: &str) -> ClientResult<CreatedResource>;

    async fn update_note(
        &self,
        uuid: &str,
        book_uuid: &str,
        body: &str,
        public: bool,
    ) -> ClientResult<i64>;

    async fn delete_note(&self, uuid: &str) -> ClientResult<i64>;
}
