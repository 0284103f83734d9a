//! quire-core - Core library for quire
//!
//! This crate contains the note and book models, the libSQL-backed local
//! replica, the delta client used to talk to the server, and the sync engine
//! that reconciles the two.

pub mod client;
pub mod db;
pub mod error;
pub mod models;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Book, Note};
