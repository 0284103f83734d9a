//! Data models for quire

mod book;
mod note;

pub use book::{validate_label, Book, CONFLICTS_BOOK_LABEL};
pub use note::Note;
