//! Fragment aggregation: many pages of the change log, one view of it.

use std::collections::{BTreeMap, BTreeSet};

use crate::client::{DeltaClient, RemoteBook, RemoteNote, SyncFragment};
use crate::error::{Error, Result};

/// Latest known server state per resource, flattened from fragments.
///
/// Fragments must be folded in fetch order. The server pages its log in
/// strictly increasing USN order, so a later fragment overwrites any earlier
/// entry for the same uuid. Maps are keyed by uuid so that reconciliation
/// visits resources in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncList {
    pub notes: BTreeMap<String, RemoteNote>,
    pub books: BTreeMap<String, RemoteBook>,
    pub expunged_notes: BTreeSet<String>,
    pub expunged_books: BTreeSet<String>,
    pub max_usn: i64,
    pub max_current_time: i64,
}

impl SyncList {
    pub fn from_fragments(fragments: impl IntoIterator<Item = SyncFragment>) -> Self {
        let mut list = Self::default();
        for fragment in fragments {
            list.absorb(fragment);
        }
        list
    }

    /// Fold one more fragment into the list
    pub fn absorb(&mut self, fragment: SyncFragment) {
        for note in fragment.notes {
            self.notes.insert(note.uuid.clone(), note);
        }
        for book in fragment.books {
            self.books.insert(book.uuid.clone(), book);
        }
        self.expunged_notes.extend(fragment.expunged_notes);
        self.expunged_books.extend(fragment.expunged_books);
        self.max_usn = self.max_usn.max(fragment.frag_max_usn);
        self.max_current_time = self.max_current_time.max(fragment.current_time);
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
            && self.books.is_empty()
            && self.expunged_notes.is_empty()
            && self.expunged_books.is_empty()
    }
}

/// Page through the server change log starting after `after_usn`.
pub async fn fetch_fragments(client: &impl DeltaClient, after_usn: i64) -> Result<Vec<SyncFragment>> {
    let mut fragments = Vec::new();
    let mut cursor = after_usn;

    loop {
        let fragment = client.get_sync_fragment(cursor).await?;
        tracing::debug!(
            "Fetched fragment after usn {cursor}: max usn {}, {} notes, {} books",
            fragment.frag_max_usn,
            fragment.notes.len(),
            fragment.books.len()
        );

        if fragment.frag_max_usn == 0 {
            fragments.push(fragment);
            break;
        }
        if fragment.frag_max_usn <= cursor {
            return Err(Error::InconsistentData(format!(
                "fragment after usn {cursor} did not advance (max usn {})",
                fragment.frag_max_usn
            )));
        }

        cursor = fragment.frag_max_usn;
        fragments.push(fragment);
    }

    Ok(fragments)
}

/// Fetch and flatten everything after `after_usn`.
pub async fn get_sync_list(client: &impl DeltaClient, after_usn: i64) -> Result<SyncList> {
    let fragments = fetch_fragments(client, after_usn).await?;
    Ok(SyncList::from_fragments(fragments))
}
