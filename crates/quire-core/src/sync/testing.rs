//! In-process delta client and fixtures for sync tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use crate::client::{
    ClientError, ClientResult, CreatedResource, DeltaClient, RemoteBook, RemoteNote,
    SyncFragment, SyncState,
};
use crate::models::{Book, Note};

pub fn remote_book(uuid: &str, label: &str, usn: i64) -> RemoteBook {
    RemoteBook {
        uuid: uuid.to_string(),
        label: label.to_string(),
        usn,
        deleted: false,
    }
}

pub fn remote_note(uuid: &str, book_uuid: &str, body: &str, usn: i64) -> RemoteNote {
    RemoteNote {
        uuid: uuid.to_string(),
        book_uuid: book_uuid.to_string(),
        body: body.to_string(),
        added_on: 100,
        edited_on: 0,
        usn,
        public: false,
        deleted: false,
    }
}

pub fn local_book(uuid: &str, label: &str, usn: i64, dirty: bool) -> Book {
    Book {
        uuid: uuid.to_string(),
        label: label.to_string(),
        usn,
        deleted: false,
        dirty,
    }
}

pub fn local_note(uuid: &str, book_uuid: &str, body: &str, usn: i64, dirty: bool) -> Note {
    Note {
        uuid: uuid.to_string(),
        book_uuid: book_uuid.to_string(),
        body: body.to_string(),
        added_on: 100,
        edited_on: 0,
        usn,
        public: false,
        deleted: false,
        dirty,
    }
}

#[derive(Debug, Default)]
struct ServerState {
    max_usn: i64,
    current_time: i64,
    full_sync_before: i64,
    books: BTreeMap<String, RemoteBook>,
    notes: BTreeMap<String, RemoteNote>,
    expunged_notes: BTreeMap<String, i64>,
    expunged_books: BTreeMap<String, i64>,
    scripted: VecDeque<SyncFragment>,
    concurrent_writes: VecDeque<String>,
    fail_on: Option<String>,
    calls: Vec<String>,
    fragment_requests: Vec<i64>,
}

impl ServerState {
    fn next_usn(&mut self) -> i64 {
        self.max_usn += 1;
        self.max_usn
    }

    fn put_book(&mut self, uuid: &str, label: &str) -> i64 {
        let usn = self.next_usn();
        self.books
            .insert(uuid.to_string(), remote_book(uuid, label, usn));
        usn
    }

    /// Simulate another client writing before our own request lands
    fn run_concurrent_write(&mut self) {
        if let Some(label) = self.concurrent_writes.pop_front() {
            let uuid = format!("other-{}", self.max_usn + 1);
            self.put_book(&uuid, &label);
        }
    }

    fn begin_write(&mut self, call: String) -> ClientResult<()> {
        let operation = call.split(' ').next().unwrap_or_default().to_string();
        self.calls.push(call);
        if self.fail_on.as_deref() == Some(operation.as_str()) {
            return Err(ClientError::Api(format!("{operation} rejected (500)")));
        }
        self.run_concurrent_write();
        Ok(())
    }
}

/// Scripted server: allocates USNs, pages its log by `after_usn` and records
/// every write it receives.
#[derive(Debug)]
pub struct FakeDeltaClient {
    page_size: usize,
    state: Mutex<ServerState>,
}

impl FakeDeltaClient {
    pub fn new() -> Self {
        Self::with_page_size(100)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size,
            state: Mutex::new(ServerState {
                current_time: 1_000,
                ..ServerState::default()
            }),
        }
    }

    pub fn seed_book(&self, uuid: &str, label: &str) -> i64 {
        self.state.lock().unwrap().put_book(uuid, label)
    }

    pub fn seed_note(&self, uuid: &str, book_uuid: &str, body: &str) -> i64 {
        let mut state = self.state.lock().unwrap();
        let usn = state.next_usn();
        state
            .notes
            .insert(uuid.to_string(), remote_note(uuid, book_uuid, body, usn));
        usn
    }

    /// Edit a note as another device would
    pub fn edit_note(&self, uuid: &str, book_uuid: &str, body: &str, edited_on: i64) -> i64 {
        let mut state = self.state.lock().unwrap();
        let usn = state.next_usn();
        let note = state
            .notes
            .get_mut(uuid)
            .unwrap_or_else(|| panic!("no server note {uuid}"));
        note.book_uuid = book_uuid.to_string();
        note.body = body.to_string();
        note.edited_on = edited_on;
        note.usn = usn;
        usn
    }

    /// Soft delete a note as another device would
    pub fn delete_note_remotely(&self, uuid: &str) -> i64 {
        let mut state = self.state.lock().unwrap();
        let usn = state.next_usn();
        let note = state
            .notes
            .get_mut(uuid)
            .unwrap_or_else(|| panic!("no server note {uuid}"));
        note.deleted = true;
        note.body.clear();
        note.usn = usn;
        usn
    }

    pub fn expunge_note(&self, uuid: &str) -> i64 {
        let mut state = self.state.lock().unwrap();
        state.notes.remove(uuid);
        let usn = state.next_usn();
        state.expunged_notes.insert(uuid.to_string(), usn);
        usn
    }

    pub fn expunge_book(&self, uuid: &str) -> i64 {
        let mut state = self.state.lock().unwrap();
        state.books.remove(uuid);
        let usn = state.next_usn();
        state.expunged_books.insert(uuid.to_string(), usn);
        usn
    }

    /// Consume USNs without recording resources
    pub fn advance_usn_to(&self, usn: i64) {
        let mut state = self.state.lock().unwrap();
        state.max_usn = state.max_usn.max(usn);
    }

    pub fn set_current_time(&self, current_time: i64) {
        self.state.lock().unwrap().current_time = current_time;
    }

    pub fn set_full_sync_before(&self, full_sync_before: i64) {
        self.state.lock().unwrap().full_sync_before = full_sync_before;
    }

    /// Serve this fragment verbatim on the next fragment request
    pub fn push_scripted_fragment(&self, fragment: SyncFragment) {
        self.state.lock().unwrap().scripted.push_back(fragment);
    }

    /// Before each of the next writes, another writer creates a book with
    /// the given label, taking a USN first.
    pub fn inject_concurrent_writes<'a>(&self, labels: impl IntoIterator<Item = &'a str>) {
        let mut state = self.state.lock().unwrap();
        state
            .concurrent_writes
            .extend(labels.into_iter().map(str::to_string));
    }

    /// Fail every request of the named operation, e.g. `create_note`
    pub fn fail_on(&self, operation: &str) {
        self.state.lock().unwrap().fail_on = Some(operation.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn fragment_requests(&self) -> Vec<i64> {
        self.state.lock().unwrap().fragment_requests.clone()
    }

    pub fn book(&self, uuid: &str) -> Option<RemoteBook> {
        self.state.lock().unwrap().books.get(uuid).cloned()
    }

    pub fn note(&self, uuid: &str) -> Option<RemoteNote> {
        self.state.lock().unwrap().notes.get(uuid).cloned()
    }

    pub fn max_usn(&self) -> i64 {
        self.state.lock().unwrap().max_usn
    }
}

enum Entry {
    Book(RemoteBook),
    Note(RemoteNote),
    ExpungedBook(String),
    ExpungedNote(String),
}

impl DeltaClient for FakeDeltaClient {
    async fn get_sync_state(&self) -> ClientResult<SyncState> {
        let state = self.state.lock().unwrap();
        Ok(SyncState {
            full_sync_before: state.full_sync_before,
            max_usn: state.max_usn,
            current_time: state.current_time,
        })
    }

    async fn get_sync_fragment(&self, after_usn: i64) -> ClientResult<SyncFragment> {
        let mut state = self.state.lock().unwrap();
        state.fragment_requests.push(after_usn);
        if let Some(fragment) = state.scripted.pop_front() {
            return Ok(fragment);
        }

        let mut entries: Vec<(i64, Entry)> = Vec::new();
        entries.extend(
            state
                .books
                .values()
                .filter(|book| book.usn > after_usn)
                .map(|book| (book.usn, Entry::Book(book.clone()))),
        );
        entries.extend(
            state
                .notes
                .values()
                .filter(|note| note.usn > after_usn)
                .map(|note| (note.usn, Entry::Note(note.clone()))),
        );
        entries.extend(
            state
                .expunged_books
                .iter()
                .filter(|(_, usn)| **usn > after_usn)
                .map(|(uuid, usn)| (*usn, Entry::ExpungedBook(uuid.clone()))),
        );
        entries.extend(
            state
                .expunged_notes
                .iter()
                .filter(|(_, usn)| **usn > after_usn)
                .map(|(uuid, usn)| (*usn, Entry::ExpungedNote(uuid.clone()))),
        );
        entries.sort_by_key(|(usn, _)| *usn);
        entries.truncate(self.page_size);

        let mut fragment = SyncFragment {
            frag_max_usn: entries.last().map_or(0, |(usn, _)| *usn),
            user_max_usn: state.max_usn,
            current_time: state.current_time,
            ..SyncFragment::default()
        };
        for (_, entry) in entries {
            match entry {
                Entry::Book(book) => fragment.books.push(book),
                Entry::Note(note) => fragment.notes.push(note),
                Entry::ExpungedBook(uuid) => fragment.expunged_books.push(uuid),
                Entry::ExpungedNote(uuid) => fragment.expunged_notes.push(uuid),
            }
        }
        Ok(fragment)
    }

    async fn create_book(&self, label: &str) -> ClientResult<CreatedResource> {
        let mut state = self.state.lock().unwrap();
        state.begin_write(format!("create_book {label}"))?;
        let uuid = format!("server-{}", state.max_usn + 1);
        let usn = state.put_book(&uuid, label);
        Ok(CreatedResource { uuid, usn })
    }

    async fn update_book(&self, uuid: &str, label: &str) -> ClientResult<i64> {
        let mut state = self.state.lock().unwrap();
        state.begin_write(format!("update_book {uuid} {label}"))?;
        if !state.books.contains_key(uuid) {
            return Err(ClientError::Api(format!("book {uuid} not found (404)")));
        }
        Ok(state.put_book(uuid, label))
    }

    async fn delete_book(&self, uuid: &str) -> ClientResult<i64> {
        let mut state = self.state.lock().unwrap();
        state.begin_write(format!("delete_book {uuid}"))?;
        let usn = state.next_usn();
        let book = state
            .books
            .get_mut(uuid)
            .ok_or_else(|| ClientError::Api(format!("book {uuid} not found (404)")))?;
        book.deleted = true;
        book.usn = usn;
        Ok(usn)
    }

    async fn create_note(&self, book_uuid: &str, body: &str) -> ClientResult<CreatedResource> {
        let mut state = self.state.lock().unwrap();
        state.begin_write(format!("create_note {book_uuid}"))?;
        let usn = state.next_usn();
        let uuid = format!("server-{usn}");
        state
            .notes
            .insert(uuid.clone(), remote_note(&uuid, book_uuid, body, usn));
        Ok(CreatedResource { uuid, usn })
    }

    async fn update_note(
        &self,
        uuid: &str,
        book_uuid: &str,
        body: &str,
        public: bool,
    ) -> ClientResult<i64> {
        let mut state = self.state.lock().unwrap();
        state.begin_write(format!("update_note {uuid}"))?;
        let usn = state.next_usn();
        let note = state
            .notes
            .get_mut(uuid)
            .ok_or_else(|| ClientError::Api(format!("note {uuid} not found (404)")))?;
        note.book_uuid = book_uuid.to_string();
        note.body = body.to_string();
        note.public = public;
        note.deleted = false;
        note.usn = usn;
        Ok(usn)
    }

    async fn delete_note(&self, uuid: &str) -> ClientResult<i64> {
        let mut state = self.state.lock().unwrap();
        state.begin_write(format!("delete_note {uuid}"))?;
        let usn = state.next_usn();
        let note = state
            .notes
            .get_mut(uuid)
            .ok_or_else(|| ClientError::Api(format!("note {uuid} not found (404)")))?;
        note.deleted = true;
        note.body.clear();
        note.usn = usn;
        Ok(usn)
    }
}
