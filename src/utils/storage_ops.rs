//! Remote storage abstraction for testability
//!
//! The backup pipeline only needs a handful of operations from the remote
//! side: authenticate once, look entries up by exact name, create a
//! container, create an entry and replace an entry's content in place.

use std::io;
use std::path::{Path, PathBuf};

/// A remote object (archive or container) identified by id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub id: String,
    pub name: String,
}

/// Which kind of remote object a query matches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Container,
    Entry,
    Any,
}

/// Exact-match lookup of remote objects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryQuery {
    pub name: String,
    /// Restrict to children of this container; `None` searches the whole namespace
    pub parent: Option<String>,
    pub kind: EntryKind,
    pub include_trashed: bool,
}

impl EntryQuery {
    /// Live container with the given name
    pub fn container(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parent: None,
            kind: EntryKind::Container,
            include_trashed: false,
        }
    }

    /// Live object with the given name inside `parent`
    pub fn entry_in(parent: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            parent: Some(parent.to_string()),
            kind: EntryKind::Any,
            include_trashed: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Remote storage used before authentication")]
    NotAuthenticated,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{operation} failed with status {status}: {body}")]
    Api {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unexpected response: {0}")]
    Protocol(String),
}

/// Abstraction for remote storage operations, enabling mocking in tests
pub trait RemoteStorage {
    /// Obtain credentials; every other call requires a successful authentication
    fn authenticate(&mut self) -> Result<(), StorageError>;

    /// List objects matching the query
    fn list_entries(&self, query: &EntryQuery) -> Result<Vec<RemoteEntry>, StorageError>;

    /// Create a top-level container and return its id
    fn create_container(&self, name: &str) -> Result<String, StorageError>;

    /// Upload `local_file` as a new object named `name` inside `container_id`
    fn create_entry(
        &self,
        container_id: &str,
        name: &str,
        local_file: &Path,
    ) -> Result<String, StorageError>;

    /// Replace the content of an existing object, keeping its id
    fn update_entry_content(&self, entry_id: &str, local_file: &Path) -> Result<(), StorageError>;
}

/// In-memory storage for testing
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::collections::HashSet;
    use std::fs;
    use std::sync::{Arc, Mutex};

    /// Recorded operation call
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum StorageCall {
        Authenticate,
        List { query: EntryQuery },
        CreateContainer { name: String },
        CreateEntry { container_id: String, name: String },
        UpdateEntry { entry_id: String },
    }

    /// Object held by the mock
    #[derive(Clone, Debug)]
    pub struct StoredObject {
        pub id: String,
        pub name: String,
        pub parent: Option<String>,
        pub is_container: bool,
        pub trashed: bool,
        pub content: Vec<u8>,
        /// Number of content writes (1 after create, +1 per update)
        pub revisions: u32,
    }

    #[derive(Default)]
    struct State {
        authenticated: bool,
        next_id: u64,
        objects: Vec<StoredObject>,
    }

    impl State {
        fn allocate_id(&mut self) -> String {
            self.next_id += 1;
            format!("mock-{}", self.next_id)
        }
    }

    /// Mock remote storage for testing
    #[derive(Clone, Default)]
    pub struct MockStorage {
        /// Recorded operation calls
        pub calls: Arc<Mutex<Vec<StorageCall>>>,
        state: Arc<Mutex<State>>,
        should_fail_auth: Arc<Mutex<bool>>,
        should_fail_container: Arc<Mutex<bool>>,
        failing_uploads: Arc<Mutex<HashSet<String>>>,
    }

    impl MockStorage {
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure authentication to fail
        pub fn with_failing_auth(self) -> Self {
            *self.should_fail_auth.lock().unwrap() = true;
            self
        }

        /// Configure container creation to fail
        pub fn with_failing_container(self) -> Self {
            *self.should_fail_container.lock().unwrap() = true;
            self
        }

        /// Configure create/update of the object named `name` to fail
        pub fn with_failing_upload(self, name: &str) -> Self {
            self.failing_uploads.lock().unwrap().insert(name.to_string());
            self
        }

        /// Insert an existing object and return its id
        pub fn seed(
            &self,
            parent: Option<&str>,
            name: &str,
            is_container: bool,
            trashed: bool,
        ) -> String {
            let mut state = self.state.lock().unwrap();
            let id = state.allocate_id();
            state.objects.push(StoredObject {
                id: id.clone(),
                name: name.to_string(),
                parent: parent.map(String::from),
                is_container,
                trashed,
                content: Vec::new(),
                revisions: 1,
            });
            id
        }

        /// All objects, trashed ones included
        pub fn objects(&self) -> Vec<StoredObject> {
            self.state.lock().unwrap().objects.clone()
        }

        /// Live objects with the given name
        pub fn live_named(&self, name: &str) -> Vec<StoredObject> {
            self.objects()
                .into_iter()
                .filter(|o| o.name == name && !o.trashed)
                .collect()
        }

        /// Get all recorded calls
        pub fn get_calls(&self) -> Vec<StorageCall> {
            self.calls.lock().unwrap().clone()
        }

        /// Number of create_container calls
        pub fn containers_created(&self) -> usize {
            self.count(|c| matches!(c, StorageCall::CreateContainer { .. }))
        }

        /// Number of create_entry and update_entry_content calls
        pub fn upload_calls(&self) -> usize {
            self.count(|c| {
                matches!(c, StorageCall::CreateEntry { .. } | StorageCall::UpdateEntry { .. })
            })
        }

        fn count(&self, predicate: impl Fn(&StorageCall) -> bool) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| predicate(*c)).count()
        }

        fn record_call(&self, call: StorageCall) {
            self.calls.lock().unwrap().push(call);
        }

        fn require_auth(&self) -> Result<(), StorageError> {
            if self.state.lock().unwrap().authenticated {
                Ok(())
            } else {
                Err(StorageError::NotAuthenticated)
            }
        }

        fn check_upload(&self, name: &str) -> Result<(), StorageError> {
            if self.failing_uploads.lock().unwrap().contains(name) {
                return Err(StorageError::Api {
                    operation: "upload".to_string(),
                    status: 500,
                    body: format!("mock upload failure for {}", name),
                });
            }
            Ok(())
        }

        fn read_file(path: &Path) -> Result<Vec<u8>, StorageError> {
            fs::read(path).map_err(|source| StorageError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    impl RemoteStorage for MockStorage {
        fn authenticate(&mut self) -> Result<(), StorageError> {
            self.record_call(StorageCall::Authenticate);
            if *self.should_fail_auth.lock().unwrap() {
                return Err(StorageError::Auth("mock authentication failure".to_string()));
            }
            self.state.lock().unwrap().authenticated = true;
            Ok(())
        }

        fn list_entries(&self, query: &EntryQuery) -> Result<Vec<RemoteEntry>, StorageError> {
            self.record_call(StorageCall::List {
                query: query.clone(),
            });
            self.require_auth()?;

            let state = self.state.lock().unwrap();
            Ok(state
                .objects
                .iter()
                .filter(|o| o.name == query.name)
                .filter(|o| query.include_trashed || !o.trashed)
                .filter(|o| match query.kind {
                    EntryKind::Container => o.is_container,
                    EntryKind::Entry => !o.is_container,
                    EntryKind::Any => true,
                })
                .filter(|o| match query.parent {
                    Some(ref parent) => o.parent.as_deref() == Some(parent.as_str()),
                    None => true,
                })
                .map(|o| RemoteEntry {
                    id: o.id.clone(),
                    name: o.name.clone(),
                })
                .collect())
        }

        fn create_container(&self, name: &str) -> Result<String, StorageError> {
            self.record_call(StorageCall::CreateContainer {
                name: name.to_string(),
            });
            self.require_auth()?;

            if *self.should_fail_container.lock().unwrap() {
                return Err(StorageError::Api {
                    operation: "create container".to_string(),
                    status: 403,
                    body: "mock container failure".to_string(),
                });
            }

            Ok(self.seed(None, name, true, false))
        }

        fn create_entry(
            &self,
            container_id: &str,
            name: &str,
            local_file: &Path,
        ) -> Result<String, StorageError> {
            self.record_call(StorageCall::CreateEntry {
                container_id: container_id.to_string(),
                name: name.to_string(),
            });
            self.require_auth()?;
            self.check_upload(name)?;

            let content = Self::read_file(local_file)?;
            let mut state = self.state.lock().unwrap();
            let id = state.allocate_id();
            state.objects.push(StoredObject {
                id: id.clone(),
                name: name.to_string(),
                parent: Some(container_id.to_string()),
                is_container: false,
                trashed: false,
                content,
                revisions: 1,
            });
            Ok(id)
        }

        fn update_entry_content(
            &self,
            entry_id: &str,
            local_file: &Path,
        ) -> Result<(), StorageError> {
            self.record_call(StorageCall::UpdateEntry {
                entry_id: entry_id.to_string(),
            });
            self.require_auth()?;

            let name = self
                .objects()
                .into_iter()
                .find(|o| o.id == entry_id)
                .map(|o| o.name)
                .ok_or_else(|| StorageError::Api {
                    operation: "update".to_string(),
                    status: 404,
                    body: format!("File not found: {}", entry_id),
                })?;
            self.check_upload(&name)?;

            let content = Self::read_file(local_file)?;
            let mut state = self.state.lock().unwrap();
            if let Some(object) = state.objects.iter_mut().find(|o| o.id == entry_id) {
                object.content = content;
                object.revisions += 1;
            }
            Ok(())
        }
    }
}
