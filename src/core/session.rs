//! The in-memory thread list and active-thread pointer.

use tracing::{debug, error, warn};

use crate::core::message::Message;
use crate::core::store::KeyValueStore;
use crate::core::thread::Thread;

/// Storage key holding the serialized thread list.
pub const THREADS_KEY: &str = "chat_threads";

/// Threads ordered most-recent-first plus the active thread id.
///
/// Every mutation that changes the thread list is written through to the
/// backing store, except that an empty list is never written.
pub struct Session {
    threads: Vec<Thread>,
    active_thread_id: Option<String>,
    store: Box<dyn KeyValueStore>,
}

impl Session {
    /// Start with no threads and no saved state.
    pub fn empty(store: Box<dyn KeyValueStore>) -> Self {
        Self {
            threads: Vec::new(),
            active_thread_id: None,
            store,
        }
    }

    /// Read the saved thread list. Missing or malformed data yields an empty
    /// session; the first saved thread becomes active.
    pub fn load(store: Box<dyn KeyValueStore>) -> Self {
        let threads = match store.get(THREADS_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Thread>>(&raw) {
                Ok(threads) => threads,
                Err(err) => {
                    warn!(error = %err, "failed to parse saved threads; starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(error = %err, "failed to read saved threads; starting empty");
                Vec::new()
            }
        };

        let active_thread_id = threads.first().map(|thread| thread.id.clone());
        debug!(count = threads.len(), "loaded threads");
        Self {
            threads,
            active_thread_id,
            store,
        }
    }

    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    pub fn thread(&self, id: &str) -> Option<&Thread> {
        self.threads.iter().find(|thread| thread.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.thread(id).is_some()
    }

    pub fn active_thread_id(&self) -> Option<&str> {
        self.active_thread_id.as_deref()
    }

    pub fn active_thread(&self) -> Option<&Thread> {
        self.active_thread_id
            .as_deref()
            .and_then(|id| self.thread(id))
    }

    /// Insert a fresh empty thread at the front and make it active.
    pub fn create_thread(&mut self) -> String {
        let thread = Thread::default();
        let id = thread.id.clone();
        self.threads.insert(0, thread);
        self.active_thread_id = Some(id.clone());
        self.persist();
        id
    }

    /// Remove a thread. Unknown ids are ignored. When the active thread is
    /// removed the first remaining thread becomes active.
    pub fn delete_thread(&mut self, id: &str) -> bool {
        let before = self.threads.len();
        self.threads.retain(|thread| thread.id != id);
        if self.threads.len() == before {
            return false;
        }

        if self.active_thread_id.as_deref() == Some(id) {
            self.active_thread_id = self.threads.first().map(|thread| thread.id.clone());
        }
        self.persist();
        true
    }

    /// Point the active thread at `id`. Returns false, leaving the pointer
    /// untouched, when no such thread exists.
    pub fn set_active(&mut self, id: &str) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.active_thread_id = Some(id.to_string());
        true
    }

    /// Replace a thread's messages, deriving its title if needed.
    pub fn update_messages(&mut self, thread_id: &str, messages: Vec<Message>) -> bool {
        let Some(thread) = self.threads.iter_mut().find(|t| t.id == thread_id) else {
            return false;
        };
        thread.replace_messages(messages);
        self.persist();
        true
    }

    fn persist(&mut self) {
        if self.threads.is_empty() {
            return;
        }

        let serialized = match serde_json::to_string(&self.threads) {
            Ok(serialized) => serialized,
            Err(err) => {
                error!(error = %err, "failed to serialize threads");
                return;
            }
        };

        if let Err(err) = self.store.set(THREADS_KEY, &serialized) {
            error!(error = %err, "failed to save threads");
        }
    }
}
