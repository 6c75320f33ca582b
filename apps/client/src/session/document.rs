//! Document Store — the single active resume text for the session.
//!
//! Writes persist first, then swap the in-memory document, then fan out to every
//! registered observer so dependent caches drop their results.

use std::fmt;
use std::sync::{Arc, Mutex, RwLock, Weak};

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::SessionError;
use crate::storage::{SessionStorage, DOCUMENT_KEY};

/// Identity of one ingested document. A re-upload of identical text gets a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(Uuid);

impl DocumentId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub text: String,
    pub stored_at: DateTime<Utc>,
}

/// Anything whose state is derived from the current document.
pub trait DocumentObserver: Send + Sync {
    /// Called after the document was replaced (`Some`) or cleared (`None`).
    fn document_changed(&self, current: Option<DocumentId>);
}

pub struct DocumentStore {
    current: RwLock<Option<Arc<Document>>>,
    storage: Arc<dyn SessionStorage>,
    observers: Mutex<Vec<Weak<dyn DocumentObserver>>>,
}

impl DocumentStore {
    /// Opens the store, restoring a document persisted by an earlier page or run.
    pub fn open(storage: Arc<dyn SessionStorage>) -> Result<Self, SessionError> {
        let restored = storage.get(DOCUMENT_KEY)?.map(|text| {
            let document = Document {
                id: DocumentId::new(),
                text,
                stored_at: Utc::now(),
            };
            info!(
                "Restored persisted document {} ({} chars)",
                document.id,
                document.text.len()
            );
            Arc::new(document)
        });

        Ok(Self {
            current: RwLock::new(restored),
            storage,
            observers: Mutex::new(Vec::new()),
        })
    }

    /// The current document, or `None` if nothing has been uploaded.
    pub fn document(&self) -> Option<Arc<Document>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn current_id(&self) -> Option<DocumentId> {
        self.document().map(|d| d.id)
    }

    /// Registers an observer. Only a weak reference is kept.
    pub fn subscribe(&self, observer: Weak<dyn DocumentObserver>) {
        self.lock_observers().push(observer);
    }

    /// Replaces the document in full and invalidates every observer.
    ///
    /// Nothing changes if persisting fails.
    pub(crate) fn set_document(&self, text: String) -> Result<DocumentId, SessionError> {
        self.storage.set(DOCUMENT_KEY, &text)?;

        let document = Arc::new(Document {
            id: DocumentId::new(),
            text,
            stored_at: Utc::now(),
        });
        let id = document.id;
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some(document);

        info!("Document {id} stored");
        self.notify(Some(id));
        Ok(id)
    }

    /// Explicit session reset: forgets the document everywhere.
    pub fn reset(&self) -> Result<(), SessionError> {
        self.storage.remove(DOCUMENT_KEY)?;
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = None;

        info!("Document cleared");
        self.notify(None);
        Ok(())
    }

    fn notify(&self, current: Option<DocumentId>) {
        // Collect first so observers run without the registry lock held
        let live: Vec<Arc<dyn DocumentObserver>> = {
            let mut observers = self.lock_observers();
            observers.retain(|o| o.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };
        debug!("Notifying {} document observers", live.len());
        for observer in live {
            observer.document_changed(current);
        }
    }

    fn lock_observers(&self) -> std::sync::MutexGuard<'_, Vec<Weak<dyn DocumentObserver>>> {
        self.observers.lock().unwrap_or_else(|e| e.into_inner())
    }
}
