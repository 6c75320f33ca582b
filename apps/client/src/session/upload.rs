//! Upload Controller — ingestion of a resume file.
//!
//! The only writer of the Document Store. One upload at a time; a failed upload
//! leaves the current document untouched.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use crate::backend::models::UploadFile;
use crate::backend::ResumeBackend;
use crate::errors::{Operation, SessionError};
use crate::session::document::{DocumentId, DocumentStore};

/// Document formats the backend can extract text from (`.pdf`, `.docx`).
pub const ALLOWED_MEDIA_TYPES: [&str; 2] = [
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Idle,
    Uploading,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadState {
    pub status: UploadStatus,
    pub error: Option<SessionError>,
}

impl UploadState {
    fn idle() -> Self {
        Self {
            status: UploadStatus::Idle,
            error: None,
        }
    }
}

/// Where the caller should go after a successful upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Dashboard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub document_id: DocumentId,
    pub next: Navigation,
}

/// True if `media_type` (parameters ignored) is an accepted document format.
pub fn is_supported(media_type: &str) -> bool {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    ALLOWED_MEDIA_TYPES.contains(&essence.as_str())
}

#[derive(Clone)]
pub struct UploadController {
    store: Arc<DocumentStore>,
    backend: Arc<dyn ResumeBackend>,
    state: Arc<Mutex<UploadState>>,
}

impl UploadController {
    pub fn new(store: Arc<DocumentStore>, backend: Arc<dyn ResumeBackend>) -> Self {
        Self {
            store,
            backend,
            state: Arc::new(Mutex::new(UploadState::idle())),
        }
    }

    /// Uploads one file and, on success, makes its text the current document.
    pub async fn submit(&self, file: UploadFile) -> Result<UploadOutcome, SessionError> {
        if !is_supported(&file.media_type) {
            warn!("Rejected {} ({})", file.file_name, file.media_type);
            return Err(SessionError::UnsupportedType(file.media_type));
        }

        {
            let mut state = self.lock();
            if state.status == UploadStatus::Uploading {
                return Err(SessionError::Busy(Operation::Upload));
            }
            *state = UploadState {
                status: UploadStatus::Uploading,
                error: None,
            };
        }

        info!(
            "Uploading {} ({} bytes, {})",
            file.file_name,
            file.bytes.len(),
            file.media_type
        );
        let this = self.clone();
        // Spawned so a caller that goes away cannot leave the state at Uploading
        let handle = tokio::spawn(async move { this.ingest(file).await });

        match handle.await {
            Ok(result) => result,
            Err(e) => {
                let err = SessionError::Ingestion(format!("upload task aborted: {e}"));
                self.finish(UploadStatus::Failed, Some(err.clone()));
                Err(err)
            }
        }
    }

    /// Drag/drop and file-picker entry point: only the first file is used.
    pub async fn submit_selection(
        &self,
        files: impl IntoIterator<Item = UploadFile>,
    ) -> Result<Option<UploadOutcome>, SessionError> {
        match files.into_iter().next() {
            Some(file) => self.submit(file).await.map(Some),
            None => Ok(None),
        }
    }

    pub fn state(&self) -> UploadState {
        self.lock().clone()
    }

    /// Consumes a terminal outcome, returning to `Idle`. Returns the consumed state.
    pub fn acknowledge(&self) -> UploadState {
        let mut state = self.lock();
        match state.status {
            UploadStatus::Succeeded | UploadStatus::Failed => {
                std::mem::replace(&mut *state, UploadState::idle())
            }
            UploadStatus::Idle | UploadStatus::Uploading => state.clone(),
        }
    }

    /// Runs the upload and records its terminal state.
    async fn ingest(&self, file: UploadFile) -> Result<UploadOutcome, SessionError> {
        let result = self.upload_and_store(&file).await;
        match &result {
            Ok(_) => {
                info!("Upload of {} succeeded", file.file_name);
                self.finish(UploadStatus::Succeeded, None);
            }
            Err(e) => {
                warn!("Upload of {} failed: {e}", file.file_name);
                self.finish(UploadStatus::Failed, Some(e.clone()));
            }
        }
        result
    }

    async fn upload_and_store(&self, file: &UploadFile) -> Result<UploadOutcome, SessionError> {
        let response = self
            .backend
            .upload_file(file)
            .await
            .map_err(|e| SessionError::ingestion(&e))?;

        // Only a complete response reaches the store
        let document_id = self
            .store
            .set_document(response.extracted_text)
            .map_err(|e| {
                SessionError::Ingestion(format!("Failed to save the uploaded resume ({e})."))
            })?;

        Ok(UploadOutcome {
            document_id,
            next: Navigation::Dashboard,
        })
    }

    fn finish(&self, status: UploadStatus, error: Option<SessionError>) {
        *self.lock() = UploadState { status, error };
    }

    fn lock(&self) -> MutexGuard<'_, UploadState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::document::DocumentObserver;
    use crate::session::testing::{wait_for_calls, FlakyStorage, ScriptedBackend};
    use crate::storage::{MemoryStorage, SessionStorage, DOCUMENT_KEY};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Weak;

    const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

    fn setup(backend: Arc<ScriptedBackend>) -> (Arc<DocumentStore>, UploadController) {
        let store = Arc::new(DocumentStore::open(Arc::new(MemoryStorage::new())).unwrap());
        let controller = UploadController::new(store.clone(), backend);
        (store, controller)
    }

    fn pdf(text: &str) -> UploadFile {
        UploadFile::new("cv.pdf", "application/pdf", text.as_bytes().to_vec())
    }

    #[test]
    fn test_allow_list() {
        assert!(is_supported("application/pdf"));
        assert!(is_supported("Application/PDF; charset=binary"));
        assert!(is_supported(DOCX));
        assert!(!is_supported("text/plain"));
        assert!(!is_supported("image/png"));
        assert!(!is_supported(""));
    }

    #[tokio::test]
    async fn test_successful_upload_stores_document() {
        let backend = ScriptedBackend::new();
        let (store, controller) = setup(backend.clone());

        let outcome = controller.submit(pdf("Hello")).await.unwrap();

        assert_eq!(outcome.next, Navigation::Dashboard);
        let document = store.document().unwrap();
        assert_eq!(document.text, "Hello");
        assert_eq!(document.id, outcome.document_id);
        assert_eq!(controller.state().status, UploadStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_unsupported_type_never_reaches_backend() {
        let backend = ScriptedBackend::new();
        let (store, controller) = setup(backend.clone());

        let file = UploadFile::new("notes.txt", "text/plain", b"hi".to_vec());
        let err = controller.submit(file).await.unwrap_err();

        assert_eq!(err, SessionError::UnsupportedType("text/plain".to_string()));
        assert_eq!(backend.uploads.load(Ordering::SeqCst), 0);
        assert_eq!(controller.state().status, UploadStatus::Idle);
        assert!(store.document().is_none());
    }

    #[tokio::test]
    async fn test_failed_upload_keeps_previous_document() {
        let backend = ScriptedBackend::new();
        let (store, controller) = setup(backend.clone());
        controller.submit(pdf("first version")).await.unwrap();
        let before = store.document().unwrap();

        backend.fail_upload.store(true, Ordering::SeqCst);
        let err = controller.submit(pdf("replacement")).await.unwrap_err();

        assert!(matches!(err, SessionError::Ingestion(ref msg) if msg.contains("boom")));
        assert_eq!(store.document().unwrap(), before);
        let state = controller.state();
        assert_eq!(state.status, UploadStatus::Failed);
        assert_eq!(state.error, Some(err));
    }

    #[derive(Default)]
    struct Notifications(AtomicUsize);

    impl DocumentObserver for Notifications {
        fn document_changed(&self, _: Option<DocumentId>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_failed_persist_changes_nothing() {
        let storage = FlakyStorage::new();
        let store = Arc::new(DocumentStore::open(storage.clone()).unwrap());
        let controller = UploadController::new(store.clone(), ScriptedBackend::new());
        controller.submit(pdf("first version")).await.unwrap();
        let before = store.document().unwrap();

        let notifications = Arc::new(Notifications::default());
        let weak: Weak<dyn DocumentObserver> = Arc::downgrade(&notifications) as _;
        store.subscribe(weak);

        storage.fail_writes.store(true, Ordering::SeqCst);
        let err = controller.submit(pdf("replacement")).await.unwrap_err();

        assert!(matches!(err, SessionError::Ingestion(ref msg) if msg.contains("disk full")));
        assert_eq!(store.document().unwrap(), before);
        assert_eq!(
            storage.get(DOCUMENT_KEY).unwrap().as_deref(),
            Some("first version")
        );
        assert_eq!(notifications.0.load(Ordering::SeqCst), 0);
        let state = controller.state();
        assert_eq!(state.status, UploadStatus::Failed);
        assert_eq!(state.error, Some(err));
    }

    #[tokio::test]
    async fn test_second_submit_while_uploading_is_busy() {
        let backend = ScriptedBackend::gated();
        let (_, controller) = setup(backend.clone());

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.submit(pdf("one")).await })
        };
        wait_for_calls(&backend.uploads, 1).await;
        assert_eq!(controller.state().status, UploadStatus::Uploading);

        let err = controller.submit(pdf("two")).await.unwrap_err();
        assert_eq!(err, SessionError::Busy(Operation::Upload));

        backend.release(1);
        first.await.unwrap().unwrap();
        assert_eq!(backend.uploads.load(Ordering::SeqCst), 1);
        assert_eq!(controller.state().status, UploadStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_acknowledge_resets_terminal_state() {
        let (_, controller) = setup(ScriptedBackend::new());
        controller.submit(pdf("Hello")).await.unwrap();

        let consumed = controller.acknowledge();
        assert_eq!(consumed.status, UploadStatus::Succeeded);
        assert_eq!(controller.state(), UploadState::idle());
    }

    #[tokio::test]
    async fn test_selection_uses_first_file_only() {
        let backend = ScriptedBackend::new();
        let (store, controller) = setup(backend.clone());

        let outcome = controller
            .submit_selection(vec![pdf("first"), pdf("second")])
            .await
            .unwrap();
        assert!(outcome.is_some());
        assert_eq!(store.document().unwrap().text, "first");
        assert_eq!(backend.uploads.load(Ordering::SeqCst), 1);

        let none = controller.submit_selection(Vec::new()).await.unwrap();
        assert!(none.is_none());
    }
}
