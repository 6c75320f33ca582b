// Session orchestration: one document, its derived analyses, and the chat about it.
// All controllers share the Document Store; only the Upload Controller writes it.

pub mod analysis;
pub mod conversation;
pub mod document;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::backend::{HttpBackend, ResumeBackend};
use crate::config::Config;
use crate::errors::SessionError;
use crate::storage::{FileStorage, MemoryStorage, SessionStorage};

use analysis::{AnalysisController, AtsParams};
use conversation::ConversationController;
use document::DocumentStore;
use upload::UploadController;

/// Everything one user session needs, wired to a single backend.
#[derive(Clone)]
pub struct Session {
    pub store: Arc<DocumentStore>,
    pub upload: UploadController,
    pub analysis: AnalysisController,
    pub conversation: ConversationController,
}

impl Session {
    pub fn new(
        backend: Arc<dyn ResumeBackend>,
        storage: Arc<dyn SessionStorage>,
        ats: AtsParams,
    ) -> Result<Self, SessionError> {
        let store = Arc::new(DocumentStore::open(storage)?);

        Ok(Self {
            upload: UploadController::new(store.clone(), backend.clone()),
            analysis: AnalysisController::new(store.clone(), backend.clone(), ats),
            conversation: ConversationController::new(backend),
            store,
        })
    }

    /// Builds a session against the configured HTTP backend and storage.
    pub fn connect(config: &Config) -> Result<Self> {
        let backend = HttpBackend::new(&config.api_url, config.request_timeout())
            .context("Failed to build HTTP client")?;

        let storage: Arc<dyn SessionStorage> = match &config.session_dir {
            Some(dir) => {
                info!("Persisting session state in {}", dir.display());
                Arc::new(FileStorage::open(dir).context("Failed to open session directory")?)
            }
            None => Arc::new(MemoryStorage::new()),
        };

        Ok(Self::new(Arc::new(backend), storage, config.ats_params())?)
    }
}
