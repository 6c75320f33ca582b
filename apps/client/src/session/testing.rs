//! Scripted `ResumeBackend` and `SessionStorage` doubles for controller tests.
//!
//! Every backend call is counted. A gated backend holds each call until the test
//! releases a permit, which keeps requests observably in flight.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::backend::models::{
    AtsRequest, AtsResponse, AtsScores, ChatResponse, SummaryResponse, UploadFile,
    UploadResponse,
};
use crate::backend::{BackendError, ResumeBackend};
use crate::storage::{MemoryStorage, SessionStorage, StorageError};

#[derive(Default)]
pub struct ScriptedBackend {
    pub uploads: AtomicUsize,
    pub summaries: AtomicUsize,
    pub ats_calls: AtomicUsize,
    pub chats: AtomicUsize,
    pub fail_upload: AtomicBool,
    pub fail_summary: AtomicBool,
    pub fail_ats: AtomicBool,
    pub fail_chat: AtomicBool,
    pub panic_chat: AtomicBool,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A backend whose calls block until [`ScriptedBackend::release`].
    pub fn gated() -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        })
    }

    pub fn release(&self, calls: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(calls);
        }
    }

    async fn enter(&self, counter: &AtomicUsize) -> usize {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        n
    }

    fn failure() -> BackendError {
        BackendError::Api {
            status: 500,
            message: "boom".to_string(),
        }
    }
}

/// Yields to spawned tasks until `counter` reaches `n`.
pub async fn wait_for_calls(counter: &AtomicUsize, n: usize) {
    while counter.load(Ordering::SeqCst) < n {
        tokio::task::yield_now().await;
    }
}

#[async_trait]
impl ResumeBackend for ScriptedBackend {
    async fn upload_file(&self, file: &UploadFile) -> Result<UploadResponse, BackendError> {
        self.enter(&self.uploads).await;
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(Self::failure());
        }
        Ok(UploadResponse {
            status: "success".to_string(),
            extracted_text: String::from_utf8_lossy(&file.bytes).into_owned(),
            message: None,
            rag_status: None,
        })
    }

    async fn summarize(&self, text: &str) -> Result<SummaryResponse, BackendError> {
        let n = self.enter(&self.summaries).await;
        if self.fail_summary.load(Ordering::SeqCst) {
            return Err(Self::failure());
        }
        Ok(SummaryResponse {
            status: "success".to_string(),
            report: format!("summary #{n} of {text}"),
        })
    }

    async fn ats_score(&self, request: &AtsRequest) -> Result<AtsResponse, BackendError> {
        self.enter(&self.ats_calls).await;
        if self.fail_ats.load(Ordering::SeqCst) {
            return Err(Self::failure());
        }
        Ok(AtsResponse {
            status: "success".to_string(),
            role: Some(request.role.clone()),
            ats_report: AtsScores {
                overall_score: 70.0,
                keyword_score: 55.0,
                structure_score: Some(80.0),
                formatting_score: None,
                length_score: Some(100.0),
            },
            ai_feedback: request.job_description.clone(),
            match_score: Some(62.0),
        })
    }

    async fn chat(&self, query: &str, top_k: u32) -> Result<ChatResponse, BackendError> {
        self.enter(&self.chats).await;
        if self.panic_chat.load(Ordering::SeqCst) {
            panic!("chat handler crashed");
        }
        if self.fail_chat.load(Ordering::SeqCst) {
            return Err(Self::failure());
        }
        Ok(ChatResponse {
            status: "success".to_string(),
            report: format!("reply to {query} (top_k={top_k})"),
        })
    }
}

/// Storage whose writes start failing once `fail_writes` is set.
#[derive(Default)]
pub struct FlakyStorage {
    inner: MemoryStorage,
    pub fail_writes: AtomicBool,
}

impl FlakyStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl SessionStorage for FlakyStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io {
                key: key.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key)
    }
}
