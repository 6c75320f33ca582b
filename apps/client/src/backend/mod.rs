/// Backend client — the single point of entry for all calls to the Resumini API.
///
/// No controller talks HTTP directly; they hold an `Arc<dyn ResumeBackend>`.
/// Failures are never retried here: the session layer decides what a failure means.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod models;

use models::{
    AtsRequest, AtsResponse, ChatRequest, ChatResponse, ErrorBody, SummaryRequest,
    SummaryResponse, UploadFile, UploadResponse, STATUS_SUCCESS,
};

/// Retrieval breadth sent with every chat query.
pub const CHAT_TOP_K: u32 = 4;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Backend reported status '{status}'")]
    Rejected { status: String },
}

impl BackendError {
    /// A short description suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Http(e) if e.is_timeout() => "the backend timed out".to_string(),
            BackendError::Http(_) => "the backend could not be reached".to_string(),
            BackendError::Api { message, .. } => message.clone(),
            BackendError::Decode(_) => "the backend sent an unreadable response".to_string(),
            BackendError::Rejected { status } => format!("the backend reported '{status}'"),
        }
    }
}

/// The four endpoints the client depends on.
#[async_trait]
pub trait ResumeBackend: Send + Sync {
    async fn upload_file(&self, file: &UploadFile) -> Result<UploadResponse, BackendError>;

    async fn summarize(&self, text: &str) -> Result<SummaryResponse, BackendError>;

    async fn ats_score(&self, request: &AtsRequest) -> Result<AtsResponse, BackendError>;

    async fn chat(&self, query: &str, top_k: u32) -> Result<ChatResponse, BackendError>;
}

/// `ResumeBackend` over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        debug!("POST {path}");
        let response = self.client.post(self.url(path)).json(body).send().await?;
        decode(path, response).await
    }
}

/// Maps a response to `T`, turning non-2xx statuses into `BackendError::Api`.
async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, BackendError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        warn!("{path} returned {status}: {body}");
        // FastAPI puts the reason in `detail`
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.message())
            .unwrap_or(body);
        return Err(BackendError::Api {
            status: status.as_u16(),
            message,
        });
    }

    Ok(serde_json::from_str(&body)?)
}

fn ensure_success(status: &str) -> Result<(), BackendError> {
    if status == STATUS_SUCCESS {
        Ok(())
    } else {
        Err(BackendError::Rejected {
            status: status.to_string(),
        })
    }
}

#[async_trait]
impl ResumeBackend for HttpBackend {
    async fn upload_file(&self, file: &UploadFile) -> Result<UploadResponse, BackendError> {
        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.file_name.clone())
            .mime_str(&file.media_type)?;
        let form = Form::new().part("file", part);

        debug!("POST /upload/file ({} bytes)", file.bytes.len());
        let response = self
            .client
            .post(self.url("/upload/file"))
            .multipart(form)
            .send()
            .await?;
        let parsed: UploadResponse = decode("/upload/file", response).await?;
        ensure_success(&parsed.status)?;
        Ok(parsed)
    }

    async fn summarize(&self, text: &str) -> Result<SummaryResponse, BackendError> {
        let parsed: SummaryResponse = self
            .post_json("/analyze/summary", &SummaryRequest { text })
            .await?;
        ensure_success(&parsed.status)?;
        Ok(parsed)
    }

    async fn ats_score(&self, request: &AtsRequest) -> Result<AtsResponse, BackendError> {
        let parsed: AtsResponse = self.post_json("/analyze/ats", request).await?;
        ensure_success(&parsed.status)?;
        Ok(parsed)
    }

    async fn chat(&self, query: &str, top_k: u32) -> Result<ChatResponse, BackendError> {
        let parsed: ChatResponse = self
            .post_json("/chat", &ChatRequest { query, top_k })
            .await?;
        ensure_success(&parsed.status)?;
        Ok(parsed)
    }
}
