//! Request and response bodies of the Resumini backend.
//!
//! Field names are the backend's wire names and must not be renamed.

use std::path::Path;

use bytes::Bytes;
use mime_guess::MimeGuess;
use serde::{Deserialize, Serialize};

/// The value of `status` on every successful backend response.
pub const STATUS_SUCCESS: &str = "success";

// ────────────────────────────────────────────────────────────────────────────
// Upload
// ────────────────────────────────────────────────────────────────────────────

/// A raw file handed to the client by a drop or the file picker.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    /// Declared media type, e.g. `application/pdf`.
    pub media_type: String,
    pub bytes: Bytes,
}

impl UploadFile {
    pub fn new(
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a file from disk, declaring the media type guessed from its extension.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let media_type = MimeGuess::from_path(path)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "resume".to_string());

        Ok(Self::new(file_name, media_type, bytes))
    }
}

/// POST /upload/file
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub status: String,
    pub extracted_text: String,
    pub message: Option<String>,
    pub rag_status: Option<serde_json::Value>,
}

// ────────────────────────────────────────────────────────────────────────────
// Analysis
// ────────────────────────────────────────────────────────────────────────────

/// POST /analyze/summary
#[derive(Debug, Serialize)]
pub struct SummaryRequest<'a> {
    pub text: &'a str,
}

/// Shared shape of the summary and chat responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportResponse {
    pub status: String,
    pub report: String,
}

pub type SummaryResponse = ReportResponse;
pub type ChatResponse = ReportResponse;

/// POST /analyze/ats
#[derive(Debug, Clone, Serialize)]
pub struct AtsRequest {
    pub resume_text: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtsScores {
    pub overall_score: f64,
    pub keyword_score: f64,
    pub structure_score: Option<f64>,
    pub formatting_score: Option<f64>,
    pub length_score: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AtsResponse {
    pub status: String,
    pub role: Option<String>,
    pub ats_report: AtsScores,
    /// Absent when no job description was sent.
    pub ai_feedback: Option<String>,
    pub match_score: Option<f64>,
}

// ────────────────────────────────────────────────────────────────────────────
// Chat
// ────────────────────────────────────────────────────────────────────────────

/// POST /chat
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub query: &'a str,
    pub top_k: u32,
}

/// FastAPI error body: `{"detail": "..."}` or a structured validation list.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}
