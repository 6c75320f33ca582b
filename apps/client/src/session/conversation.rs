//! Conversation Controller — the multi-turn chat about the uploaded resume.
//!
//! The transcript is append-only. The user's turn is recorded before the request is
//! sent, at most one query is outstanding, and a failed request still ends with an
//! assistant turn so the transcript always reads as a complete exchange.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::{ResumeBackend, CHAT_TOP_K};
use crate::errors::{Operation, SessionError};

/// Seed turn shown when a conversation starts.
pub const WELCOME_MESSAGE: &str = "Hello! I have analyzed your resume. Ask me anything about \
    your experience, skills, or how to improve.";

/// Assistant turn recorded when a chat request fails.
pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error connecting to the brain.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Whether an assistant turn is a real answer or the fallback for a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnKind {
    Message,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub kind: TurnKind,
    pub at: DateTime<Utc>,
}

impl Turn {
    fn new(role: Role, content: impl Into<String>, kind: TurnKind) -> Self {
        Self {
            role,
            content: content.into(),
            kind,
            at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, TurnKind::Message)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, TurnKind::Message)
    }

    pub fn failure() -> Self {
        Self::new(Role::Assistant, FALLBACK_REPLY, TurnKind::Failure)
    }
}

#[derive(Debug)]
struct Transcript {
    turns: Vec<Turn>,
    pending: bool,
}

fn lock(transcript: &Mutex<Transcript>) -> MutexGuard<'_, Transcript> {
    transcript.lock().unwrap_or_else(|e| e.into_inner())
}

/// Owns the `pending` latch of one accepted query.
///
/// Settling appends the reply and clears the latch. Dropping an unsettled reply
/// appends the fallback turn instead, so the latch is released exactly once.
struct PendingReply {
    transcript: Arc<Mutex<Transcript>>,
    settled: bool,
}

impl PendingReply {
    fn settle(mut self, turn: Turn) -> Turn {
        self.finish(turn.clone());
        turn
    }

    fn finish(&mut self, turn: Turn) {
        let mut transcript = lock(&self.transcript);
        transcript.turns.push(turn);
        transcript.pending = false;
        self.settled = true;
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Chat request ended without a reply");
            self.finish(Turn::failure());
        }
    }
}

#[derive(Clone)]
pub struct ConversationController {
    backend: Arc<dyn ResumeBackend>,
    transcript: Arc<Mutex<Transcript>>,
    top_k: u32,
}

impl ConversationController {
    pub fn new(backend: Arc<dyn ResumeBackend>) -> Self {
        Self {
            backend,
            transcript: Arc::new(Mutex::new(Transcript {
                turns: vec![Turn::assistant(WELCOME_MESSAGE)],
                pending: false,
            })),
            top_k: CHAT_TOP_K,
        }
    }

    /// Sends one query and returns the assistant turn that answered it.
    ///
    /// Blank input is ignored (`Ok(None)`). While another query is outstanding the
    /// call is rejected with `Busy` and the transcript is left untouched. Backend
    /// failures are not errors: they produce a `TurnKind::Failure` turn.
    pub async fn ask(&self, query: &str) -> Result<Option<Turn>, SessionError> {
        if query.trim().is_empty() {
            debug!("Ignoring blank query");
            return Ok(None);
        }

        {
            let mut transcript = lock(&self.transcript);
            if transcript.pending {
                return Err(SessionError::Busy(Operation::Chat));
            }
            transcript.turns.push(Turn::user(query));
            transcript.pending = true;
        }

        let reply = PendingReply {
            transcript: self.transcript.clone(),
            settled: false,
        };
        let backend = self.backend.clone();
        let query = query.to_string();
        let top_k = self.top_k;

        info!("Sending chat query ({} chars)", query.len());
        // Spawned so a caller that goes away cannot leave the latch set
        let handle = tokio::spawn(async move {
            let turn = match backend.chat(&query, top_k).await {
                Ok(response) => Turn::assistant(response.report),
                Err(e) => {
                    warn!("Chat query failed: {e}");
                    Turn::failure()
                }
            };
            reply.settle(turn)
        });

        match handle.await {
            Ok(turn) => Ok(Some(turn)),
            Err(e) => {
                warn!("Chat task aborted: {e}");
                // The reply guard has already recorded the fallback turn
                Ok(lock(&self.transcript).turns.last().cloned())
            }
        }
    }

    pub fn transcript(&self) -> Vec<Turn> {
        lock(&self.transcript).turns.clone()
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.transcript).pending
    }
}
