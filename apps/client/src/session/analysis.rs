//! Analysis views — lazily fetched, memoized reports derived from the current document.
//!
//! Each view kind moves `Empty → Loading → Ready | Failed` at most once per document.
//! A `Ready` view answers from the cache; a `Loading` view hands every caller the same
//! in-flight result; a `Failed` view is fetched again on the next request.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::models::{AtsRequest, AtsResponse, AtsScores};
use crate::backend::ResumeBackend;
use crate::errors::SessionError;
use crate::session::document::{Document, DocumentId, DocumentObserver, DocumentStore};

/// Target role used for ATS scoring when none is configured.
pub const DEFAULT_ATS_ROLE: &str = "Software Engineer";

/// Job description used for ATS scoring when none is configured.
pub const DEFAULT_ATS_JOB_DESCRIPTION: &str = "We are looking for a Software Engineer with \
    experience in Python, JavaScript, and React. The candidate should have knowledge of web \
    development, databases (SQL/NoSQL), and cloud platforms like AWS. Strong problem-solving \
    skills and experience with Git/Agile workflows are required.";

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Summary,
    Ats,
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisKind::Summary => f.write_str("summary"),
            AnalysisKind::Ats => f.write_str("ats"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewStatus {
    Empty,
    Loading,
    Ready,
    Failed,
}

/// ATS scoring result as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtsReport {
    pub role: Option<String>,
    pub scores: AtsScores,
    pub ai_feedback: Option<String>,
    pub match_score: Option<f64>,
}

impl From<AtsResponse> for AtsReport {
    fn from(response: AtsResponse) -> Self {
        Self {
            role: response.role,
            scores: response.ats_report,
            ai_feedback: response.ai_feedback,
            match_score: response.match_score,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewPayload {
    /// Markdown executive summary.
    Summary(String),
    Ats(AtsReport),
}

/// Snapshot of one view. `data` is set iff `Ready`, `error` iff `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisView {
    pub kind: AnalysisKind,
    pub status: ViewStatus,
    pub data: Option<ViewPayload>,
    pub error: Option<SessionError>,
}

/// Fixed inputs for the ATS endpoint, supplied by configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtsParams {
    pub role: String,
    pub job_description: Option<String>,
}

impl Default for AtsParams {
    fn default() -> Self {
        Self {
            role: DEFAULT_ATS_ROLE.to_string(),
            job_description: Some(DEFAULT_ATS_JOB_DESCRIPTION.to_string()),
        }
    }
}

type Outcome = Result<ViewPayload, SessionError>;

/// Result of [`AnalysisController::request`].
#[derive(Debug)]
pub enum AnalysisRequest {
    /// Served from the cache without a network call.
    Ready(ViewPayload),
    /// A fetch is in flight; every holder observes the same result.
    Pending(PendingAnalysis),
}

impl AnalysisRequest {
    pub async fn resolve(self) -> Result<ViewPayload, SessionError> {
        match self {
            AnalysisRequest::Ready(payload) => Ok(payload),
            AnalysisRequest::Pending(pending) => pending.wait().await,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PendingAnalysis {
    kind: AnalysisKind,
    done: watch::Receiver<Option<Outcome>>,
}

impl PendingAnalysis {
    pub fn kind(&self) -> AnalysisKind {
        self.kind
    }

    pub async fn wait(mut self) -> Result<ViewPayload, SessionError> {
        let outcome = match self.done.wait_for(Option::is_some).await {
            Ok(value) => Option::clone(&value),
            Err(_) => None,
        };
        outcome.unwrap_or_else(|| Err(abandoned(self.kind)))
    }
}

fn abandoned(kind: AnalysisKind) -> SessionError {
    SessionError::Analysis(format!("the {kind} request ended without a result"))
}

// ────────────────────────────────────────────────────────────────────────────
// Cache
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum Slot {
    Empty,
    Loading {
        ticket: u64,
        done: watch::Receiver<Option<Outcome>>,
    },
    Ready(ViewPayload),
    Failed(SessionError),
}

impl Slot {
    /// A loading slot whose task died without publishing anything.
    fn is_abandoned(&self) -> bool {
        match self {
            Slot::Loading { done, .. } => done.borrow().is_none() && done.has_changed().is_err(),
            _ => false,
        }
    }
}

#[derive(Debug)]
struct CacheState {
    document: Option<DocumentId>,
    next_ticket: u64,
    summary: Slot,
    ats: Slot,
}

impl CacheState {
    fn slot(&self, kind: AnalysisKind) -> &Slot {
        match kind {
            AnalysisKind::Summary => &self.summary,
            AnalysisKind::Ats => &self.ats,
        }
    }

    fn slot_mut(&mut self, kind: AnalysisKind) -> &mut Slot {
        match kind {
            AnalysisKind::Summary => &mut self.summary,
            AnalysisKind::Ats => &mut self.ats,
        }
    }

    fn reset_for(&mut self, document: Option<DocumentId>) {
        self.document = document;
        self.summary = Slot::Empty;
        self.ats = Slot::Empty;
    }
}

/// Per-view results for the current document.
#[derive(Debug)]
pub(crate) struct AnalysisCache {
    state: Mutex<CacheState>,
}

impl AnalysisCache {
    fn new() -> Self {
        Self {
            state: Mutex::new(CacheState {
                document: None,
                next_ticket: 0,
                summary: Slot::Empty,
                ats: Slot::Empty,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Drops every view; in-flight fetches become stale.
    ///
    /// A notification for the document the cache already targets is a no-op, so a
    /// fetch started for it before the notification arrived keeps its slot.
    pub(crate) fn invalidate(&self, document: Option<DocumentId>) {
        let mut state = self.lock();
        if state.document == document {
            debug!("Analysis views already target the current document");
            return;
        }
        state.reset_for(document);
    }

    /// Applies a finished fetch unless the cache has moved on since it started.
    fn complete(
        &self,
        kind: AnalysisKind,
        document: DocumentId,
        ticket: u64,
        outcome: &Outcome,
    ) {
        let mut state = self.lock();
        let current = state.document == Some(document)
            && matches!(
                state.slot(kind),
                Slot::Loading { ticket: t, .. } if *t == ticket
            );
        if !current {
            debug!("Discarding stale {kind} result (ticket {ticket})");
            return;
        }
        *state.slot_mut(kind) = match outcome {
            Ok(payload) => Slot::Ready(payload.clone()),
            Err(e) => Slot::Failed(e.clone()),
        };
    }
}

impl DocumentObserver for AnalysisCache {
    fn document_changed(&self, current: Option<DocumentId>) {
        debug!("Invalidating analysis views");
        self.invalidate(current);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Controller
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AnalysisController {
    store: Arc<DocumentStore>,
    backend: Arc<dyn ResumeBackend>,
    cache: Arc<AnalysisCache>,
    ats: Arc<AtsParams>,
}

impl AnalysisController {
    pub fn new(
        store: Arc<DocumentStore>,
        backend: Arc<dyn ResumeBackend>,
        ats: AtsParams,
    ) -> Self {
        let cache = Arc::new(AnalysisCache::new());
        let observer: Weak<dyn DocumentObserver> = Arc::downgrade(&cache) as _;
        store.subscribe(observer);

        Self {
            store,
            backend,
            cache,
            ats: Arc::new(ats),
        }
    }

    /// Returns the cached view, joins the in-flight fetch, or starts a new one.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn request(&self, kind: AnalysisKind) -> Result<AnalysisRequest, SessionError> {
        // Read under the cache lock so the cache never moves back to a replaced document
        let mut state = self.cache.lock();
        let document = self.store.document().ok_or(SessionError::NoDocument)?;
        if state.document != Some(document.id) {
            state.reset_for(Some(document.id));
        }

        let slot = state.slot(kind);
        if slot.is_abandoned() {
            warn!("{kind} fetch was abandoned; starting over");
        } else {
            match slot {
                Slot::Ready(payload) => {
                    debug!("{kind} served from cache");
                    return Ok(AnalysisRequest::Ready(payload.clone()));
                }
                Slot::Loading { done, .. } => {
                    debug!("{kind} already loading; joining");
                    return Ok(AnalysisRequest::Pending(PendingAnalysis {
                        kind,
                        done: done.clone(),
                    }));
                }
                Slot::Empty | Slot::Failed(_) => {}
            }
        }

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        let (tx, rx) = watch::channel(None);
        *state.slot_mut(kind) = Slot::Loading {
            ticket,
            done: rx.clone(),
        };
        drop(state);

        info!("Fetching {kind} for document {}", document.id);
        tokio::spawn(run_fetch(
            self.backend.clone(),
            self.cache.clone(),
            self.ats.clone(),
            document,
            kind,
            ticket,
            tx,
        ));

        Ok(AnalysisRequest::Pending(PendingAnalysis { kind, done: rx }))
    }

    /// `request` followed by waiting for the result.
    pub async fn fetch(&self, kind: AnalysisKind) -> Result<ViewPayload, SessionError> {
        self.request(kind)?.resolve().await
    }

    pub fn view(&self, kind: AnalysisKind) -> AnalysisView {
        let state = self.cache.lock();
        let (status, data, error) = match state.slot(kind) {
            Slot::Empty => (ViewStatus::Empty, None, None),
            Slot::Loading { .. } => (ViewStatus::Loading, None, None),
            Slot::Ready(payload) => (ViewStatus::Ready, Some(payload.clone()), None),
            Slot::Failed(e) => (ViewStatus::Failed, None, Some(e.clone())),
        };
        AnalysisView {
            kind,
            status,
            data,
            error,
        }
    }
}

async fn run_fetch(
    backend: Arc<dyn ResumeBackend>,
    cache: Arc<AnalysisCache>,
    ats: Arc<AtsParams>,
    document: Arc<Document>,
    kind: AnalysisKind,
    ticket: u64,
    tx: watch::Sender<Option<Outcome>>,
) {
    let result = match kind {
        AnalysisKind::Summary => backend
            .summarize(&document.text)
            .await
            .map(|r| ViewPayload::Summary(r.report)),
        AnalysisKind::Ats => {
            let request = AtsRequest {
                resume_text: document.text.clone(),
                role: ats.role.clone(),
                job_description: ats.job_description.clone(),
            };
            backend
                .ats_score(&request)
                .await
                .map(|r| ViewPayload::Ats(r.into()))
        }
    };

    let outcome = result.map_err(|e| {
        warn!("{kind} fetch for document {} failed: {e}", document.id);
        SessionError::analysis(&e)
    });
    if outcome.is_ok() {
        info!("{kind} ready for document {}", document.id);
    }

    cache.complete(kind, document.id, ticket, &outcome);
    tx.send_replace(Some(outcome));
}
