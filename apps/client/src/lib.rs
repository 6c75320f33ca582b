//! Resumini client: session orchestration for the resume-analysis service.
//!
//! Upload a resume, read its summary and ATS score, and chat about it. The
//! backend does all extraction, scoring and retrieval; this crate owns the
//! session state around those four endpoints.

pub mod backend;
pub mod config;
pub mod errors;
pub mod session;
pub mod storage;

pub use errors::{Operation, SessionError};
pub use session::Session;
