use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::session::analysis::{AtsParams, DEFAULT_ATS_JOB_DESCRIPTION, DEFAULT_ATS_ROLE};

const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Client configuration loaded from environment variables.
/// Every variable has a default; only malformed values are errors.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub timeout_secs: u64,
    /// Where the document text is persisted. In-memory only when unset.
    pub session_dir: Option<PathBuf>,
    pub ats_role: String,
    /// An empty value disables AI feedback on the ATS view.
    pub ats_job_description: Option<String>,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let or_default =
            |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Config {
            api_url: or_default("RESUMINI_API_URL", DEFAULT_API_URL),
            timeout_secs: match lookup("RESUMINI_TIMEOUT_SECS") {
                Some(v) => v
                    .parse::<u64>()
                    .context("RESUMINI_TIMEOUT_SECS must be a whole number of seconds")?,
                None => DEFAULT_TIMEOUT_SECS,
            },
            session_dir: lookup("RESUMINI_SESSION_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            ats_role: or_default("ATS_TARGET_ROLE", DEFAULT_ATS_ROLE),
            ats_job_description: Some(or_default(
                "ATS_JOB_DESCRIPTION",
                DEFAULT_ATS_JOB_DESCRIPTION,
            ))
            .filter(|v| !v.trim().is_empty()),
            rust_log: or_default("RUST_LOG", "info"),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn ats_params(&self) -> AtsParams {
        AtsParams {
            role: self.ats_role.clone(),
            job_description: self.ats_job_description.clone(),
        }
    }
}
