use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::detector::loopback_client;
use crate::types::{Candidate, PrintJob, SendUrlsRequest, SendUrlsResponse};

/// Message used when the helper rejects a job without saying why.
pub const GENERIC_FAILURE: &str = "print submission failed";

/// The only failures that reach the user.
#[derive(Debug, Error)]
pub enum PrintError {
    #[error("{0}")]
    Rejected(String),
    #[error("print helper unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),
    #[error("print helper not found; install or start WebPrinter")]
    NotFound,
    #[error("invalid print job: {0}")]
    InvalidJob(&'static str),
    #[error("a print request is already in progress")]
    Busy,
}

impl PrintJob {
    /// Validate and build a job. At least one URL is required and both paper
    /// dimensions must be positive.
    pub fn new(
        session_id: impl Into<String>,
        preview_url: &str,
        print_url: &str,
        paper_width: f64,
        paper_height: f64,
    ) -> Result<Self, PrintError> {
        let preview_url = preview_url.trim();
        let print_url = print_url.trim();
        if preview_url.is_empty() && print_url.is_empty() {
            return Err(PrintError::InvalidJob("a preview or print URL is required"));
        }
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(paper_width) || !valid(paper_height) {
            return Err(PrintError::InvalidJob("paper size must be positive"));
        }
        Ok(Self {
            session_id: session_id.into(),
            preview_url: preview_url.to_string(),
            print_url: print_url.to_string(),
            paper_width,
            paper_height,
        })
    }
}

/// Default bound on one submission, connect through reply.
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Submits print jobs to a discovered helper. No retries.
#[derive(Debug, Clone)]
pub struct PrintClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl Default for PrintClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PrintClient {
    pub fn new() -> Self {
        Self::with_client(loopback_client())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: SUBMIT_TIMEOUT,
        }
    }

    /// A helper that accepts the connection but never replies fails after
    /// `timeout` as `Unreachable`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn send(&self, target: &Candidate, job: &PrintJob) -> Result<(), PrintError> {
        let url = format!("{}/send-urls", target.base_url());
        let res = self
            .client
            .post(&url)
            .json(&SendUrlsRequest::from(job))
            .timeout(self.timeout)
            .send()
            .await?;

        let status = res.status();
        let envelope = match res.json::<SendUrlsResponse>().await {
            Ok(e) => Some(e),
            Err(e) if e.is_timeout() => return Err(PrintError::Unreachable(e)),
            Err(_) => None,
        };
        match envelope {
            Some(SendUrlsResponse { success: true, .. }) if status.is_success() => {
                info!(%url, session = %job.session_id, "print job accepted");
                Ok(())
            }
            other => {
                let msg = other
                    .and_then(|e| e.error)
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| GENERIC_FAILURE.to_string());
                warn!(%url, %status, error = %msg, "print job rejected");
                Err(PrintError::Rejected(msg))
            }
        }
    }
}
