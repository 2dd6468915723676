use serde::{Deserialize, Serialize};

/// One (host, port) pair the detector may probe.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub host: String,
    pub port: u16,
}

impl Candidate {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Base URL of the helper's local HTTP API at this candidate.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Outcome of a single liveness probe. A miss carries no host or port.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    pub found: bool,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl ProbeResult {
    pub fn hit(host: impl Into<String>, port: u16) -> Self {
        Self {
            found: true,
            host: Some(host.into()),
            port: Some(port),
        }
    }

    pub fn miss() -> Self {
        Self::default()
    }

    pub fn candidate(&self) -> Option<Candidate> {
        match (&self.host, self.port) {
            (Some(h), Some(p)) if self.found => Some(Candidate::new(h.clone(), p)),
            _ => None,
        }
    }
}

/// Result of one `check_installed` cycle.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledInfo {
    pub installed: bool,
    pub port: Option<u16>,
    pub version: Option<String>,
}

impl InstalledInfo {
    pub fn not_installed() -> Self {
        Self::default()
    }
}

/// A print job handed to the helper. Built fresh for every submission.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PrintJob {
    pub session_id: String,
    pub preview_url: String,
    pub print_url: String,
    pub paper_width: f64,
    pub paper_height: f64,
}

/// Latest published helper release, as far as the manifest could tell.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UpdateInfo {
    pub version: Option<String>,
    pub manifest_url: String,
    pub download_url: String,
}

/// `GET /status` body.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StatusBody {
    pub status: String,
}

/// `GET /version` body.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VersionBody {
    pub version: String,
}

/// `POST /send-urls` body.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SendUrlsRequest {
    pub session: String,
    pub preview_url: String,
    pub print_url: String,
    pub paper_width: f64,
    pub paper_height: f64,
    pub paper_size: String,
    pub print_selector: String,
}

pub const PAPER_SIZE_CUSTOM: &str = "Custom";
pub const PRINT_SELECTOR: &str = "#print_wrap";

impl From<&PrintJob> for SendUrlsRequest {
    fn from(job: &PrintJob) -> Self {
        Self {
            session: job.session_id.clone(),
            preview_url: job.preview_url.clone(),
            print_url: job.print_url.clone(),
            paper_width: job.paper_width,
            paper_height: job.paper_height,
            paper_size: PAPER_SIZE_CUSTOM.to_string(),
            print_selector: PRINT_SELECTOR.to_string(),
        }
    }
}

/// `POST /send-urls` response envelope.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SendUrlsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
