use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};

use crate::session::unix_millis;
use crate::types::UpdateInfo;

/// Public release bucket the helper's auto-updater reads from.
pub const RELEASE_BASE_URL: &str =
    "https://storage.googleapis.com/tour-gov/code-x-team/webprint-electron/latest";

/// Text mirror used to read the manifest without cross-origin trouble.
pub const MIRROR_PREFIX: &str = "https://r.jina.ai/";

/// Installer name the bucket always carries alongside the versioned one.
pub const INSTALLER_ALIAS: &str = "WebPrinter-Setup.exe";

/// Where release metadata lives and how to reach it.
#[derive(Debug, Clone)]
pub struct UpdateSource {
    pub base_url: String,
    pub mirror_prefix: String,
    pub timeout: Duration,
}

impl Default for UpdateSource {
    fn default() -> Self {
        Self {
            base_url: RELEASE_BASE_URL.to_string(),
            mirror_prefix: MIRROR_PREFIX.to_string(),
            timeout: Duration::from_millis(3000),
        }
    }
}

impl UpdateSource {
    pub fn manifest_url(&self) -> String {
        format!("{}/latest.yml", self.base_url.trim_end_matches('/'))
    }

    pub fn installer_alias_url(&self) -> String {
        format!("{}/{INSTALLER_ALIAS}", self.base_url.trim_end_matches('/'))
    }

    /// Rewrite `target` so it is fetched through the mirror.
    pub fn mirror_url(&self, target: &str) -> String {
        if let Some(rest) = target.strip_prefix("https://") {
            format!("{}{rest}", self.mirror_prefix)
        } else {
            let rest = target.strip_prefix("http://").unwrap_or(target);
            format!("{}http://{rest}", self.mirror_prefix)
        }
    }
}

/// Fields scraped out of `latest.yml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestMeta {
    pub version: Option<String>,
    pub exe_path: Option<String>,
}

/// Pull `version:` and `path: *.exe` out of mirrored manifest text.
///
/// The mirror may flatten line breaks, so both tokens are matched anywhere.
/// Returns `None` when neither is present.
pub fn parse_latest_manifest(text: &str) -> Option<ManifestMeta> {
    static VERSION: OnceLock<Regex> = OnceLock::new();
    static PATH: OnceLock<Regex> = OnceLock::new();
    let version_re =
        VERSION.get_or_init(|| Regex::new(r"(?i)version:\s*(\S+)").expect("valid regex"));
    let path_re =
        PATH.get_or_init(|| Regex::new(r"(?i)path:\s*(\S+\.exe)").expect("valid regex"));

    let capture = |re: &Regex| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    };
    let meta = ManifestMeta {
        version: capture(version_re),
        exe_path: capture(path_re),
    };
    if meta.version.is_none() && meta.exe_path.is_none() {
        return None;
    }
    Some(meta)
}

/// Advisory lookup of the newest published helper.
#[derive(Debug, Clone, Default)]
pub struct UpdateInfoFetcher {
    client: reqwest::Client,
    source: UpdateSource,
}

impl UpdateInfoFetcher {
    pub fn new(source: UpdateSource) -> Self {
        Self {
            client: reqwest::Client::new(),
            source,
        }
    }

    pub fn with_client(client: reqwest::Client, source: UpdateSource) -> Self {
        Self { client, source }
    }

    pub fn source(&self) -> &UpdateSource {
        &self.source
    }

    /// Never fails; unknown fields come back as `None` and the download
    /// link falls back to the installer alias.
    pub async fn get_latest_info(&self) -> UpdateInfo {
        let manifest_url = self.source.manifest_url();
        let meta = self
            .fetch_text(&manifest_url)
            .await
            .and_then(|t| parse_latest_manifest(&t))
            .unwrap_or_default();

        let download_url = match &meta.exe_path {
            Some(p) => format!("{}/{p}", self.source.base_url.trim_end_matches('/')),
            None => self.source.installer_alias_url(),
        };
        debug!(version = ?meta.version, %download_url, "latest release");

        UpdateInfo {
            version: meta.version,
            manifest_url,
            download_url,
        }
    }

    async fn fetch_text(&self, target: &str) -> Option<String> {
        let busted = format!("{target}?t={}", unix_millis());
        let url = self.source.mirror_url(&busted);
        let res = match self
            .client
            .get(&url)
            .timeout(self.source.timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(%url, error = %e, "manifest fetch failed");
                return None;
            }
        };
        if !res.status().is_success() {
            warn!(%url, status = %res.status(), "manifest fetch rejected");
            return None;
        }
        res.text().await.ok()
    }
}
