use std::sync::Mutex;

use serde::Serialize;
use tracing::{info, warn};
use url::form_urlencoded;

/// URL scheme registered by the desktop helper.
pub const SCHEME: &str = "webprinter";

/// Build `webprinter://<action>[?k=v&...]` with form-style query encoding.
pub fn build_protocol_url<K, V>(action: &str, params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut query = form_urlencoded::Serializer::new(String::new());
    for (k, v) in params {
        query.append_pair(k.as_ref(), v.as_ref());
    }
    let query = query.finish();
    if query.is_empty() {
        format!("{SCHEME}://{action}")
    } else {
        format!("{SCHEME}://{action}?{query}")
    }
}

/// Hands a URL to whatever the platform has registered for it.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &str) -> std::io::Result<()>;
}

impl<N: Navigator + ?Sized> Navigator for &N {
    fn navigate(&self, url: &str) -> std::io::Result<()> {
        (**self).navigate(url)
    }
}

/// Opens URLs through the OS handler (`xdg-open`, `open`, `start`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemNavigator;

impl Navigator for SystemNavigator {
    fn navigate(&self, url: &str) -> std::io::Result<()> {
        open::that_detached(url)
    }
}

/// Keeps every URL instead of opening it. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    urls: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &str) -> std::io::Result<()> {
        if let Ok(mut urls) = self.urls.lock() {
            urls.push(url.to_string());
        }
        Ok(())
    }
}

/// Whether navigation was attempted. A missing handler is not observable.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LaunchOutcome {
    pub success: bool,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Wakes the helper through its URL scheme.
#[derive(Debug, Default)]
pub struct Launcher<N = SystemNavigator> {
    navigator: N,
}

impl<N: Navigator> Launcher<N> {
    pub fn new(navigator: N) -> Self {
        Self { navigator }
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    pub fn launch_status(&self) -> LaunchOutcome {
        self.go(build_protocol_url::<&str, &str>("status", &[]))
    }

    pub fn launch_open(&self, session: &str) -> LaunchOutcome {
        self.go(build_protocol_url("open", &[("session", session)]))
    }

    pub fn launch_print(&self, session: &str) -> LaunchOutcome {
        self.go(build_protocol_url("print", &[("session", session)]))
    }

    /// Open the installer download in the browser.
    pub fn open_install_page(&self, url: &str) -> LaunchOutcome {
        self.go(url.to_string())
    }

    fn go(&self, url: String) -> LaunchOutcome {
        match self.navigator.navigate(&url) {
            Ok(()) => {
                info!(%url, "navigated");
                LaunchOutcome {
                    success: true,
                    url,
                    error: None,
                }
            }
            Err(e) => {
                warn!(%url, error = %e, "navigation failed");
                LaunchOutcome {
                    success: false,
                    url,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn bare_action_has_no_query() {
        assert_eq!(build_protocol_url::<&str, &str>("status", &[]), "webprinter://status");
    }

    #[test]
    fn simple_session_param() {
        assert_eq!(
            build_protocol_url("open", &[("session", "abc")]),
            "webprinter://open?session=abc"
        );
    }

    #[test]
    fn reserved_characters_survive_reparse() {
        let raw = "a b&c=d/é?#%";
        let url = build_protocol_url("print", &[("session", raw)]);
        assert!(!url.contains(' '));
        assert!(!url.contains("&c"));
        let parsed = Url::parse(&url).unwrap();
        let got: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        assert_eq!(got, vec![("session".to_string(), raw.to_string())]);
    }

    #[test]
    fn launcher_records_urls() {
        let l = Launcher::new(RecordingNavigator::default());
        assert!(l.launch_status().success);
        let out = l.launch_open("web_1");
        assert_eq!(out.url, "webprinter://open?session=web_1");
        l.launch_print("web_1");
        assert_eq!(
            l.navigator().urls(),
            vec![
                "webprinter://status",
                "webprinter://open?session=web_1",
                "webprinter://print?session=web_1"
            ]
        );
    }

    #[test]
    fn borrowed_recorder_keeps_urls_for_caller() {
        let rec = RecordingNavigator::default();
        {
            let l = Launcher::new(&rec);
            l.launch_status();
            l.launch_open("web_7");
        }
        assert_eq!(
            rec.urls(),
            vec!["webprinter://status", "webprinter://open?session=web_7"]
        );
    }

    struct Broken;

    impl Navigator for Broken {
        fn navigate(&self, _url: &str) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no handler"))
        }
    }

    #[test]
    fn navigation_failure_is_reported_not_raised() {
        let out = Launcher::new(Broken).launch_status();
        assert!(!out.success);
        assert_eq!(out.error.as_deref(), Some("no handler"));
    }
}
