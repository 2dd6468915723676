use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::time;
use tracing::{debug, info};

use crate::client::{PrintClient, PrintError};
use crate::config::FlowConfig;
use crate::detector::{Detector, HttpProbe, StatusProbe};
use crate::launcher::{Launcher, Navigator, SystemNavigator};
use crate::session::new_session_id;
use crate::types::{Candidate, PrintJob};

/// What a successful print hand-off produced.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PrintReceipt {
    pub session: String,
    pub host: String,
    pub port: u16,
    pub version: Option<String>,
}

/// Wake, find, submit: the full hand-off of one print request.
pub struct PrintFlow<P = HttpProbe, N = SystemNavigator> {
    config: FlowConfig,
    detector: Detector<P>,
    launcher: Launcher<N>,
    client: PrintClient,
    connecting: AtomicBool,
}

struct ClearOnDrop<'a>(&'a AtomicBool);

impl Drop for ClearOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<P: StatusProbe, N: Navigator> PrintFlow<P, N> {
    pub fn new(
        config: FlowConfig,
        detector: Detector<P>,
        launcher: Launcher<N>,
        client: PrintClient,
    ) -> Self {
        Self {
            config,
            detector,
            launcher,
            client,
            connecting: AtomicBool::new(false),
        }
    }

    pub fn launcher(&self) -> &Launcher<N> {
        &self.launcher
    }

    /// Wake the helper and look for it, retrying `max_retries` times.
    pub async fn locate(&self) -> Option<Candidate> {
        self.launcher.launch_status();
        time::sleep(self.config.retry_delay).await;

        let mut hit = self.detector.find_service(&self.config.discovery).await;
        let mut retries = 0;
        while hit.is_none() && retries < self.config.max_retries {
            retries += 1;
            debug!(retries, "helper not up yet");
            time::sleep(self.config.retry_delay).await;
            hit = self.detector.find_service(&self.config.discovery).await;
        }
        hit
    }

    /// Validate the job, bring the helper up and hand it the job.
    /// Only one request runs at a time; a second caller gets `Busy`.
    pub async fn start_print(
        &self,
        preview_url: &str,
        print_url: &str,
        paper_width: f64,
        paper_height: f64,
    ) -> Result<PrintReceipt, PrintError> {
        let mut job = PrintJob::new("", preview_url, print_url, paper_width, paper_height)?;

        if self.connecting.swap(true, Ordering::SeqCst) {
            return Err(PrintError::Busy);
        }
        let _clear = ClearOnDrop(&self.connecting);

        let target = self.locate().await.ok_or(PrintError::NotFound)?;

        let session = new_session_id();
        self.launcher.launch_open(&session);
        job.session_id = session.clone();

        self.client.send(&target, &job).await?;

        let version = time::timeout(
            self.config.discovery.timeout,
            self.detector.probe().version(&target.host, target.port),
        )
        .await
        .ok()
        .flatten();
        info!(%session, port = target.port, "print job handed off");

        Ok(PrintReceipt {
            session,
            host: target.host,
            port: target.port,
            version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscoveryConfig;
    use crate::detector::tests::FakeProbe;
    use crate::launcher::RecordingNavigator;
    use std::time::Duration;

    fn flow(probe: FakeProbe, retry_ms: u64) -> PrintFlow<FakeProbe, RecordingNavigator> {
        let config = FlowConfig {
            discovery: DiscoveryConfig {
                fixed_port: Some(18731),
                hosts: vec!["127.0.0.1".into()],
                timeout: Duration::from_millis(50),
                ..Default::default()
            },
            retry_delay: Duration::from_millis(retry_ms),
            max_retries: 2,
        };
        PrintFlow::new(
            config,
            Detector::with_probe(probe),
            Launcher::new(RecordingNavigator::default()),
            PrintClient::new(),
        )
    }

    #[tokio::test]
    async fn invalid_job_does_not_wake_helper() {
        let f = flow(FakeProbe::default(), 1);
        let err = f.start_print("", "", 80.0, 100.0).await.unwrap_err();
        assert!(matches!(err, PrintError::InvalidJob(_)));
        assert!(f.launcher().navigator().urls().is_empty());
    }

    #[tokio::test]
    async fn not_found_after_retries() {
        let f = flow(FakeProbe::default(), 1);
        let err = f.start_print("http://a", "", 80.0, 100.0).await.unwrap_err();
        assert!(matches!(err, PrintError::NotFound));
        assert_eq!(f.detector.probe().ports_called().len(), 3);
        assert_eq!(f.launcher().navigator().urls(), vec!["webprinter://status"]);
    }

    #[tokio::test]
    async fn second_request_while_connecting_is_busy() {
        let f = flow(FakeProbe::default(), 40);
        let (a, b) = tokio::join!(
            f.start_print("http://a", "", 80.0, 100.0),
            f.start_print("http://a", "", 80.0, 100.0)
        );
        assert!(matches!(a, Err(PrintError::NotFound)));
        assert!(matches!(b, Err(PrintError::Busy)));
    }
}
