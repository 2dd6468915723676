use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::DiscoveryConfig;
use crate::ports::dedup_ports;
use crate::types::{Candidate, InstalledInfo, ProbeResult, StatusBody, VersionBody};

/// Upper bound on the timeout used for the canonical-port fast path.
pub const FAST_PATH_TIMEOUT: Duration = Duration::from_millis(300);

const MAX_CONCURRENCY: usize = 256;

/// How the detector talks to a candidate. `HttpProbe` is the real one.
pub trait StatusProbe: Send + Sync + 'static {
    /// True only when the candidate reports itself as running.
    fn status(&self, host: &str, port: u16) -> impl Future<Output = bool> + Send;

    /// Version string reported by the helper, if it gives one.
    fn version(&self, host: &str, port: u16) -> impl Future<Output = Option<String>> + Send;
}

/// Liveness and version checks over the helper's local HTTP API.
#[derive(Clone, Debug)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpProbe {
    pub fn new() -> Self {
        Self::with_client(loopback_client())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Option<T> {
        let res = self.client.get(url).send().await.ok()?;
        if !res.status().is_success() {
            return None;
        }
        res.json::<T>().await.ok()
    }
}

impl StatusProbe for HttpProbe {
    async fn status(&self, host: &str, port: u16) -> bool {
        let url = format!("http://{host}:{port}/status");
        matches!(
            self.get_json::<StatusBody>(&url).await,
            Some(StatusBody { status }) if status == "running"
        )
    }

    async fn version(&self, host: &str, port: u16) -> Option<String> {
        let url = format!("http://{host}:{port}/version");
        self.get_json::<VersionBody>(&url).await.map(|v| v.version)
    }
}

/// HTTP client for talking to the helper. Loopback traffic never goes
/// through a proxy.
pub fn loopback_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .unwrap_or_default()
}

/// Single liveness check bounded by `timeout`. Every failure is a miss.
pub async fn probe_one<P: StatusProbe>(
    probe: &P,
    host: &str,
    port: u16,
    timeout: Duration,
) -> ProbeResult {
    match time::timeout(timeout, probe.status(host, port)).await {
        Ok(true) => ProbeResult::hit(host, port),
        Ok(false) => {
            debug!(host, port, "probe miss");
            ProbeResult::miss()
        }
        Err(_) => {
            debug!(host, port, ?timeout, "probe timed out");
            ProbeResult::miss()
        }
    }
}

/// Try each host in order on one port; first hit wins.
pub async fn probe_across_hosts<P: StatusProbe>(
    probe: &P,
    hosts: &[String],
    port: u16,
    timeout: Duration,
) -> ProbeResult {
    for host in hosts {
        let r = probe_one(probe, host, port, timeout).await;
        if r.found {
            return r;
        }
    }
    ProbeResult::miss()
}

/// Locates the helper among a set of candidate hosts and ports.
#[derive(Debug)]
pub struct Detector<P = HttpProbe> {
    probe: Arc<P>,
}

impl<P> Clone for Detector<P> {
    fn clone(&self) -> Self {
        Self {
            probe: Arc::clone(&self.probe),
        }
    }
}

impl Detector<HttpProbe> {
    pub fn new() -> Self {
        Self::with_probe(HttpProbe::new())
    }
}

impl Default for Detector<HttpProbe> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: StatusProbe> Detector<P> {
    pub fn with_probe(probe: P) -> Self {
        Self {
            probe: Arc::new(probe),
        }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Find a listening candidate.
    ///
    /// - A fixed port is probed alone; the port list is never touched.
    /// - Otherwise the first listed port is tried with a short timeout and,
    ///   if it answers, wins outright.
    /// - The remaining ports are raced with at most `concurrency` probes in
    ///   flight. The first hit to complete wins and the rest are aborted.
    pub async fn find_service(&self, config: &DiscoveryConfig) -> Option<Candidate> {
        let hosts: Arc<[String]> = config.hosts.clone().into();

        if let Some(port) = config.fixed_port {
            return probe_across_hosts(&*self.probe, &hosts, port, config.timeout)
                .await
                .candidate();
        }

        let ports = dedup_ports(&config.ports);
        let (&first, rest) = ports.split_first()?;

        let fast_timeout = config.timeout.min(FAST_PATH_TIMEOUT);
        if let Some(hit) = probe_across_hosts(&*self.probe, &hosts, first, fast_timeout)
            .await
            .candidate()
        {
            return Some(hit);
        }

        self.fan_out(hosts, rest, config.timeout, config.concurrency)
            .await
    }

    pub async fn find_service_port(&self, config: &DiscoveryConfig) -> Option<u16> {
        self.find_service(config).await.map(|c| c.port)
    }

    async fn fan_out(
        &self,
        hosts: Arc<[String]>,
        ports: &[u16],
        timeout: Duration,
        concurrency: usize,
    ) -> Option<Candidate> {
        if ports.is_empty() {
            return None;
        }

        let sem = Arc::new(Semaphore::new(concurrency.clamp(1, MAX_CONCURRENCY)));
        let cancel = CancellationToken::new();
        let mut set = JoinSet::new();

        for &port in ports {
            let sem = Arc::clone(&sem);
            let probe = Arc::clone(&self.probe);
            let hosts = Arc::clone(&hosts);
            let cancel = cancel.clone();

            set.spawn(async move {
                let _permit = sem.acquire_owned().await.ok()?;
                if cancel.is_cancelled() {
                    return None;
                }
                probe_across_hosts(&*probe, &hosts, port, timeout)
                    .await
                    .candidate()
            });
        }

        while let Some(res) = set.join_next().await {
            if let Ok(Some(hit)) = res {
                cancel.cancel();
                set.abort_all();
                return Some(hit);
            }
        }
        None
    }

    /// Up to `max_attempts` discovery rounds with linear backoff between them.
    pub async fn check_installed(&self, config: &DiscoveryConfig) -> InstalledInfo {
        self.check_installed_with_cancel(config, CancellationToken::new())
            .await
    }

    /// Variant that gives up early once `cancel` fires.
    pub async fn check_installed_with_cancel(
        &self,
        config: &DiscoveryConfig,
        cancel: CancellationToken,
    ) -> InstalledInfo {
        for attempt in 1..=config.max_attempts {
            if cancel.is_cancelled() {
                break;
            }

            if let Some(hit) = self.find_service(config).await {
                let version =
                    time::timeout(config.timeout, self.probe.version(&hit.host, hit.port))
                        .await
                        .ok()
                        .flatten();
                info!(host = %hit.host, port = hit.port, ?version, attempt, "helper found");
                return InstalledInfo {
                    installed: true,
                    port: Some(hit.port),
                    version,
                };
            }

            debug!(attempt, max = config.max_attempts, "helper not found");
            if attempt < config.max_attempts {
                let wait = config.backoff_base * attempt;
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = time::sleep(wait) => {}
                }
            }
        }

        InstalledInfo::not_installed()
    }
}
