use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::ports;

/// Knobs for locating the helper. Every field has a default; partial JSON
/// documents and [`DiscoveryOverrides`] are merged field by field over it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// When set, only this port is probed and the port list is ignored.
    pub fixed_port: Option<u16>,
    pub ports: Vec<u16>,
    pub hosts: Vec<String>,
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,
    pub max_attempts: u32,
    #[serde(rename = "backoff_ms", with = "millis")]
    pub backoff_base: Duration,
    pub concurrency: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            fixed_port: None,
            ports: ports::default_ports(),
            hosts: vec!["127.0.0.1".to_string(), "localhost".to_string()],
            timeout: Duration::from_millis(1000),
            max_attempts: 5,
            backoff_base: Duration::from_millis(200),
            concurrency: 4,
        }
    }
}

/// Caller-supplied overrides; `None` keeps the base value.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOverrides {
    pub fixed_port: Option<u16>,
    pub ports: Option<Vec<u16>>,
    pub hosts: Option<Vec<String>>,
    pub timeout: Option<Duration>,
    pub max_attempts: Option<u32>,
    pub backoff_base: Option<Duration>,
    pub concurrency: Option<usize>,
}

impl DiscoveryConfig {
    /// Shallow merge: each override that is present replaces the whole field.
    pub fn merged(mut self, o: DiscoveryOverrides) -> Self {
        if let Some(p) = o.fixed_port {
            self.fixed_port = Some(p);
        }
        if let Some(v) = o.ports {
            self.ports = v;
        }
        if let Some(v) = o.hosts {
            self.hosts = v;
        }
        if let Some(v) = o.timeout {
            self.timeout = v;
        }
        if let Some(v) = o.max_attempts {
            self.max_attempts = v;
        }
        if let Some(v) = o.backoff_base {
            self.backoff_base = v;
        }
        if let Some(v) = o.concurrency {
            self.concurrency = v;
        }
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("invalid discovery config")
    }
}

/// Orchestration settings for the full wake/find/submit flow.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct FlowConfig {
    #[serde(flatten)]
    pub discovery: DiscoveryConfig,
    /// Pause after waking the helper and between discovery rounds.
    #[serde(rename = "retry_delay_ms", with = "millis")]
    pub retry_delay: Duration,
    /// Extra discovery rounds after the first one.
    pub max_retries: u32,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            discovery: DiscoveryConfig::default(),
            retry_delay: Duration::from_millis(1200),
            max_retries: 5,
        }
    }
}

/// Read a JSON config file. Missing keys fall back to defaults.
pub fn load_config_from_path(path: impl AsRef<Path>) -> Result<FlowConfig> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read config file: {}", path.as_ref().display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("invalid config file: {}", path.as_ref().display()))
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_helper_install() {
        let c = DiscoveryConfig::default();
        assert_eq!(c.fixed_port, None);
        assert_eq!(c.ports.first(), Some(&18731));
        assert_eq!(c.hosts, vec!["127.0.0.1", "localhost"]);
        assert_eq!(c.timeout, Duration::from_millis(1000));
        assert_eq!(c.max_attempts, 5);
    }

    #[test]
    fn partial_json_merges_over_defaults() {
        let c = DiscoveryConfig::from_json_str(r#"{"ports":[9000,9001],"timeout_ms":250}"#)
            .unwrap();
        assert_eq!(c.ports, vec![9000, 9001]);
        assert_eq!(c.timeout, Duration::from_millis(250));
        assert_eq!(c.hosts, DiscoveryConfig::default().hosts);
        assert_eq!(c.backoff_base, Duration::from_millis(200));
    }

    #[test]
    fn overrides_replace_whole_fields() {
        let c = DiscoveryConfig::default().merged(DiscoveryOverrides {
            hosts: Some(vec!["127.0.0.1".into()]),
            concurrency: Some(8),
            ..Default::default()
        });
        assert_eq!(c.hosts, vec!["127.0.0.1"]);
        assert_eq!(c.concurrency, 8);
        assert_eq!(c.ports.len(), 10);
    }

    #[test]
    fn flow_config_reads_flattened_discovery_keys() {
        let f: FlowConfig =
            serde_json::from_str(r#"{"fixed_port":18735,"retry_delay_ms":50}"#).unwrap();
        assert_eq!(f.discovery.fixed_port, Some(18735));
        assert_eq!(f.retry_delay, Duration::from_millis(50));
        assert_eq!(f.max_retries, 5);
    }
}
