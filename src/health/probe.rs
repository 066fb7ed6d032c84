//! Health probe capability trait and declarative probe configuration.
//! A small capability trait lets TCP, HTTP, process-liveness and
//! composite probes share one scheduling path in
//! [`crate::health::checker::HealthChecker`].

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Declarative description of how an instance should be probed, persisted
/// alongside the instance record so a restarted orchestrator resumes
/// checking with the same cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProbeConfig {
    /// No probe configured; the instance is considered healthy once running.
    None,
    Tcp {
        addr: SocketAddr,
        #[serde(with = "duration_secs")]
        timeout: Duration,
    },
    Http {
        url: url::Url,
        expected_status: u16,
        #[serde(with = "duration_secs")]
        timeout: Duration,
    },
    Process {
        pid: u32,
    },
    /// All inner probes must succeed for the composite probe to succeed.
    Composite { probes: Vec<ProbeConfig> },
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig::None
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("tcp connect to {0} failed: {1}")]
    TcpConnect(SocketAddr, String),
    #[error("http request to {0} failed: {1}")]
    HttpRequest(String, String),
    #[error("http response status {actual} did not match expected {expected}")]
    HttpStatus { expected: u16, actual: u16 },
    #[error("process {0} is not running")]
    ProcessNotRunning(u32),
    #[error("composite probe failed: {0}")]
    Composite(String),
    #[error("probe not configured")]
    NotConfigured,
}

/// Capability trait every concrete probe implements. `name()` is used purely
/// for log/event context, never matched on for behavior.
#[async_trait]
pub trait Probe: Send + Sync {
    fn name(&self) -> &'static str;
    async fn check(&self) -> Result<(), ProbeError>;
}

pub struct TcpProbe {
    pub addr: SocketAddr,
    pub timeout: Duration,
}

#[async_trait]
impl Probe for TcpProbe {
    fn name(&self) -> &'static str {
        "tcp"
    }

    async fn check(&self) -> Result<(), ProbeError> {
        tokio::time::timeout(self.timeout, tokio::net::TcpStream::connect(self.addr))
            .await
            .map_err(|_| ProbeError::TcpConnect(self.addr, "timed out".to_string()))?
            .map_err(|e| ProbeError::TcpConnect(self.addr, e.to_string()))?;
        Ok(())
    }
}

pub struct HttpProbe {
    pub url: url::Url,
    pub expected_status: u16,
    pub timeout: Duration,
    pub client: reqwest::Client,
}

#[async_trait]
impl Probe for HttpProbe {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn check(&self) -> Result<(), ProbeError> {
        let expected = http::StatusCode::from_u16(self.expected_status)
            .map_err(|e| ProbeError::HttpRequest(self.url.to_string(), e.to_string()))?;
        let response = self
            .client
            .get(self.url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ProbeError::HttpRequest(self.url.to_string(), e.to_string()))?;
        let actual = response.status();
        if actual == expected {
            Ok(())
        } else {
            Err(ProbeError::HttpStatus {
                expected: expected.as_u16(),
                actual: actual.as_u16(),
            })
        }
    }
}

pub struct ProcessProbe {
    pub pid: u32,
}

#[async_trait]
impl Probe for ProcessProbe {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn check(&self) -> Result<(), ProbeError> {
        #[cfg(unix)]
        {
            // Signal 0 performs no-op existence/permission checks (kill(2)).
            let result = unsafe { libc::kill(self.pid as i32, 0) };
            if result == 0 {
                Ok(())
            } else {
                Err(ProbeError::ProcessNotRunning(self.pid))
            }
        }
        #[cfg(not(unix))]
        {
            Err(ProbeError::ProcessNotRunning(self.pid))
        }
    }
}

pub struct CompositeProbe {
    pub probes: Vec<Box<dyn Probe>>,
}

#[async_trait]
impl Probe for CompositeProbe {
    fn name(&self) -> &'static str {
        "composite"
    }

    async fn check(&self) -> Result<(), ProbeError> {
        for probe in &self.probes {
            probe
                .check()
                .await
                .map_err(|e| ProbeError::Composite(format!("{}: {e}", probe.name())))?;
        }
        Ok(())
    }
}

/// Builds the concrete [`Probe`] described by `config`, used by
/// `lifecycle::manager::InstanceManager` when registering a freshly started
/// instance with the health checker. `ProbeConfig::None` has no concrete
/// probe; callers skip registration in that case rather than calling this.
pub fn build_probe(config: &ProbeConfig) -> Option<Box<dyn Probe>> {
    match config {
        ProbeConfig::None => None,
        ProbeConfig::Tcp { addr, timeout } => Some(Box::new(TcpProbe {
            addr: *addr,
            timeout: *timeout,
        })),
        ProbeConfig::Http {
            url,
            expected_status,
            timeout,
        } => Some(Box::new(HttpProbe {
            url: url.clone(),
            expected_status: *expected_status,
            timeout: *timeout,
            client: reqwest::Client::new(),
        })),
        ProbeConfig::Process { pid } => Some(Box::new(ProcessProbe { pid: *pid })),
        ProbeConfig::Composite { probes } => {
            let inner: Vec<Box<dyn Probe>> = probes.iter().filter_map(build_probe).collect();
            if inner.is_empty() {
                None
            } else {
                Some(Box::new(CompositeProbe { probes: inner }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_probe_is_none_for_unconfigured_probes() {
        assert!(build_probe(&ProbeConfig::None).is_none());
    }

    #[test]
    fn build_probe_builds_a_process_probe() {
        let probe = build_probe(&ProbeConfig::Process { pid: std::process::id() }).unwrap();
        assert_eq!(probe.name(), "process");
    }

    #[tokio::test]
    async fn process_probe_detects_current_process_as_running() {
        let probe = ProcessProbe {
            pid: std::process::id(),
        };
        assert!(probe.check().await.is_ok());
    }

    #[tokio::test]
    async fn process_probe_detects_unlikely_pid_as_not_running() {
        let probe = ProcessProbe { pid: u32::MAX - 1 };
        assert!(probe.check().await.is_err());
    }
}
