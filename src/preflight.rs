//! MQTT bridge reachability preflight

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::error::{LauncherError, Result};

/// Connect timeout for a single probe
pub const PREFLIGHT_TIMEOUT: Duration = Duration::from_secs(2);

/// What to do with an unreachable MQTT bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PreflightMode {
    /// Log the failure and continue
    #[default]
    Warn,
    /// Abort the run
    Fail,
    /// Do not probe at all
    Skip,
}

impl FromStr for PreflightMode {
    type Err = LauncherError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "fail" => Ok(Self::Fail),
            "skip" => Ok(Self::Skip),
            other => Err(LauncherError::usage(format!(
                "Invalid MQTT_PREFLIGHT value: {} (expected warn, fail or skip)",
                other
            ))),
        }
    }
}

impl fmt::Display for PreflightMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Warn => "warn",
            Self::Fail => "fail",
            Self::Skip => "skip",
        };
        f.write_str(s)
    }
}

/// `host:port` for logs and errors, with IPv6 literals bracketed
pub fn host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Outcome of one connection attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightResult {
    pub target: String,
    pub ok: bool,
    pub detail: Option<String>,
}

/// TCP prober for the MQTT bridge
#[derive(Debug, Clone)]
pub struct Preflight {
    timeout: Duration,
}

impl Preflight {
    pub fn new() -> Self {
        Self {
            timeout: PREFLIGHT_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Attempt a single connection. The stream is dropped, and so closed, on
    /// every path.
    pub async fn probe(&self, host: &str, port: u16) -> PreflightResult {
        let target = host_port(host, port);
        debug!("Probing MQTT bridge at {} (timeout {:?})", target, self.timeout);

        let detail = match tokio::time::timeout(self.timeout, TcpStream::connect((host, port))).await
        {
            Ok(Ok(stream)) => {
                drop(stream);
                None
            }
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!("connection timed out after {:?}", self.timeout)),
        };

        PreflightResult {
            target,
            ok: detail.is_none(),
            detail,
        }
    }

    /// Apply `mode` to the bridge at `host:port`.
    ///
    /// Returns `None` when skipped. Only `Fail` turns an unreachable bridge
    /// into an error.
    pub async fn check(
        &self,
        mode: PreflightMode,
        host: &str,
        port: u16,
    ) -> Result<Option<PreflightResult>> {
        if mode == PreflightMode::Skip {
            info!("MQTT preflight skipped");
            return Ok(None);
        }

        let result = self.probe(host, port).await;
        if result.ok {
            info!("MQTT bridge reachable at {}", result.target);
            return Ok(Some(result));
        }

        let detail = result.detail.clone().unwrap_or_default();
        match mode {
            PreflightMode::Fail => Err(LauncherError::PreflightFailure {
                target: result.target,
                detail,
            }),
            _ => {
                warn!(
                    "MQTT bridge not reachable at {}: {} (continuing, MQTT_PREFLIGHT=warn)",
                    result.target, detail
                );
                Ok(Some(result))
            }
        }
    }
}

impl Default for Preflight {
    fn default() -> Self {
        Self::new()
    }
}
