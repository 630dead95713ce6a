use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::WatchdogError;

/// Status of a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Up,
    Down,
    Unknown,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Up => "up",
            ProbeStatus::Down => "down",
            ProbeStatus::Unknown => "unknown",
        }
    }

    /// Parse a stored status, mapping anything unrecognised to `Unknown`
    pub fn from_stored(value: &str) -> Self {
        value.parse().unwrap_or(ProbeStatus::Unknown)
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ProbeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(ProbeStatus::Up),
            "down" => Ok(ProbeStatus::Down),
            "unknown" => Ok(ProbeStatus::Unknown),
            other => Err(format!("unknown probe status '{other}'")),
        }
    }
}

/// Kind of check a target declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    Tcp,
    Http,
    Https,
}

impl ProbeKind {
    /// Match a declared check type case-insensitively.
    pub fn parse(check_type: &str) -> Result<Self, WatchdogError> {
        match check_type.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(ProbeKind::Tcp),
            "http" => Ok(ProbeKind::Http),
            "https" => Ok(ProbeKind::Https),
            _ => Err(WatchdogError::UnsupportedCheckType(check_type.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::Tcp => "tcp",
            ProbeKind::Http => "http",
            ProbeKind::Https => "https",
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single probe execution.
///
/// `error` is present exactly when `status` is not `Up`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub status: ProbeStatus,
    pub latency: Option<Duration>,
    pub error: Option<String>,
}

impl ProbeOutcome {
    /// Mark the probe as successful with the measured latency
    pub fn up(latency: Duration) -> Self {
        Self { status: ProbeStatus::Up, latency: Some(latency), error: None }
    }

    /// Mark the probe as failed, keeping the time spent until the failure
    pub fn down(latency: Duration, error: impl Into<String>) -> Self {
        Self { status: ProbeStatus::Down, latency: Some(latency), error: Some(error.into()) }
    }

    pub fn latency_seconds(&self) -> Option<f64> {
        self.latency.map(|latency| latency.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_kind_is_case_insensitive() {
        assert_eq!(ProbeKind::parse("TCP").unwrap(), ProbeKind::Tcp);
        assert_eq!(ProbeKind::parse("Http").unwrap(), ProbeKind::Http);
        assert_eq!(ProbeKind::parse(" https ").unwrap(), ProbeKind::Https);
    }

    #[test]
    fn test_unknown_probe_kind_is_rejected() {
        match ProbeKind::parse("icmp") {
            Err(WatchdogError::UnsupportedCheckType(kind)) => assert_eq!(kind, "icmp"),
            other => panic!("expected UnsupportedCheckType, got {other:?}"),
        }
    }

    #[test]
    fn test_stored_status_round_trip() {
        for status in [ProbeStatus::Up, ProbeStatus::Down, ProbeStatus::Unknown] {
            assert_eq!(ProbeStatus::from_stored(status.as_str()), status);
        }
        assert_eq!(ProbeStatus::from_stored("degraded"), ProbeStatus::Unknown);
    }

    #[test]
    fn test_down_outcome_carries_error() {
        let outcome = ProbeOutcome::down(Duration::from_millis(1500), "Timeout connecting to a:1");
        assert_eq!(outcome.status, ProbeStatus::Down);
        assert_eq!(outcome.error.as_deref(), Some("Timeout connecting to a:1"));
        assert_eq!(outcome.latency_seconds(), Some(1.5));

        let up = ProbeOutcome::up(Duration::from_millis(20));
        assert!(up.error.is_none());
    }
}
