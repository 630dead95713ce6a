use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::WatchdogError;
use crate::monitoring::types::{ProbeKind, ProbeOutcome, ProbeStatus};

pub type TargetId = i64;
pub type ProbeResultId = i64;

/// Upper bound the scheduler accepts for a check interval (24 hours)
pub const MAX_INTERVAL_SECONDS: u64 = 86_400;

/// MonitoredTarget model - a network endpoint probed on a fixed interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredTarget {
    pub id: Option<TargetId>,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub check_type: String,
    pub interval_seconds: u64,
    pub recipient: String,
    pub description: Option<String>,
    /// Request path for http/https checks, `/` when absent
    pub http_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MonitoredTarget {
    /// Create a new, not yet persisted target
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        check_type: impl Into<String>,
        recipient: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            name: name.into(),
            host: host.into(),
            port,
            check_type: check_type.into(),
            interval_seconds: 300,
            recipient: recipient.into(),
            description: None,
            http_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_interval(mut self, interval_seconds: u64) -> Self {
        self.interval_seconds = interval_seconds;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_http_path(mut self, path: impl Into<String>) -> Self {
        self.http_path = Some(path.into());
        self
    }

    /// Identifier of a persisted target
    pub fn require_id(&self) -> Result<TargetId, WatchdogError> {
        self.id.ok_or_else(|| {
            WatchdogError::InvalidTarget(format!("target '{}' has not been saved yet", self.name))
        })
    }

    /// Structural invariants the scheduler relies on.
    ///
    /// Returns the parsed probe kind so callers do not have to parse twice.
    pub fn check_schedulable(&self) -> Result<ProbeKind, WatchdogError> {
        self.require_id()?;
        if self.interval_seconds == 0 || self.interval_seconds > MAX_INTERVAL_SECONDS {
            return Err(WatchdogError::InvalidTarget(format!(
                "interval must be between 1 and {MAX_INTERVAL_SECONDS} seconds, got {}",
                self.interval_seconds
            )));
        }
        if self.port == 0 {
            return Err(WatchdogError::InvalidTarget("port must be between 1 and 65535".into()));
        }
        ProbeKind::parse(&self.check_type)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// ProbeResult model - one immutable outcome of probing a target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub id: Option<ProbeResultId>,
    pub target_id: TargetId,
    pub status: ProbeStatus,
    pub latency_seconds: Option<f64>,
    pub error_message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl ProbeResult {
    /// Build an unsaved result from a probe outcome, stamped with the current time
    pub fn from_outcome(target_id: TargetId, outcome: &ProbeOutcome) -> Self {
        Self {
            id: None,
            target_id,
            status: outcome.status,
            latency_seconds: outcome.latency_seconds(),
            error_message: outcome.error.clone().filter(|error| !error.is_empty()),
            checked_at: Utc::now(),
        }
    }
}

/// Which transition a notification reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Down,
    Recovery,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Down => "down",
            NotificationKind::Recovery => "recovery",
        }
    }

    pub fn from_stored(value: &str) -> Option<Self> {
        match value {
            "down" => Some(NotificationKind::Down),
            "recovery" => Some(NotificationKind::Recovery),
            _ => None,
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// NotificationRecord model - audit entry for an attempted alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: Option<i64>,
    pub target_id: TargetId,
    pub kind: NotificationKind,
    /// Transport that carried the message (`webhook`, `log`, ...)
    pub channel: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Convert a timestamp to the millisecond column representation
pub fn timestamp_to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

/// Convert a stored millisecond column back to a timestamp
pub fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}
