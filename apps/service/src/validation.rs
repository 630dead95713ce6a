use anyhow::{Result, anyhow};
use std::net::IpAddr;

use crate::database::models::MonitoredTarget;
use crate::monitoring::types::ProbeKind;

pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_HOST_LENGTH: usize = 255;
pub const MAX_DESCRIPTION_LENGTH: usize = 500;
const MAX_LABEL_LENGTH: usize = 63;

/// Validation results with specific error messages
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { is_valid: true, error: None }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self { is_valid: false, error: Some(msg.into()) }
    }

    pub fn to_result(&self) -> Result<()> {
        if self.is_valid {
            Ok(())
        } else {
            Err(anyhow!(self.error.clone().unwrap_or_else(|| "Validation failed".to_string())))
        }
    }

    /// Keep the first failure
    fn and_then(self, next: impl FnOnce() -> ValidationResult) -> ValidationResult {
        if self.is_valid { next() } else { self }
    }
}

/// Allowed range for check intervals, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalLimits {
    pub min_seconds: u64,
    pub max_seconds: u64,
}

impl Default for IntervalLimits {
    fn default() -> Self {
        Self { min_seconds: 30, max_seconds: 86_400 }
    }
}

/// Validate target name
pub fn validate_target_name(name: &str) -> ValidationResult {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return ValidationResult::err("Name cannot be empty");
    }

    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return ValidationResult::err(format!("Name too long (max {MAX_NAME_LENGTH} characters)"));
    }

    ValidationResult::ok()
}

/// Validate host (IP address or hostname)
pub fn validate_host(host: &str) -> ValidationResult {
    if host.trim().is_empty() {
        return ValidationResult::err("Host cannot be empty");
    }

    if host.len() > MAX_HOST_LENGTH {
        return ValidationResult::err(format!("Host too long (max {MAX_HOST_LENGTH} characters)"));
    }

    if host.parse::<IpAddr>().is_ok() {
        return ValidationResult::ok();
    }

    if host.contains(char::is_whitespace) {
        return ValidationResult::err("Host cannot contain spaces");
    }

    let valid_label = |label: &str| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LENGTH
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    };

    // A single trailing dot is a fully qualified name
    let name = host.strip_suffix('.').unwrap_or(host);
    if name.split('.').all(valid_label) {
        ValidationResult::ok()
    } else {
        ValidationResult::err("Invalid host. Use IP address or valid hostname")
    }
}

/// Validate port
pub fn validate_port(port: u16) -> ValidationResult {
    if port == 0 {
        return ValidationResult::err("Port must be between 1 and 65535");
    }
    ValidationResult::ok()
}

/// Validate check interval
pub fn validate_interval(interval: u64, limits: &IntervalLimits) -> ValidationResult {
    if interval < limits.min_seconds {
        return ValidationResult::err(format!(
            "Interval must be at least {} seconds",
            limits.min_seconds
        ));
    }

    if interval > limits.max_seconds {
        return ValidationResult::err(format!(
            "Interval too long (max {} seconds)",
            limits.max_seconds
        ));
    }

    ValidationResult::ok()
}

/// Validate check type
pub fn validate_check_type(check_type: &str) -> ValidationResult {
    match ProbeKind::parse(check_type) {
        Ok(_) => ValidationResult::ok(),
        Err(_) => ValidationResult::err(format!(
            "Unknown check type: {check_type}. Use tcp, http or https"
        )),
    }
}

/// Validate alert recipient
pub fn validate_recipient(recipient: &str) -> ValidationResult {
    if recipient.trim().is_empty() {
        return ValidationResult::err("Recipient cannot be empty");
    }

    if recipient.contains(char::is_whitespace) {
        return ValidationResult::err("Recipient cannot contain spaces");
    }

    ValidationResult::ok()
}

/// Validate optional description
pub fn validate_description(description: Option<&str>) -> ValidationResult {
    match description {
        Some(text) if text.chars().count() > MAX_DESCRIPTION_LENGTH => ValidationResult::err(
            format!("Description too long (max {MAX_DESCRIPTION_LENGTH} characters)"),
        ),
        _ => ValidationResult::ok(),
    }
}

/// Validate optional HTTP request path
pub fn validate_http_path(path: Option<&str>) -> ValidationResult {
    match path {
        Some(path) if !path.starts_with('/') => ValidationResult::err("HTTP path must start with '/'"),
        Some(path) if path.contains(char::is_whitespace) => {
            ValidationResult::err("HTTP path cannot contain spaces")
        }
        _ => ValidationResult::ok(),
    }
}

/// Validate a whole target, reporting the first problem found
pub fn validate_target(target: &MonitoredTarget, limits: &IntervalLimits) -> ValidationResult {
    validate_target_name(&target.name)
        .and_then(|| validate_host(&target.host))
        .and_then(|| validate_port(target.port))
        .and_then(|| validate_interval(target.interval_seconds, limits))
        .and_then(|| validate_check_type(&target.check_type))
        .and_then(|| validate_recipient(&target.recipient))
        .and_then(|| validate_description(target.description.as_deref()))
        .and_then(|| validate_http_path(target.http_path.as_deref()))
}
