use std::time::Duration;

use super::checker::{Checker, HttpChecker, TcpChecker};
use super::types::ProbeKind;
use crate::database::models::MonitoredTarget;
use crate::error::WatchdogError;

/// Strategy-specific options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOptions {
    /// Request path for http/https probes, `/` when absent
    pub path: Option<String>,
}

impl ProbeOptions {
    pub fn for_target(target: &MonitoredTarget) -> Self {
        Self { path: target.http_path.clone() }
    }
}

/// Maps a declared check type to a probe strategy bound to its target
pub struct ProbeFactory;

impl ProbeFactory {
    /// Create the checker for `check_type`, matched case-insensitively.
    ///
    /// Unknown check types are an error, never silently defaulted.
    pub fn create(
        check_type: &str,
        host: &str,
        port: u16,
        timeout: Duration,
        options: &ProbeOptions,
    ) -> Result<Box<dyn Checker>, WatchdogError> {
        let path = options.path.as_deref().unwrap_or("/");

        let checker: Box<dyn Checker> = match ProbeKind::parse(check_type)? {
            ProbeKind::Tcp => Box::new(TcpChecker::new(host, port, timeout)),
            ProbeKind::Http => Box::new(HttpChecker::new(host, port, timeout, false, path)?),
            ProbeKind::Https => Box::new(HttpChecker::new(host, port, timeout, true, path)?),
        };

        Ok(checker)
    }

    /// Create the checker for a stored target
    pub fn for_target(
        target: &MonitoredTarget,
        timeout: Duration,
    ) -> Result<Box<dyn Checker>, WatchdogError> {
        Self::create(
            &target.check_type,
            &target.host,
            target.port,
            timeout,
            &ProbeOptions::for_target(target),
        )
    }
}
