use serde::Serialize;

use super::types::ProbeStatus;
use crate::database::models::ProbeResult;

/// Uptime view over a window of probe results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UptimeSummary {
    pub total_checks: usize,
    pub up_checks: usize,
    /// Share of `up` results in percent, 0 when there are no results
    pub uptime_percentage: f64,
    pub average_latency_seconds: Option<f64>,
    pub latest_status: ProbeStatus,
}

impl UptimeSummary {
    /// Summarise results ordered newest first
    pub fn from_results(results: &[ProbeResult]) -> Self {
        let total_checks = results.len();
        let up_checks = results.iter().filter(|r| r.status == ProbeStatus::Up).count();
        let uptime_percentage = if total_checks == 0 {
            0.0
        } else {
            up_checks as f64 / total_checks as f64 * 100.0
        };

        let latencies: Vec<f64> = results.iter().filter_map(|r| r.latency_seconds).collect();
        let average_latency_seconds = if latencies.is_empty() {
            None
        } else {
            Some(latencies.iter().sum::<f64>() / latencies.len() as f64)
        };

        Self {
            total_checks,
            up_checks,
            uptime_percentage,
            average_latency_seconds,
            latest_status: results.first().map(|r| r.status).unwrap_or(ProbeStatus::Unknown),
        }
    }
}
