/// Monitoring engine module - probes targets and reacts to status changes
///
/// This module is responsible for:
/// - Executing TCP/HTTP/HTTPS probes through a common `Checker` trait
/// - Scheduling one periodic job per target
/// - Detecting down/recovery transitions from the recorded history
/// - Summarising result windows
pub mod checker;
pub mod factory;
pub mod scheduler;
pub mod summary;
pub mod transition;
pub mod types;

pub use checker::{Checker, HttpChecker, TcpChecker};
pub use factory::{ProbeFactory, ProbeOptions};
pub use scheduler::{JobStatus, MonitorScheduler, SchedulerStatus};
pub use summary::UptimeSummary;
pub use transition::Transition;
pub use types::{ProbeKind, ProbeOutcome, ProbeStatus};
