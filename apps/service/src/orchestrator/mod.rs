//! Orchestrator module - wires storage, notifications and the scheduler
//!
//! `Watchdog` is the single entry point used by the command line: it owns the
//! stores, builds the configured notification transport, keeps the scheduler in
//! sync with target edits and runs the service loop until shutdown.


use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::{Config, NotificationConfig, TransportKind};
use crate::database::models::{MonitoredTarget, NotificationRecord, ProbeResult, TargetId};
use crate::database::{DatabaseImpl, HistoryStore, NotificationLog, TargetRepository, initialize_database};
use crate::error::WatchdogError;
use crate::monitoring::{MonitorScheduler, SchedulerStatus, UptimeSummary};
use crate::notifications::{
    LogTransport, NotificationDispatcher, NotificationTransport, TransportError, WebhookTransport,
};
use crate::pool::open_pool;
use crate::validation::validate_target;

/// Results plus their uptime summary for one target
#[derive(Debug, Clone, serde::Serialize)]
pub struct TargetHistory {
    pub target: MonitoredTarget,
    pub summary: UptimeSummary,
    pub results: Vec<ProbeResult>,
}

/// Main orchestrator for the watchdog service
pub struct Watchdog {
    config: Arc<Config>,
    targets: Arc<dyn TargetRepository>,
    history: Arc<dyn HistoryStore>,
    notifications: Arc<dyn NotificationLog>,
    scheduler: Arc<MonitorScheduler>,
}

impl Watchdog {
    /// Open the configured database, migrate it and build the service
    pub async fn open(config: Config) -> Result<Self> {
        info!(path = %config.database.path, "Opening database");
        let pool = open_pool(&config.database.path, config.database.max_connections)
            .await
            .with_context(|| format!("failed to open database {}", config.database.path))?;

        // Get database connection for initialization
        let conn = pool.get().await?;
        initialize_database(&conn).await?;
        drop(conn);

        let database = Arc::new(DatabaseImpl::new_from_pool(pool));
        Self::with_stores(config, database.clone(), database.clone(), database)
    }

    /// Build the service on top of existing stores
    pub fn with_stores(
        config: Config,
        targets: Arc<dyn TargetRepository>,
        history: Arc<dyn HistoryStore>,
        notifications: Arc<dyn NotificationLog>,
    ) -> Result<Self> {
        let transport = build_transport(&config.notifications)?;
        info!(channel = transport.channel(), "Notification transport ready");
        Ok(Self::with_transport(config, targets, history, notifications, transport))
    }

    /// Build the service with an explicit notification transport
    pub fn with_transport(
        config: Config,
        targets: Arc<dyn TargetRepository>,
        history: Arc<dyn HistoryStore>,
        notifications: Arc<dyn NotificationLog>,
        transport: Arc<dyn NotificationTransport>,
    ) -> Self {
        let dispatcher = Arc::new(
            NotificationDispatcher::new(transport, notifications.clone())
                .with_signature(config.notifications.signature.clone()),
        );
        let scheduler = Arc::new(
            MonitorScheduler::new(targets.clone(), history.clone(), dispatcher)
                .with_probe_timeout(config.monitoring.probe_timeout()),
        );

        Self { config: Arc::new(config), targets, history, notifications, scheduler }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scheduler(&self) -> &Arc<MonitorScheduler> {
        &self.scheduler
    }

    /// Run until Ctrl-C
    pub async fn run(&self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
            info!("Shutdown requested");
        })
        .await
    }

    /// Start the scheduler, reconcile periodically and stop once `shutdown` completes
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        info!("Starting watchdog...");
        self.scheduler.start().await?;

        let reload_interval = self.config.monitoring.reload_interval();
        let reload = async {
            let Some(period) = reload_interval else {
                return std::future::pending::<()>().await;
            };
            let mut timer = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                timer.tick().await;
                if let Err(e) = self.scheduler.reconcile().await {
                    error!("Failed to reload targets: {e}");
                }
            }
        };

        tokio::select! {
            _ = shutdown => {}
            _ = reload => {}
        }

        self.scheduler.stop().await;
        info!("Watchdog stopped");
        Ok(())
    }

    /// Validate, persist and schedule a new target
    pub async fn register_target(&self, mut target: MonitoredTarget) -> Result<MonitoredTarget, WatchdogError> {
        self.validate(&target)?;

        target.id = None;
        let id = self.targets.save_target(&target).await?;
        target.id = Some(id);
        info!(target_id = id, name = %target.name, "Registered target");

        self.scheduler.add(&target).await?;
        Ok(target)
    }

    /// Validate and persist changes to a stored target, then reschedule it
    pub async fn update_target(&self, target: MonitoredTarget) -> Result<MonitoredTarget, WatchdogError> {
        let id = target.require_id()?;
        let existing = self.get_target(id).await?;
        self.validate(&target)?;

        self.targets.save_target(&target).await?;
        let saved = MonitoredTarget { created_at: existing.created_at, ..target };
        info!(target_id = id, name = %saved.name, "Updated target");

        self.scheduler.update(&saved).await?;
        Ok(saved)
    }

    /// Unschedule and delete a target; returns false when it did not exist
    pub async fn remove_target(&self, id: TargetId, purge_history: bool) -> Result<bool, WatchdogError> {
        self.scheduler.remove(id).await;
        let removed = self.targets.delete_target(id, purge_history).await?;
        if removed {
            info!(target_id = id, purge_history, "Removed target");
        } else {
            warn!(target_id = id, "Tried to remove unknown target");
        }
        Ok(removed)
    }

    pub async fn get_target(&self, id: TargetId) -> Result<MonitoredTarget, WatchdogError> {
        self.targets.get_target(id).await?.ok_or(WatchdogError::TargetNotFound(id))
    }

    pub async fn list_targets(&self) -> Result<Vec<MonitoredTarget>, WatchdogError> {
        Ok(self.targets.list_targets().await?)
    }

    /// Manual "check now"; persisted but never notifies
    pub async fn check_now(&self, id: TargetId) -> Result<ProbeResult, WatchdogError> {
        self.scheduler.run_once(id).await
    }

    /// Results of the last `hours` hours, newest first, with their summary
    pub async fn history(&self, id: TargetId, hours: u32, limit: usize) -> Result<TargetHistory, WatchdogError> {
        let target = self.get_target(id).await?;
        // Windows reaching past the representable range mean "everything"
        let since = ChronoDuration::try_hours(i64::from(hours))
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let results = self.history.recent_results(id, since, limit).await?;
        let summary = UptimeSummary::from_results(&results);

        Ok(TargetHistory { target, summary, results })
    }

    pub async fn notifications(&self, id: TargetId, limit: usize) -> Result<Vec<NotificationRecord>, WatchdogError> {
        self.get_target(id).await?;
        Ok(self.notifications.recent_notifications(id, limit).await?)
    }

    pub async fn status(&self) -> SchedulerStatus {
        self.scheduler.status().await
    }

    fn validate(&self, target: &MonitoredTarget) -> Result<(), WatchdogError> {
        let limits = self.config.monitoring.interval_limits();
        validate_target(target, &limits)
            .to_result()
            .map_err(|e| WatchdogError::InvalidTarget(e.to_string()))
    }
}

/// Build the transport selected in the configuration
pub fn build_transport(config: &NotificationConfig) -> Result<Arc<dyn NotificationTransport>, TransportError> {
    match config.transport {
        TransportKind::Log => Ok(Arc::new(LogTransport)),
        TransportKind::Webhook => {
            let url = config.webhook_url.as_deref().ok_or_else(|| {
                TransportError::InvalidConfiguration("webhook transport requires webhook_url".into())
            })?;
            let timeout = Duration::from_secs(config.timeout_seconds.max(1));
            Ok(Arc::new(WebhookTransport::new(url, timeout)?))
        }
    }
}
