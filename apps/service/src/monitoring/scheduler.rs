use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard, oneshot, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{MissedTickBehavior, interval_at, timeout};
use tracing::{debug, error, info, warn};

use super::checker::DEFAULT_PROBE_TIMEOUT;
use super::factory::ProbeFactory;
use super::transition::Transition;
use super::types::{ProbeOutcome, ProbeStatus};
use crate::database::models::{MonitoredTarget, ProbeResult, TargetId};
use crate::database::{HistoryStore, TargetRepository};
use crate::error::{Result, WatchdogError};
use crate::notifications::NotificationDispatcher;

/// Extra time granted on top of the probe timeout before a tick gives up
const PROBE_GRACE: Duration = Duration::from_secs(1);

/// Snapshot of the scheduler returned by [`MonitorScheduler::status`]
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub active_jobs: usize,
    pub jobs: Vec<JobStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub id: TargetId,
    pub name: String,
    pub next_fire_time: DateTime<Utc>,
}

/// Everything a tick needs, shared by all jobs
struct TickContext {
    targets: Arc<dyn TargetRepository>,
    history: Arc<dyn HistoryStore>,
    dispatcher: Arc<NotificationDispatcher>,
    probe_timeout: Duration,
    /// One probe at a time per target, shared by scheduled ticks and `run_once`
    guards: Mutex<HashMap<TargetId, Arc<Mutex<()>>>>,
}

struct ScheduledJob {
    name: String,
    interval_seconds: u64,
    next_fire: watch::Receiver<DateTime<Utc>>,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl ScheduledJob {
    /// Ask the job loop to exit; in-flight ticks still finish
    fn cancel(self) -> JoinHandle<()> {
        let _ = self.shutdown.send(());
        self.handle
    }
}

#[derive(Default)]
struct SchedulerState {
    running: bool,
    jobs: HashMap<TargetId, ScheduledJob>,
}

/// Monitor scheduler - keeps one periodic job per target.
///
/// Structural operations (`start`, `stop`, `add`, `update`, `remove`,
/// `reconcile`) serialize on the job table lock. Each tick runs in its own task
/// so a slow or panicking probe never delays other targets.
pub struct MonitorScheduler {
    ctx: Arc<TickContext>,
    state: Mutex<SchedulerState>,
}

impl MonitorScheduler {
    pub fn new(
        targets: Arc<dyn TargetRepository>,
        history: Arc<dyn HistoryStore>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            ctx: Arc::new(TickContext {
                targets,
                history,
                dispatcher,
                probe_timeout: DEFAULT_PROBE_TIMEOUT,
                guards: Mutex::new(HashMap::new()),
            }),
            state: Mutex::new(SchedulerState::default()),
        }
    }

    /// Set the per-probe timeout; only valid before the scheduler is shared
    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        if let Some(ctx) = Arc::get_mut(&mut self.ctx) {
            ctx.probe_timeout = probe_timeout;
        }
        self
    }

    pub fn probe_timeout(&self) -> Duration {
        self.ctx.probe_timeout
    }

    /// Load every stored target and schedule it.
    ///
    /// Calling `start` on a running scheduler is a no-op. Targets that fail the
    /// structural checks are logged and skipped.
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.running {
            warn!("Scheduler already running");
            return Ok(());
        }

        let targets = self.ctx.targets.list_targets().await?;
        for target in targets {
            if let Err(e) = self.install(&mut state, &target) {
                warn!(name = %target.name, "Skipping target: {e}");
            }
        }

        state.running = true;
        info!(jobs = state.jobs.len(), "Scheduler started");
        Ok(())
    }

    /// Cancel every timer and wait for in-flight ticks to finish.
    ///
    /// Calling `stop` on a stopped scheduler is a no-op.
    pub async fn stop(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut state = self.state.lock().await;
            if !state.running {
                debug!("Scheduler not running");
                return;
            }
            state.running = false;
            state.jobs.drain().map(|(_, job)| job.cancel()).collect()
        };

        let count = handles.len();
        for joined in futures::future::join_all(handles).await {
            if let Err(e) = joined {
                log_join_error(None, e);
            }
        }
        info!(jobs = count, "Scheduler stopped");
    }

    /// Schedule a target, replacing any job it already has.
    ///
    /// The target is always validated; while the scheduler is stopped nothing is
    /// installed.
    pub async fn add(&self, target: &MonitoredTarget) -> Result<()> {
        target.check_schedulable()?;

        let mut state = self.state.lock().await;
        if !state.running {
            debug!(name = %target.name, "Scheduler stopped, not scheduling target");
            return Ok(());
        }
        self.install(&mut state, target)
    }

    /// Reschedule a target after its settings changed
    pub async fn update(&self, target: &MonitoredTarget) -> Result<()> {
        self.add(target).await
    }

    /// Drop the job for `target_id`; unknown ids are ignored
    pub async fn remove(&self, target_id: TargetId) {
        let removed = self.state.lock().await.jobs.remove(&target_id);
        if let Some(job) = removed {
            drop(job.cancel());
            info!(target_id, "Unscheduled target");
        }

        // A draining tick may still hold the guard; it must stay shared until released
        let mut guards = self.ctx.guards.lock().await;
        if guards.get(&target_id).is_some_and(|guard| Arc::strong_count(guard) == 1) {
            guards.remove(&target_id);
        }
    }

    pub async fn status(&self) -> SchedulerStatus {
        let state = self.state.lock().await;
        let mut jobs: Vec<JobStatus> = state
            .jobs
            .iter()
            .map(|(id, job)| JobStatus {
                id: *id,
                name: job.name.clone(),
                next_fire_time: *job.next_fire.borrow(),
            })
            .collect();
        jobs.sort_by_key(|job| job.id);

        SchedulerStatus { running: state.running, active_jobs: jobs.len(), jobs }
    }

    /// Probe a target right now and persist the result.
    ///
    /// Transitions are not evaluated, so this never notifies. Waits for an
    /// in-flight scheduled tick of the same target.
    pub async fn run_once(&self, target_id: TargetId) -> Result<ProbeResult> {
        let target = self
            .ctx
            .targets
            .get_target(target_id)
            .await?
            .ok_or(WatchdogError::TargetNotFound(target_id))?;

        let _guard = self.ctx.guard(target_id).await.lock_owned().await;
        let mut result = self.ctx.probe(target_id, &target).await?;
        result.id = Some(self.ctx.history.append_result(&result).await?);
        Ok(result)
    }

    /// Bring the job table in line with the stored targets.
    ///
    /// New targets are added, vanished ones removed and those whose interval or
    /// name changed are rescheduled.
    pub async fn reconcile(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.running {
            return Ok(());
        }

        let desired: HashMap<TargetId, MonitoredTarget> = self
            .ctx
            .targets
            .list_targets()
            .await?
            .into_iter()
            .filter_map(|target| target.id.map(|id| (id, target)))
            .collect();

        let scheduled: HashSet<TargetId> = state.jobs.keys().copied().collect();
        for target_id in scheduled.iter().filter(|id| !desired.contains_key(*id)) {
            if let Some(job) = state.jobs.remove(target_id) {
                drop(job.cancel());
                info!(target_id, "Target vanished, unscheduled");
            }
        }

        for (target_id, target) in &desired {
            let changed = match state.jobs.get(target_id) {
                Some(job) => job.interval_seconds != target.interval_seconds || job.name != target.name,
                None => true,
            };
            if !changed {
                continue;
            }
            if let Err(e) = self.install(&mut state, target) {
                warn!(target_id, "Cannot schedule target: {e}");
            }
        }

        Ok(())
    }

    /// Spawn the job loop for `target`, cancelling a previous job for the same id
    fn install(&self, state: &mut SchedulerState, target: &MonitoredTarget) -> Result<()> {
        target.check_schedulable()?;
        let target_id = target.require_id()?;

        if let Some(previous) = state.jobs.remove(&target_id) {
            drop(previous.cancel());
        }

        let period = Duration::from_secs(target.interval_seconds);
        let (next_tx, next_rx) = watch::channel(next_fire_after(period));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run_job(self.ctx.clone(), target_id, period, next_tx, shutdown_rx));

        state.jobs.insert(
            target_id,
            ScheduledJob {
                name: target.name.clone(),
                interval_seconds: target.interval_seconds,
                next_fire: next_rx,
                shutdown: shutdown_tx,
                handle,
            },
        );
        info!(target_id, name = %target.name, interval = target.interval_seconds, "Scheduled target");
        Ok(())
    }
}

impl TickContext {
    async fn guard(&self, target_id: TargetId) -> Arc<Mutex<()>> {
        self.guards.lock().await.entry(target_id).or_default().clone()
    }

    /// Run the probe for `target` without persisting anything
    async fn probe(&self, target_id: TargetId, target: &MonitoredTarget) -> Result<ProbeResult> {
        let checker = ProbeFactory::for_target(target, self.probe_timeout)?;

        let start = Instant::now();
        let outcome = match timeout(self.probe_timeout + PROBE_GRACE, checker.check()).await {
            Ok(outcome) => outcome,
            Err(_) => ProbeOutcome::down(start.elapsed(), format!("Timeout probing {}", checker.describe())),
        };

        let result = ProbeResult::from_outcome(target_id, &outcome);
        debug!(target_id, status = %result.status, latency = ?result.latency_seconds, "Probe finished");
        Ok(result)
    }

    /// One scheduled tick. Never fails; problems are logged.
    ///
    /// The previous result is read before the new one is appended. The guard
    /// keeps other writers for this target out, so a failed lookup leaves
    /// nothing behind and the transition is evaluated on a later tick.
    async fn tick(&self, target_id: TargetId, _guard: OwnedMutexGuard<()>) {
        let target = match self.targets.get_target(target_id).await {
            Ok(Some(target)) => target,
            Ok(None) => {
                warn!(target_id, "Target no longer exists, skipping tick");
                return;
            }
            Err(e) => {
                error!(target_id, "Failed to load target: {e:#}");
                return;
            }
        };

        let mut result = match self.probe(target_id, &target).await {
            Ok(result) => result,
            Err(e) => {
                error!(target_id, "Check failed: {e}");
                return;
            }
        };

        let previous = match self.history.latest_result(target_id).await {
            Ok(previous) => previous.map(|r| r.status).unwrap_or(ProbeStatus::Unknown),
            Err(e) => {
                error!(target_id, "Failed to load previous result, discarding check: {e:#}");
                return;
            }
        };

        match self.history.append_result(&result).await {
            Ok(id) => result.id = Some(id),
            Err(e) => {
                error!(target_id, "Failed to record result: {e:#}");
                return;
            }
        }

        match Transition::between(previous, result.status) {
            Some(Transition::WentDown) => {
                let error_text = result.error_message.as_deref().unwrap_or("Unknown error");
                warn!(target_id, name = %target.name, "Target went down: {error_text}");
                self.dispatcher.send_down(&target, error_text).await;
            }
            Some(Transition::Recovered) => {
                info!(target_id, name = %target.name, "Target recovered");
                self.dispatcher.send_recovery(&target).await;
            }
            None => {}
        }
    }
}

/// Timer loop of a single target.
///
/// The first tick fires one full period after scheduling. A tick that is still
/// running when the next one is due causes that one to be skipped.
async fn run_job(
    ctx: Arc<TickContext>,
    target_id: TargetId,
    period: Duration,
    next_fire: watch::Sender<DateTime<Utc>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut timer = interval_at(tokio::time::Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,

            Some(joined) = ticks.join_next() => {
                if let Err(e) = joined {
                    log_join_error(Some(target_id), e);
                }
            }

            _ = timer.tick() => {
                let _ = next_fire.send(next_fire_after(period));

                if !ticks.is_empty() {
                    warn!(target_id, "Previous check still running, skipping tick");
                    continue;
                }
                let guard = ctx.guard(target_id).await;
                let Ok(guard) = guard.try_lock_owned() else {
                    warn!(target_id, "Manual check in progress, skipping tick");
                    continue;
                };
                let ctx = ctx.clone();
                ticks.spawn(async move { ctx.tick(target_id, guard).await });
            }
        }
    }

    while let Some(joined) = ticks.join_next().await {
        if let Err(e) = joined {
            log_join_error(Some(target_id), e);
        }
    }
    debug!(target_id, "Job stopped");
}

fn next_fire_after(period: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(period)
        .ok()
        .and_then(|period| Utc::now().checked_add_signed(period))
        .unwrap_or_else(Utc::now)
}

fn log_join_error(target_id: Option<TargetId>, e: JoinError) {
    if e.is_panic() {
        error!(?target_id, "Check task panicked: {e}");
    } else {
        debug!(?target_id, "Check task cancelled: {e}");
    }
}
