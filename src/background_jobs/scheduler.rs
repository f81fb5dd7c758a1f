use super::handle::{mirror_to_ledger, SchedulerCommand, SchedulerHandle, SharedScheduleState};
use super::obligation::{DailyFireTime, DeliveryAction, Obligation};
use crate::error::{LearnerError, LearnerResult};
use crate::ledger::JobLedger;
use crate::progression::{ProgressOutcome, ProgressionEngine};
use crate::subject::{Subject, SubjectRef, SubjectStore};
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tokio::task::{AbortHandle, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long shutdown waits for in-flight executions.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Schedule,
    Manual,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Schedule => write!(f, "schedule"),
            Trigger::Manual => write!(f, "manual"),
        }
    }
}

/// Aborts the execution task once its supervising worker goes away.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Result of one obligation execution, collected by the scheduler loop.
struct WorkerReport {
    obligation: Obligation,
    trigger: Trigger,
    elapsed: Duration,
    result: Result<LearnerResult<ProgressOutcome>, JoinError>,
}

/// Runs the action bound to an obligation against the current stored subject.
async fn execute(
    engine: &ProgressionEngine,
    obligation: &Obligation,
) -> LearnerResult<ProgressOutcome> {
    match obligation.action {
        DeliveryAction::ReadingProgression => {
            engine.progress_reading_by_key(&obligation.subject.key).await
        }
        DeliveryAction::TopicTip => engine.deliver_tip_by_key(&obligation.subject.key).await,
    }
}

/// Drives the registry: restores it from the ledger, drains due obligations on a fixed
/// cadence and executes them on a supervised worker pool.
pub struct ObligationScheduler {
    shared_state: Arc<RwLock<SharedScheduleState>>,
    ledger: Arc<dyn JobLedger>,
    subjects: Arc<dyn SubjectStore>,
    engine: Arc<ProgressionEngine>,

    /// In-flight executions; every result comes back through `reap`.
    workers: JoinSet<WorkerReport>,

    command_receiver: mpsc::Receiver<SchedulerCommand>,
    shutdown_token: CancellationToken,
    fire_time: DailyFireTime,
    drain_interval: Duration,
}

impl ObligationScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        shared_state: Arc<RwLock<SharedScheduleState>>,
        ledger: Arc<dyn JobLedger>,
        subjects: Arc<dyn SubjectStore>,
        engine: Arc<ProgressionEngine>,
        command_receiver: mpsc::Receiver<SchedulerCommand>,
        shutdown_token: CancellationToken,
        fire_time: DailyFireTime,
        drain_interval: Duration,
    ) -> Self {
        Self {
            shared_state,
            ledger,
            subjects,
            engine,
            workers: JoinSet::new(),
            command_receiver,
            shutdown_token,
            fire_time,
            drain_interval,
        }
    }

    /// Main scheduler loop. Returns once the shutdown token is cancelled.
    pub async fn run(&mut self) {
        match self.reconcile().await {
            Ok(restored) => info!(
                "Starting scheduler with {} restored obligations, draining every {:?}",
                restored, self.drain_interval
            ),
            Err(e) => error!("Failed to restore obligations from the ledger: {}", e),
        }

        let mut ticker = tokio::time::interval(self.drain_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.drain_due(Local::now()).await;
                }
                Some(cmd) = self.command_receiver.recv() => {
                    self.handle_command(cmd).await;
                }
                Some(joined) = self.workers.join_next(), if !self.workers.is_empty() => {
                    match joined {
                        Ok(report) => self.reap(report).await,
                        Err(e) => error!("Obligation worker failed: {}", e),
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Scheduler stopped");
    }

    /// Rebuilds the registry from the ledger. Entries whose subject is gone or already
    /// finished are skipped, and the ledger is rewritten without them.
    pub async fn reconcile(&self) -> LearnerResult<usize> {
        let entries = self.ledger.load()?;
        let now = Local::now();
        let mut state = self.shared_state.write().await;
        let mut restored = 0;
        let mut lookups_failed = false;

        for entry in &entries {
            match self.subjects.find(entry) {
                Ok(Some(Subject::Reading(reading))) if reading.is_finished() => {
                    info!("Not restoring {}, it is already finished", entry);
                }
                Ok(Some(subject)) => {
                    if state.registry.register(Some(&subject), self.fire_time, now)? {
                        restored += 1;
                    }
                }
                Ok(None) => warn!("Ledger entry {} has no stored subject, skipping", entry),
                Err(e) => {
                    lookups_failed = true;
                    error!("Failed to load subject for ledger entry {}: {}", entry, e);
                }
            }
        }

        // Keep the ledger as is when a lookup failed so the entry gets another chance.
        if !lookups_failed && state.registry.snapshot() != entries {
            mirror_to_ledger(self.ledger.as_ref(), &state.registry)?;
        }

        info!("Restored {} of {} ledger entries", restored, entries.len());
        Ok(restored)
    }

    /// Queues every obligation whose fire time has passed and moves each to its next
    /// occurrence. Returns the number queued.
    pub(crate) async fn drain_due(&mut self, now: DateTime<Local>) -> usize {
        let to_run = {
            let mut state = self.shared_state.write().await;
            let due = state.registry.list_due(&now);
            let mut to_run = Vec::with_capacity(due.len());
            for obligation in due {
                state.registry.mark_ran(&obligation.subject, &now);
                if state.running.insert(obligation.subject.clone()) {
                    to_run.push(obligation);
                } else {
                    debug!("Skipping {}, still running", obligation.subject);
                }
            }
            to_run
        };

        if to_run.is_empty() {
            return 0;
        }
        info!("Draining {} due obligations", to_run.len());
        let queued = to_run.len();
        for obligation in to_run {
            self.spawn_obligation(obligation, Trigger::Schedule);
        }
        queued
    }

    async fn handle_command(&mut self, cmd: SchedulerCommand) {
        match cmd {
            SchedulerCommand::RunAll { response } => {
                let queued = self.run_all().await;
                let _ = response.send(queued);
            }
        }
    }

    /// Queues every registered obligation once. Fire times are not touched.
    async fn run_all(&mut self) -> usize {
        let to_run: Vec<Obligation> = {
            let mut state = self.shared_state.write().await;
            let all = state.registry.all();
            all.into_iter()
                .filter(|o| state.running.insert(o.subject.clone()))
                .collect()
        };

        info!("Running {} obligations on request", to_run.len());
        let queued = to_run.len();
        for obligation in to_run {
            self.spawn_obligation(obligation, Trigger::Manual);
        }
        queued
    }

    fn spawn_obligation(&mut self, obligation: Obligation, trigger: Trigger) {
        debug!("Starting {} (triggered_by: {})", obligation.subject, trigger);
        let engine = Arc::clone(&self.engine);

        self.workers.spawn(async move {
            let start_time = Instant::now();
            let inner = obligation.clone();
            // Nested task so a panic is reported with the obligation it belongs to.
            let task = tokio::spawn(async move { execute(&engine, &inner).await });
            let _abort_guard = AbortOnDrop(task.abort_handle());
            let result = task.await;
            WorkerReport {
                obligation,
                trigger,
                elapsed: start_time.elapsed(),
                result,
            }
        });
    }

    /// Logs the outcome of one execution and retires obligations that have nothing
    /// left to deliver.
    async fn reap(&self, report: WorkerReport) {
        let subject = &report.obligation.subject;
        let name = &report.obligation.display_name;
        self.shared_state.write().await.running.remove(subject);

        let retire = match report.result {
            Ok(Ok(ProgressOutcome::Finished)) => {
                info!("{} finished in {:?}, retiring its obligation", name, report.elapsed);
                true
            }
            Ok(Ok(outcome)) => {
                info!(
                    "Delivered {} ({:?}, triggered_by: {}) in {:?}",
                    name, outcome, report.trigger, report.elapsed
                );
                false
            }
            Ok(Err(e @ LearnerError::AlreadyCompleted(_)))
            | Ok(Err(e @ LearnerError::NotFound(_))) => {
                warn!("Retiring obligation for {}: {}", subject, e);
                true
            }
            Ok(Err(e)) => {
                error!(
                    "Obligation for {} failed after {:?} (triggered_by: {}): {}",
                    name, report.elapsed, report.trigger, e
                );
                false
            }
            Err(e) => {
                error!("Obligation for {} panicked after {:?}: {}", name, report.elapsed, e);
                false
            }
        };

        if retire {
            self.retire(subject).await;
        }
    }

    async fn retire(&self, subject: &SubjectRef) {
        let mut state = self.shared_state.write().await;
        if !state.registry.retire(subject) {
            return;
        }
        if let Err(e) = mirror_to_ledger(self.ledger.as_ref(), &state.registry) {
            error!("Failed to update ledger after retiring {}: {}", subject, e);
        }
    }

    /// Waits up to `limit` for in-flight executions. Returns `false` on timeout.
    pub(crate) async fn settle(&mut self, limit: Duration) -> bool {
        let mut workers = std::mem::take(&mut self.workers);
        let finished = tokio::time::timeout(limit, async {
            while let Some(joined) = workers.join_next().await {
                match joined {
                    Ok(report) => self.reap(report).await,
                    Err(e) => error!("Obligation worker failed: {}", e),
                }
            }
        })
        .await
        .is_ok();
        self.workers = workers;
        finished
    }

    async fn shutdown(&mut self) {
        let in_flight = self.workers.len();
        if in_flight > 0 {
            info!("Waiting for {} in-flight obligations...", in_flight);
        }
        if !self.settle(SHUTDOWN_GRACE).await {
            self.abandon();
        }
        info!("Scheduler shutdown complete");
    }

    /// Cancels every in-flight execution, including the work nested inside each worker.
    fn abandon(&mut self) {
        warn!("Abandoning {} obligations still running", self.workers.len());
        self.workers.abort_all();
    }
}

/// Create a scheduler and its handle.
pub fn create_scheduler(
    subjects: Arc<dyn SubjectStore>,
    ledger: Arc<dyn JobLedger>,
    engine: Arc<ProgressionEngine>,
    fire_time: DailyFireTime,
    drain_interval: Duration,
    shutdown_token: CancellationToken,
) -> (ObligationScheduler, SchedulerHandle) {
    let (command_tx, command_rx) = mpsc::channel(100);
    let shared_state = Arc::new(RwLock::new(SharedScheduleState::default()));

    let scheduler = ObligationScheduler::new(
        Arc::clone(&shared_state),
        Arc::clone(&ledger),
        subjects,
        engine,
        command_rx,
        shutdown_token,
        fire_time,
        drain_interval,
    );

    let handle = SchedulerHandle::new(command_tx, shared_state, ledger, fire_time);

    (scheduler, handle)
}
