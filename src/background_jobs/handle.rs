use super::obligation::DailyFireTime;
use super::registry::RecurrenceRegistry;
use crate::error::{LearnerError, LearnerResult};
use crate::ledger::JobLedger;
use crate::subject::{Subject, SubjectRef};
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{info, warn};

/// Command sent to the scheduler.
pub enum SchedulerCommand {
    /// Queue every registered obligation once, regardless of its fire time.
    /// Answers with the number of obligations queued.
    RunAll { response: oneshot::Sender<usize> },
}

/// Shared state between scheduler and handle.
#[derive(Default)]
pub struct SharedScheduleState {
    pub registry: RecurrenceRegistry,
    /// Subjects with an execution in flight
    pub running: HashSet<SubjectRef>,
}

/// Writes the registry's full contents to the ledger.
pub(super) fn mirror_to_ledger(
    ledger: &dyn JobLedger,
    registry: &RecurrenceRegistry,
) -> LearnerResult<()> {
    ledger.save_snapshot(&registry.snapshot())
}

/// Handle to interact with the scheduler from HTTP handlers.
#[derive(Clone)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
    shared_state: Arc<RwLock<SharedScheduleState>>,
    ledger: Arc<dyn JobLedger>,
    fire_time: DailyFireTime,
}

impl SchedulerHandle {
    pub fn new(
        command_tx: mpsc::Sender<SchedulerCommand>,
        shared_state: Arc<RwLock<SharedScheduleState>>,
        ledger: Arc<dyn JobLedger>,
        fire_time: DailyFireTime,
    ) -> Self {
        Self {
            command_tx,
            shared_state,
            ledger,
            fire_time,
        }
    }

    pub fn fire_time(&self) -> DailyFireTime {
        self.fire_time
    }

    /// Registers `subject` and mirrors the registry into the ledger while holding the
    /// write lock, so the ledger never lags behind the registry. Returns `false` when
    /// the subject already had an obligation.
    pub async fn register(&self, subject: &Subject) -> LearnerResult<bool> {
        let reference = subject.reference();
        let mut state = self.shared_state.write().await;
        let added = state
            .registry
            .register(Some(subject), self.fire_time, Local::now())?;
        if !added {
            info!("{} is already scheduled", reference);
            return Ok(false);
        }

        if let Err(e) = mirror_to_ledger(self.ledger.as_ref(), &state.registry) {
            state.registry.retire(&reference);
            return Err(e);
        }
        info!(
            "Scheduled {} every day at {} ({} obligations)",
            reference,
            self.fire_time,
            state.registry.len()
        );
        Ok(true)
    }

    /// Queues every obligation for immediate execution without waiting for it.
    pub async fn run_all(&self) -> LearnerResult<usize> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(SchedulerCommand::RunAll {
                response: response_tx,
            })
            .await
            .map_err(|_| LearnerError::External("Scheduler not available".to_string()))?;

        response_rx
            .await
            .map_err(|_| LearnerError::External("Scheduler did not respond".to_string()))
    }

    /// Clears the ledger and the registry together. Executions already in flight
    /// finish, but nothing is scheduled afterwards.
    pub async fn reset(&self) -> LearnerResult<usize> {
        let mut state = self.shared_state.write().await;
        self.ledger.clear()?;
        let removed = state.registry.clear();
        warn!("Schedule reset, {} obligations removed", removed);
        Ok(removed)
    }

    pub async fn enumerate(&self) -> Vec<(DateTime<Local>, String)> {
        self.shared_state.read().await.registry.enumerate()
    }

    pub async fn obligation_count(&self) -> usize {
        self.shared_state.read().await.registry.len()
    }

    pub async fn is_scheduled(&self, subject: &SubjectRef) -> bool {
        self.shared_state.read().await.registry.contains(subject)
    }

    pub async fn is_running(&self, subject: &SubjectRef) -> bool {
        self.shared_state.read().await.running.contains(subject)
    }

    /// Number of executions in flight.
    pub async fn running_count(&self) -> usize {
        self.shared_state.read().await.running.len()
    }
}
