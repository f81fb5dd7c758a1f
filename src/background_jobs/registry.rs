use super::obligation::{DailyFireTime, DeliveryAction, Obligation};
use crate::error::{LearnerError, LearnerResult};
use crate::ledger::LedgerEntry;
use crate::subject::{Subject, SubjectRef};
use chrono::{DateTime, Local};

/// In-memory set of active obligations, kept in registration order.
///
/// At most one obligation exists per subject: registering a subject that is already
/// present leaves the existing obligation untouched.
#[derive(Debug, Default)]
pub struct RecurrenceRegistry {
    obligations: Vec<Obligation>,
}

impl RecurrenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when a new obligation was added.
    pub fn register(
        &mut self,
        subject: Option<&Subject>,
        fire_time: DailyFireTime,
        now: DateTime<Local>,
    ) -> LearnerResult<bool> {
        let subject =
            subject.ok_or_else(|| LearnerError::invalid("called scheduler without a subject"))?;
        let reference = subject.reference();
        if self.contains(&reference) {
            return Ok(false);
        }

        self.obligations.push(Obligation {
            action: DeliveryAction::for_kind(reference.kind),
            subject: reference,
            display_name: subject.display_name().to_string(),
            fire_time,
            next_run: fire_time.next_after(&now),
        });
        Ok(true)
    }

    pub fn contains(&self, subject: &SubjectRef) -> bool {
        self.obligations.iter().any(|o| &o.subject == subject)
    }

    pub fn get(&self, subject: &SubjectRef) -> Option<&Obligation> {
        self.obligations.iter().find(|o| &o.subject == subject)
    }

    pub fn list_due(&self, now: &DateTime<Local>) -> Vec<Obligation> {
        self.obligations
            .iter()
            .filter(|o| o.is_due(now))
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<Obligation> {
        self.obligations.clone()
    }

    /// Moves the obligation's next run to the following occurrence of its fire time.
    pub fn mark_ran(&mut self, subject: &SubjectRef, now: &DateTime<Local>) {
        if let Some(obligation) = self.obligations.iter_mut().find(|o| &o.subject == subject) {
            obligation.next_run = obligation.fire_time.next_after(now);
        }
    }

    pub fn retire(&mut self, subject: &SubjectRef) -> bool {
        let before = self.obligations.len();
        self.obligations.retain(|o| &o.subject != subject);
        self.obligations.len() != before
    }

    pub fn clear(&mut self) -> usize {
        let removed = self.obligations.len();
        self.obligations.clear();
        removed
    }

    /// `(next run, display name)` per obligation, in registration order.
    pub fn enumerate(&self) -> Vec<(DateTime<Local>, String)> {
        self.obligations
            .iter()
            .map(|o| (o.next_run, o.display_name.clone()))
            .collect()
    }

    /// The ledger projection of the whole registry.
    pub fn snapshot(&self) -> Vec<LedgerEntry> {
        self.obligations.iter().map(|o| o.subject.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.obligations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obligations.is_empty()
    }
}
