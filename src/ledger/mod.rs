//! Job Ledger: the durable list of obligations that must exist after a restart.

mod schema;
mod sqlite_job_ledger;

pub use schema::LEDGER_VERSIONED_SCHEMAS;
pub use sqlite_job_ledger::SqliteJobLedger;

use crate::error::LearnerResult;
use crate::subject::SubjectRef;

/// An obligation reduced to what is needed to rebuild it: variant tag and natural key.
pub type LedgerEntry = SubjectRef;

pub trait JobLedger: Send + Sync {
    fn load(&self) -> LearnerResult<Vec<LedgerEntry>>;

    /// Replaces every stored entry with `entries`. Callers pass the complete set.
    fn save_snapshot(&self, entries: &[LedgerEntry]) -> LearnerResult<()>;

    fn clear(&self) -> LearnerResult<()>;
}
