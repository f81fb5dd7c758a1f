//! Recurring delivery scheduling.
//!
//! Obligations live in an in-memory registry that is mirrored into the job ledger on
//! every change, so a restart can rebuild it. The scheduler drains due obligations on
//! a fixed cadence and runs them on a supervised worker pool.

mod handle;
mod obligation;
mod registry;
mod scheduler;

pub use handle::{SchedulerCommand, SchedulerHandle, SharedScheduleState};
pub use obligation::{DailyFireTime, DeliveryAction, Obligation};
pub use registry::RecurrenceRegistry;
pub use scheduler::{create_scheduler, ObligationScheduler};
