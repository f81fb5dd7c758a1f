//! Daily Learner Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod auth;
pub mod background_jobs;
pub mod commands;
pub mod config;
pub mod error;
pub mod integrations;
pub mod ledger;
pub mod progression;
pub mod server;
pub mod sqlite_persistence;
pub mod subject;

#[cfg(test)]
mod test_support;

// Re-export commonly used types for convenience
pub use error::{LearnerError, LearnerResult};
pub use server::{run_server, RequestsLoggingLevel};
pub use subject::{SqliteSubjectStore, SubjectStore};
