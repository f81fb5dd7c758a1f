//! Progression Engine: advances a subject by one delivery.

mod engine;
pub mod guards;

pub use engine::{ProgressOutcome, ProgressionEngine, DEFAULT_PAGES_SPLIT};
