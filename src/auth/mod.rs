//! Authenticity checks for inbound chat platform requests.

mod signature;

pub use signature::{RequestVerifier, REPLAY_WINDOW_SECS};
