//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestClient, TestServer, TOPIC_NAME};
//!
//! #[tokio::test]
//! async fn test_tips() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     let reply = client.command("/tips", TOPIC_NAME).await;
//!     assert!(reply.contains("tips and tricks"));
//! }
//! ```

mod client;
mod constants;
mod fakes;
mod server;

// Public API - this is what tests import
#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use constants::*;
#[allow(unused_imports)]
pub use fakes::channel_for;
#[allow(unused_imports)]
pub use server::TestServer;
