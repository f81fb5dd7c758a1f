//! Shared constants for end-to-end tests
//!
//! When test data changes (signing secret, catalog books, etc.),
//! update only this file.

// ============================================================================
// Request signing
// ============================================================================

/// Signing secret shared between the test server and the test client
pub const SIGNING_SECRET: &str = "e2e-signing-secret";

// ============================================================================
// Test Catalog
// ============================================================================

/// A book read page by page: 300 pages, split 15 -> 20 pages per delivery
pub const PAGED_BOOK_TITLE: &str = "The Pragmatic Programmer";
pub const PAGED_BOOK_AUTHOR: &str = "Andrew Hunt";
pub const PAGED_BOOK_ISBN: &str = "9780201616224";
pub const PAGED_BOOK_PAGES: u32 = 300;

/// A book read chapter by chapter
pub const CHAPTER_BOOK_TITLE: &str = "Clean Code";
pub const CHAPTER_BOOK_AUTHOR: &str = "Robert C. Martin";
pub const CHAPTER_BOOK_ISBN: &str = "9780132350884";
pub const CHAPTER_BOOK_CHAPTERS: u32 = 3;

pub const TOPIC_NAME: &str = "Rust";

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between server readiness checks (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

/// Default timeout for HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Maximum time to wait for background deliveries (milliseconds)
pub const DELIVERY_TIMEOUT_MS: u64 = 5000;
