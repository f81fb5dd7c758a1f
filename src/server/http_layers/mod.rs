mod requests_logging;
mod slack_signature;

pub use requests_logging::{log_requests, RequestsLoggingLevel};
pub use slack_signature::{verify_slack_signature, SIGNATURE_HEADER, TIMESTAMP_HEADER};
