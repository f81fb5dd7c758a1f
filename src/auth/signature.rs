use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

/// Requests whose timestamp is further than this from now are rejected.
pub const REPLAY_WINDOW_SECS: i64 = 300;

const SIGNATURE_VERSION: &str = "v0";

/// Checks that a request was signed by the chat platform with the shared signing
/// secret, and that it is fresh.
#[derive(Clone)]
pub struct RequestVerifier {
    secret: Vec<u8>,
}

impl RequestVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn verify(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        raw_body: &[u8],
    ) -> bool {
        self.verify_at(chrono::Utc::now().timestamp(), timestamp, signature, raw_body)
    }

    /// Same as [`verify`](Self::verify) with an explicit current unix time.
    pub fn verify_at(
        &self,
        now: i64,
        timestamp: Option<&str>,
        signature: Option<&str>,
        raw_body: &[u8],
    ) -> bool {
        let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
            debug!("Request is missing its timestamp or signature");
            return false;
        };

        let Ok(sent_at) = timestamp.trim().parse::<i64>() else {
            debug!("Request timestamp '{}' is not a number", timestamp);
            return false;
        };
        if now.abs_diff(sent_at) > REPLAY_WINDOW_SECS.unsigned_abs() {
            warn!("Rejecting request outside the replay window (sent at {})", sent_at);
            return false;
        }

        match self.sign(timestamp, raw_body) {
            Some(expected) => expected.as_bytes().ct_eq(signature.as_bytes()).into(),
            None => false,
        }
    }

    /// `v0=<hex hmac>` over `v0:<timestamp>:<body>`.
    pub fn sign(&self, timestamp: &str, raw_body: &[u8]) -> Option<String> {
        let mut mac = match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(e) => {
                warn!("Invalid signing secret: {}", e);
                return None;
            }
        };
        mac.update(SIGNATURE_VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(raw_body);
        Some(format!(
            "{}={}",
            SIGNATURE_VERSION,
            hex::encode(mac.finalize().into_bytes())
        ))
    }
}
