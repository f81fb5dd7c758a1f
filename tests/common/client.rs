//! HTTP client for end-to-end tests
//!
//! Wraps reqwest and signs every request the way the chat platform does.
//! When routes or request formats change, update only this file.

use super::constants::*;
use daily_learner::auth::RequestVerifier;
use reqwest::Response;
use std::time::Duration;

pub const TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";
pub const SIGNATURE_HEADER: &str = "X-Slack-Signature";

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    verifier: RequestVerifier,
}

impl TestClient {
    /// Creates a client signing with the server's secret
    pub fn new(base_url: String) -> Self {
        Self::with_secret(base_url, SIGNING_SECRET)
    }

    /// Creates a client signing with an arbitrary secret
    pub fn with_secret(base_url: String, secret: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            verifier: RequestVerifier::new(secret),
        }
    }

    /// POSTs a form body signed with the current time
    pub async fn post_signed(&self, path: &str, body: String) -> Response {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.post_signed_at(path, body, &timestamp).await
    }

    pub async fn post_signed_at(&self, path: &str, body: String, timestamp: &str) -> Response {
        let signature = self
            .verifier
            .sign(timestamp, body.as_bytes())
            .expect("Failed to sign request");
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header(TIMESTAMP_HEADER, timestamp)
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn post_unsigned(&self, path: &str, body: String) -> Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .expect("Request failed")
    }

    /// Runs a slash command and returns the reply text
    pub async fn command(&self, command: &str, text: &str) -> String {
        let body = format!(
            "command={}&text={}",
            urlencoding::encode(command),
            urlencoding::encode(text)
        );
        let response = self.post_signed("/slack/events", body).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let json: serde_json::Value = response.json().await.expect("Reply is not JSON");
        assert_eq!(json["response_type"], "in_channel");
        json["text"].as_str().expect("Reply has no text").to_string()
    }

    pub async fn hello(&self) -> Response {
        self.post_signed("/slack/hello", String::new()).await
    }

    pub async fn reset_schedule(&self) -> Response {
        self.post_signed("/slack/reset_schedule", String::new()).await
    }

    pub async fn home(&self) -> serde_json::Value {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Request failed")
            .json()
            .await
            .expect("Health reply is not JSON")
    }
}
