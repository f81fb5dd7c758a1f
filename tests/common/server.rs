//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own database directory and fake
//! collaborators. The scheduler runs for real; only the outside world is faked.

use super::constants::*;
use super::fakes::{EchoGenerator, RecordingDelivery, StaticDirectory, TestCatalog};
use daily_learner::auth::RequestVerifier;
use daily_learner::background_jobs::{create_scheduler, DailyFireTime, SchedulerHandle};
use daily_learner::commands::CommandService;
use daily_learner::ledger::SqliteJobLedger;
use daily_learner::progression::{ProgressionEngine, DEFAULT_PAGES_SPLIT};
use daily_learner::server::{make_app, RequestsLoggingLevel, ServerConfig, ServerState};
use daily_learner::subject::SqliteSubjectStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Test server instance with isolated databases
///
/// When dropped, the server and its scheduler are cancelled. Use [`TestServer::stop`]
/// to shut down cleanly and keep the database directory for a restart.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Every message the server delivered
    pub delivery: Arc<RecordingDelivery>,

    pub scheduler_handle: SchedulerHandle,

    /// Direct access to stored subjects
    pub subjects: Arc<SqliteSubjectStore>,

    // Private fields - keep resources alive until drop
    db_dir: Option<TempDir>,
    shutdown_token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port with a fresh database directory
    pub async fn spawn() -> Self {
        let db_dir = TempDir::new().expect("Failed to create temp db dir");
        Self::spawn_in(db_dir).await
    }

    /// Spawns a test server reusing an existing database directory
    ///
    /// # Panics
    ///
    /// Panics if the stores cannot be opened, the port cannot be bound or the
    /// server doesn't become ready within timeout.
    pub async fn spawn_in(db_dir: TempDir) -> Self {
        let subjects = Arc::new(
            SqliteSubjectStore::new(db_dir.path().join("subjects.db"))
                .expect("Failed to open subject store"),
        );
        let ledger = Arc::new(
            SqliteJobLedger::new(db_dir.path().join("jobs.db")).expect("Failed to open ledger"),
        );
        let delivery = Arc::new(RecordingDelivery::default());

        let engine = Arc::new(ProgressionEngine::new(
            subjects.clone(),
            Arc::new(EchoGenerator),
            delivery.clone(),
            DEFAULT_PAGES_SPLIT,
        ));

        let shutdown_token = CancellationToken::new();
        // Long drain interval: deliveries in tests only happen through /run.
        let (mut scheduler, scheduler_handle) = create_scheduler(
            subjects.clone(),
            ledger,
            engine,
            DailyFireTime::default(),
            Duration::from_secs(3600),
            shutdown_token.clone(),
        );

        let commands = CommandService::new(
            subjects.clone(),
            Arc::new(TestCatalog::default()),
            Arc::new(StaticDirectory),
            scheduler_handle.clone(),
        );

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let app = make_app(ServerState {
            config: ServerConfig {
                requests_logging_level: RequestsLoggingLevel::None,
                port,
            },
            start_time: Instant::now(),
            commands: Arc::new(commands),
            scheduler_handle: scheduler_handle.clone(),
            verifier: Arc::new(RequestVerifier::new(SIGNING_SECRET)),
        });

        let scheduler_task = tokio::spawn(async move { scheduler.run().await });
        let server_token = shutdown_token.clone();
        let server_task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_token.cancelled().await })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            delivery,
            scheduler_handle,
            subjects,
            db_dir: Some(db_dir),
            shutdown_token,
            tasks: vec![scheduler_task, server_task],
        };

        server.wait_for_ready().await;

        server
    }

    /// Shuts the server and scheduler down and hands back the database directory.
    pub async fn stop(mut self) -> TempDir {
        self.shutdown_token.cancel();
        for task in self.tasks.drain(..) {
            task.await.expect("Server task panicked");
        }
        self.db_dir.take().expect("Database directory already taken")
    }

    /// Waits until no obligation is executing. Progress is persisted by then.
    pub async fn wait_until_idle(&self) {
        let start = Instant::now();
        while self.scheduler_handle.running_count().await > 0 {
            if start.elapsed() > Duration::from_millis(DELIVERY_TIMEOUT_MS) {
                panic!(
                    "Obligations still running after {}ms, delivered so far: {:?}",
                    DELIVERY_TIMEOUT_MS,
                    self.delivery.sent()
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Waits until the registry holds exactly `count` obligations.
    pub async fn wait_for_obligations(&self, count: usize) {
        let start = Instant::now();
        while self.scheduler_handle.obligation_count().await != count {
            if start.elapsed() > Duration::from_millis(DELIVERY_TIMEOUT_MS) {
                panic!("Expected {} obligations within {}ms", count, DELIVERY_TIMEOUT_MS);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Waits for the server to become ready by polling the health endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
        // TempDir will be cleaned up automatically
    }
}
