use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use daily_learner::auth::RequestVerifier;
use daily_learner::background_jobs::create_scheduler;
use daily_learner::commands::CommandService;
use daily_learner::config::{AppConfig, CliConfig, FileConfig, DEFAULT_PORT};
use daily_learner::integrations::{
    GoogleBooksClient, OpenAiContentGenerator, SlackClient,
};
use daily_learner::ledger::SqliteJobLedger;
use daily_learner::progression::{ProgressionEngine, DEFAULT_PAGES_SPLIT};
use daily_learner::server::{run_server, RequestsLoggingLevel, ServerConfig, ServerState};
use daily_learner::subject::SqliteSubjectStore;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Its values override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding subjects.db and jobs.db.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Daily delivery time (HH:MM, server local time).
    #[clap(long)]
    pub fire_time: Option<String>,

    /// Number of chunks a book read page by page is split into.
    #[clap(long, default_value_t = DEFAULT_PAGES_SPLIT)]
    pub pages_split: u32,

    /// How often due obligations are checked, in seconds.
    #[clap(long, default_value_t = 60)]
    pub drain_interval_secs: u64,

    #[clap(long, env = "SLACK_SIGNING_SECRET", hide_env_values = true)]
    pub slack_signing_secret: Option<String>,

    #[clap(long, env = "SLACK_BOT_TOKEN", hide_env_values = true)]
    pub slack_bot_token: Option<String>,

    #[clap(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_dir: self.db_dir.clone(),
            port: self.port,
            logging_level: self.logging_level.clone(),
            fire_time: self.fire_time.clone(),
            pages_split: self.pages_split,
            drain_interval_secs: self.drain_interval_secs,
            slack_signing_secret: self.slack_signing_secret.clone(),
            slack_bot_token: self.slack_bot_token.clone(),
            openai_api_key: self.openai_api_key.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Opening subject store at {:?}...", config.subjects_db_path());
    let subjects = Arc::new(
        SqliteSubjectStore::new(config.subjects_db_path())
            .context("Failed to open subject store")?,
    );
    info!("Opening job ledger at {:?}...", config.jobs_db_path());
    let ledger = Arc::new(
        SqliteJobLedger::new(config.jobs_db_path()).context("Failed to open job ledger")?,
    );

    let slack = Arc::new(SlackClient::new(config.slack.clone()));
    let generator = Arc::new(OpenAiContentGenerator::new(config.openai.clone()));
    let catalog = Arc::new(GoogleBooksClient::new(config.catalog.clone()));

    let engine = Arc::new(ProgressionEngine::new(
        subjects.clone(),
        generator,
        slack.clone(),
        config.pages_split,
    ));

    let shutdown_token = CancellationToken::new();
    let (mut scheduler, scheduler_handle) = create_scheduler(
        subjects.clone(),
        ledger,
        engine,
        config.fire_time,
        config.drain_interval,
        shutdown_token.clone(),
    );

    let commands = Arc::new(CommandService::new(
        subjects,
        catalog,
        slack,
        scheduler_handle.clone(),
    ));
    let state = ServerState {
        config: ServerConfig {
            requests_logging_level: config.logging_level.clone(),
            port: config.port,
        },
        start_time: Instant::now(),
        commands,
        scheduler_handle,
        verifier: Arc::new(RequestVerifier::new(config.slack_signing_secret.clone())),
    };

    info!(
        "Delivering every day at {}, ready to serve at port {}!",
        config.fire_time, config.port
    );

    let scheduler_task = tokio::spawn(async move { scheduler.run().await });
    let server_token = shutdown_token.clone();
    let mut server_task = tokio::spawn(run_server(state, server_token));

    tokio::select! {
        result = &mut server_task => {
            match result {
                Ok(Ok(())) => info!("Server exited"),
                Ok(Err(e)) => error!("Server failed: {:#}", e),
                Err(e) => error!("Server task panicked: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    shutdown_token.cancel();
    if !server_task.is_finished() {
        if let Err(e) = server_task.await {
            error!("Server task panicked: {}", e);
        }
    }
    if let Err(e) = scheduler_task.await {
        error!("Scheduler task panicked: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}
