mod file_config;

pub use file_config::{
    CatalogFileConfig, FileConfig, OpenAiFileConfig, ScheduleConfig, SlackFileConfig,
};

use crate::background_jobs::DailyFireTime;
use crate::integrations::{GoogleBooksConfig, OpenAiConfig, SlackConfig, DEFAULT_SLACK_API_URL};
use crate::progression::DEFAULT_PAGES_SPLIT;
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DRAIN_INTERVAL_SECS: u64 = 60;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub fire_time: Option<String>,
    pub pages_split: u32,
    pub drain_interval_secs: u64,
    pub slack_signing_secret: Option<String>,
    pub slack_bot_token: Option<String>,
    pub openai_api_key: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db_dir: None,
            port: DEFAULT_PORT,
            logging_level: RequestsLoggingLevel::default(),
            fire_time: None,
            pages_split: DEFAULT_PAGES_SPLIT,
            drain_interval_secs: DEFAULT_DRAIN_INTERVAL_SECS,
            slack_signing_secret: None,
            slack_bot_token: None,
            openai_api_key: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,

    pub fire_time: DailyFireTime,
    pub pages_split: u32,
    pub drain_interval: Duration,

    pub slack_signing_secret: String,
    pub slack: SlackConfig,
    pub openai: OpenAiConfig,
    pub catalog: GoogleBooksConfig,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        // [schedule]
        let schedule = file.schedule.unwrap_or_default();
        let fire_time = match schedule.fire_time.or_else(|| cli.fire_time.clone()) {
            Some(raw) => DailyFireTime::parse(&raw)
                .with_context(|| format!("Invalid fire time {:?}", raw))?,
            None => DailyFireTime::default(),
        };
        let pages_split = schedule.pages_split.unwrap_or(cli.pages_split);
        if pages_split == 0 {
            bail!("pages_split must be at least 1");
        }
        let drain_interval_secs = schedule
            .drain_interval_secs
            .unwrap_or(cli.drain_interval_secs);
        if drain_interval_secs == 0 {
            bail!("drain_interval_secs must be at least 1");
        }

        // [slack]
        let slack_file = file.slack.unwrap_or_default();
        let slack_signing_secret = slack_file
            .signing_secret
            .or_else(|| cli.slack_signing_secret.clone())
            .unwrap_or_default();
        if slack_signing_secret.trim().is_empty() {
            bail!("A Slack signing secret must be specified via SLACK_SIGNING_SECRET or [slack]");
        }
        let bot_token = slack_file
            .bot_token
            .or_else(|| cli.slack_bot_token.clone())
            .unwrap_or_default();
        if bot_token.is_empty() {
            warn!("No Slack bot token configured, deliveries and channel creation will fail");
        }
        let slack = SlackConfig {
            api_url: slack_file
                .api_url
                .unwrap_or_else(|| DEFAULT_SLACK_API_URL.to_string()),
            bot_token,
            timeout: Duration::from_secs(slack_file.timeout_secs.unwrap_or(30)),
        };

        // [openai]
        let openai_file = file.openai.unwrap_or_default();
        let openai_defaults = OpenAiConfig::default();
        let openai = OpenAiConfig {
            base_url: openai_file.base_url.unwrap_or(openai_defaults.base_url),
            model: openai_file.model.unwrap_or(openai_defaults.model),
            api_key: openai_file
                .api_key
                .or_else(|| cli.openai_api_key.clone()),
            timeout: openai_file
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(openai_defaults.timeout),
        };

        // [catalog]
        let catalog_file = file.catalog.unwrap_or_default();
        let catalog_defaults = GoogleBooksConfig::default();
        let catalog = GoogleBooksConfig {
            api_url: catalog_file.api_url.unwrap_or(catalog_defaults.api_url),
            api_key: catalog_file.api_key,
            timeout: catalog_file
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(catalog_defaults.timeout),
        };

        Ok(Self {
            db_dir,
            port,
            logging_level,
            fire_time,
            pages_split,
            drain_interval: Duration::from_secs(drain_interval_secs),
            slack_signing_secret,
            slack,
            openai,
            catalog,
        })
    }

    pub fn subjects_db_path(&self) -> PathBuf {
        self.db_dir.join("subjects.db")
    }

    pub fn jobs_db_path(&self) -> PathBuf {
        self.db_dir.join("jobs.db")
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
