use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub port: Option<u16>,
    pub logging_level: Option<String>,

    pub schedule: Option<ScheduleConfig>,
    pub slack: Option<SlackFileConfig>,
    pub openai: Option<OpenAiFileConfig>,
    pub catalog: Option<CatalogFileConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Daily delivery time, `HH:MM` in server local time
    pub fire_time: Option<String>,
    pub pages_split: Option<u32>,
    pub drain_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SlackFileConfig {
    pub api_url: Option<String>,
    pub bot_token: Option<String>,
    pub signing_secret: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct OpenAiFileConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct CatalogFileConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
