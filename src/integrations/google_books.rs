//! Book metadata lookups against the Google Books volumes API.

use super::{CatalogLookup, CatalogRecord};
use crate::error::{LearnerError, LearnerResult};
use crate::subject::ProgressMode;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_GOOGLE_BOOKS_URL: &str = "https://www.googleapis.com/books/v1/volumes";

#[derive(Debug, Clone)]
pub struct GoogleBooksConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for GoogleBooksConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_GOOGLE_BOOKS_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumesResponse {
    #[serde(default)]
    total_items: u32,
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    volume_info: VolumeInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    #[serde(default)]
    title: String,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default)]
    page_count: u32,
    #[serde(default)]
    chapter_count: u32,
    #[serde(default)]
    industry_identifiers: Vec<IndustryIdentifier>,
}

#[derive(Debug, Deserialize)]
struct IndustryIdentifier {
    #[serde(rename = "type")]
    id_type: String,
    identifier: String,
}

impl VolumeInfo {
    fn isbn_13(&self) -> Option<&str> {
        self.industry_identifiers
            .iter()
            .find(|id| id.id_type == "ISBN_13")
            .map(|id| id.identifier.as_str())
    }
}

fn record_from_isbn_search(isbn: &str, response: VolumesResponse) -> LearnerResult<CatalogRecord> {
    if response.total_items > 1 || response.items.len() > 1 {
        return Err(LearnerError::Ambiguous(format!(
            "{} books found for isbn {}",
            response.total_items.max(response.items.len() as u32),
            isbn
        )));
    }
    let info = response
        .items
        .into_iter()
        .next()
        .map(|volume| volume.volume_info)
        .ok_or_else(|| LearnerError::NotFound(format!("no book with isbn {}", isbn)))?;

    let (mode, total_extent) = if info.chapter_count > 0 {
        (ProgressMode::ByChapter, info.chapter_count)
    } else {
        (ProgressMode::ByPage, info.page_count)
    };
    if total_extent == 0 {
        return Err(LearnerError::NotFound(format!(
            "no page or chapter count known for {}",
            info.title
        )));
    }

    Ok(CatalogRecord {
        isbn: info.isbn_13().unwrap_or(isbn).to_string(),
        author: info
            .authors
            .first()
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string()),
        title: info.title,
        total_extent,
        mode,
    })
}

/// Exact title matches win over fuzzy ones; the candidates must agree on one ISBN-13.
fn isbn_from_title_search(title: &str, response: VolumesResponse) -> LearnerResult<String> {
    let exact: Vec<&VolumeInfo> = response
        .items
        .iter()
        .map(|volume| &volume.volume_info)
        .filter(|info| info.title.trim().eq_ignore_ascii_case(title.trim()))
        .collect();
    let candidates = if exact.is_empty() {
        response.items.iter().map(|v| &v.volume_info).collect()
    } else {
        exact
    };

    let isbns: BTreeSet<&str> = candidates.iter().filter_map(|info| info.isbn_13()).collect();
    let mut isbns = isbns.into_iter();
    match (isbns.next(), isbns.next()) {
        (None, _) => Err(LearnerError::NotFound(format!("no book titled {}", title))),
        (Some(isbn), None) => Ok(isbn.to_string()),
        (Some(_), Some(_)) => Err(LearnerError::Ambiguous(format!(
            "several books match {}, try its ISBN",
            title
        ))),
    }
}

pub struct GoogleBooksClient {
    client: Client,
    config: GoogleBooksConfig,
}

impl GoogleBooksClient {
    pub fn new(config: GoogleBooksConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    async fn search(&self, query: String) -> LearnerResult<VolumesResponse> {
        debug!("Searching volumes for {}", query);
        let mut params = vec![("q", query)];
        if let Some(key) = &self.config.api_key {
            params.push(("key", key.clone()));
        }

        let response = self
            .client
            .get(&self.config.api_url)
            .query(&params)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| LearnerError::External(format!("Book lookup failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LearnerError::External(format!(
                "Book lookup returned {}",
                status.as_u16()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| LearnerError::External(format!("Failed to parse book lookup: {}", e)))
    }
}

#[async_trait]
impl CatalogLookup for GoogleBooksClient {
    async fn resolve_by_isbn(&self, isbn: &str) -> LearnerResult<CatalogRecord> {
        if isbn.trim().is_empty() {
            return Err(LearnerError::invalid("empty isbn given"));
        }
        let response = self.search(format!("isbn:{}", isbn.trim())).await?;
        record_from_isbn_search(isbn.trim(), response)
    }

    async fn resolve_isbn_by_title(&self, title: &str) -> LearnerResult<String> {
        if title.trim().is_empty() {
            return Err(LearnerError::invalid("You need to specify the book name"));
        }
        let response = self.search(format!("intitle:{}", title.trim())).await?;
        isbn_from_title_search(title, response)
    }
}
