//! In-memory collaborators standing in for the chat platform, the content
//! generator and the book catalog.

use super::constants::*;
use async_trait::async_trait;
use daily_learner::integrations::{
    sanitize_channel_name, CatalogLookup, CatalogRecord, ChannelDirectory, ContentGenerator,
    DeliveryChannel,
};
use daily_learner::subject::ProgressMode;
use daily_learner::{LearnerError, LearnerResult};
use std::sync::Mutex;

/// Replies with a text naming what was asked for.
#[derive(Default)]
pub struct EchoGenerator;

#[async_trait]
impl ContentGenerator for EchoGenerator {
    async fn summarize_by_chapter(
        &self,
        title: &str,
        _author: &str,
        chapter: u32,
    ) -> LearnerResult<String> {
        Ok(format!("Summary of {} chapter {}", title, chapter))
    }

    async fn summarize_by_page(
        &self,
        title: &str,
        _author: &str,
        target_page: u32,
        current_page: u32,
    ) -> LearnerResult<String> {
        Ok(format!(
            "Summary of {} pages {}-{}",
            title, current_page, target_page
        ))
    }

    async fn tip_for(&self, topic: &str) -> LearnerResult<String> {
        Ok(format!("Tip about {}", topic))
    }
}

/// Records every delivered message as `(channel_id, text)`.
#[derive(Default)]
pub struct RecordingDelivery {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingDelivery {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, channel_id: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(channel, _)| channel == channel_id)
            .map(|(_, text)| text)
            .collect()
    }
}

#[async_trait]
impl DeliveryChannel for RecordingDelivery {
    async fn deliver(&self, channel_id: &str, text: &str) -> LearnerResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((channel_id.to_string(), text.to_string()));
        Ok(())
    }
}

/// Channel ids are `C-<sanitized name>`.
#[derive(Default)]
pub struct StaticDirectory;

#[async_trait]
impl ChannelDirectory for StaticDirectory {
    async fn resolve_or_create_channel(&self, name: &str) -> LearnerResult<String> {
        Ok(format!("C-{}", sanitize_channel_name(name)))
    }
}

pub fn channel_for(name: &str) -> String {
    format!("C-{}", sanitize_channel_name(name))
}

/// Knows the two test books.
pub struct TestCatalog {
    books: Vec<CatalogRecord>,
}

impl Default for TestCatalog {
    fn default() -> Self {
        Self {
            books: vec![
                CatalogRecord {
                    isbn: PAGED_BOOK_ISBN.to_string(),
                    title: PAGED_BOOK_TITLE.to_string(),
                    author: PAGED_BOOK_AUTHOR.to_string(),
                    total_extent: PAGED_BOOK_PAGES,
                    mode: ProgressMode::ByPage,
                },
                CatalogRecord {
                    isbn: CHAPTER_BOOK_ISBN.to_string(),
                    title: CHAPTER_BOOK_TITLE.to_string(),
                    author: CHAPTER_BOOK_AUTHOR.to_string(),
                    total_extent: CHAPTER_BOOK_CHAPTERS,
                    mode: ProgressMode::ByChapter,
                },
            ],
        }
    }
}

#[async_trait]
impl CatalogLookup for TestCatalog {
    async fn resolve_by_isbn(&self, isbn: &str) -> LearnerResult<CatalogRecord> {
        self.books
            .iter()
            .find(|book| book.isbn == isbn)
            .cloned()
            .ok_or_else(|| LearnerError::NotFound(format!("no book with isbn {}", isbn)))
    }

    async fn resolve_isbn_by_title(&self, title: &str) -> LearnerResult<String> {
        self.books
            .iter()
            .find(|book| book.title.eq_ignore_ascii_case(title))
            .map(|book| book.isbn.clone())
            .ok_or_else(|| LearnerError::NotFound(format!("no book titled {}", title)))
    }
}
