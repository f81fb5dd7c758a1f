//! Narrow interfaces to the outside world, plus their HTTP-backed implementations.

mod google_books;
mod openai;
mod slack;

pub use google_books::{GoogleBooksClient, GoogleBooksConfig};
pub use openai::{OpenAiConfig, OpenAiContentGenerator};
pub use slack::{
    sanitize_channel_name, to_slack_markdown, SlackClient, SlackConfig, DEFAULT_SLACK_API_URL,
};

use crate::error::LearnerResult;
use crate::subject::{ProgressMode, ReadingStatus, ReadingSubject};
use async_trait::async_trait;

/// Produces the text that gets delivered. An empty string means nothing usable came back.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn summarize_by_chapter(
        &self,
        title: &str,
        author: &str,
        chapter: u32,
    ) -> LearnerResult<String>;

    /// Summary of the pages in `(current_page, target_page]`.
    async fn summarize_by_page(
        &self,
        title: &str,
        author: &str,
        target_page: u32,
        current_page: u32,
    ) -> LearnerResult<String>;

    async fn tip_for(&self, topic: &str) -> LearnerResult<String>;
}

#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn deliver(&self, channel_id: &str, text: &str) -> LearnerResult<()>;
}

#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    /// Returns the id of the channel named after `name`, creating it when missing.
    async fn resolve_or_create_channel(&self, name: &str) -> LearnerResult<String>;
}

/// What a bibliographic lookup knows about a book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRecord {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub total_extent: u32,
    pub mode: ProgressMode,
}

impl CatalogRecord {
    pub fn into_reading_subject(self, channel_id: String) -> ReadingSubject {
        ReadingSubject {
            isbn: self.isbn,
            title: self.title,
            author: self.author,
            total_extent: self.total_extent,
            mode: self.mode,
            current_position: 0,
            status: ReadingStatus::Ongoing,
            channel_id,
        }
    }
}

#[async_trait]
pub trait CatalogLookup: Send + Sync {
    async fn resolve_by_isbn(&self, isbn: &str) -> LearnerResult<CatalogRecord>;
    async fn resolve_isbn_by_title(&self, title: &str) -> LearnerResult<String>;
}
