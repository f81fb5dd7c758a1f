//! In-memory collaborators for unit tests.

use crate::error::{LearnerError, LearnerResult};
use crate::integrations::{
    CatalogLookup, CatalogRecord, ChannelDirectory, ContentGenerator, DeliveryChannel,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationCall {
    Chapter { title: String, chapter: u32 },
    Pages { title: String, target: u32, current: u32 },
    Tip { topic: String },
}

pub struct FakeGenerator {
    pub calls: Mutex<Vec<GenerationCall>>,
    reply: Mutex<String>,
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self::replying("a fine summary")
    }

    pub fn replying(reply: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            reply: Mutex::new(reply.to_string()),
        }
    }

    pub fn calls(&self) -> Vec<GenerationCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: GenerationCall) -> LearnerResult<String> {
        self.calls.lock().unwrap().push(call);
        Ok(self.reply.lock().unwrap().clone())
    }
}

#[async_trait]
impl ContentGenerator for FakeGenerator {
    async fn summarize_by_chapter(
        &self,
        title: &str,
        _author: &str,
        chapter: u32,
    ) -> LearnerResult<String> {
        self.record(GenerationCall::Chapter {
            title: title.to_string(),
            chapter,
        })
    }

    async fn summarize_by_page(
        &self,
        title: &str,
        _author: &str,
        target_page: u32,
        current_page: u32,
    ) -> LearnerResult<String> {
        self.record(GenerationCall::Pages {
            title: title.to_string(),
            target: target_page,
            current: current_page,
        })
    }

    async fn tip_for(&self, topic: &str) -> LearnerResult<String> {
        self.record(GenerationCall::Tip {
            topic: topic.to_string(),
        })
    }
}

#[derive(Default)]
pub struct RecordingDelivery {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: Mutex<bool>,
}

impl RecordingDelivery {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait]
impl DeliveryChannel for RecordingDelivery {
    async fn deliver(&self, channel_id: &str, text: &str) -> LearnerResult<()> {
        if *self.fail.lock().unwrap() {
            return Err(LearnerError::DeliveryFailed("channel_not_found".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel_id.to_string(), text.to_string()));
        Ok(())
    }
}

/// Never answers. `in_flight` counts the requests whose futures are still alive.
#[derive(Default)]
pub struct HangingGenerator {
    token: Arc<()>,
}

impl HangingGenerator {
    pub fn in_flight(&self) -> usize {
        Arc::strong_count(&self.token) - 1
    }

    async fn hang(&self) -> LearnerResult<String> {
        let _held = Arc::clone(&self.token);
        std::future::pending().await
    }
}

#[async_trait]
impl ContentGenerator for HangingGenerator {
    async fn summarize_by_chapter(&self, _: &str, _: &str, _: u32) -> LearnerResult<String> {
        self.hang().await
    }

    async fn summarize_by_page(&self, _: &str, _: &str, _: u32, _: u32) -> LearnerResult<String> {
        self.hang().await
    }

    async fn tip_for(&self, _: &str) -> LearnerResult<String> {
        self.hang().await
    }
}

/// Hands out `C-<name>` ids and remembers every name it was asked for.
#[derive(Default)]
pub struct FakeDirectory {
    pub requested: Mutex<Vec<String>>,
}

#[async_trait]
impl ChannelDirectory for FakeDirectory {
    async fn resolve_or_create_channel(&self, name: &str) -> LearnerResult<String> {
        self.requested.lock().unwrap().push(name.to_string());
        Ok(format!("C-{}", crate::integrations::sanitize_channel_name(name)))
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    pub books: Mutex<HashMap<String, CatalogRecord>>,
    pub isbn_lookups: Mutex<usize>,
}

impl FakeCatalog {
    pub fn with_book(record: CatalogRecord) -> Self {
        let catalog = Self::default();
        catalog
            .books
            .lock()
            .unwrap()
            .insert(record.isbn.clone(), record);
        catalog
    }

    pub fn isbn_lookups(&self) -> usize {
        *self.isbn_lookups.lock().unwrap()
    }
}

#[async_trait]
impl CatalogLookup for FakeCatalog {
    async fn resolve_by_isbn(&self, isbn: &str) -> LearnerResult<CatalogRecord> {
        *self.isbn_lookups.lock().unwrap() += 1;
        self.books
            .lock()
            .unwrap()
            .get(isbn)
            .cloned()
            .ok_or_else(|| LearnerError::NotFound(format!("no book with isbn {}", isbn)))
    }

    async fn resolve_isbn_by_title(&self, title: &str) -> LearnerResult<String> {
        let books = self.books.lock().unwrap();
        let matches: Vec<_> = books
            .values()
            .filter(|record| record.title.eq_ignore_ascii_case(title))
            .collect();
        match matches.as_slice() {
            [] => Err(LearnerError::NotFound(format!("no book titled {}", title))),
            [record] => Ok(record.isbn.clone()),
            _ => Err(LearnerError::Ambiguous(format!(
                "more than one book titled {}",
                title
            ))),
        }
    }
}
