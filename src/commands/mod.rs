//! Chat commands: subscribing to books and topics, listing and running the schedule.

use crate::background_jobs::SchedulerHandle;
use crate::error::{LearnerError, LearnerResult};
use crate::integrations::{CatalogLookup, ChannelDirectory};
use crate::subject::{ReadingSubject, SubjectStore, TopicSubject};
use std::sync::Arc;
use tracing::info;

/// Returns the digits of `text` when it reads as an ISBN-10 or ISBN-13.
pub fn normalize_isbn(text: &str) -> Option<String> {
    let compact: String = text
        .trim()
        .chars()
        .filter(|c| *c != '-' && *c != ' ')
        .collect();
    let mut chars = compact.chars();
    let last = chars.next_back()?;
    let digits_ok = chars.as_str().chars().all(|c| c.is_ascii_digit());
    let last_ok = match compact.len() {
        10 => last.is_ascii_digit() || last == 'X' || last == 'x',
        13 => last.is_ascii_digit(),
        _ => false,
    };
    (digits_ok && last_ok).then(|| compact.to_uppercase())
}

pub struct CommandService {
    subjects: Arc<dyn SubjectStore>,
    catalog: Arc<dyn CatalogLookup>,
    channels: Arc<dyn ChannelDirectory>,
    scheduler: SchedulerHandle,
}

impl CommandService {
    pub fn new(
        subjects: Arc<dyn SubjectStore>,
        catalog: Arc<dyn CatalogLookup>,
        channels: Arc<dyn ChannelDirectory>,
        scheduler: SchedulerHandle,
    ) -> Self {
        Self {
            subjects,
            catalog,
            channels,
            scheduler,
        }
    }

    /// Finds or creates the reading subject for `text` (an ISBN or a title) and
    /// schedules its daily summary.
    pub async fn subscribe_book(&self, text: &str) -> LearnerResult<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(LearnerError::invalid("You need to specify the book name"));
        }

        let isbn = match normalize_isbn(text) {
            Some(isbn) => isbn,
            None => self.catalog.resolve_isbn_by_title(text).await?,
        };

        let reading = match self.existing_reading(&isbn)? {
            Some(reading) => reading,
            None => self.create_reading(&isbn).await?,
        };

        self.scheduler.register(&reading.clone().into()).await?;
        Ok(format!(
            "{} will be summarized for you every day at {} on channel <#{}>",
            reading.title,
            self.scheduler.fire_time(),
            reading.channel_id
        ))
    }

    fn existing_reading(&self, isbn: &str) -> LearnerResult<Option<ReadingSubject>> {
        match self.subjects.find_reading_by_key(isbn)? {
            Some(reading) if reading.is_finished() => {
                Err(LearnerError::AlreadyCompleted(reading.title))
            }
            other => Ok(other),
        }
    }

    async fn create_reading(&self, isbn: &str) -> LearnerResult<ReadingSubject> {
        let record = self.catalog.resolve_by_isbn(isbn).await?;
        // The catalog may answer with the ISBN-13 of an ISBN-10 query.
        if record.isbn != isbn {
            if let Some(reading) = self.existing_reading(&record.isbn)? {
                return Ok(reading);
            }
        }

        let channel_id = self.channels.resolve_or_create_channel(&record.title).await?;
        let reading = record.into_reading_subject(channel_id);
        self.subjects.upsert_reading(&reading)?;
        info!("Created reading subject {} ({})", reading.title, reading.isbn);
        Ok(reading)
    }

    pub async fn subscribe_topic(&self, name: &str) -> LearnerResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LearnerError::invalid(
                "You need to specify the technology name",
            ));
        }

        let topic = match self.subjects.find_topic_by_key(name)? {
            Some(topic) => topic,
            None => {
                let channel_id = self.channels.resolve_or_create_channel(name).await?;
                let topic = TopicSubject {
                    name: name.to_string(),
                    channel_id,
                };
                self.subjects.upsert_topic(&topic)?;
                info!("Created topic subject {}", topic.name);
                topic
            }
        };

        self.scheduler.register(&topic.clone().into()).await?;
        Ok(format!(
            "We will give you tips and tricks about {} every day on channel <#{}>",
            topic.name, topic.channel_id
        ))
    }

    /// Channels of every stored subject, then the schedule in registration order.
    pub async fn overview(&self) -> LearnerResult<String> {
        let mut channels: Vec<String> = self
            .subjects
            .list_reading()?
            .iter()
            .map(|reading| format!("<#{}>", reading.channel_id))
            .collect();
        channels.extend(
            self.subjects
                .list_topics()?
                .iter()
                .map(|topic| format!("<#{}>", topic.channel_id)),
        );

        let schedule: Vec<String> = self
            .scheduler
            .enumerate()
            .await
            .into_iter()
            .map(|(next_run, name)| {
                format!(
                    "Next run: {}, Title: {}",
                    next_run.format("%Y-%m-%d %H:%M:%S"),
                    name
                )
            })
            .collect();

        Ok(format!(
            "Channels I created:\n{}\nCurrent schedule:\n{}",
            channels.join("\n"),
            schedule.join("\n")
        ))
    }

    pub async fn run_all(&self) -> LearnerResult<String> {
        let queued = self.scheduler.run_all().await?;
        Ok(format!("Running {} scheduled deliveries now", queued))
    }

    pub async fn reset(&self) -> LearnerResult<String> {
        self.scheduler.reset().await?;
        Ok("Successful reset!".to_string())
    }
}
