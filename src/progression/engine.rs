use super::guards;
use crate::error::{LearnerError, LearnerResult};
use crate::integrations::{ContentGenerator, DeliveryChannel};
use crate::subject::{ProgressMode, ReadingStatus, ReadingSubject, SubjectStore, TopicSubject};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_PAGES_SPLIT: u32 = 15;

/// What a single fire did to its subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressOutcome {
    /// A slice was delivered and the reading subject moved to `position`.
    Advanced { position: u32 },
    /// The final slice was delivered and the subject is now finished.
    Finished,
    TipDelivered,
}

pub struct ProgressionEngine {
    subjects: Arc<dyn SubjectStore>,
    generator: Arc<dyn ContentGenerator>,
    delivery: Arc<dyn DeliveryChannel>,
    pages_split: u32,
}

impl ProgressionEngine {
    pub fn new(
        subjects: Arc<dyn SubjectStore>,
        generator: Arc<dyn ContentGenerator>,
        delivery: Arc<dyn DeliveryChannel>,
        pages_split: u32,
    ) -> Self {
        Self {
            subjects,
            generator,
            delivery,
            pages_split: pages_split.max(1),
        }
    }

    /// Loads the current record for `isbn` and advances it. The record is always read
    /// fresh so that a fire never writes back a stale copy.
    pub async fn progress_reading_by_key(&self, isbn: &str) -> LearnerResult<ProgressOutcome> {
        let reading = self
            .subjects
            .find_reading_by_key(isbn)?
            .ok_or_else(|| LearnerError::NotFound(format!("reading subject {}", isbn)))?;
        self.progress_reading(reading).await
    }

    pub async fn deliver_tip_by_key(&self, name: &str) -> LearnerResult<ProgressOutcome> {
        let topic = self
            .subjects
            .find_topic_by_key(name)?
            .ok_or_else(|| LearnerError::NotFound(format!("topic {}", name)))?;
        self.deliver_tip(&topic).await
    }

    pub async fn progress_reading(
        &self,
        mut reading: ReadingSubject,
    ) -> LearnerResult<ProgressOutcome> {
        if reading.is_finished() {
            return Err(LearnerError::AlreadyCompleted(reading.title));
        }

        let finished = match reading.mode {
            ProgressMode::ByChapter => self.deliver_next_chapter(&mut reading).await?,
            ProgressMode::ByPage => self.deliver_next_pages(&mut reading).await?,
        };

        if finished {
            reading.status = ReadingStatus::Finished;
        }
        self.subjects.upsert_reading(&reading)?;

        if finished {
            info!("Finished {} ({})", reading.title, reading.isbn);
            let notice = format!(
                "This was the final summary for {} - Thank you for using the bot!",
                reading.title
            );
            self.delivery.deliver(&reading.channel_id, &notice).await?;
            return Ok(ProgressOutcome::Finished);
        }

        Ok(ProgressOutcome::Advanced {
            position: reading.current_position,
        })
    }

    /// Returns whether the delivered chapter was the last one.
    async fn deliver_next_chapter(&self, reading: &mut ReadingSubject) -> LearnerResult<bool> {
        let chapter = reading.current_position;
        guards::check_chapter(&reading.title, chapter)?;
        if chapter >= reading.total_extent {
            return Err(LearnerError::invalid(format!(
                "chapter {} is past the last chapter of {}",
                chapter, reading.title
            )));
        }

        debug!("Summarizing chapter {} of {}", chapter, reading.title);
        let summary = self
            .generator
            .summarize_by_chapter(&reading.title, &reading.author, chapter)
            .await?;
        self.deliver_summary(reading, &summary).await?;

        reading.current_position += 1;
        Ok(reading.current_position == reading.total_extent)
    }

    async fn deliver_next_pages(&self, reading: &mut ReadingSubject) -> LearnerResult<bool> {
        let current = reading.current_position;
        let target = guards::page_target(current, reading.total_extent, self.pages_split);
        if target == 0 {
            warn!(
                "{} ({}) has {} pages, fewer than the page split of {}: it cannot advance",
                reading.title, reading.isbn, reading.total_extent, self.pages_split
            );
            return Err(LearnerError::invalid(format!(
                "{} has fewer pages than the page split of {}",
                reading.title, self.pages_split
            )));
        }
        guards::check_page_range(&reading.title, target, current)?;

        debug!(
            "Summarizing pages {}..={} of {}",
            current + 1,
            target,
            reading.title
        );
        let summary = self
            .generator
            .summarize_by_page(&reading.title, &reading.author, target, current)
            .await?;
        self.deliver_summary(reading, &summary).await?;

        reading.current_position = target;
        Ok(guards::is_last_page_chunk(target, reading.total_extent))
    }

    async fn deliver_summary(&self, reading: &ReadingSubject, summary: &str) -> LearnerResult<()> {
        if summary.trim().is_empty() {
            return Err(LearnerError::SummaryUnavailable(reading.title.clone()));
        }
        self.delivery.deliver(&reading.channel_id, summary).await
    }

    /// Topics carry no progress, so nothing is written back.
    pub async fn deliver_tip(&self, topic: &TopicSubject) -> LearnerResult<ProgressOutcome> {
        guards::check_topic(&topic.name)?;
        let tip = self.generator.tip_for(&topic.name).await?;
        if tip.trim().is_empty() {
            return Err(LearnerError::SummaryUnavailable(topic.name.clone()));
        }
        self.delivery.deliver(&topic.channel_id, &tip).await?;
        Ok(ProgressOutcome::TipDelivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subject::SqliteSubjectStore;
    use crate::test_support::{FakeGenerator, GenerationCall, RecordingDelivery};
    use tempfile::TempDir;

    struct Fixture {
        engine: ProgressionEngine,
        store: Arc<SqliteSubjectStore>,
        generator: Arc<FakeGenerator>,
        delivery: Arc<RecordingDelivery>,
        _dir: TempDir,
    }

    fn fixture_with(generator: FakeGenerator) -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteSubjectStore::new(dir.path().join("subjects.db")).unwrap());
        let generator = Arc::new(generator);
        let delivery = Arc::new(RecordingDelivery::default());
        let engine = ProgressionEngine::new(
            store.clone(),
            generator.clone(),
            delivery.clone(),
            DEFAULT_PAGES_SPLIT,
        );
        Fixture {
            engine,
            store,
            generator,
            delivery,
            _dir: dir,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(FakeGenerator::new())
    }

    fn book(mode: ProgressMode, total: u32, position: u32) -> ReadingSubject {
        ReadingSubject {
            isbn: "9780441013593".to_string(),
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            total_extent: total,
            mode,
            current_position: position,
            status: ReadingStatus::Ongoing,
            channel_id: "C-dune".to_string(),
        }
    }

    #[tokio::test]
    async fn test_by_page_first_fire_on_short_book() {
        let f = fixture();
        f.store.upsert_reading(&book(ProgressMode::ByPage, 20, 0)).unwrap();

        let outcome = f.engine.progress_reading_by_key("9780441013593").await.unwrap();

        assert_eq!(outcome, ProgressOutcome::Advanced { position: 1 });
        assert_eq!(
            f.generator.calls(),
            vec![GenerationCall::Pages {
                title: "Dune".to_string(),
                target: 1,
                current: 0
            }]
        );
        let stored = f.store.find_reading_by_key("9780441013593").unwrap().unwrap();
        assert_eq!(stored.current_position, 1);
        assert_eq!(stored.status, ReadingStatus::Ongoing);
        assert_eq!(f.delivery.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_by_chapter_last_chapter_finishes_with_notice() {
        let f = fixture();
        f.store.upsert_reading(&book(ProgressMode::ByChapter, 3, 2)).unwrap();

        let outcome = f.engine.progress_reading_by_key("9780441013593").await.unwrap();

        assert_eq!(outcome, ProgressOutcome::Finished);
        assert_eq!(
            f.generator.calls(),
            vec![GenerationCall::Chapter {
                title: "Dune".to_string(),
                chapter: 2
            }]
        );
        let stored = f.store.find_reading_by_key("9780441013593").unwrap().unwrap();
        assert_eq!(stored.current_position, 3);
        assert_eq!(stored.status, ReadingStatus::Finished);

        let sent = f.delivery.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], ("C-dune".to_string(), "a fine summary".to_string()));
        assert_eq!(
            sent[1].1,
            "This was the final summary for Dune - Thank you for using the bot!"
        );
    }

    #[tokio::test]
    async fn test_by_chapter_increments_until_finished() {
        let f = fixture();
        f.store.upsert_reading(&book(ProgressMode::ByChapter, 4, 0)).unwrap();

        let mut positions = Vec::new();
        loop {
            match f.engine.progress_reading_by_key("9780441013593").await.unwrap() {
                ProgressOutcome::Advanced { position } => positions.push(position),
                ProgressOutcome::Finished => break,
                other => panic!("unexpected outcome {:?}", other),
            }
        }
        assert_eq!(positions, vec![1, 2, 3]);

        let before = f.store.find_reading_by_key("9780441013593").unwrap().unwrap();
        let err = f
            .engine
            .progress_reading_by_key("9780441013593")
            .await
            .unwrap_err();
        assert!(matches!(err, LearnerError::AlreadyCompleted(_)));
        assert_eq!(
            f.store.find_reading_by_key("9780441013593").unwrap().unwrap(),
            before
        );
    }

    #[tokio::test]
    async fn test_by_page_finishes_within_one_page_of_the_end() {
        let f = fixture();
        // 299 pages / 15 = 19 per step; 280 + 19 = 299 lands on the last page.
        f.store
            .upsert_reading(&book(ProgressMode::ByPage, 299, 280))
            .unwrap();

        let outcome = f.engine.progress_reading_by_key("9780441013593").await.unwrap();

        assert_eq!(outcome, ProgressOutcome::Finished);
        let stored = f.store.find_reading_by_key("9780441013593").unwrap().unwrap();
        assert_eq!(stored.current_position, 299);
        assert!(stored.is_finished());
    }

    #[tokio::test]
    async fn test_by_page_one_short_of_the_end_also_finishes() {
        let f = fixture();
        f.store
            .upsert_reading(&book(ProgressMode::ByPage, 301, 280))
            .unwrap();

        // step is 20, target 300 is one page short of 301.
        let outcome = f.engine.progress_reading_by_key("9780441013593").await.unwrap();

        assert_eq!(outcome, ProgressOutcome::Finished);
        assert_eq!(
            f.store
                .find_reading_by_key("9780441013593")
                .unwrap()
                .unwrap()
                .current_position,
            300
        );
    }

    #[tokio::test]
    async fn test_empty_summary_is_unavailable_and_nothing_changes() {
        let f = fixture_with(FakeGenerator::replying("   "));
        f.store.upsert_reading(&book(ProgressMode::ByChapter, 5, 1)).unwrap();

        let err = f
            .engine
            .progress_reading_by_key("9780441013593")
            .await
            .unwrap_err();

        assert!(matches!(err, LearnerError::SummaryUnavailable(_)));
        assert!(f.delivery.sent().is_empty());
        assert_eq!(
            f.store
                .find_reading_by_key("9780441013593")
                .unwrap()
                .unwrap()
                .current_position,
            1
        );
    }

    #[tokio::test]
    async fn test_failed_delivery_does_not_advance() {
        let f = fixture();
        f.delivery.set_failing(true);
        f.store.upsert_reading(&book(ProgressMode::ByPage, 300, 0)).unwrap();

        let err = f
            .engine
            .progress_reading_by_key("9780441013593")
            .await
            .unwrap_err();

        assert!(matches!(err, LearnerError::DeliveryFailed(_)));
        assert_eq!(
            f.store
                .find_reading_by_key("9780441013593")
                .unwrap()
                .unwrap()
                .current_position,
            0
        );
    }

    #[tokio::test]
    async fn test_page_split_larger_than_book_fails_before_generation() {
        let f = fixture();
        f.store.upsert_reading(&book(ProgressMode::ByPage, 10, 0)).unwrap();

        let err = f
            .engine
            .progress_reading_by_key("9780441013593")
            .await
            .unwrap_err();

        match &err {
            LearnerError::InvalidArgument(msg) => {
                assert!(msg.contains("fewer pages than the page split of 15"), "{}", msg)
            }
            other => panic!("unexpected error {}", other),
        }
        assert!(f.generator.calls().is_empty());
        let stored = f.store.find_reading_by_key("9780441013593").unwrap().unwrap();
        assert_eq!(stored.current_position, 0);
    }

    #[tokio::test]
    async fn test_missing_subject_is_not_found() {
        let f = fixture();
        let err = f.engine.progress_reading_by_key("123").await.unwrap_err();
        assert!(matches!(err, LearnerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_tip_is_delivered_and_not_persisted() {
        let f = fixture();
        let topic = TopicSubject {
            name: "Rust".to_string(),
            channel_id: "C-rust".to_string(),
        };
        f.store.upsert_topic(&topic).unwrap();

        let outcome = f.engine.deliver_tip_by_key("Rust").await.unwrap();

        assert_eq!(outcome, ProgressOutcome::TipDelivered);
        assert_eq!(
            f.delivery.sent(),
            vec![("C-rust".to_string(), "a fine summary".to_string())]
        );
        assert_eq!(f.store.list_topics().unwrap(), vec![topic]);
    }

    #[tokio::test]
    async fn test_empty_tip_is_unavailable() {
        let f = fixture_with(FakeGenerator::replying(""));
        let topic = TopicSubject {
            name: "Rust".to_string(),
            channel_id: "C-rust".to_string(),
        };

        let err = f.engine.deliver_tip(&topic).await.unwrap_err();

        assert!(matches!(err, LearnerError::SummaryUnavailable(_)));
        assert!(f.delivery.sent().is_empty());
    }
}
