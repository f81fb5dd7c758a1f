//! Subject Store: the authoritative, keyed records of what is being delivered.

mod models;
mod schema;
mod sqlite_subject_store;

pub use models::*;
pub use schema::SUBJECT_VERSIONED_SCHEMAS;
pub use sqlite_subject_store::SqliteSubjectStore;

use crate::error::LearnerResult;

pub trait SubjectStore: Send + Sync {
    fn upsert_reading(&self, record: &ReadingSubject) -> LearnerResult<()>;
    fn find_reading_by_key(&self, isbn: &str) -> LearnerResult<Option<ReadingSubject>>;
    fn list_reading(&self) -> LearnerResult<Vec<ReadingSubject>>;

    fn upsert_topic(&self, record: &TopicSubject) -> LearnerResult<()>;
    fn find_topic_by_key(&self, name: &str) -> LearnerResult<Option<TopicSubject>>;
    fn list_topics(&self) -> LearnerResult<Vec<TopicSubject>>;

    /// Resolves a reference to the current stored record of its variant.
    fn find(&self, subject: &SubjectRef) -> LearnerResult<Option<Subject>> {
        Ok(match subject.kind {
            SubjectKind::Reading => self.find_reading_by_key(&subject.key)?.map(Subject::Reading),
            SubjectKind::Topic => self.find_topic_by_key(&subject.key)?.map(Subject::Topic),
        })
    }

    fn upsert(&self, subject: &Subject) -> LearnerResult<()> {
        match subject {
            Subject::Reading(reading) => self.upsert_reading(reading),
            Subject::Topic(topic) => self.upsert_topic(topic),
        }
    }
}
