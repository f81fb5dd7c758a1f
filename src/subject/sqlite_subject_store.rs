use super::models::{ReadingSubject, SubjectKind, TopicSubject};
use super::schema::SUBJECT_VERSIONED_SCHEMAS;
use super::SubjectStore;
use crate::error::{LearnerError, LearnerResult};
use crate::sqlite_persistence::open_versioned;
use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

pub struct SqliteSubjectStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSubjectStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned(db_path, SUBJECT_VERSIONED_SCHEMAS, "subjects")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> LearnerResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| LearnerError::Storage(anyhow!("subject store connection poisoned")))
    }

    /// Writes the whole document in one statement. The row is left untouched when the
    /// stored document is already identical.
    fn upsert_document<T: Serialize>(
        &self,
        kind: SubjectKind,
        key: &str,
        record: &T,
    ) -> LearnerResult<()> {
        let document = serde_json::to_string(record)?;
        let now = chrono::Utc::now().timestamp();
        let changed = self.conn()?.execute(
            "INSERT INTO subjects (kind, natural_key, document, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(kind, natural_key) DO UPDATE
             SET document = excluded.document, updated_at = excluded.updated_at
             WHERE subjects.document != excluded.document",
            params![kind.as_str(), key, document, now],
        )?;
        debug!("Upserted {} subject {} ({} rows changed)", kind, key, changed);
        Ok(())
    }

    fn find_document<T: DeserializeOwned>(
        &self,
        kind: SubjectKind,
        key: &str,
    ) -> LearnerResult<Option<T>> {
        let document: Option<String> = self
            .conn()?
            .query_row(
                "SELECT document FROM subjects WHERE kind = ?1 AND natural_key = ?2",
                params![kind.as_str(), key],
                |row| row.get(0),
            )
            .optional()?;

        match document {
            Some(document) => Ok(Some(serde_json::from_str(&document)?)),
            None => Ok(None),
        }
    }

    fn list_documents<T: DeserializeOwned>(&self, kind: SubjectKind) -> LearnerResult<Vec<T>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT document FROM subjects WHERE kind = ?1 ORDER BY id")?;
        let documents = stmt
            .query_map(params![kind.as_str()], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        documents
            .iter()
            .map(|document| serde_json::from_str(document).map_err(LearnerError::from))
            .collect()
    }
}

impl SubjectStore for SqliteSubjectStore {
    fn upsert_reading(&self, record: &ReadingSubject) -> LearnerResult<()> {
        if record.isbn.trim().is_empty() {
            return Err(LearnerError::invalid("empty reading subject given"));
        }
        self.upsert_document(SubjectKind::Reading, &record.isbn, record)
    }

    fn find_reading_by_key(&self, isbn: &str) -> LearnerResult<Option<ReadingSubject>> {
        if isbn.trim().is_empty() {
            return Err(LearnerError::invalid("empty isbn given"));
        }
        self.find_document(SubjectKind::Reading, isbn)
    }

    fn list_reading(&self) -> LearnerResult<Vec<ReadingSubject>> {
        self.list_documents(SubjectKind::Reading)
    }

    fn upsert_topic(&self, record: &TopicSubject) -> LearnerResult<()> {
        if record.name.trim().is_empty() {
            return Err(LearnerError::invalid("empty topic subject given"));
        }
        self.upsert_document(SubjectKind::Topic, &record.name, record)
    }

    fn find_topic_by_key(&self, name: &str) -> LearnerResult<Option<TopicSubject>> {
        if name.trim().is_empty() {
            return Err(LearnerError::invalid("empty topic name given"));
        }
        self.find_document(SubjectKind::Topic, name)
    }

    fn list_topics(&self) -> LearnerResult<Vec<TopicSubject>> {
        self.list_documents(SubjectKind::Topic)
    }
}
