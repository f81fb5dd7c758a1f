use serde::{Deserialize, Serialize};

/// Discriminant of the two subject variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Reading,
    Topic,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::Reading => "reading",
            SubjectKind::Topic => "topic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reading" => Some(SubjectKind::Reading),
            "topic" => Some(SubjectKind::Topic),
            _ => None,
        }
    }
}

impl std::fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a subject: its variant plus its natural key (ISBN or topic name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectRef {
    pub kind: SubjectKind,
    pub key: String,
}

impl SubjectRef {
    pub fn new(kind: SubjectKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }
}

impl std::fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressMode {
    ByPage,
    ByChapter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingStatus {
    Ongoing,
    Finished,
}

/// A book being summarized a slice at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingSubject {
    pub isbn: String,
    pub title: String,
    pub author: String,
    /// Page count for `ByPage`, chapter count for `ByChapter`.
    pub total_extent: u32,
    pub mode: ProgressMode,
    /// Last delivered page, or the next chapter to deliver.
    pub current_position: u32,
    pub status: ReadingStatus,
    pub channel_id: String,
}

impl ReadingSubject {
    pub fn is_finished(&self) -> bool {
        self.status == ReadingStatus::Finished
    }

    pub fn reference(&self) -> SubjectRef {
        SubjectRef::new(SubjectKind::Reading, &self.isbn)
    }
}

/// A technology for which a tip is delivered every day. Carries no progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSubject {
    pub name: String,
    pub channel_id: String,
}

impl TopicSubject {
    pub fn reference(&self) -> SubjectRef {
        SubjectRef::new(SubjectKind::Topic, &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Subject {
    Reading(ReadingSubject),
    Topic(TopicSubject),
}

impl Subject {
    pub fn kind(&self) -> SubjectKind {
        match self {
            Subject::Reading(_) => SubjectKind::Reading,
            Subject::Topic(_) => SubjectKind::Topic,
        }
    }

    pub fn natural_key(&self) -> &str {
        match self {
            Subject::Reading(reading) => &reading.isbn,
            Subject::Topic(topic) => &topic.name,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Subject::Reading(reading) => &reading.title,
            Subject::Topic(topic) => &topic.name,
        }
    }

    pub fn channel_id(&self) -> &str {
        match self {
            Subject::Reading(reading) => &reading.channel_id,
            Subject::Topic(topic) => &topic.channel_id,
        }
    }

    pub fn reference(&self) -> SubjectRef {
        SubjectRef::new(self.kind(), self.natural_key())
    }
}

impl From<ReadingSubject> for Subject {
    fn from(reading: ReadingSubject) -> Self {
        Subject::Reading(reading)
    }
}

impl From<TopicSubject> for Subject {
    fn from(topic: TopicSubject) -> Self {
        Subject::Topic(topic)
    }
}
