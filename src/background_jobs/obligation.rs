use crate::error::{LearnerError, LearnerResult};
use crate::subject::{SubjectKind, SubjectRef};
use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};

/// Time of day at which an obligation fires, in server local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyFireTime(NaiveTime);

impl DailyFireTime {
    pub fn new(time: NaiveTime) -> Self {
        Self(time)
    }

    /// Parses `HH:MM`.
    pub fn parse(s: &str) -> LearnerResult<Self> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(Self)
            .map_err(|_| LearnerError::invalid(format!("'{}' is not a HH:MM time", s)))
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }

    /// First occurrence of this time of day strictly after `now`.
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
        let today = now.date_naive();
        for offset in 0..3 {
            let Some(date) = today.checked_add_days(Days::new(offset)) else {
                break;
            };
            // Skipped over by a DST gap on that date: try the next one.
            if let Some(candidate) = date
                .and_time(self.0)
                .and_local_timezone(now.timezone())
                .earliest()
            {
                if candidate > *now {
                    return candidate;
                }
            }
        }
        now.clone() + chrono::Duration::days(1)
    }
}

impl Default for DailyFireTime {
    fn default() -> Self {
        Self(NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN))
    }
}

impl std::fmt::Display for DailyFireTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

/// What to run when an obligation fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryAction {
    ReadingProgression,
    TopicTip,
}

impl DeliveryAction {
    pub fn for_kind(kind: SubjectKind) -> Self {
        match kind {
            SubjectKind::Reading => DeliveryAction::ReadingProgression,
            SubjectKind::Topic => DeliveryAction::TopicTip,
        }
    }
}

/// A subject bound to its daily delivery. Holds the subject's key only; the record
/// itself is loaded from the store each time the obligation fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Obligation {
    pub subject: SubjectRef,
    pub display_name: String,
    pub action: DeliveryAction,
    pub fire_time: DailyFireTime,
    pub next_run: DateTime<Local>,
}

impl Obligation {
    pub fn is_due(&self, now: &DateTime<Local>) -> bool {
        self.next_run <= *now
    }
}
