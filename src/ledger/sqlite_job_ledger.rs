use super::schema::LEDGER_VERSIONED_SCHEMAS;
use super::{JobLedger, LedgerEntry};
use crate::error::{LearnerError, LearnerResult};
use crate::sqlite_persistence::open_versioned;
use crate::subject::SubjectKind;
use anyhow::{anyhow, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

pub struct SqliteJobLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteJobLedger {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned(db_path, LEDGER_VERSIONED_SCHEMAS, "jobs")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> LearnerResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| LearnerError::Storage(anyhow!("job ledger connection poisoned")))
    }
}

impl JobLedger for SqliteJobLedger {
    fn load(&self) -> LearnerResult<Vec<LedgerEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT kind, natural_key FROM ledger_entries ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let entries = rows
            .into_iter()
            .filter_map(|(kind, key)| match SubjectKind::parse(&kind) {
                Some(kind) => Some(LedgerEntry::new(kind, key)),
                None => {
                    warn!("Skipping ledger entry {} with unknown kind '{}'", key, kind);
                    None
                }
            })
            .collect();
        Ok(entries)
    }

    fn save_snapshot(&self, entries: &[LedgerEntry]) -> LearnerResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM ledger_entries", [])?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO ledger_entries (kind, natural_key) VALUES (?1, ?2)")?;
            for entry in entries {
                stmt.execute(params![entry.kind.as_str(), entry.key])?;
            }
        }
        tx.commit()?;
        debug!("Saved ledger snapshot with {} entries", entries.len());
        Ok(())
    }

    fn clear(&self) -> LearnerResult<()> {
        let removed = self.conn()?.execute("DELETE FROM ledger_entries", [])?;
        debug!("Cleared {} ledger entries", removed);
        Ok(())
    }
}
