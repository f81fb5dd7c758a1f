use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::info;

/// Offset added to schema versions before they are written to `PRAGMA user_version`,
/// so a database created by some other tool is never mistaken for one of ours.
pub const BASE_DB_VERSION: usize = 77_000;

pub const DEFAULT_TIMESTAMP: &str = "(cast(strftime('%s','now') as int))";

#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            #[allow(unused_mut)]
            let mut column = $crate::sqlite_persistence::Column {
                name: $name,
                sql_type: $sql_type,
                is_primary_key: false,
                non_null: false,
                default_value: None,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
}

impl SqlType {
    fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
        }
    }

    fn parse(s: &str) -> Option<&'static SqlType> {
        match s {
            "TEXT" => Some(&SqlType::Text),
            "INTEGER" => Some(&SqlType::Integer),
            _ => None,
        }
    }
}

pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static SqlType,
    pub is_primary_key: bool,
    pub non_null: bool,
    pub default_value: Option<&'static str>,
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub indices: &'static [(&'static str, &'static str)],
    pub unique_constraints: &'static [&'static [&'static str]],
}

impl Table {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        let columns = self
            .columns
            .iter()
            .map(|column| {
                let mut sql = format!("{} {}", column.name, column.sql_type.as_sql());
                if column.is_primary_key {
                    sql.push_str(" PRIMARY KEY");
                }
                if column.non_null {
                    sql.push_str(" NOT NULL");
                }
                if let Some(default_value) = column.default_value {
                    sql.push_str(&format!(" DEFAULT {}", default_value));
                }
                sql
            })
            .chain(
                self.unique_constraints
                    .iter()
                    .map(|cols| format!("UNIQUE ({})", cols.join(", "))),
            )
            .collect::<Vec<_>>()
            .join(", ");

        conn.execute(&format!("CREATE TABLE {} ({});", self.name, columns), params![])?;

        for (index_name, index_columns) in self.indices {
            conn.execute(
                &format!(
                    "CREATE INDEX {} ON {}({});",
                    index_name, self.name, index_columns
                ),
                params![],
            )?;
        }
        Ok(())
    }

    fn validate(&self, conn: &Connection) -> Result<()> {
        struct ActualColumn {
            name: String,
            sql_type: String,
            non_null: bool,
            is_primary_key: bool,
        }

        let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", self.name))?;
        let actual: Vec<ActualColumn> = stmt
            .query_map(params![], |row| {
                Ok(ActualColumn {
                    name: row.get(1)?,
                    sql_type: row.get(2)?,
                    non_null: row.get::<_, i32>(3)? == 1,
                    is_primary_key: row.get::<_, i32>(5)? == 1,
                })
            })?
            .collect::<rusqlite::Result<_>>()?;

        if actual.len() != self.columns.len() {
            bail!(
                "Table {} has {} columns, expected {}",
                self.name,
                actual.len(),
                self.columns.len()
            );
        }

        for (actual, expected) in actual.iter().zip(self.columns.iter()) {
            if actual.name != expected.name {
                bail!(
                    "Table {} column name mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    actual.name
                );
            }
            if SqlType::parse(&actual.sql_type) != Some(expected.sql_type) {
                bail!(
                    "Table {} column {} type mismatch: expected {:?}, got {}",
                    self.name,
                    expected.name,
                    expected.sql_type,
                    actual.sql_type
                );
            }
            // SQLite reports INTEGER PRIMARY KEY columns as nullable
            if actual.non_null != expected.non_null && !expected.is_primary_key {
                bail!(
                    "Table {} column {} non-null mismatch",
                    self.name,
                    expected.name
                );
            }
            if actual.is_primary_key != expected.is_primary_key {
                bail!(
                    "Table {} column {} primary key mismatch",
                    self.name,
                    expected.name
                );
            }
        }

        for (index_name, _) in self.indices {
            let exists = conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type='index' AND name=?1 AND tbl_name=?2",
                    params![index_name, self.name],
                    |_| Ok(true),
                )
                .unwrap_or(false);
            if !exists {
                bail!("Table {} is missing index '{}'", self.name, index_name);
            }
        }

        Ok(())
    }
}

pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
    pub migration: Option<fn(&Connection) -> Result<()>>,
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.create(conn)?;
        }
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + self.version),
            [],
        )?;
        Ok(())
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.validate(conn)?;
        }
        Ok(())
    }
}

/// Opens (or creates) a database file whose layout is described by `schemas`.
///
/// A new file gets the latest schema. An existing file is validated against the
/// schema matching its stored version and then migrated forward.
pub fn open_versioned<P: AsRef<Path>>(
    db_path: P,
    schemas: &[VersionedSchema],
    label: &str,
) -> Result<Connection> {
    let path = db_path.as_ref();
    let latest = schemas
        .last()
        .with_context(|| format!("No schema defined for {} database", label))?;
    let is_new_db = !path.exists();

    let mut conn = Connection::open(path)
        .with_context(|| format!("Failed to open {} database at {:?}", label, path))?;

    if is_new_db {
        info!("Creating new {} database at {:?}", label, path);
        latest.create(&conn)?;
        return Ok(conn);
    }

    let raw_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let db_version = raw_version - BASE_DB_VERSION as i64;
    if db_version < 1 {
        bail!(
            "{} database version {} is invalid (expected >= 1)",
            label,
            db_version
        );
    }
    let db_version = db_version as usize;

    let schema = schemas
        .iter()
        .find(|s| s.version == db_version)
        .with_context(|| format!("Unknown {} database version {}", label, db_version))?;
    schema
        .validate(&conn)
        .with_context(|| format!("{} database schema validation failed", label))?;

    if db_version < latest.version {
        info!(
            "Migrating {} database from version {} to {}",
            label, db_version, latest.version
        );
        let tx = conn.transaction()?;
        for schema in schemas.iter().filter(|s| s.version > db_version) {
            if let Some(migration_fn) = schema.migration {
                migration_fn(&tx).with_context(|| {
                    format!("Failed to run migration to version {}", schema.version)
                })?;
            }
        }
        tx.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + latest.version),
            [],
        )?;
        tx.commit()?;
    }

    Ok(conn)
}
