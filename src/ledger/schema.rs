//! SQLite schema for the job ledger database.

use crate::sqlite_column;
use crate::sqlite_persistence::{SqlType, Table, VersionedSchema};

const LEDGER_ENTRIES_TABLE_V1: Table = Table {
    name: "ledger_entries",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("kind", &SqlType::Text, non_null = true),
        sqlite_column!("natural_key", &SqlType::Text, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

pub const LEDGER_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[LEDGER_ENTRIES_TABLE_V1],
    migration: None,
}];
