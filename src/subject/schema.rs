//! SQLite schema for the subject documents database.

use crate::sqlite_column;
use crate::sqlite_persistence::{SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP};

/// One row per subject; `document` is the whole record serialized as JSON.
const SUBJECTS_TABLE_V1: Table = Table {
    name: "subjects",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("kind", &SqlType::Text, non_null = true),
        sqlite_column!("natural_key", &SqlType::Text, non_null = true),
        sqlite_column!("document", &SqlType::Text, non_null = true),
        sqlite_column!(
            "updated_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_subjects_kind", "kind")],
    unique_constraints: &[&["kind", "natural_key"]],
};

pub const SUBJECT_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[SUBJECTS_TABLE_V1],
    migration: None,
}];
