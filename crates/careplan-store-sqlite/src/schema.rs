//! SQL schema for the SQLite care-plan store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Singleton values: the store's own clock id and its knowledge vector.
CREATE TABLE IF NOT EXISTS store_metadata (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Every version of every entity, in insertion order.
-- Rows are never deleted. UPDATEs only append a successor to
-- `next_versions` or soft-delete a replaced head by setting `deleted_date`.
CREATE TABLE IF NOT EXISTS versions (
    seq            INTEGER PRIMARY KEY AUTOINCREMENT,
    uuid           TEXT NOT NULL UNIQUE,
    kind           TEXT NOT NULL,   -- EntityKind, snake_case
    entity_id      TEXT NOT NULL,   -- user-assigned id, stable across versions
    payload_json   TEXT NOT NULL,   -- full serialised Entity
    next_versions  TEXT NOT NULL DEFAULT '[]',  -- authoritative successor list
    effective_date TEXT NOT NULL,   -- RFC 3339 UTC
    deleted_date   TEXT,            -- RFC 3339 UTC; tombstones and the heads they replaced
    clock_id       TEXT NOT NULL,
    clock_counter  INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS versions_entity_idx ON versions(kind, entity_id);
CREATE INDEX IF NOT EXISTS versions_clock_idx  ON versions(clock_id, clock_counter);

PRAGMA user_version = 1;
";

pub const CLOCK_ID_KEY: &str = "clock_id";
pub const KNOWLEDGE_VECTOR_KEY: &str = "knowledge_vector";
