//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Entities, uuid lists and
//! knowledge vectors are stored as compact JSON. UUIDs are stored as
//! hyphenated lowercase strings.

use std::str::FromStr as _;

use careplan_core::{
  entity::{Entity, EntityKind},
  knowledge::{ClockId, ClockStamp, KnowledgeVector},
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_uuids(ids: &[Uuid]) -> Result<String> {
  Ok(serde_json::to_string(ids)?)
}

pub fn decode_uuids(s: &str) -> Result<Vec<Uuid>> {
  Ok(serde_json::from_str(s)?)
}

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

// ─── EntityKind ───────────────────────────────────────────────────────────────

pub fn encode_kind(kind: EntityKind) -> String { kind.to_string() }

pub fn decode_kind(s: &str) -> Result<EntityKind> {
  EntityKind::from_str(s).map_err(|_| {
    Error::Core(careplan_core::Error::InvalidValue(format!(
      "unknown entity kind: {s:?}"
    )))
  })
}

// ─── Clocks ───────────────────────────────────────────────────────────────────

pub fn encode_clock(clock: ClockId) -> String { encode_uuid(clock.as_uuid()) }

pub fn decode_clock(s: &str) -> Result<ClockId> {
  Ok(ClockId::from_uuid(decode_uuid(s)?))
}

pub fn encode_vector(vector: &KnowledgeVector) -> Result<String> {
  Ok(serde_json::to_string(vector)?)
}

pub fn decode_vector(s: &str) -> Result<KnowledgeVector> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawVersion`]'s field order.
pub const VERSION_COLUMNS: &str =
  "seq, payload_json, next_versions, clock_id, clock_counter";

/// Raw strings read directly from a `versions` row.
pub struct RawVersion {
  pub seq:           i64,
  pub payload_json:  String,
  pub next_versions: String,
  pub clock_id:      String,
  pub clock_counter: i64,
}

impl RawVersion {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      seq:           row.get(0)?,
      payload_json:  row.get(1)?,
      next_versions: row.get(2)?,
      clock_id:      row.get(3)?,
      clock_counter: row.get(4)?,
    })
  }

  /// The payload carries the immutable parts of the version; the successor
  /// list and clock stamp come from their own columns.
  pub fn into_entity(self) -> Result<Entity> {
    let mut entity: Entity = serde_json::from_str(&self.payload_json)?;
    let counter = u64::try_from(self.clock_counter).map_err(|_| {
      Error::Core(careplan_core::Error::InvalidValue(format!(
        "negative clock counter in row {}",
        self.seq
      )))
    })?;

    let version = entity.version_mut();
    version.next_version_uuids = decode_uuids(&self.next_versions)?;
    version.stamp = Some(ClockStamp::new(decode_clock(&self.clock_id)?, counter));
    Ok(entity)
  }
}
