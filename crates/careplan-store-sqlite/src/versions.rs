//! Row-level operations on the `versions` table.
//!
//! Everything here is synchronous and runs inside a `tokio_rusqlite`
//! connection callback, usually within a transaction opened by the caller.
//! A `&Transaction` derefs to `&Connection`, so the helpers take the latter.

use std::collections::HashSet;

use careplan_core::{
  entity::{Entity, EntityKind},
  knowledge::{ClockId, ClockStamp, KnowledgeVector},
  query::{Query, head_rank},
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use crate::{
  encode::{
    RawVersion, VERSION_COLUMNS, decode_clock, decode_kind, decode_uuids,
    decode_vector, encode_clock, encode_dt, encode_kind, encode_uuid,
    encode_uuids, encode_vector,
  },
  schema::{CLOCK_ID_KEY, KNOWLEDGE_VECTOR_KEY},
  Error, Result,
};

// ─── Metadata ────────────────────────────────────────────────────────────────

fn read_metadata(conn: &Connection, key: &str) -> Result<Option<String>> {
  Ok(
    conn
      .query_row(
        "SELECT value FROM store_metadata WHERE key = ?1",
        rusqlite::params![key],
        |r| r.get(0),
      )
      .optional()?,
  )
}

fn write_metadata(conn: &Connection, key: &str, value: &str) -> Result<()> {
  conn.execute(
    "INSERT INTO store_metadata (key, value) VALUES (?1, ?2)
     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    rusqlite::params![key, value],
  )?;
  Ok(())
}

/// Load the store's clock, minting one (with its counter at 1) on first open.
pub fn ensure_clock(conn: &Connection) -> Result<ClockId> {
  if let Some(raw) = read_metadata(conn, CLOCK_ID_KEY)? {
    return decode_clock(&raw);
  }
  let clock = ClockId::new();
  let mut vector = KnowledgeVector::new();
  vector.increment(clock);
  write_metadata(conn, CLOCK_ID_KEY, &encode_clock(clock))?;
  write_vector(conn, &vector)?;
  Ok(clock)
}

pub fn read_vector(conn: &Connection) -> Result<KnowledgeVector> {
  let raw = read_metadata(conn, KNOWLEDGE_VECTOR_KEY)?
    .ok_or(Error::MissingMetadata(KNOWLEDGE_VECTOR_KEY))?;
  decode_vector(&raw)
}

pub fn write_vector(conn: &Connection, vector: &KnowledgeVector) -> Result<()> {
  write_metadata(conn, KNOWLEDGE_VECTOR_KEY, &encode_vector(vector)?)
}

/// The stamp local writes receive right now.
pub fn local_stamp(conn: &Connection, clock: ClockId) -> Result<ClockStamp> {
  Ok(ClockStamp::new(clock, read_vector(conn)?.counter(clock)))
}

// ─── Reads ───────────────────────────────────────────────────────────────────

fn collect_versions(
  conn: &Connection,
  sql: &str,
  params: impl rusqlite::Params,
) -> Result<Vec<Entity>> {
  let mut stmt = conn.prepare(sql)?;
  let raws = stmt
    .query_map(params, RawVersion::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawVersion::into_entity).collect()
}

/// Every stored version in insertion order, optionally restricted to one
/// kind and a set of ids.
pub fn load_versions(
  conn: &Connection,
  kind: Option<EntityKind>,
  ids: &[String],
) -> Result<Vec<Entity>> {
  let mut conds: Vec<String> = vec![];
  let mut params: Vec<String> = vec![];

  if let Some(kind) = kind {
    params.push(encode_kind(kind));
    conds.push(format!("kind = ?{}", params.len()));
  }
  if !ids.is_empty() {
    let placeholders: Vec<String> = ids
      .iter()
      .map(|id| {
        params.push(id.clone());
        format!("?{}", params.len())
      })
      .collect();
    conds.push(format!("entity_id IN ({})", placeholders.join(", ")));
  }

  let where_clause = if conds.is_empty() {
    String::new()
  } else {
    format!("WHERE {}", conds.join(" AND "))
  };
  let sql =
    format!("SELECT {VERSION_COLUMNS} FROM versions {where_clause} ORDER BY seq");

  collect_versions(conn, &sql, rusqlite::params_from_iter(params))
}

/// Every version of one logical entity, in insertion order.
pub fn load_chain(
  conn: &Connection,
  kind: EntityKind,
  id: &str,
) -> Result<Vec<Entity>> {
  load_versions(conn, Some(kind), &[id.to_owned()])
}

/// Chain members with no successor inside the chain. More than one head
/// means the chain has forked through concurrent edits.
pub fn chain_heads(
  conn: &Connection,
  kind: EntityKind,
  id: &str,
) -> Result<Vec<Entity>> {
  let chain = load_chain(conn, kind, id)?;
  let members: HashSet<Uuid> = chain.iter().map(Entity::uuid).collect();
  Ok(
    chain
      .into_iter()
      .filter(|e| {
        !e.version()
          .next_version_uuids
          .iter()
          .any(|n| members.contains(n))
      })
      .collect(),
  )
}

/// The head reads resolve to, unless that head is a tombstone. Ranked over
/// every head so writes agree with what queries show.
pub fn live_head(heads: &[Entity]) -> Option<&Entity> {
  heads
    .iter()
    .max_by(|a, b| head_rank(a).cmp(&head_rank(b)))
    .filter(|e| !e.is_tombstone())
}

pub fn version_kind(conn: &Connection, uuid: Uuid) -> Result<Option<EntityKind>> {
  let raw: Option<String> = conn
    .query_row(
      "SELECT kind FROM versions WHERE uuid = ?1",
      rusqlite::params![encode_uuid(uuid)],
      |r| r.get(0),
    )
    .optional()?;
  raw.as_deref().map(decode_kind).transpose()
}

pub fn version_exists(conn: &Connection, uuid: Uuid) -> Result<bool> {
  Ok(version_kind(conn, uuid)?.is_some())
}

pub fn load_version(conn: &Connection, uuid: Uuid) -> Result<Option<Entity>> {
  let sql = format!("SELECT {VERSION_COLUMNS} FROM versions WHERE uuid = ?1");
  Ok(
    collect_versions(conn, &sql, rusqlite::params![encode_uuid(uuid)])?
      .into_iter()
      .next(),
  )
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Append a version row. The entity must already carry its stamp.
pub fn insert_version(conn: &Connection, entity: &Entity) -> Result<()> {
  let version = entity.version();
  let stamp = version.stamp.ok_or_else(|| {
    careplan_core::Error::InvalidValue(format!(
      "version {} has no clock stamp",
      version.uuid
    ))
  })?;
  let counter = i64::try_from(stamp.counter).map_err(|_| {
    careplan_core::Error::InvalidValue(format!(
      "clock counter {} out of range",
      stamp.counter
    ))
  })?;

  conn.execute(
    "INSERT INTO versions (
       uuid, kind, entity_id, payload_json, next_versions,
       effective_date, deleted_date, clock_id, clock_counter
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    rusqlite::params![
      encode_uuid(version.uuid),
      encode_kind(entity.kind()),
      version.id,
      serde_json::to_string(entity)?,
      encode_uuids(&version.next_version_uuids)?,
      encode_dt(version.effective_date),
      version.deleted_date.map(encode_dt),
      encode_clock(stamp.clock),
      counter,
    ],
  )?;
  Ok(())
}

/// Record `next` as a successor of `prev`. No-op if already linked.
pub fn link_successor(conn: &Connection, prev: Uuid, next: Uuid) -> Result<()> {
  let prev_str = encode_uuid(prev);
  let raw: Option<String> = conn
    .query_row(
      "SELECT next_versions FROM versions WHERE uuid = ?1",
      rusqlite::params![prev_str],
      |r| r.get(0),
    )
    .optional()?;
  let Some(raw) = raw else { return Ok(()) };

  let mut successors = decode_uuids(&raw)?;
  if successors.contains(&next) {
    return Ok(());
  }
  successors.push(next);
  conn.execute(
    "UPDATE versions SET next_versions = ?1 WHERE uuid = ?2",
    rusqlite::params![encode_uuids(&successors)?, prev_str],
  )?;
  Ok(())
}

/// Soft-delete a stored version in place. Sets `deleted_date` in both the
/// column and the payload; a version already marked keeps its date.
pub fn mark_deleted(
  conn: &Connection,
  uuid: Uuid,
  at: DateTime<Utc>,
) -> Result<()> {
  let Some(mut entity) = load_version(conn, uuid)? else { return Ok(()) };
  if entity.version().deleted_date.is_some() {
    return Ok(());
  }
  entity.version_mut().deleted_date = Some(at);
  conn.execute(
    "UPDATE versions SET deleted_date = ?1, payload_json = ?2 WHERE uuid = ?3",
    rusqlite::params![
      encode_dt(at),
      serde_json::to_string(&entity)?,
      encode_uuid(uuid),
    ],
  )?;
  Ok(())
}

// ─── Integrity ───────────────────────────────────────────────────────────────

/// Every uuid the entity refers to must name a stored version of the right
/// kind.
pub fn check_references(conn: &Connection, entity: &Entity) -> Result<()> {
  for (kind, uuid) in entity.references() {
    if version_kind(conn, uuid)? != Some(kind) {
      return Err(careplan_core::Error::MissingReference { kind, uuid }.into());
    }
  }
  Ok(())
}

/// Outcomes must point at an existing occurrence of their task, and each
/// occurrence holds at most one live outcome.
pub fn check_outcome(conn: &Connection, entity: &Entity) -> Result<()> {
  let Some(outcome) = entity.as_outcome() else { return Ok(()) };

  let task = load_version(conn, outcome.task_uuid)?;
  let Some(task) = task.as_ref().and_then(Entity::as_task) else {
    return Err(
      careplan_core::Error::MissingReference {
        kind: EntityKind::Task,
        uuid: outcome.task_uuid,
      }
      .into(),
    );
  };
  if !task.schedule.has_occurrence(outcome.task_occurrence_index) {
    return Err(
      careplan_core::Error::InvalidValue(format!(
        "task {:?} has no occurrence {}",
        task.version.id, outcome.task_occurrence_index
      ))
      .into(),
    );
  }

  let existing = Query::new(EntityKind::Outcome)
    .with_task_uuids([outcome.task_uuid])
    .evaluate(load_versions(conn, Some(EntityKind::Outcome), &[])?);
  let taken = existing.iter().filter_map(Entity::as_outcome).any(|o| {
    o.task_occurrence_index == outcome.task_occurrence_index
      && o.version.id != outcome.version.id
  });
  if taken {
    return Err(
      careplan_core::Error::InvalidValue(format!(
        "an outcome already exists for occurrence {} of task {}",
        outcome.task_occurrence_index, outcome.task_uuid
      ))
      .into(),
    );
  }
  Ok(())
}

// ─── Batches ─────────────────────────────────────────────────────────────────

/// Prepare `entity` as the next version after `heads` and append it.
fn append_version(
  conn: &Connection,
  mut entity: Entity,
  heads: &[Entity],
  created: Option<DateTime<Utc>>,
  stamp: ClockStamp,
  now: DateTime<Utc>,
) -> Result<Entity> {
  let previous: Vec<Uuid> = heads.iter().map(Entity::uuid).collect();

  let version = entity.version_mut();
  version.previous_version_uuids = previous.clone();
  version.next_version_uuids.clear();
  version.created_date = created.or(Some(now));
  version.updated_date = Some(now);
  version.stamp = Some(stamp);

  insert_version(conn, &entity)?;
  for prev in previous {
    link_successor(conn, prev, entity.uuid())?;
  }
  Ok(entity)
}

/// Insert first versions. An id whose chain ends in a tombstone is revived
/// as a successor of that tombstone.
pub fn add_batch(
  conn: &Connection,
  entities: Vec<Entity>,
  stamp: ClockStamp,
  now: DateTime<Utc>,
) -> Result<Vec<Entity>> {
  let mut stored = Vec::with_capacity(entities.len());
  for mut entity in entities {
    let kind = entity.kind();
    let heads = chain_heads(conn, kind, entity.id())?;
    if live_head(&heads).is_some() {
      return Err(
        careplan_core::Error::AlreadyExists { kind, id: entity.id().to_owned() }
          .into(),
      );
    }
    if version_exists(conn, entity.uuid())? {
      return Err(
        careplan_core::Error::InvalidValue(format!(
          "version {} is already stored",
          entity.uuid()
        ))
        .into(),
      );
    }
    check_references(conn, &entity)?;
    check_outcome(conn, &entity)?;

    entity.version_mut().deleted_date = None;
    stored.push(append_version(conn, entity, &heads, None, stamp, now)?);
  }
  Ok(stored)
}

/// Append a new version of each entity, matched by kind and id.
pub fn update_batch(
  conn: &Connection,
  entities: Vec<Entity>,
  stamp: ClockStamp,
  now: DateTime<Utc>,
) -> Result<Vec<Entity>> {
  let mut stored = Vec::with_capacity(entities.len());
  for mut entity in entities {
    let kind = entity.kind();
    let heads = chain_heads(conn, kind, entity.id())?;
    let Some(current) = live_head(&heads) else {
      return Err(
        careplan_core::Error::NotFound { kind, id: entity.id().to_owned() }
          .into(),
      );
    };
    if entity.version().effective_date < current.version().effective_date {
      return Err(
        careplan_core::Error::InvalidValue(format!(
          "new version of {kind} {:?} takes effect before the current one",
          entity.id()
        ))
        .into(),
      );
    }
    check_references(conn, &entity)?;
    check_outcome(conn, &entity)?;

    let created = current.version().created_date;
    let version = entity.version_mut();
    version.uuid = Uuid::new_v4();
    version.deleted_date = None;
    stored.push(append_version(conn, entity, &heads, created, stamp, now)?);
  }
  Ok(stored)
}

/// Append a tombstone after each entity's current version and mark every
/// head it replaces as deleted. Only kind and id of the inputs are used; the
/// tombstone copies the stored head.
pub fn delete_batch(
  conn: &Connection,
  entities: Vec<Entity>,
  stamp: ClockStamp,
  now: DateTime<Utc>,
) -> Result<Vec<Entity>> {
  let mut stored = Vec::with_capacity(entities.len());
  for entity in entities {
    let kind = entity.kind();
    let heads = chain_heads(conn, kind, entity.id())?;
    let Some(current) = live_head(&heads) else {
      return Err(
        careplan_core::Error::NotFound { kind, id: entity.id().to_owned() }
          .into(),
      );
    };

    let mut tombstone = current.clone();
    let created = current.version().created_date;
    let version = tombstone.version_mut();
    version.uuid = Uuid::new_v4();
    version.deleted_date = Some(now);
    for head in &heads {
      mark_deleted(conn, head.uuid(), now)?;
    }
    stored.push(append_version(conn, tombstone, &heads, created, stamp, now)?);
  }
  Ok(stored)
}
