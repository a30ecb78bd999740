//! Exporting and importing history as revision records.

use std::collections::{BTreeMap, BTreeSet};

use careplan_core::{
  entity::{Entity, EntityKind},
  knowledge::{ClockId, ClockStamp, KnowledgeVector},
  revision::RevisionRecord,
};
use rusqlite::Connection;
use tracing::debug;

use crate::{
  versions::{
    insert_version, link_successor, load_versions, local_stamp, read_vector,
    version_exists, write_vector,
  },
  Result,
};

/// Every stored version whose stamp `since` does not cover, one record per
/// stamp in `(clock, counter)` order.
///
/// Each record's vector is `since` advanced by every stamp up to and
/// including its own, so applying a prefix of the result leaves the receiver
/// with an accurate vector.
pub fn revisions_since(
  conn: &Connection,
  since: &KnowledgeVector,
) -> Result<Vec<RevisionRecord>> {
  let mut groups: BTreeMap<ClockStamp, Vec<Entity>> = BTreeMap::new();
  for entity in load_versions(conn, None, &[])? {
    let Some(stamp) = entity.version().stamp else { continue };
    if since.covers(stamp) {
      continue;
    }
    groups.entry(stamp).or_default().push(entity);
  }

  let mut running = since.clone();
  Ok(
    groups
      .into_iter()
      .map(|(stamp, entities)| {
        running.observe(stamp);
        RevisionRecord::new(entities, running.clone())
      })
      .collect(),
  )
}

/// Apply `record` and fold its vector into ours. Returns the kinds that
/// gained versions.
///
/// Versions already stored are skipped, so replaying a record is harmless.
/// Successor links only ever point at versions this store holds. Links into
/// an incoming version are added when it is inserted, from its own list of
/// predecessors.
pub fn merge_record(
  conn: &Connection,
  clock: ClockId,
  record: RevisionRecord,
) -> Result<BTreeSet<EntityKind>> {
  let mut vector = read_vector(conn)?;
  let mut touched = BTreeSet::new();
  let (mut inserted, mut skipped) = (0usize, 0usize);

  for mut entity in record.entities {
    if version_exists(conn, entity.uuid())? {
      skipped += 1;
      continue;
    }

    let stamp = match entity.version().stamp {
      Some(stamp) => stamp,
      None => local_stamp(conn, clock)?,
    };

    let mut successors = Vec::new();
    for next in &entity.version().next_version_uuids {
      if version_exists(conn, *next)? {
        successors.push(*next);
      }
    }

    let version = entity.version_mut();
    version.stamp = Some(stamp);
    version.next_version_uuids = successors;

    insert_version(conn, &entity)?;
    for prev in entity.version().previous_version_uuids.clone() {
      link_successor(conn, prev, entity.uuid())?;
    }

    vector.observe(stamp);
    touched.insert(entity.kind());
    inserted += 1;
  }

  vector.merge(&record.knowledge_vector);
  write_vector(conn, &vector)?;

  debug!(inserted, skipped, "merged revision record");
  Ok(touched)
}
