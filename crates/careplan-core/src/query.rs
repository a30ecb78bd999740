//! Queries and sort descriptors.
//!
//! A [`Query`] selects entities of a single kind. Backends may push parts of
//! it down to their storage engine, but [`Query::evaluate`] is the reference
//! semantics: it resolves version chains to the entity in effect, applies the
//! filters, sorts, and paginates.

use std::{
  cmp::Ordering,
  collections::{BTreeMap, HashSet},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{Entity, EntityKind};

// ─── Sorting ─────────────────────────────────────────────────────────────────

/// A field entities can be ordered by. Kinds lacking the field sort as if
/// the value were missing; missing values sort first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
  EffectiveDate,
  CreatedDate,
  UpdatedDate,
  Id,
  Title,
  GivenName,
  FamilyName,
  TaskOccurrenceIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortDescriptor {
  pub key:       SortKey,
  pub ascending: bool,
}

impl SortDescriptor {
  pub fn ascending(key: SortKey) -> Self { Self { key, ascending: true } }

  pub fn descending(key: SortKey) -> Self { Self { key, ascending: false } }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SortValue<'a> {
  Missing,
  Number(u64),
  Date(DateTime<Utc>),
  Text(&'a str),
}

fn text(value: Option<&str>) -> SortValue<'_> {
  value.map_or(SortValue::Missing, SortValue::Text)
}

fn date(value: Option<DateTime<Utc>>) -> SortValue<'static> {
  value.map_or(SortValue::Missing, SortValue::Date)
}

fn sort_value(entity: &Entity, key: SortKey) -> SortValue<'_> {
  let version = entity.version();
  match key {
    SortKey::EffectiveDate => SortValue::Date(version.effective_date),
    SortKey::CreatedDate => date(version.created_date),
    SortKey::UpdatedDate => date(version.updated_date),
    SortKey::Id => SortValue::Text(&version.id),
    SortKey::Title => match entity {
      Entity::CarePlan(p) => SortValue::Text(&p.title),
      Entity::Task(t) => text(t.title.as_deref()),
      Entity::Contact(c) => text(c.title.as_deref()),
      _ => SortValue::Missing,
    },
    SortKey::GivenName => match entity {
      Entity::Patient(p) => text(p.name.given.as_deref()),
      Entity::Contact(c) => text(c.name.given.as_deref()),
      _ => SortValue::Missing,
    },
    SortKey::FamilyName => match entity {
      Entity::Patient(p) => text(p.name.family.as_deref()),
      Entity::Contact(c) => text(c.name.family.as_deref()),
      _ => SortValue::Missing,
    },
    SortKey::TaskOccurrenceIndex => match entity {
      Entity::Outcome(o) => SortValue::Number(u64::from(o.task_occurrence_index)),
      _ => SortValue::Missing,
    },
  }
}

/// Compare two entities lexicographically over `sort`. The first descriptor
/// that tells them apart decides.
pub fn compare_entities(
  a: &Entity,
  b: &Entity,
  sort: &[SortDescriptor],
) -> Ordering {
  sort
    .iter()
    .map(|d| {
      let order = sort_value(a, d.key).cmp(&sort_value(b, d.key));
      if d.ascending { order } else { order.reverse() }
    })
    .find(|o| o.is_ne())
    .unwrap_or(Ordering::Equal)
}

/// Rank used to pick one head when a logical entity has forked into several
/// concurrent versions. The greatest rank wins.
pub fn head_rank(
  entity: &Entity,
) -> (DateTime<Utc>, Option<DateTime<Utc>>, Uuid) {
  let v = entity.version();
  (v.effective_date, v.updated_date, v.uuid)
}

// ─── Query ───────────────────────────────────────────────────────────────────

/// Half-open `[start, end)` window over effective dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateInterval {
  pub start: DateTime<Utc>,
  pub end:   DateTime<Utc>,
}

/// Selects entities of one kind. Empty filter lists match everything.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
  pub kind:            EntityKind,
  pub ids:             Vec<String>,
  /// Exact versions. When set, version resolution is skipped and the named
  /// versions are returned even if they are no longer current.
  pub uuids:           Vec<Uuid>,
  /// Care plans belonging to these patient versions.
  pub patient_uuids:   Vec<Uuid>,
  /// Tasks and contacts belonging to these care plan versions.
  pub care_plan_uuids: Vec<Uuid>,
  /// Outcomes belonging to these task versions.
  pub task_uuids:      Vec<Uuid>,
  /// All of these tags must be present.
  pub tags:            Vec<String>,
  pub date_interval:   Option<DateInterval>,
  pub sort:            Vec<SortDescriptor>,
  pub limit:           Option<usize>,
  pub offset:          Option<usize>,
}

impl Query {
  pub fn new(kind: EntityKind) -> Self {
    Self {
      kind,
      ids: Vec::new(),
      uuids: Vec::new(),
      patient_uuids: Vec::new(),
      care_plan_uuids: Vec::new(),
      task_uuids: Vec::new(),
      tags: Vec::new(),
      date_interval: None,
      sort: Vec::new(),
      limit: None,
      offset: None,
    }
  }

  pub fn with_ids<I, S>(mut self, ids: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.ids = ids.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_uuids(mut self, uuids: impl IntoIterator<Item = Uuid>) -> Self {
    self.uuids = uuids.into_iter().collect();
    self
  }

  pub fn with_patient_uuids(
    mut self,
    uuids: impl IntoIterator<Item = Uuid>,
  ) -> Self {
    self.patient_uuids = uuids.into_iter().collect();
    self
  }

  pub fn with_care_plan_uuids(
    mut self,
    uuids: impl IntoIterator<Item = Uuid>,
  ) -> Self {
    self.care_plan_uuids = uuids.into_iter().collect();
    self
  }

  pub fn with_task_uuids(
    mut self,
    uuids: impl IntoIterator<Item = Uuid>,
  ) -> Self {
    self.task_uuids = uuids.into_iter().collect();
    self
  }

  pub fn with_tags<I, S>(mut self, tags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.tags = tags.into_iter().map(Into::into).collect();
    self
  }

  pub fn during(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
    self.date_interval = Some(DateInterval { start, end });
    self
  }

  pub fn sorted_by(mut self, descriptor: SortDescriptor) -> Self {
    self.sort.push(descriptor);
    self
  }

  pub fn with_limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }

  pub fn with_offset(mut self, offset: usize) -> Self {
    self.offset = Some(offset);
    self
  }

  /// The descriptors results are ordered by; effective date ascending when
  /// none were given.
  pub fn sort_descriptors(&self) -> Vec<SortDescriptor> {
    if self.sort.is_empty() {
      vec![SortDescriptor::ascending(SortKey::EffectiveDate)]
    } else {
      self.sort.clone()
    }
  }

  /// Field filters only; says nothing about whether `entity` is current.
  pub fn matches(&self, entity: &Entity) -> bool {
    if entity.kind() != self.kind {
      return false;
    }
    if !self.ids.is_empty() && !self.ids.iter().any(|id| id == entity.id()) {
      return false;
    }
    if !self.patient_uuids.is_empty() {
      let Entity::CarePlan(plan) = entity else { return false };
      if !plan.patient_uuid.is_some_and(|u| self.patient_uuids.contains(&u)) {
        return false;
      }
    }
    if !self.care_plan_uuids.is_empty() {
      let plan_uuid = match entity {
        Entity::Task(t) => t.care_plan_uuid,
        Entity::Contact(c) => c.care_plan_uuid,
        _ => None,
      };
      if !plan_uuid.is_some_and(|u| self.care_plan_uuids.contains(&u)) {
        return false;
      }
    }
    if !self.task_uuids.is_empty() {
      let Entity::Outcome(outcome) = entity else { return false };
      if !self.task_uuids.contains(&outcome.task_uuid) {
        return false;
      }
    }
    let tags = &entity.version().tags;
    self.tags.iter().all(|t| tags.contains(t))
  }

  /// Run the query over every stored version of (at least) this kind.
  pub fn evaluate(&self, versions: impl IntoIterator<Item = Entity>) -> Vec<Entity> {
    let versions = versions.into_iter().filter(|e| e.kind() == self.kind);

    let mut selected: Vec<Entity> = if self.uuids.is_empty() {
      resolve_current(versions, self.date_interval.as_ref())
    } else {
      versions.filter(|e| self.uuids.contains(&e.uuid())).collect()
    };
    selected.retain(|e| self.matches(e));

    let sort = self.sort_descriptors();
    selected.sort_by(|a, b| {
      compare_entities(a, b, &sort).then_with(|| a.uuid().cmp(&b.uuid()))
    });

    selected
      .into_iter()
      .skip(self.offset.unwrap_or(0))
      .take(self.limit.unwrap_or(usize::MAX))
      .collect()
  }
}

/// Reduce a set of versions to the one in effect per logical entity.
///
/// Only versions effective before the interval end take part. Among those, a
/// version is a head when none of its successors took part; forks are
/// settled by [`head_rank`]. Logical entities whose winner is a tombstone
/// are dropped.
fn resolve_current(
  versions: impl Iterator<Item = Entity>,
  interval: Option<&DateInterval>,
) -> Vec<Entity> {
  let candidates: Vec<Entity> = versions
    .filter(|e| interval.is_none_or(|i| e.version().effective_date < i.end))
    .collect();
  let present: HashSet<Uuid> = candidates.iter().map(Entity::uuid).collect();

  let mut winners: BTreeMap<String, Entity> = BTreeMap::new();
  for entity in candidates {
    let superseded = entity
      .version()
      .next_version_uuids
      .iter()
      .any(|next| present.contains(next));
    if superseded {
      continue;
    }
    let replace = winners
      .get(entity.id())
      .is_none_or(|current| head_rank(&entity) > head_rank(current));
    if replace {
      winners.insert(entity.id().to_owned(), entity);
    }
  }

  winners.into_values().filter(|e| !e.is_tombstone()).collect()
}

#[cfg(test)]
mod tests {
  use chrono::{TimeDelta, TimeZone as _};

  use super::*;
  use crate::{
    entity::{Contact, Outcome, Patient, Task},
    schedule::Schedule,
  };

  fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
  }

  fn task(id: &str, day: u32) -> Task {
    let mut t = Task::new(id, Some(id.to_uppercase()), None, Schedule::once(at(day)));
    t.version.effective_date = at(day);
    t
  }

  /// A successor version of `prev`, linked both ways.
  fn successor(prev: &mut Task, day: u32) -> Task {
    let mut next = prev.clone();
    next.version.uuid = Uuid::new_v4();
    next.version.effective_date = at(day);
    next.version.previous_version_uuids = vec![prev.version.uuid];
    next.version.next_version_uuids.clear();
    prev.version.next_version_uuids.push(next.version.uuid);
    next
  }

  #[test]
  fn returns_only_current_version() {
    let mut v1 = task("a", 1);
    let v2 = successor(&mut v1, 2);

    let out = Query::new(EntityKind::Task).evaluate([Entity::from(v1), Entity::from(v2.clone())]);
    assert_eq!(out, vec![Entity::Task(v2)]);
  }

  #[test]
  fn interval_selects_version_in_effect() {
    let mut v1 = task("a", 1);
    let v2 = successor(&mut v1, 10);

    let out = Query::new(EntityKind::Task)
      .during(at(1), at(5))
      .evaluate([Entity::from(v1.clone()), Entity::from(v2)]);
    assert_eq!(out, vec![Entity::Task(v1)]);
  }

  #[test]
  fn tombstoned_entities_are_hidden() {
    let mut v1 = task("a", 1);
    let mut gone = successor(&mut v1, 1);
    gone.version.deleted_date = Some(at(2));

    let out = Query::new(EntityKind::Task).evaluate([Entity::from(v1), Entity::from(gone)]);
    assert!(out.is_empty());
  }

  #[test]
  fn fork_is_settled_by_rank() {
    let mut base = task("a", 1);
    let left = successor(&mut base, 3);
    let right = successor(&mut base, 2);

    let out = Query::new(EntityKind::Task)
      .evaluate([Entity::from(base), Entity::from(left.clone()), Entity::from(right)]);
    assert_eq!(out, vec![Entity::Task(left)]);
  }

  #[test]
  fn uuid_query_returns_exact_versions() {
    let mut v1 = task("a", 1);
    let v2 = successor(&mut v1, 2);

    let out = Query::new(EntityKind::Task)
      .with_uuids([v1.version.uuid])
      .evaluate([Entity::from(v1.clone()), Entity::from(v2)]);
    assert_eq!(out, vec![Entity::Task(v1)]);
  }

  #[test]
  fn filters_by_relationship_and_tags() {
    let task_uuid = Uuid::new_v4();
    let mut hit = Outcome::new(task_uuid, 0, Vec::new());
    hit.version.tags = vec!["morning".into(), "home".into()];
    let miss = Outcome::new(Uuid::new_v4(), 0, Vec::new());

    let out = Query::new(EntityKind::Outcome)
      .with_task_uuids([task_uuid])
      .with_tags(["home"])
      .evaluate([Entity::from(hit.clone()), Entity::from(miss)]);
    assert_eq!(out, vec![Entity::Outcome(hit)]);
  }

  #[test]
  fn ignores_other_kinds() {
    let out = Query::new(EntityKind::Patient).evaluate([
      Entity::from(Patient::new("p", "Amy", "Frost")),
      Entity::from(Contact::new("c", "Bo", "Lin", None)),
    ]);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].kind(), EntityKind::Patient);
  }

  #[test]
  fn sorts_then_paginates() {
    let tasks: Vec<Entity> =
      (1..=5).rev().map(|d| task(&format!("t{d}"), d).into()).collect();

    let out = Query::new(EntityKind::Task)
      .sorted_by(SortDescriptor::descending(SortKey::EffectiveDate))
      .with_offset(1)
      .with_limit(2)
      .evaluate(tasks);
    let ids: Vec<_> = out.iter().map(Entity::id).collect();
    assert_eq!(ids, ["t4", "t3"]);
  }

  #[test]
  fn missing_values_sort_first() {
    let titled = Entity::from(task("b", 1));
    let mut untitled = task("a", 1);
    untitled.title = None;
    let untitled = Entity::from(untitled);

    let sort = [SortDescriptor::ascending(SortKey::Title)];
    assert_eq!(compare_entities(&untitled, &titled, &sort), Ordering::Less);
  }

  #[test]
  fn later_descriptors_break_ties() {
    let mut a = Patient::new("a", "Amy", "Frost");
    let mut b = Patient::new("b", "Bea", "Frost");
    let now = Utc::now();
    a.version.effective_date = now;
    b.version.effective_date = now - TimeDelta::days(1);

    let sort = [
      SortDescriptor::ascending(SortKey::FamilyName),
      SortDescriptor::descending(SortKey::GivenName),
    ];
    assert_eq!(
      compare_entities(&a.into(), &b.into(), &sort),
      Ordering::Greater
    );
  }
}
