//! Integration tests for `SqliteStore` against an in-memory database.

use careplan_core::{
  Error as CoreError,
  entity::{
    CarePlan, Contact, Entity, EntityKind, Outcome, OutcomeValue,
    OutcomeValueKind, Patient, Task,
  },
  knowledge::{ClockId, ClockStamp, KnowledgeVector},
  query::Query,
  revision::RevisionRecord,
  schedule::Schedule,
  store::{ReadableStore, RevisionStore, WritableStore},
};
use chrono::{TimeDelta, Utc};
use futures::StreamExt as _;
use uuid::Uuid;

use crate::{SqliteStore, StoreConfig};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn task(id: &str) -> Task {
  Task::new(id, None, None, Schedule::daily(Utc::now(), None))
}

/// A version as another store would ship it, stamped with that store's clock.
fn foreign<E: Into<Entity>>(entity: E, clock: ClockId, counter: u64) -> Entity {
  let mut entity = entity.into();
  entity.version_mut().stamp = Some(ClockStamp::new(clock, counter));
  entity
}

fn entities(records: &[RevisionRecord]) -> Vec<&Entity> {
  records.iter().flat_map(|r| &r.entities).collect()
}

// ─── Writes ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_fetch_patient() {
  let s = store().await;

  let stored = s
    .add(vec![Patient::new("p1", "Ada", "Lovelace").into()])
    .await
    .unwrap();
  assert_eq!(stored.len(), 1);
  assert!(stored[0].version().created_date.is_some());
  assert_eq!(
    stored[0].version().stamp,
    Some(ClockStamp::new(s.clock_id(), 1))
  );

  let fetched = s.fetch(&Query::new(EntityKind::Patient)).await.unwrap();
  assert_eq!(fetched, stored);
}

#[tokio::test]
async fn add_existing_id_errors() {
  let s = store().await;
  s.add(vec![task("a").into()]).await.unwrap();

  let err = s.add(vec![task("a").into()]).await.unwrap_err();
  assert!(matches!(err, CoreError::AlreadyExists { kind: EntityKind::Task, .. }));
}

#[tokio::test]
async fn failed_batch_leaves_store_untouched() {
  let s = store().await;
  s.add(vec![task("a").into()]).await.unwrap();

  let err = s
    .add(vec![task("b").into(), task("a").into()])
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::AlreadyExists { .. }));

  let tasks = s.fetch(&Query::new(EntityKind::Task)).await.unwrap();
  assert_eq!(tasks.len(), 1);
  assert_eq!(tasks[0].id(), "a");
}

#[tokio::test]
async fn update_appends_version() {
  let s = store().await;
  let mut t = task("a");
  let first = s.add(vec![t.clone().into()]).await.unwrap();

  t.title = Some("Updated".into());
  let second = s.update(vec![t.into()]).await.unwrap();

  let v1 = first[0].version();
  let v2 = second[0].version();
  assert_ne!(v1.uuid, v2.uuid);
  assert_eq!(v2.previous_version_uuids, vec![v1.uuid]);
  assert_eq!(v2.created_date, v1.created_date);

  let current = s.fetch(&Query::new(EntityKind::Task)).await.unwrap();
  assert_eq!(current.len(), 1);
  assert_eq!(current[0].as_task().unwrap().title.as_deref(), Some("Updated"));

  // The old version is still addressable and now knows its successor.
  let old = s
    .fetch(&Query::new(EntityKind::Task).with_uuids([v1.uuid]))
    .await
    .unwrap();
  assert_eq!(old[0].version().next_version_uuids, vec![v2.uuid]);
}

#[tokio::test]
async fn update_missing_entity_errors() {
  let s = store().await;
  let err = s.update(vec![task("ghost").into()]).await.unwrap_err();
  assert!(matches!(err, CoreError::NotFound { kind: EntityKind::Task, .. }));
}

#[tokio::test]
async fn update_cannot_move_effective_date_backwards() {
  let s = store().await;
  let mut t = task("a");
  s.add(vec![t.clone().into()]).await.unwrap();

  t.version.effective_date -= TimeDelta::days(1);
  let err = s.update(vec![t.into()]).await.unwrap_err();
  assert!(matches!(err, CoreError::InvalidValue(_)));
}

#[tokio::test]
async fn delete_hides_entity_and_allows_re_add() {
  let s = store().await;
  let p = Patient::new("p1", "Ada", "Lovelace");
  s.add(vec![p.clone().into()]).await.unwrap();

  let tombstones = s.delete(vec![p.clone().into()]).await.unwrap();
  assert!(tombstones[0].is_tombstone());
  assert!(
    s.fetch(&Query::new(EntityKind::Patient))
      .await
      .unwrap()
      .is_empty()
  );

  let err = s.delete(vec![p.into()]).await.unwrap_err();
  assert!(matches!(err, CoreError::NotFound { .. }));

  let revived = s
    .add(vec![Patient::new("p1", "Ada", "King").into()])
    .await
    .unwrap();
  assert_eq!(
    revived[0].version().previous_version_uuids,
    vec![tombstones[0].uuid()]
  );
  assert_eq!(
    s.fetch(&Query::new(EntityKind::Patient)).await.unwrap().len(),
    1
  );
}

// ─── Integrity ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn dangling_reference_is_rejected() {
  let s = store().await;
  let missing = Uuid::new_v4();

  let err = s
    .add(vec![CarePlan::new("plan", "Recovery", Some(missing)).into()])
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    CoreError::MissingReference { kind: EntityKind::Patient, uuid } if uuid == missing
  ));
}

#[tokio::test]
async fn reference_to_wrong_kind_is_rejected() {
  let s = store().await;
  let contact = s
    .add(vec![Contact::new("c1", "Grace", "Hopper", None).into()])
    .await
    .unwrap();

  let err = s
    .add(vec![CarePlan::new("plan", "Recovery", Some(contact[0].uuid())).into()])
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::MissingReference { .. }));
}

#[tokio::test]
async fn tasks_filtered_by_care_plan() {
  let s = store().await;
  let patient = s
    .add(vec![Patient::new("p1", "Ada", "Lovelace").into()])
    .await
    .unwrap();
  let plan = s
    .add(vec![CarePlan::new("plan", "Recovery", Some(patient[0].uuid())).into()])
    .await
    .unwrap();
  let plan_uuid = plan[0].uuid();

  let mut walk = task("walk");
  walk.care_plan_uuid = Some(plan_uuid);
  s.add(vec![walk.into(), task("stretch").into()]).await.unwrap();

  let in_plan = s
    .fetch(&Query::new(EntityKind::Task).with_care_plan_uuids([plan_uuid]))
    .await
    .unwrap();
  assert_eq!(in_plan.len(), 1);
  assert_eq!(in_plan[0].id(), "walk");
}

#[tokio::test]
async fn outcome_must_match_an_occurrence() {
  let s = store().await;
  let t = Task::new("once", None, None, Schedule::once(Utc::now()));
  let stored = s.add(vec![t.into()]).await.unwrap();

  let err = s
    .add(vec![Outcome::new(stored[0].uuid(), 1, vec![]).into()])
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::InvalidValue(_)));

  let ok = s
    .add(vec![Outcome::new(stored[0].uuid(), 0, vec![]).into()])
    .await;
  assert!(ok.is_ok());
}

#[tokio::test]
async fn one_outcome_per_occurrence() {
  let s = store().await;
  let stored = s.add(vec![task("a").into()]).await.unwrap();
  let task_uuid = stored[0].uuid();

  let value = OutcomeValue::new(OutcomeValueKind::Boolean(true));
  s.add(vec![Outcome::new(task_uuid, 0, vec![value]).into()])
    .await
    .unwrap();

  let err = s
    .add(vec![Outcome::new(task_uuid, 0, vec![]).into()])
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::InvalidValue(_)));

  let outcomes = s
    .fetch(&Query::new(EntityKind::Outcome).with_task_uuids([task_uuid]))
    .await
    .unwrap();
  assert_eq!(outcomes.len(), 1);
}

// ─── Revisions ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_store_produces_no_revisions() {
  let s = store().await;
  let kv = s.knowledge_vector().await.unwrap();
  assert!(s.compute_revisions(&kv).await.unwrap().is_empty());
  assert!(
    s.compute_revisions(&KnowledgeVector::new())
      .await
      .unwrap()
      .is_empty()
  );
}

#[tokio::test]
async fn adding_task_creates_revision_record() {
  let s = store().await;
  s.add(vec![task("a").into()]).await.unwrap();

  let revisions = s.compute_revisions(&KnowledgeVector::new()).await.unwrap();
  assert_eq!(revisions.len(), 1);
  assert_eq!(revisions[0].entities.len(), 1);
  assert_eq!(revisions[0].entities[0].kind(), EntityKind::Task);
  assert!(revisions[0].entities[0].version().deleted_date.is_none());
}

#[tokio::test]
async fn updating_task_creates_revision_record() {
  let s = store().await;
  let mut t = task("a");
  s.add(vec![t.clone().into()]).await.unwrap();
  t.title = Some("Updated".into());
  s.update(vec![t.into()]).await.unwrap();

  let revisions = s.compute_revisions(&KnowledgeVector::new()).await.unwrap();
  assert_eq!(revisions.len(), 1);
  assert_eq!(revisions[0].entities.len(), 2);
  assert!(revisions[0].entities.iter().all(|e| e.kind() == EntityKind::Task));
}

#[tokio::test]
async fn update_after_sync_point_yields_only_new_version() {
  let s = store().await;
  let mut t = task("a");
  s.add(vec![t.clone().into()]).await.unwrap();
  let after_add = s.knowledge_vector().await.unwrap();
  s.increment_clock().await.unwrap();

  t.title = Some("Updated".into());
  s.update(vec![t.into()]).await.unwrap();

  let revisions = s.compute_revisions(&after_add).await.unwrap();
  let found = entities(&revisions);
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].as_task().unwrap().title.as_deref(), Some("Updated"));
}

#[tokio::test]
async fn revision_for_deleting_task() {
  let s = store().await;
  let t = task("A");
  s.add(vec![t.clone().into()]).await.unwrap();
  s.update(vec![t.clone().into()]).await.unwrap();
  s.increment_clock().await.unwrap();
  s.delete(vec![t.into()]).await.unwrap();

  let since = KnowledgeVector::from_entries([(s.clock_id(), 1)]);
  let revisions = s.compute_revisions(&since).await.unwrap();
  assert_eq!(revisions.len(), 1);
  assert_eq!(revisions[0].entities.len(), 1);
  assert!(revisions[0].entities[0].version().deleted_date.is_some());
}

/// Add then delete `entity` within one stamp and return the full history.
async fn add_then_delete(entity: Entity) -> Vec<RevisionRecord> {
  let s = store().await;
  s.add(vec![entity.clone()]).await.unwrap();
  s.delete(vec![entity]).await.unwrap();
  s.compute_revisions(&KnowledgeVector::new()).await.unwrap()
}

#[tokio::test]
async fn revision_for_deleting_patient() {
  let revisions = add_then_delete(Patient::new("id1", "Ada", "Lovelace").into()).await;
  assert_eq!(revisions.len(), 1);
  assert!(revisions[0].entities[0].version().deleted_date.is_some());
  assert_eq!(revisions[0].tombstones().count(), 2);
}

#[tokio::test]
async fn revision_for_deleting_care_plan() {
  let revisions = add_then_delete(CarePlan::new("id1", "Recovery", None).into()).await;
  assert_eq!(revisions.len(), 1);
  assert!(revisions[0].entities[0].version().deleted_date.is_some());
  assert_eq!(revisions[0].tombstones().count(), 2);
}

#[tokio::test]
async fn revision_for_deleting_contact() {
  let revisions =
    add_then_delete(Contact::new("id1", "Grace", "Hopper", None).into()).await;
  assert_eq!(revisions.len(), 1);
  assert!(revisions[0].entities[0].version().deleted_date.is_some());
  assert_eq!(revisions[0].tombstones().count(), 2);
}

#[tokio::test]
async fn delete_marks_replaced_head() {
  let s = store().await;
  let first = s.add(vec![task("a").into()]).await.unwrap();
  let tombstones = s.delete(vec![task("a").into()]).await.unwrap();

  let old = s
    .fetch(&Query::new(EntityKind::Task).with_uuids([first[0].uuid()]))
    .await
    .unwrap();
  assert_eq!(old[0].version().deleted_date, tombstones[0].version().deleted_date);
  assert_eq!(old[0].version().next_version_uuids, vec![tombstones[0].uuid()]);
}

#[tokio::test]
async fn adding_outcome_joins_task_record() {
  let s = store().await;
  let stored = s.add(vec![task("a").into()]).await.unwrap();
  s.add(vec![Outcome::new(stored[0].uuid(), 0, vec![]).into()])
    .await
    .unwrap();

  let revisions = s.compute_revisions(&KnowledgeVector::new()).await.unwrap();
  assert_eq!(revisions.len(), 1);
  assert_eq!(revisions[0].entities.len(), 2);
  assert_eq!(
    revisions[0].entities.last().map(Entity::kind),
    Some(EntityKind::Outcome)
  );
}

#[tokio::test]
async fn all_entities_returned_for_empty_vector() {
  let s = store().await;
  let (c1, c2) = (ClockId::new(), ClockId::new());

  s.merge_revision(RevisionRecord::new(
    vec![foreign(Patient::new("A", "a", "a"), c1, 5)],
    KnowledgeVector::from_entries([(c1, 5)]),
  ))
  .await
  .unwrap();
  s.merge_revision(RevisionRecord::new(
    vec![foreign(Patient::new("B", "b", "b"), c2, 3)],
    KnowledgeVector::from_entries([(c2, 3)]),
  ))
  .await
  .unwrap();

  let revisions = s.compute_revisions(&KnowledgeVector::new()).await.unwrap();
  assert_eq!(entities(&revisions).len(), 2);
}

#[tokio::test]
async fn known_entities_are_not_returned() {
  let s = store().await;
  let (c1, c2) = (ClockId::new(), ClockId::new());

  for record in [
    RevisionRecord::new(
      vec![foreign(Patient::new("A", "a", "a"), c1, 5)],
      KnowledgeVector::from_entries([(c1, 5)]),
    ),
    RevisionRecord::new(
      vec![foreign(CarePlan::new("B", "b", None), c2, 3)],
      KnowledgeVector::from_entries([(c2, 3)]),
    ),
    RevisionRecord::new(
      vec![foreign(Contact::new("C", "c", "c", None), c2, 3)],
      KnowledgeVector::from_entries([(c2, 3)]),
    ),
  ] {
    s.merge_revision(record).await.unwrap();
  }

  let since = KnowledgeVector::from_entries([(c1, 1), (c2, 3)]);
  let revisions = s.compute_revisions(&since).await.unwrap();
  assert_eq!(revisions.len(), 1);
  assert_eq!(revisions[0].entities.len(), 1);
  assert_eq!(revisions[0].entities[0].kind(), EntityKind::Patient);
}

#[tokio::test]
async fn entities_are_grouped_by_stamp() {
  let s = store().await;
  let (c1, c2) = (ClockId::new(), ClockId::new());

  for (entity, clock, counter) in [
    (Patient::new("A", "a", "a"), c1, 5),
    (Patient::new("B", "b", "b"), c2, 3),
    (Patient::new("C", "c", "c"), c2, 3),
  ] {
    s.merge_revision(RevisionRecord::new(
      vec![foreign(entity, clock, counter)],
      KnowledgeVector::from_entries([(clock, counter)]),
    ))
    .await
    .unwrap();
  }

  let since = KnowledgeVector::from_entries([(c1, 4)]);
  let revisions = s.compute_revisions(&since).await.unwrap();
  assert_eq!(revisions.len(), 2);

  // The running vector only ever grows, and the last record covers all.
  let last = &revisions[1].knowledge_vector;
  assert!(last.dominates(&revisions[0].knowledge_vector));
  assert!(last.dominates(&since));
  assert_eq!(last.counter(c1), 5);
  assert_eq!(last.counter(c2), 3);
}

#[tokio::test]
async fn nothing_new_after_catching_up() {
  let s = store().await;
  s.add(vec![task("a").into(), task("b").into()]).await.unwrap();

  let revisions = s.compute_revisions(&KnowledgeVector::new()).await.unwrap();
  let caught_up = revisions
    .last()
    .map(|r| r.knowledge_vector.clone())
    .unwrap();
  assert!(s.compute_revisions(&caught_up).await.unwrap().is_empty());
}

#[tokio::test]
async fn merge_is_idempotent_and_advances_vector() {
  let s = store().await;
  let c1 = ClockId::new();
  let record = RevisionRecord::new(
    vec![foreign(Patient::new("A", "a", "a"), c1, 2)],
    KnowledgeVector::from_entries([(c1, 2)]),
  );

  s.merge_revision(record.clone()).await.unwrap();
  s.merge_revision(record).await.unwrap();

  let patients = s.fetch(&Query::new(EntityKind::Patient)).await.unwrap();
  assert_eq!(patients.len(), 1);

  let kv = s.knowledge_vector().await.unwrap();
  assert_eq!(kv.counter(c1), 2);
  assert_eq!(kv.counter(s.clock_id()), 1);
}

#[tokio::test]
async fn merged_chain_resolves_to_latest_version() {
  let (a, b) = (store().await, store().await);
  let mut t = task("a");
  a.add(vec![t.clone().into()]).await.unwrap();
  t.title = Some("Updated".into());
  a.update(vec![t.into()]).await.unwrap();

  let since = b.knowledge_vector().await.unwrap();
  for record in a.compute_revisions(&since).await.unwrap() {
    b.merge_revision(record).await.unwrap();
  }

  let tasks = b.fetch(&Query::new(EntityKind::Task)).await.unwrap();
  assert_eq!(tasks.len(), 1);
  assert_eq!(tasks[0].as_task().unwrap().title.as_deref(), Some("Updated"));

  // Nothing that came from `a` is offered back to it.
  let a_knows = a.knowledge_vector().await.unwrap();
  assert!(b.compute_revisions(&a_knows).await.unwrap().is_empty());
}

#[tokio::test]
async fn writes_follow_the_merged_winner() {
  let (a, b) = (store().await, store().await);
  let t = task("t");
  a.add(vec![t.clone().into()]).await.unwrap();
  let since = b.knowledge_vector().await.unwrap();
  for record in a.compute_revisions(&since).await.unwrap() {
    b.merge_revision(record).await.unwrap();
  }

  // Concurrent edits: `b` updates, then `a` deletes a little later.
  b.update(vec![t.clone().into()]).await.unwrap();
  tokio::time::sleep(std::time::Duration::from_millis(5)).await;
  a.delete(vec![t.clone().into()]).await.unwrap();

  let since = a.knowledge_vector().await.unwrap();
  for record in b.compute_revisions(&since).await.unwrap() {
    a.merge_revision(record).await.unwrap();
  }

  // The tombstone outranks b's update, so the task reads as deleted and
  // writes treat it the same way.
  assert!(a.fetch(&Query::new(EntityKind::Task)).await.unwrap().is_empty());
  let err = a.update(vec![t.clone().into()]).await.unwrap_err();
  assert!(matches!(err, CoreError::NotFound { kind: EntityKind::Task, .. }));
  let err = a.delete(vec![t.into()]).await.unwrap_err();
  assert!(matches!(err, CoreError::NotFound { .. }));

  let revived = a.add(vec![task("t").into()]).await.unwrap();
  assert_eq!(revived[0].version().previous_version_uuids.len(), 2);
  assert_eq!(a.fetch(&Query::new(EntityKind::Task)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn export_advances_clock_past_exported_records() {
  let s = store().await;
  s.add(vec![Patient::new("p1", "Ada", "Lovelace").into()])
    .await
    .unwrap();

  let exported = s.export_revisions(&KnowledgeVector::new()).await.unwrap();
  let handed_off = exported.last().map(|r| r.knowledge_vector.clone()).unwrap();
  assert_eq!(s.knowledge_vector().await.unwrap().counter(s.clock_id()), 2);

  let later = s
    .add(vec![Patient::new("p2", "Grace", "Hopper").into()])
    .await
    .unwrap();
  let stamp = later[0].version().stamp.unwrap();
  assert!(!handed_off.covers(stamp));

  let pending = s.compute_revisions(&handed_off).await.unwrap();
  let found = entities(&pending);
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].id(), "p2");
}

// ─── Live queries ────────────────────────────────────────────────────────────

#[tokio::test]
async fn stream_emits_snapshot_after_each_write() {
  let s = store().await;
  let mut live = s.stream(&Query::new(EntityKind::Patient));

  let initial = live.next().await.unwrap().unwrap();
  assert!(initial.is_empty());

  s.add(vec![Patient::new("p1", "Ada", "Lovelace").into()])
    .await
    .unwrap();
  let after_add = live.next().await.unwrap().unwrap();
  assert_eq!(after_add.len(), 1);

  s.delete(vec![Patient::new("p1", "Ada", "Lovelace").into()])
    .await
    .unwrap();
  let after_delete = live.next().await.unwrap().unwrap();
  assert!(after_delete.is_empty());
}

#[tokio::test]
async fn stream_ignores_other_kinds() {
  let s = store().await;
  let mut live = s.stream(&Query::new(EntityKind::Patient));
  live.next().await.unwrap().unwrap();

  s.add(vec![task("a").into()]).await.unwrap();
  s.add(vec![Patient::new("p1", "Ada", "Lovelace").into()])
    .await
    .unwrap();

  // The task write does not produce a snapshot of its own.
  let next = live.next().await.unwrap().unwrap();
  assert_eq!(next.len(), 1);
  assert_eq!(next[0].kind(), EntityKind::Patient);
}

#[tokio::test]
async fn stream_reflects_merged_revisions() {
  let s = store().await;
  let mut live = s.stream(&Query::new(EntityKind::Contact));
  live.next().await.unwrap().unwrap();

  let c1 = ClockId::new();
  s.merge_revision(RevisionRecord::new(
    vec![foreign(Contact::new("c", "Grace", "Hopper", None), c1, 1)],
    KnowledgeVector::from_entries([(c1, 1)]),
  ))
  .await
  .unwrap();

  let next = live.next().await.unwrap().unwrap();
  assert_eq!(next.len(), 1);
}

// ─── Configuration ───────────────────────────────────────────────────────────

#[tokio::test]
async fn configured_kinds_drive_ownership() {
  let s = SqliteStore::open_with_config(
    StoreConfig::default()
      .with_name("patients")
      .with_kinds([EntityKind::Patient]),
  )
  .await
  .unwrap();

  assert_eq!(s.name(), "patients");
  assert!(s.should_handle(&Query::new(EntityKind::Patient)));
  assert!(!s.should_handle(&Query::new(EntityKind::Contact)));

  let patient: Entity = Patient::new("p", "a", "b").into();
  let contact: Entity = Contact::new("c", "a", "b", None).into();
  assert!(s.should_handle_writing(&patient));
  assert!(!s.should_handle_writing(&contact));
}

#[tokio::test]
async fn default_config_handles_everything() {
  let s = store().await;
  let contact: Entity = Contact::new("c", "a", "b", None).into();
  assert!(s.should_handle(&Query::new(EntityKind::Outcome)));
  assert!(s.should_handle_writing(&contact));
}

#[test]
fn config_loads_from_file() {
  let path = std::env::temp_dir().join(format!("careplan-{}.toml", Uuid::new_v4()));
  std::fs::write(
    &path,
    "name = \"phone\"\nkinds = [\"patient\", \"care_plan\"]\nchange_buffer = 8\n",
  )
  .unwrap();

  let config = StoreConfig::load(Some(path.as_path())).unwrap();
  std::fs::remove_file(&path).ok();

  assert_eq!(config.name, "phone");
  assert_eq!(config.kinds, vec![EntityKind::Patient, EntityKind::CarePlan]);
  assert_eq!(config.change_buffer, 8);
  assert!(config.path.is_none());
}

#[tokio::test]
async fn clock_survives_reopen() {
  let path = std::env::temp_dir().join(format!("careplan-{}.db", Uuid::new_v4()));

  let first = SqliteStore::open(&path).await.unwrap();
  let clock = first.clock_id();
  first.add(vec![task("a").into()]).await.unwrap();
  first.increment_clock().await.unwrap();
  drop(first);

  let second = SqliteStore::open(&path).await.unwrap();
  assert_eq!(second.clock_id(), clock);
  assert_eq!(second.knowledge_vector().await.unwrap().counter(clock), 2);
  assert_eq!(
    second.fetch(&Query::new(EntityKind::Task)).await.unwrap().len(),
    1
  );

  drop(second);
  for suffix in ["", "-wal", "-shm"] {
    let mut file = path.clone().into_os_string();
    file.push(suffix);
    std::fs::remove_file(file).ok();
  }
}
