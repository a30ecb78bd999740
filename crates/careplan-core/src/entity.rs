//! Versioned entities: patients, care plans, tasks, contacts and outcomes.
//!
//! Every entity is one immutable *version* of a logical object. The logical
//! identity is the user-assigned `id`; each version has its own `uuid` and
//! links to its neighbours through `previous_version_uuids` and
//! `next_version_uuids`. Links are plain identifier lists resolved by lookup.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::{knowledge::ClockStamp, schedule::Schedule};

// ─── Kind ────────────────────────────────────────────────────────────────────

/// Discriminant of [`Entity`]; also the `kind` column in storage backends.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
  Patient,
  CarePlan,
  Task,
  Contact,
  Outcome,
}

// ─── Version header ──────────────────────────────────────────────────────────

/// A free-form note attached to any entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
  pub author:  Option<String>,
  pub title:   Option<String>,
  pub content: Option<String>,
}

/// Fields shared by every versioned entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
  /// Identifies this version only.
  pub uuid:                   Uuid,
  /// User-assigned identifier, stable across versions.
  pub id:                     String,
  #[serde(default)]
  pub previous_version_uuids: Vec<Uuid>,
  #[serde(default)]
  pub next_version_uuids:     Vec<Uuid>,
  pub effective_date:         DateTime<Utc>,
  /// Set on tombstone versions only.
  pub deleted_date:           Option<DateTime<Utc>>,
  /// Store-assigned on write.
  pub created_date:           Option<DateTime<Utc>>,
  /// Store-assigned on write.
  pub updated_date:           Option<DateTime<Utc>>,
  /// The clock and counter that produced this version. Store-assigned.
  pub stamp:                  Option<ClockStamp>,
  #[serde(default)]
  pub tags:                   Vec<String>,
  pub remote_id:              Option<String>,
  pub group_identifier:       Option<String>,
  #[serde(default)]
  pub notes:                  Vec<Note>,
}

impl Version {
  /// A fresh, unsaved first version effective now.
  pub fn new(id: impl Into<String>) -> Self {
    Self {
      uuid:                   Uuid::new_v4(),
      id:                     id.into(),
      previous_version_uuids: Vec::new(),
      next_version_uuids:     Vec::new(),
      effective_date:         Utc::now(),
      deleted_date:           None,
      created_date:           None,
      updated_date:           None,
      stamp:                  None,
      tags:                   Vec::new(),
      remote_id:              None,
      group_identifier:       None,
      notes:                  Vec::new(),
    }
  }

  pub fn is_tombstone(&self) -> bool { self.deleted_date.is_some() }
}

// ─── Shared value types ──────────────────────────────────────────────────────

/// A structured person name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonName {
  pub given:  Option<String>,
  pub family: Option<String>,
}

impl PersonName {
  pub fn new(given: impl Into<String>, family: impl Into<String>) -> Self {
    Self { given: Some(given.into()), family: Some(family.into()) }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
  Male,
  Female,
  Other,
}

/// A labelled contact method, e.g. `("work", "amy@example.com")`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledValue {
  pub label: String,
  pub value: String,
}

// ─── Patient ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
  #[serde(flatten)]
  pub version:   Version,
  pub name:      PersonName,
  pub sex:       Option<Sex>,
  pub birthday:  Option<NaiveDate>,
  #[serde(default)]
  pub allergies: Vec<String>,
}

impl Patient {
  pub fn new(
    id: impl Into<String>,
    given: impl Into<String>,
    family: impl Into<String>,
  ) -> Self {
    Self {
      version:   Version::new(id),
      name:      PersonName::new(given, family),
      sex:       None,
      birthday:  None,
      allergies: Vec::new(),
    }
  }
}

// ─── CarePlan ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarePlan {
  #[serde(flatten)]
  pub version:      Version,
  pub title:        String,
  /// Version uuid of the patient this plan belongs to.
  pub patient_uuid: Option<Uuid>,
}

impl CarePlan {
  pub fn new(
    id: impl Into<String>,
    title: impl Into<String>,
    patient_uuid: Option<Uuid>,
  ) -> Self {
    Self { version: Version::new(id), title: title.into(), patient_uuid }
  }
}

// ─── Task ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
  #[serde(flatten)]
  pub version:           Version,
  pub title:             Option<String>,
  pub instructions:      Option<String>,
  pub care_plan_uuid:    Option<Uuid>,
  pub schedule:          Schedule,
  #[serde(default = "default_true")]
  pub impacts_adherence: bool,
}

fn default_true() -> bool { true }

impl Task {
  pub fn new(
    id: impl Into<String>,
    title: Option<String>,
    care_plan_uuid: Option<Uuid>,
    schedule: Schedule,
  ) -> Self {
    Self {
      version: Version::new(id),
      title,
      instructions: None,
      care_plan_uuid,
      schedule,
      impacts_adherence: true,
    }
  }
}

// ─── Contact ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
  #[serde(flatten)]
  pub version:         Version,
  pub name:            PersonName,
  pub care_plan_uuid:  Option<Uuid>,
  pub organization:    Option<String>,
  pub title:           Option<String>,
  pub role:            Option<String>,
  #[serde(default)]
  pub email_addresses: Vec<LabeledValue>,
  #[serde(default)]
  pub phone_numbers:   Vec<LabeledValue>,
}

impl Contact {
  pub fn new(
    id: impl Into<String>,
    given: impl Into<String>,
    family: impl Into<String>,
    care_plan_uuid: Option<Uuid>,
  ) -> Self {
    Self {
      version: Version::new(id),
      name: PersonName::new(given, family),
      care_plan_uuid,
      organization: None,
      title: None,
      role: None,
      email_addresses: Vec::new(),
      phone_numbers: Vec::new(),
    }
  }
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// The payload of one outcome value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum OutcomeValueKind {
  Integer(i64),
  Double(f64),
  Boolean(bool),
  Text(String),
  Date(DateTime<Utc>),
}

/// A single recorded value, e.g. a temperature reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeValue {
  pub value:        OutcomeValueKind,
  pub units:        Option<String>,
  /// Free-text classifier, e.g. "systolic".
  pub kind:         Option<String>,
  pub created_date: DateTime<Utc>,
}

impl OutcomeValue {
  pub fn new(value: OutcomeValueKind) -> Self {
    Self { value, units: None, kind: None, created_date: Utc::now() }
  }
}

/// The recorded result of one occurrence of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
  #[serde(flatten)]
  pub version:               Version,
  /// Version uuid of the owning task.
  pub task_uuid:             Uuid,
  /// 0-based index into the task's schedule.
  pub task_occurrence_index: u32,
  #[serde(default)]
  pub values:                Vec<OutcomeValue>,
}

impl Outcome {
  /// Outcomes have no natural user-facing id, so a random one is assigned.
  pub fn new(
    task_uuid: Uuid,
    task_occurrence_index: u32,
    values: Vec<OutcomeValue>,
  ) -> Self {
    Self {
      version: Version::new(Uuid::new_v4().to_string()),
      task_uuid,
      task_occurrence_index,
      values,
    }
  }
}

// ─── Entity ──────────────────────────────────────────────────────────────────

/// Closed sum over every entity kind a store can hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Entity {
  Patient(Patient),
  CarePlan(CarePlan),
  Task(Task),
  Contact(Contact),
  Outcome(Outcome),
}

impl Entity {
  pub fn kind(&self) -> EntityKind {
    match self {
      Self::Patient(_) => EntityKind::Patient,
      Self::CarePlan(_) => EntityKind::CarePlan,
      Self::Task(_) => EntityKind::Task,
      Self::Contact(_) => EntityKind::Contact,
      Self::Outcome(_) => EntityKind::Outcome,
    }
  }

  pub fn version(&self) -> &Version {
    match self {
      Self::Patient(e) => &e.version,
      Self::CarePlan(e) => &e.version,
      Self::Task(e) => &e.version,
      Self::Contact(e) => &e.version,
      Self::Outcome(e) => &e.version,
    }
  }

  pub fn version_mut(&mut self) -> &mut Version {
    match self {
      Self::Patient(e) => &mut e.version,
      Self::CarePlan(e) => &mut e.version,
      Self::Task(e) => &mut e.version,
      Self::Contact(e) => &mut e.version,
      Self::Outcome(e) => &mut e.version,
    }
  }

  pub fn uuid(&self) -> Uuid { self.version().uuid }

  pub fn id(&self) -> &str { &self.version().id }

  pub fn is_tombstone(&self) -> bool { self.version().is_tombstone() }

  /// Version uuids this entity refers to, paired with the kind they must
  /// resolve to.
  pub fn references(&self) -> Vec<(EntityKind, Uuid)> {
    match self {
      Self::Patient(_) => Vec::new(),
      Self::CarePlan(p) => p
        .patient_uuid
        .map(|u| (EntityKind::Patient, u))
        .into_iter()
        .collect(),
      Self::Task(t) => t
        .care_plan_uuid
        .map(|u| (EntityKind::CarePlan, u))
        .into_iter()
        .collect(),
      Self::Contact(c) => c
        .care_plan_uuid
        .map(|u| (EntityKind::CarePlan, u))
        .into_iter()
        .collect(),
      Self::Outcome(o) => vec![(EntityKind::Task, o.task_uuid)],
    }
  }

  pub fn as_task(&self) -> Option<&Task> {
    match self {
      Self::Task(t) => Some(t),
      _ => None,
    }
  }

  pub fn as_outcome(&self) -> Option<&Outcome> {
    match self {
      Self::Outcome(o) => Some(o),
      _ => None,
    }
  }
}

impl From<Patient> for Entity {
  fn from(value: Patient) -> Self { Self::Patient(value) }
}

impl From<CarePlan> for Entity {
  fn from(value: CarePlan) -> Self { Self::CarePlan(value) }
}

impl From<Task> for Entity {
  fn from(value: Task) -> Self { Self::Task(value) }
}

impl From<Contact> for Entity {
  fn from(value: Contact) -> Self { Self::Contact(value) }
}

impl From<Outcome> for Entity {
  fn from(value: Outcome) -> Self { Self::Outcome(value) }
}
