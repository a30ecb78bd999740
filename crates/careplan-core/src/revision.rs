//! Revision records, the unit of exchange between synchronizing stores.
//!
//! A record is a batch of entity versions that were produced under a single
//! clock stamp, plus the knowledge vector reached once the batch (and every
//! record before it in the same computation) has been applied.

use serde::{Deserialize, Serialize};

use crate::{entity::Entity, knowledge::KnowledgeVector};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionRecord {
  /// Versions in the order they were written. Tombstones are included as
  /// ordinary versions with `deleted_date` set.
  pub entities:         Vec<Entity>,
  pub knowledge_vector: KnowledgeVector,
}

impl RevisionRecord {
  pub fn new(entities: Vec<Entity>, knowledge_vector: KnowledgeVector) -> Self {
    Self { entities, knowledge_vector }
  }

  pub fn is_empty(&self) -> bool { self.entities.is_empty() }

  pub fn tombstones(&self) -> impl Iterator<Item = &Entity> {
    self.entities.iter().filter(|e| e.is_tombstone())
  }
}
