//! Store traits.
//!
//! Backends implement [`ReadableStore`] (and [`WritableStore`] when they
//! accept writes) so the coordinator can hold a heterogeneous list of them
//! behind `Arc<dyn …>`. [`RevisionStore`] is implemented by stores that take
//! part in synchronization; it is only ever used generically.

use std::future::Future;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::{
  Result,
  entity::Entity,
  knowledge::KnowledgeVector,
  query::Query,
  revision::RevisionRecord,
};

/// A live query: the first item is the current result, and a fresh full
/// snapshot follows every relevant change. An `Err` item is terminal.
pub type EntityStream = BoxStream<'static, Result<Vec<Entity>>>;

// ─── Reads ───────────────────────────────────────────────────────────────────

#[async_trait]
pub trait ReadableStore: Send + Sync {
  /// Human-readable name, used in logs.
  fn name(&self) -> &str;

  /// Whether this store has results for `query`. Must be cheap and free of
  /// side effects.
  fn should_handle(&self, query: &Query) -> bool {
    let _ = query;
    true
  }

  /// One-shot fetch of the current result.
  async fn fetch(&self, query: &Query) -> Result<Vec<Entity>>;

  /// Live variant of [`fetch`](Self::fetch). Dropping the stream ends the
  /// subscription.
  fn stream(&self, query: &Query) -> EntityStream;
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Batch writes are all-or-nothing within one store.
#[async_trait]
pub trait WritableStore: ReadableStore {
  /// Whether this store owns `entity` for writing. Must be cheap and free of
  /// side effects.
  fn should_handle_writing(&self, entity: &Entity) -> bool {
    let _ = entity;
    true
  }

  /// Insert first versions. Returns the stored versions.
  async fn add(&self, entities: Vec<Entity>) -> Result<Vec<Entity>>;

  /// Append a new version to each entity's chain, matched by kind and `id`.
  async fn update(&self, entities: Vec<Entity>) -> Result<Vec<Entity>>;

  /// Append a tombstone version to each entity's chain. Returns the
  /// tombstones.
  async fn delete(&self, entities: Vec<Entity>) -> Result<Vec<Entity>>;
}

// ─── Revisions ───────────────────────────────────────────────────────────────

/// A store that can export and import its history as revision records.
pub trait RevisionStore: Send + Sync {
  /// Everything this store has seen.
  fn knowledge_vector(
    &self,
  ) -> impl Future<Output = Result<KnowledgeVector>> + Send + '_;

  /// Every version produced after `since`, grouped by clock stamp and
  /// ordered by `(clock, counter)`. Read-only; safe to retry.
  fn compute_revisions<'a>(
    &'a self,
    since: &'a KnowledgeVector,
  ) -> impl Future<Output = Result<Vec<RevisionRecord>>> + Send + 'a;

  /// [`compute_revisions`](Self::compute_revisions) and
  /// [`increment_clock`](Self::increment_clock) as one atomic step. Local
  /// writes that land afterwards carry a counter the returned records do not
  /// cover, so they are picked up by the next exchange.
  fn export_revisions<'a>(
    &'a self,
    since: &'a KnowledgeVector,
  ) -> impl Future<Output = Result<Vec<RevisionRecord>>> + Send + 'a;

  /// Apply a record produced elsewhere and merge its knowledge vector.
  fn merge_revision(
    &self,
    record: RevisionRecord,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Advance this store's own clock so later local writes are
  /// distinguishable from what has already been handed off. Returns the new
  /// vector.
  fn increment_clock(
    &self,
  ) -> impl Future<Output = Result<KnowledgeVector>> + Send + '_;
}
