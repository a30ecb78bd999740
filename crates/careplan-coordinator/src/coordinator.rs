//! [`StoreCoordinator`] — fans queries out over every store that can answer
//! them and routes each write batch to the one store that owns it.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use careplan_core::{
  Entity, Error, Result,
  entity::{CarePlan, Contact, EntityKind, Outcome, Patient, Task},
  query::Query,
  store::{EntityStream, ReadableStore, WritableStore},
};

use crate::combine::combine_many;

struct Registered {
  reader: Arc<dyn ReadableStore>,
  /// `None` for stores attached read-only.
  writer: Option<Arc<dyn WritableStore>>,
}

/// Stores in registration order. Earlier writable stores take priority when
/// more than one claims an entity.
#[derive(Default)]
pub struct StoreCoordinator {
  stores: Vec<Registered>,
}

impl StoreCoordinator {
  pub fn new() -> Self { Self::default() }

  /// Register a store for both reads and writes.
  pub fn attach<S>(mut self, store: Arc<S>) -> Self
  where
    S: WritableStore + 'static,
  {
    self.stores.push(Registered {
      reader: store.clone(),
      writer: Some(store),
    });
    self
  }

  /// Register a store that only ever answers queries.
  pub fn attach_read_only<S>(mut self, store: Arc<S>) -> Self
  where
    S: ReadableStore + 'static,
  {
    self.stores.push(Registered { reader: store, writer: None });
    self
  }

  /// Read-only stores first, then writable ones, each in registration order.
  fn readers(&self) -> impl Iterator<Item = &Arc<dyn ReadableStore>> {
    let read_only = self.stores.iter().filter(|s| s.writer.is_none());
    let writable = self.stores.iter().filter(|s| s.writer.is_some());
    read_only.chain(writable).map(|s| &s.reader)
  }

  fn writers(&self) -> impl Iterator<Item = &Arc<dyn WritableStore>> {
    self.stores.iter().filter_map(|s| s.writer.as_ref())
  }

  fn handlers<'a>(
    &'a self,
    query: &'a Query,
  ) -> impl Iterator<Item = &'a Arc<dyn ReadableStore>> {
    self.readers().filter(move |s| s.should_handle(query))
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  /// Live, sorted union of every interested store's results.
  pub fn stream(&self, query: &Query) -> EntityStream {
    let sources: Vec<EntityStream> =
      self.handlers(query).map(|s| s.stream(query)).collect();
    debug!(kind = %query.kind, sources = sources.len(), "streaming query");
    combine_many(sources, query.sort_descriptors())
  }

  /// Ask every interested store once. Results are concatenated in store
  /// order; if any store fails, the first failure in that order is returned
  /// after all fetches have finished.
  pub async fn fetch(&self, query: &Query) -> Result<Vec<Entity>> {
    let handlers: Vec<_> = self.handlers(query).collect();
    debug!(kind = %query.kind, sources = handlers.len(), "fetching query");

    let results = join_all(handlers.iter().map(|s| s.fetch(query))).await;

    let mut entities = Vec::new();
    for (store, result) in handlers.iter().zip(results) {
      match result {
        Ok(found) => entities.extend(found),
        Err(e) => {
          warn!(store = store.name(), error = %e, "fetch failed");
          return Err(e);
        }
      }
    }
    Ok(entities)
  }

  async fn fetch_kind<T>(
    &self,
    kind: EntityKind,
    extract: fn(Entity) -> Option<T>,
  ) -> Result<Vec<T>> {
    let entities = self.fetch(&Query::new(kind)).await?;
    Ok(entities.into_iter().filter_map(extract).collect())
  }

  pub async fn patients(&self) -> Result<Vec<Patient>> {
    self
      .fetch_kind(EntityKind::Patient, |e| match e {
        Entity::Patient(p) => Some(p),
        _ => None,
      })
      .await
  }

  pub async fn care_plans(&self) -> Result<Vec<CarePlan>> {
    self
      .fetch_kind(EntityKind::CarePlan, |e| match e {
        Entity::CarePlan(p) => Some(p),
        _ => None,
      })
      .await
  }

  pub async fn tasks(&self) -> Result<Vec<Task>> {
    self
      .fetch_kind(EntityKind::Task, |e| match e {
        Entity::Task(t) => Some(t),
        _ => None,
      })
      .await
  }

  pub async fn contacts(&self) -> Result<Vec<Contact>> {
    self
      .fetch_kind(EntityKind::Contact, |e| match e {
        Entity::Contact(c) => Some(c),
        _ => None,
      })
      .await
  }

  pub async fn outcomes(&self) -> Result<Vec<Outcome>> {
    self
      .fetch_kind(EntityKind::Outcome, |e| match e {
        Entity::Outcome(o) => Some(o),
        _ => None,
      })
      .await
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  /// The one writable store that owns every entity in the batch.
  ///
  /// Each entity belongs to the first writable store that claims it. The
  /// batch is rejected unless all entities are claimed, and by the same
  /// store.
  fn owner(&self, entities: &[Entity]) -> Result<&Arc<dyn WritableStore>> {
    let writers: Vec<_> = self.writers().collect();
    let owners: Vec<usize> = entities
      .iter()
      .filter_map(|e| writers.iter().position(|w| w.should_handle_writing(e)))
      .collect();

    let Some(&first) = owners.first() else {
      return Err(Error::NoStoreForAny);
    };
    if owners.len() < entities.len() {
      return Err(Error::NoStoreForSome {
        unclaimed: entities.len() - owners.len(),
        total:     entities.len(),
      });
    }
    if owners.iter().any(|&o| o != first) {
      return Err(Error::MixedOwnership);
    }
    Ok(writers[first])
  }

  fn route(&self, op: &str, entities: &[Entity]) -> Result<&Arc<dyn WritableStore>> {
    match self.owner(entities) {
      Ok(store) => {
        debug!(op, store = store.name(), count = entities.len(), "routing write");
        Ok(store)
      }
      Err(e) => {
        warn!(op, count = entities.len(), error = %e, "rejected write batch");
        Err(e)
      }
    }
  }

  pub async fn add(&self, entities: Vec<Entity>) -> Result<Vec<Entity>> {
    self.route("add", &entities)?.add(entities).await
  }

  pub async fn update(&self, entities: Vec<Entity>) -> Result<Vec<Entity>> {
    self.route("update", &entities)?.update(entities).await
  }

  pub async fn delete(&self, entities: Vec<Entity>) -> Result<Vec<Entity>> {
    self.route("delete", &entities)?.delete(entities).await
  }
}
