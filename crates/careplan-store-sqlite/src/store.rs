//! [`SqliteStore`] — the SQLite implementation of the care-plan store traits.

use std::{collections::BTreeSet, path::Path, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use futures::{StreamExt as _, stream};
use rusqlite::Connection;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info};

use careplan_core::{
  entity::{Entity, EntityKind},
  knowledge::{ClockId, KnowledgeVector},
  query::Query,
  revision::RevisionRecord,
  store::{EntityStream, ReadableStore, RevisionStore, WritableStore},
};

use crate::{
  Result,
  config::StoreConfig,
  revision::{merge_record, revisions_since},
  schema::SCHEMA,
  versions::{
    add_batch, delete_batch, ensure_clock, load_versions, local_stamp,
    read_vector, update_batch, write_vector,
  },
};

#[derive(Debug, Clone, Copy)]
enum WriteOp {
  Add,
  Update,
  Delete,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A care-plan store backed by a single SQLite file.
///
/// Cloning is cheap; clones share the connection, the clock and the change
/// channel behind live queries.
#[derive(Clone)]
pub struct SqliteStore {
  conn:    tokio_rusqlite::Connection,
  clock:   ClockId,
  config:  Arc<StoreConfig>,
  changes: broadcast::Sender<EntityKind>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` that handles every kind.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with_config(
      StoreConfig::default().with_path(path.as_ref().to_path_buf()),
    )
    .await
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    Self::open_with_config(StoreConfig::default()).await
  }

  pub async fn open_with_config(config: StoreConfig) -> Result<Self> {
    let conn = match &config.path {
      Some(path) => tokio_rusqlite::Connection::open(path).await?,
      None => tokio_rusqlite::Connection::open_in_memory().await?,
    };

    let clock = conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(ensure_clock(conn))
      })
      .await??;

    let (changes, _) = broadcast::channel(config.change_buffer.max(1));
    info!(store = %config.name, %clock, "opened sqlite store");

    Ok(Self { conn, clock, config: Arc::new(config), changes })
  }

  /// The clock this store stamps its own writes with.
  pub fn clock_id(&self) -> ClockId { self.clock }

  pub fn config(&self) -> &StoreConfig { &self.config }

  // ── Connection helpers ────────────────────────────────────────────────────

  async fn read<F, R>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&Connection) -> Result<R> + Send + 'static,
    R: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  /// Run `f` in a transaction, committing only if it succeeds.
  async fn transact<F, R>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&Connection) -> Result<R> + Send + 'static,
    R: Send + 'static,
  {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        match f(&tx) {
          Ok(value) => {
            tx.commit()?;
            Ok(Ok(value))
          }
          Err(e) => Ok(Err(e)),
        }
      })
      .await?
  }

  /// Wake live queries over each kind. Nobody listening is not an error.
  fn notify(&self, kinds: impl IntoIterator<Item = EntityKind>) {
    for kind in kinds {
      let _ = self.changes.send(kind);
    }
  }

  async fn query_versions(&self, query: Query) -> Result<Vec<Entity>> {
    self
      .read(move |conn| {
        let versions = if query.uuids.is_empty() {
          load_versions(conn, Some(query.kind), &query.ids)?
        } else {
          load_versions(conn, Some(query.kind), &[])?
        };
        Ok(query.evaluate(versions))
      })
      .await
  }

  async fn write(&self, op: WriteOp, entities: Vec<Entity>) -> Result<Vec<Entity>> {
    if entities.is_empty() {
      return Ok(entities);
    }
    let count = entities.len();
    let clock = self.clock;
    let now = Utc::now();

    let stored = self
      .transact(move |conn| {
        let stamp = local_stamp(conn, clock)?;
        match op {
          WriteOp::Add => add_batch(conn, entities, stamp, now),
          WriteOp::Update => update_batch(conn, entities, stamp, now),
          WriteOp::Delete => delete_batch(conn, entities, stamp, now),
        }
      })
      .await?;

    debug!(store = %self.config.name, ?op, count, "committed write batch");
    self.notify(stored.iter().map(Entity::kind).collect::<BTreeSet<_>>());
    Ok(stored)
  }
}

// ─── ReadableStore impl ──────────────────────────────────────────────────────

#[async_trait]
impl ReadableStore for SqliteStore {
  fn name(&self) -> &str { &self.config.name }

  fn should_handle(&self, query: &Query) -> bool {
    self.config.handles_query(query)
  }

  async fn fetch(&self, query: &Query) -> careplan_core::Result<Vec<Entity>> {
    Ok(self.query_versions(query.clone()).await?)
  }

  /// Subscribes before the first read so no commit can slip between the
  /// snapshot and the subscription. A lagging receiver re-reads once rather
  /// than once per missed notification.
  fn stream(&self, query: &Query) -> EntityStream {
    let state = (self.clone(), query.clone(), self.changes.subscribe(), true);

    stream::unfold(Some(state), |state| async move {
      let Some((store, query, mut changes, first)) = state else {
        return None;
      };

      if !first {
        loop {
          match changes.recv().await {
            Ok(kind) if kind == query.kind => break,
            Ok(_) => continue,
            Err(RecvError::Lagged(missed)) => {
              debug!(store = %store.config.name, missed, "live query lagged");
              break;
            }
            Err(RecvError::Closed) => return None,
          }
        }
      }

      match store.query_versions(query.clone()).await {
        Ok(snapshot) => Some((Ok(snapshot), Some((store, query, changes, false)))),
        Err(e) => Some((Err(careplan_core::Error::from(e)), None)),
      }
    })
    .boxed()
  }
}

// ─── WritableStore impl ──────────────────────────────────────────────────────

#[async_trait]
impl WritableStore for SqliteStore {
  fn should_handle_writing(&self, entity: &Entity) -> bool {
    self.config.handles_entity(entity)
  }

  async fn add(&self, entities: Vec<Entity>) -> careplan_core::Result<Vec<Entity>> {
    Ok(self.write(WriteOp::Add, entities).await?)
  }

  async fn update(
    &self,
    entities: Vec<Entity>,
  ) -> careplan_core::Result<Vec<Entity>> {
    Ok(self.write(WriteOp::Update, entities).await?)
  }

  async fn delete(
    &self,
    entities: Vec<Entity>,
  ) -> careplan_core::Result<Vec<Entity>> {
    Ok(self.write(WriteOp::Delete, entities).await?)
  }
}

// ─── RevisionStore impl ──────────────────────────────────────────────────────

impl RevisionStore for SqliteStore {
  async fn knowledge_vector(&self) -> careplan_core::Result<KnowledgeVector> {
    Ok(self.read(read_vector).await?)
  }

  async fn compute_revisions<'a>(
    &'a self,
    since: &'a KnowledgeVector,
  ) -> careplan_core::Result<Vec<RevisionRecord>> {
    let since = since.clone();
    let records = self.read(move |conn| revisions_since(conn, &since)).await?;
    debug!(
      store = %self.config.name,
      records = records.len(),
      "computed revisions"
    );
    Ok(records)
  }

  async fn export_revisions<'a>(
    &'a self,
    since: &'a KnowledgeVector,
  ) -> careplan_core::Result<Vec<RevisionRecord>> {
    let clock = self.clock;
    let since = since.clone();
    let (records, vector) = self
      .transact(move |conn| {
        let records = revisions_since(conn, &since)?;
        let mut vector = read_vector(conn)?;
        vector.increment(clock);
        write_vector(conn, &vector)?;
        Ok((records, vector))
      })
      .await?;
    debug!(
      store = %self.config.name,
      records = records.len(),
      counter = vector.counter(clock),
      "exported revisions"
    );
    Ok(records)
  }

  async fn merge_revision(
    &self,
    record: RevisionRecord,
  ) -> careplan_core::Result<()> {
    let clock = self.clock;
    let touched = self
      .transact(move |conn| merge_record(conn, clock, record))
      .await?;
    self.notify(touched);
    Ok(())
  }

  async fn increment_clock(&self) -> careplan_core::Result<KnowledgeVector> {
    let clock = self.clock;
    let vector = self
      .transact(move |conn| {
        let mut vector = read_vector(conn)?;
        vector.increment(clock);
        write_vector(conn, &vector)?;
        Ok(vector)
      })
      .await?;
    debug!(store = %self.config.name, counter = vector.counter(clock), "advanced clock");
    Ok(vector)
  }
}
