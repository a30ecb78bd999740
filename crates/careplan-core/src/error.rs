//! Error types for `careplan-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::entity::EntityKind;

#[derive(Debug, Error)]
pub enum Error {
  #[error("{kind} not found: {id:?}")]
  NotFound { kind: EntityKind, id: String },

  #[error("{kind} already exists: {id:?}")]
  AlreadyExists { kind: EntityKind, id: String },

  #[error("referenced {kind} version not found: {uuid}")]
  MissingReference { kind: EntityKind, uuid: Uuid },

  #[error("invalid value: {0}")]
  InvalidValue(String),

  // ── Write routing ───────────────────────────────────────────────────────

  #[error("no store could be found for any of the entities")]
  NoStoreForAny,

  #[error("no store could be found for {unclaimed} of {total} entities")]
  NoStoreForSome { unclaimed: usize, total: usize },

  #[error("not all entities belong to the same store")]
  MixedOwnership,

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// A backend failure without a domain meaning (I/O, SQL, decoding).
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// True for the three write-routing rejections, which are raised before
  /// any store is touched.
  pub fn is_ownership(&self) -> bool {
    matches!(
      self,
      Self::NoStoreForAny | Self::NoStoreForSome { .. } | Self::MixedOwnership
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
