//! Error type for `careplan-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Domain failures (missing entities, broken references, ...).
  #[error("core error: {0}")]
  Core(#[from] careplan_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// Raised by statements run inside a connection callback.
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("configuration error: {0}")]
  Config(#[from] config::ConfigError),

  #[error("store metadata is missing {0:?}")]
  MissingMetadata(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Domain errors pass through unchanged; everything else is an opaque
/// backend failure to callers of the store traits.
impl From<Error> for careplan_core::Error {
  fn from(value: Error) -> Self {
    match value {
      Error::Core(e) => e,
      other => careplan_core::Error::Store(Box::new(other)),
    }
  }
}
