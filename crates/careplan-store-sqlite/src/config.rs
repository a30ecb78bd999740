//! Runtime configuration for [`SqliteStore`](crate::SqliteStore).
//!
//! Values come from an optional TOML file, then `CAREPLAN_*` environment
//! variables, later sources overriding earlier ones:
//!
//! ```toml
//! name          = "phone"
//! path          = "careplan.db"
//! kinds         = ["patient", "care_plan"]
//! change_buffer = 64
//! ```

use std::path::{Path, PathBuf};

use careplan_core::{entity::EntityKind, query::Query, Entity};
use serde::Deserialize;

use crate::Result;

pub const ENV_PREFIX: &str = "CAREPLAN";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  /// Shown in logs and used when the coordinator reports routing failures.
  pub name:          String,
  /// Database file. `None` opens an in-memory database.
  pub path:          Option<PathBuf>,
  /// Kinds this store answers queries for and accepts writes of. Empty
  /// means every kind.
  pub kinds:         Vec<EntityKind>,
  /// Capacity of the change-notification channel behind live streams.
  pub change_buffer: usize,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      name:          "sqlite".to_owned(),
      path:          None,
      kinds:         Vec::new(),
      change_buffer: 64,
    }
  }
}

impl StoreConfig {
  /// Read `file` (if given and present) and overlay the environment.
  pub fn load(file: Option<&Path>) -> Result<Self> {
    let mut builder = config::Config::builder();
    if let Some(file) = file {
      builder = builder.add_source(config::File::from(file).required(false));
    }
    let settings = builder
      .add_source(
        config::Environment::with_prefix(ENV_PREFIX)
          .try_parsing(true)
          .list_separator(",")
          .with_list_parse_key("kinds"),
      )
      .build()?;
    Ok(settings.try_deserialize()?)
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
    self.path = Some(path.into());
    self
  }

  pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = EntityKind>) -> Self {
    self.kinds = kinds.into_iter().collect();
    self
  }

  pub fn handles_kind(&self, kind: EntityKind) -> bool {
    self.kinds.is_empty() || self.kinds.contains(&kind)
  }

  pub fn handles_query(&self, query: &Query) -> bool {
    self.handles_kind(query.kind)
  }

  pub fn handles_entity(&self, entity: &Entity) -> bool {
    self.handles_kind(entity.kind())
  }
}
