//! Core types and trait definitions for the care-plan store.
//!
//! This crate is deliberately free of database and runtime dependencies.
//! Backends and the coordinator depend on it; it depends on nothing of
//! theirs.

pub mod entity;
pub mod error;
pub mod knowledge;
pub mod query;
pub mod revision;
pub mod schedule;
pub mod store;

pub use entity::{Entity, EntityKind};
pub use error::{Error, Result};
pub use knowledge::{ClockId, ClockStamp, KnowledgeVector};
pub use query::{Query, SortDescriptor, SortKey};
pub use revision::RevisionRecord;
