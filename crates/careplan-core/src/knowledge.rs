//! Knowledge vectors — the vector clocks that drive revision computation.
//!
//! Every store owns one clock. A vector maps each clock it has heard from to
//! the highest counter observed for that clock, so it expresses "everything
//! I have seen so far".

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ─── ClockId ─────────────────────────────────────────────────────────────────

/// Opaque identifier for one independent writer (a store or a device).
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
  Deserialize,
)]
#[serde(transparent)]
pub struct ClockId(Uuid);

impl ClockId {
  /// Mint a fresh, globally unique clock.
  pub fn new() -> Self { Self(Uuid::new_v4()) }

  pub fn from_uuid(id: Uuid) -> Self { Self(id) }

  pub fn as_uuid(&self) -> Uuid { self.0 }
}

impl Default for ClockId {
  fn default() -> Self { Self::new() }
}

impl fmt::Display for ClockId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

// ─── ClockStamp ──────────────────────────────────────────────────────────────

/// The `(clock, counter)` pair recorded on every stored version. Versions
/// written in the same local transaction share a stamp.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
  Deserialize,
)]
pub struct ClockStamp {
  pub clock:   ClockId,
  pub counter: u64,
}

impl ClockStamp {
  pub fn new(clock: ClockId, counter: u64) -> Self { Self { clock, counter } }
}

// ─── KnowledgeVector ─────────────────────────────────────────────────────────

/// A mapping from clock to logical timestamp.
///
/// Counters of zero are never stored, so a missing entry and a zero entry are
/// indistinguishable and the derived `Eq`/`Ord` stay consistent with
/// [`KnowledgeVector::counter`]. The derived ordering compares the sorted
/// `(clock, counter)` entries lexicographically.
#[derive(
  Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
)]
#[serde(transparent)]
pub struct KnowledgeVector {
  clocks: BTreeMap<ClockId, u64>,
}

impl KnowledgeVector {
  pub fn new() -> Self { Self::default() }

  /// Build a vector from explicit entries. Zero counters are dropped.
  pub fn from_entries(
    entries: impl IntoIterator<Item = (ClockId, u64)>,
  ) -> Self {
    let mut vector = Self::new();
    for (clock, counter) in entries {
      vector.observe(ClockStamp::new(clock, counter));
    }
    vector
  }

  /// The counter for `clock`, or 0 if the clock has never been seen.
  pub fn counter(&self, clock: ClockId) -> u64 {
    self.clocks.get(&clock).copied().unwrap_or(0)
  }

  /// Advance `clock` by one and return the new counter.
  pub fn increment(&mut self, clock: ClockId) -> u64 {
    let counter = self.clocks.entry(clock).or_insert(0);
    *counter += 1;
    *counter
  }

  /// Pointwise maximum with `other`.
  pub fn merge(&mut self, other: &KnowledgeVector) {
    for (&clock, &counter) in &other.clocks {
      self.observe(ClockStamp::new(clock, counter));
    }
  }

  /// Non-mutating form of [`merge`](Self::merge).
  pub fn merged(&self, other: &KnowledgeVector) -> KnowledgeVector {
    let mut out = self.clone();
    out.merge(other);
    out
  }

  /// Raise a single clock to at least `stamp.counter`.
  pub fn observe(&mut self, stamp: ClockStamp) {
    if stamp.counter == 0 {
      return;
    }
    let counter = self.clocks.entry(stamp.clock).or_insert(0);
    *counter = (*counter).max(stamp.counter);
  }

  /// True when `stamp` happened at or before what this vector has seen.
  pub fn covers(&self, stamp: ClockStamp) -> bool {
    stamp.counter <= self.counter(stamp.clock)
  }

  /// True when, for every clock in `other`, this vector's counter is at
  /// least as large.
  pub fn dominates(&self, other: &KnowledgeVector) -> bool {
    other
      .clocks
      .iter()
      .all(|(&clock, &counter)| self.counter(clock) >= counter)
  }

  pub fn is_empty(&self) -> bool { self.clocks.is_empty() }

  /// Entries in clock order.
  pub fn iter(&self) -> impl Iterator<Item = ClockStamp> + '_ {
    self
      .clocks
      .iter()
      .map(|(&clock, &counter)| ClockStamp::new(clock, counter))
  }
}

impl<'de> Deserialize<'de> for KnowledgeVector {
  fn deserialize<D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Self, D::Error> {
    BTreeMap::<ClockId, u64>::deserialize(deserializer).map(Self::from_entries)
  }
}

impl FromIterator<(ClockId, u64)> for KnowledgeVector {
  fn from_iter<T: IntoIterator<Item = (ClockId, u64)>>(iter: T) -> Self {
    Self::from_entries(iter)
  }
}
