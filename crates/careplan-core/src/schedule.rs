//! Task schedules.
//!
//! A schedule is a set of repeating elements. Occurrences of all elements are
//! merged in time order and numbered from 0; an outcome refers to one of them
//! by that index.

use std::cmp::Ordering;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// One repeating component of a [`Schedule`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleElement {
  pub start:         DateTime<Utc>,
  /// Exclusive. `None` repeats forever.
  pub end:           Option<DateTime<Utc>>,
  /// Seconds between occurrences; 0 means a single occurrence at `start`.
  pub interval_secs: u64,
  pub text:          Option<String>,
}

impl ScheduleElement {
  pub fn new(
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    interval_secs: u64,
  ) -> Self {
    Self { start, end, interval_secs, text: None }
  }

  /// The start of this element's `n`-th occurrence, if it exists.
  pub fn nth(&self, n: u64) -> Option<DateTime<Utc>> {
    let at = if self.interval_secs == 0 {
      (n == 0).then_some(self.start)?
    } else {
      let offset = n.checked_mul(self.interval_secs)?;
      let delta = TimeDelta::try_seconds(i64::try_from(offset).ok()?)?;
      self.start.checked_add_signed(delta)?
    };
    match self.end {
      Some(end) if at >= end => None,
      _ => Some(at),
    }
  }

  /// Total number of occurrences, `None` when the element repeats forever.
  fn len(&self) -> Option<u64> {
    match self.end {
      Some(end) if end <= self.start => Some(0),
      Some(end) if self.interval_secs > 0 => Some(self.raw_count(end, false)),
      Some(_) => Some(1),
      None if self.interval_secs == 0 => Some(1),
      None => None,
    }
  }

  /// Occurrences starting before `at` (or at `at`, when `inclusive`),
  /// ignoring `end`.
  fn raw_count(&self, at: DateTime<Utc>, inclusive: bool) -> u64 {
    let elapsed = at - self.start;
    let zero = TimeDelta::zero();
    if elapsed < zero || (!inclusive && elapsed == zero) {
      return 0;
    }
    if self.interval_secs == 0 {
      return 1;
    }
    let secs = u64::try_from(elapsed.num_seconds()).unwrap_or(0);
    let whole = secs / self.interval_secs;
    let exact = secs % self.interval_secs == 0 && elapsed.subsec_nanos() == 0;
    if !inclusive && exact { whole } else { whole + 1 }
  }

  fn count(&self, at: DateTime<Utc>, inclusive: bool) -> u64 {
    let raw = self.raw_count(at, inclusive);
    self.len().map_or(raw, |len| raw.min(len))
  }
}

/// The recurrence rule of a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
  pub elements: Vec<ScheduleElement>,
}

impl Schedule {
  pub fn new(elements: Vec<ScheduleElement>) -> Self { Self { elements } }

  /// A single event at `at`.
  pub fn once(at: DateTime<Utc>) -> Self {
    Self::new(vec![ScheduleElement::new(at, None, 0)])
  }

  /// One event per day starting at `start`, forever or until `end`.
  pub fn daily(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Self {
    Self::new(vec![ScheduleElement::new(start, end, SECONDS_PER_DAY)])
  }

  /// The start of the `index`-th occurrence across all elements, or `None`
  /// when the schedule has fewer occurrences.
  ///
  /// Simultaneous occurrences from different elements count separately and
  /// are ordered by element position.
  pub fn occurrence(&self, index: u32) -> Option<DateTime<Utc>> {
    let target = u64::from(index);
    if let [only] = self.elements.as_slice() {
      return only.nth(target);
    }

    // Every occurrence has a distinct position in the merged order, which
    // grows with `n` within one element. Search each element for the
    // occurrence sitting exactly at `target`.
    for (pos, element) in self.elements.iter().enumerate() {
      let mut lo = 0;
      let mut hi = element.len().map_or(target + 1, |len| len.min(target + 1));
      while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let Some(at) = element.nth(mid) else {
          hi = mid;
          continue;
        };
        match self.position(pos, mid, at).cmp(&target) {
          Ordering::Equal => return Some(at),
          Ordering::Less => lo = mid + 1,
          Ordering::Greater => hi = mid,
        }
      }
    }
    None
  }

  /// Merged-order position of element `pos`'s `n`-th occurrence at `at`.
  fn position(&self, pos: usize, n: u64, at: DateTime<Utc>) -> u64 {
    self
      .elements
      .iter()
      .enumerate()
      .filter(|&(i, _)| i != pos)
      .fold(n, |acc, (i, e)| acc.saturating_add(e.count(at, i < pos)))
  }

  pub fn has_occurrence(&self, index: u32) -> bool {
    self.occurrence(index).is_some()
  }
}
