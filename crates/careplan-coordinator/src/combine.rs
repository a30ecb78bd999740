//! Merging live query results from several stores into one ordered stream.

use futures::{
  StreamExt as _,
  stream::{self, BoxStream, SelectAll},
};

use tracing::trace;

use careplan_core::{
  Entity, Result,
  query::{SortDescriptor, compare_entities},
  store::EntityStream,
};

/// The sorted union of one snapshot per source, given in source order.
///
/// Entities the descriptors cannot tell apart are ordered by source index,
/// then by version uuid, so the output is fully determined by the input.
pub fn merge_snapshots<'a>(
  snapshots: impl IntoIterator<Item = &'a [Entity]>,
  sort: &[SortDescriptor],
) -> Vec<Entity> {
  let mut tagged: Vec<(usize, &Entity)> = snapshots
    .into_iter()
    .enumerate()
    .flat_map(|(source, snapshot)| snapshot.iter().map(move |e| (source, e)))
    .collect();

  tagged.sort_by(|(sa, a), (sb, b)| {
    compare_entities(a, b, sort)
      .then(sa.cmp(sb))
      .then_with(|| a.uuid().cmp(&b.uuid()))
  });

  tagged.into_iter().map(|(_, e)| e.clone()).collect()
}

type Tagged = BoxStream<'static, (usize, Result<Vec<Entity>>)>;

struct Combiner {
  sources: SelectAll<Tagged>,
  latest:  Vec<Option<Vec<Entity>>>,
  sort:    Vec<SortDescriptor>,
}

impl Combiner {
  /// `None` until every source has reported at least once.
  fn snapshot(&self) -> Option<Vec<Entity>> {
    if self.latest.iter().any(Option::is_none) {
      return None;
    }
    Some(merge_snapshots(
      self.latest.iter().flatten().map(Vec::as_slice),
      &self.sort,
    ))
  }
}

/// Merge live streams into one that re-emits the full sorted union whenever
/// any source emits.
///
/// Nothing is emitted until every source has produced its first snapshot.
/// The first error from any source is forwarded and ends the stream. The
/// stream ends once every source has ended. With no sources at all, a single
/// empty snapshot is emitted.
pub fn combine_many(
  sources: Vec<EntityStream>,
  sort: Vec<SortDescriptor>,
) -> EntityStream {
  if sources.is_empty() {
    return stream::once(async { Ok(Vec::new()) }).boxed();
  }

  let latest = vec![None; sources.len()];
  let sources = stream::select_all(sources.into_iter().enumerate().map(
    |(index, source)| -> Tagged { source.map(move |item| (index, item)).boxed() },
  ));
  let combiner = Combiner { sources, latest, sort };

  stream::unfold(Some(combiner), |state| async move {
    let Some(mut combiner) = state else { return None };
    loop {
      let Some((index, item)) = combiner.sources.next().await else {
        return None;
      };
      match item {
        Ok(snapshot) => {
          combiner.latest[index] = Some(snapshot);
          if let Some(merged) = combiner.snapshot() {
            trace!(source = index, entities = merged.len(), "combined snapshot");
            return Some((Ok(merged), Some(combiner)));
          }
        }
        Err(e) => {
          trace!(source = index, error = %e, "source failed");
          return Some((Err(e), None));
        }
      }
    }
  })
  .boxed()
}
