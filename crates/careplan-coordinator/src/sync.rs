//! Two-way exchange of revision records between a pair of stores.

use tracing::info;

use careplan_core::{Result, store::RevisionStore};

/// Entity versions moved in each direction by [`synchronize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
  pub pulled: usize,
  pub pushed: usize,
}

async fn transfer<F, T>(from: &F, to: &T) -> Result<usize>
where
  F: RevisionStore,
  T: RevisionStore,
{
  let since = to.knowledge_vector().await?;
  let mut moved = 0;
  for record in from.export_revisions(&since).await? {
    moved += record.entities.len();
    to.merge_revision(record).await?;
  }
  Ok(moved)
}

/// Pull everything `local` has not seen from `remote`, then push everything
/// `remote` has not seen from `local`.
///
/// Each side advances its clock in the same transaction that reads its
/// outgoing revisions, so a write racing the exchange is stamped past what
/// the other side now covers and travels with the next run. A second run
/// with no writes in between moves nothing.
pub async fn synchronize<L, R>(local: &L, remote: &R) -> Result<SyncSummary>
where
  L: RevisionStore,
  R: RevisionStore,
{
  let pulled = transfer(remote, local).await?;
  let pushed = transfer(local, remote).await?;

  info!(pulled, pushed, "synchronized stores");
  Ok(SyncSummary { pulled, pushed })
}
