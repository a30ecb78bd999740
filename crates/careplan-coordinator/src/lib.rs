//! Coordination across several care-plan stores.
//!
//! [`StoreCoordinator`] presents a set of independently owned stores as one:
//! queries fan out and come back as a single sorted result, writes go to the
//! one store that owns them. [`synchronize`] exchanges history between two
//! stores that implement [`RevisionStore`](careplan_core::store::RevisionStore).

pub mod combine;
pub mod coordinator;
pub mod sync;

pub use combine::{combine_many, merge_snapshots};
pub use coordinator::StoreCoordinator;
pub use sync::{SyncSummary, synchronize};
