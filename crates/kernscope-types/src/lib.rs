//! Shared data model for kernel CI result analysis.
//!
//! Pure data types used by the store and engine crates. Kept in a leaf
//! crate so both can share them without circular dependencies.

pub mod key;
pub mod record;
pub mod result;

pub use key::{sanitize_key, LaneKey};
pub use record::{
    BisectKind, BisectRecord, DeltaCacheEntry, DeltaPair, DeltaRecord, FleetCompareBlock,
    FleetSummary, RegressionAggregate, RegressionRecord, RegressionTracker,
};
pub use result::{ResultDocument, ResultId, ResultStatus};
