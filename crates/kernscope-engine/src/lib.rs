//! Analysis engines over kernel CI result history.
//!
//! Three cooperating, stateless components, each consuming the same
//! [`DocumentStore`](kernscope_store::DocumentStore) seam:
//!
//! - [`RegressionIndex`] tracks per-lane failure history.
//! - [`BisectionEngine`] walks a lane's history backward to the last
//!   known-good result.
//! - [`DeltaEngine`] computes cached symmetric differences between
//!   result sets.
//!
//! Components never call each other and hold no mutable state beyond
//! the injected store handle; every invocation is pure given the
//! current store contents and ends in a single whole-document upsert.

pub mod bisect;
pub(crate) mod common;
pub mod delta;
pub mod errors;
pub mod regression;

pub use bisect::BisectionEngine;
pub use delta::{DeltaEngine, DeltaKind, DeltaRequest, Selector};
pub use errors::{EngineError, Result};
pub use regression::RegressionIndex;
