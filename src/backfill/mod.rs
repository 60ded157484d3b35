//! Backfill coordinator (C6, §4.6).

pub mod coordinator;
pub mod intervals;

pub use coordinator::{BackfillCoordinator, Pair};
