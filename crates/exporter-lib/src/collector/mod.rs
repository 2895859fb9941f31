//! Collection and aggregation engine
//!
//! One cycle per scrape: authenticate, read the inventory, fetch alarms per
//! cluster, fold everything into a [`CycleSnapshot`](crate::snapshot::CycleSnapshot).
//! Failures are absorbed here; a cycle always yields a snapshot.

mod engine;
mod fold;


pub use engine::{CollectionEngine, CollectionEngineBuilder, CycleConfig, CyclePhase};
pub use fold::{fold, Aggregate, AlarmCounts, ClusterOutcome, ClusterReport, Totals};
