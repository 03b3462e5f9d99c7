//! Density-based grouping of near-duplicate items into labelled events.

pub mod dbscan;
mod engine;

pub use dbscan::{DbscanParams, PointLabel, dbscan};
pub use engine::{ClusterEngine, ClusterOutcome, ClusterStats, EventCluster};
