//! Observability values returned by stages and combined by the caller.

use serde::{Deserialize, Serialize};

/// Pipeline stage a degradation or count belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Store,
    Dedup,
    Cluster,
    Ranking,
    Feedback,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Store => "store",
            Self::Dedup => "dedup",
            Self::Cluster => "cluster",
            Self::Ranking => "ranking",
            Self::Feedback => "feedback",
        };
        f.write_str(name)
    }
}

/// A condition that made a stage produce a reduced but still usable result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Degradation {
    pub stage: Stage,
    pub reason: String,
}

impl Degradation {
    pub fn new(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for Degradation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.stage, self.reason)
    }
}
