//! Two-tier duplicate filtering: exact URL against the persisted seen-URL
//! map, then cosine similarity of embeddings against stored history and
//! the current batch.

mod engine;
pub mod semantic;
pub mod url;

pub use engine::{DedupEngine, DedupOutcome, DedupStats};
pub use semantic::DuplicateMatch;
