//! Recency merge between the ephemeral and durable copies of each state kind.
//!
//! Collisions resolve to the most recent timestamp.

use std::collections::BTreeMap;

use curator_shared::{EmbeddingRecord, FeedbackRecord, FeedbackState, LearnedWeights, SeenUrls};

/// Union of both maps; a URL present in both keeps the later timestamp.
pub fn merge_urls(local: SeenUrls, durable: SeenUrls) -> SeenUrls {
    let mut merged = durable;
    for (url, seen_at) in local {
        merged
            .entry(url)
            .and_modify(|existing| *existing = (*existing).max(seen_at))
            .or_insert(seen_at);
    }
    merged
}

/// Most recent record per id, returned oldest first.
pub fn merge_embeddings(
    local: Vec<EmbeddingRecord>,
    durable: Vec<EmbeddingRecord>,
) -> Vec<EmbeddingRecord> {
    let mut by_id: BTreeMap<String, EmbeddingRecord> = BTreeMap::new();
    for record in durable.into_iter().chain(local) {
        match by_id.get(&record.id) {
            Some(existing) if existing.timestamp_ms > record.timestamp_ms => {}
            _ => {
                by_id.insert(record.id.clone(), record);
            }
        }
    }
    let mut merged: Vec<EmbeddingRecord> = by_id.into_values().collect();
    merged.sort_by_key(|r| r.timestamp_ms);
    merged
}

fn merge_history(local: Vec<FeedbackRecord>, durable: Vec<FeedbackRecord>) -> Vec<FeedbackRecord> {
    let mut by_id: BTreeMap<String, FeedbackRecord> = BTreeMap::new();
    for record in durable.into_iter().chain(local) {
        match by_id.get(&record.id) {
            Some(existing) if existing.timestamp_ms > record.timestamp_ms => {}
            _ => {
                by_id.insert(record.id.clone(), record);
            }
        }
    }
    let mut merged: Vec<FeedbackRecord> = by_id.into_values().collect();
    merged.sort_by_key(|r| r.timestamp_ms);
    merged
}

/// The weights with the newer `updated_at` win; ties go to the higher version.
pub fn merge_weights(local: LearnedWeights, durable: LearnedWeights) -> LearnedWeights {
    let local_key = (local.updated_at.unwrap_or(i64::MIN), local.version);
    let durable_key = (durable.updated_at.unwrap_or(i64::MIN), durable.version);
    if local_key >= durable_key { local } else { durable }
}

pub fn merge_feedback(local: FeedbackState, durable: FeedbackState) -> FeedbackState {
    FeedbackState {
        feedback_history: merge_history(local.feedback_history, durable.feedback_history),
        learned_weights: merge_weights(local.learned_weights, durable.learned_weights),
    }
}
