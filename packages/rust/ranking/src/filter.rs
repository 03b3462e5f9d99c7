//! Post-scoring filters: threshold, order, per-source cap.

use std::collections::HashMap;

use curator_shared::ContentItem;

/// Keep items whose total reaches `min_score`.
pub fn apply_threshold(items: Vec<ContentItem>, min_score: f64) -> Vec<ContentItem> {
    items
        .into_iter()
        .filter(|item| item.total_score() >= min_score)
        .collect()
}

/// Highest total first; ties keep their current order.
pub fn sort_by_total(items: &mut [ContentItem]) {
    items.sort_by(|a, b| b.total_score().total_cmp(&a.total_score()));
}

/// Walk a sorted list and skip items once their source has `cap` entries.
pub fn apply_source_cap(items: Vec<ContentItem>, cap: usize) -> Vec<ContentItem> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    items
        .into_iter()
        .filter(|item| {
            let source = if item.source.is_empty() { "unknown" } else { item.source.as_str() };
            let count = counts.entry(source.to_string()).or_insert(0);
            if *count >= cap {
                return false;
            }
            *count += 1;
            true
        })
        .collect()
}
