//! Embedding-similarity pass against history and the current batch.

use curator_shared::{
    ContentItem, DedupStatus, EmbeddingRecord, MS_PER_DAY, cosine_similarity, types::truncate_chars,
};
use serde::Serialize;

/// Characters of the title kept on a stored embedding record.
const RECORD_TITLE_CHARS: usize = 80;

/// Why one item was dropped as a semantic duplicate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateMatch {
    pub title: String,
    pub similarity: f64,
    pub similar_to: String,
}

#[derive(Debug, Default)]
pub struct SemanticPassOutcome {
    /// Accepted items, input order preserved.
    pub unique: Vec<ContentItem>,
    pub duplicates: Vec<DuplicateMatch>,
    /// Records for accepted items, to be appended to the store.
    pub new_records: Vec<EmbeddingRecord>,
}

pub fn purge_expired_embeddings(
    records: &mut Vec<EmbeddingRecord>,
    expiry_days: u32,
    now_ms: i64,
) -> usize {
    let cutoff = now_ms - i64::from(expiry_days) * MS_PER_DAY;
    let before = records.len();
    records.retain(|r| r.timestamp_ms >= cutoff);
    before - records.len()
}

/// Keep the newest `max` records.
pub fn evict_oldest_embeddings(records: &mut Vec<EmbeddingRecord>, max: usize) -> usize {
    if records.len() <= max {
        return 0;
    }
    records.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
    let evicted = records.len() - max;
    records.truncate(max);
    records.reverse();
    evicted
}

/// Highest similarity to any record, stopping at the first that meets `threshold`.
fn best_match<'a>(
    embedding: &[f32],
    records: impl Iterator<Item = &'a EmbeddingRecord>,
    threshold: f64,
) -> (f64, Option<&'a EmbeddingRecord>) {
    let mut best = (0.0, None);
    for record in records {
        let similarity = cosine_similarity(embedding, &record.embedding);
        if similarity > best.0 {
            best = (similarity, Some(record));
        }
        if similarity >= threshold {
            return (similarity, Some(record));
        }
    }
    best
}

/// Compare each embedded item against `history`, then against items accepted
/// earlier in this batch. Items without an embedding pass as
/// [`DedupStatus::UrlOnly`].
pub fn semantic_pass(
    items: Vec<ContentItem>,
    history: &[EmbeddingRecord],
    threshold: f64,
    now_ms: i64,
) -> SemanticPassOutcome {
    let mut outcome = SemanticPassOutcome::default();

    for mut item in items {
        let Some(embedding) = item.embedding.as_deref() else {
            item.dedup = DedupStatus::UrlOnly;
            outcome.unique.push(item);
            continue;
        };

        let (mut similarity, mut matched) = best_match(embedding, history.iter(), threshold);
        if similarity < threshold {
            let (batch_similarity, batch_match) =
                best_match(embedding, outcome.new_records.iter(), threshold);
            if batch_similarity > similarity {
                similarity = batch_similarity;
                matched = batch_match;
            }
        }

        if similarity >= threshold {
            tracing::debug!(title = %item.title, similarity, "semantic duplicate");
            outcome.duplicates.push(DuplicateMatch {
                title: truncate_chars(&item.title, 50),
                similarity,
                similar_to: matched.map(|r| r.title.clone()).unwrap_or_default(),
            });
            continue;
        }

        let record = EmbeddingRecord {
            id: item.id.clone(),
            embedding: embedding.to_vec(),
            title: truncate_chars(&item.title, RECORD_TITLE_CHARS),
            timestamp_ms: now_ms,
        };
        item.dedup = DedupStatus::Unique;
        outcome.new_records.push(record);
        outcome.unique.push(item);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use curator_shared::SourceClass;

    const NOW: i64 = 1_750_000_000_000;

    fn embedded(url: &str, embedding: Vec<f32>) -> ContentItem {
        let mut item = ContentItem::new(url, url, "src", SourceClass::Feed);
        item.embedding = Some(embedding);
        item
    }

    fn record(id: &str, embedding: Vec<f32>, ts: i64) -> EmbeddingRecord {
        EmbeddingRecord {
            id: id.into(),
            embedding,
            title: id.into(),
            timestamp_ms: ts,
        }
    }

    #[test]
    fn identical_items_in_one_batch_keep_the_first() {
        let items = vec![
            embedded("https://a.test/1", vec![1.0, 0.0, 0.2]),
            embedded("https://a.test/2", vec![1.0, 0.0, 0.2]),
            embedded("https://a.test/3", vec![1.0, 0.0, 0.2]),
        ];
        let outcome = semantic_pass(items, &[], 0.85, NOW);
        assert_eq!(outcome.unique.len(), 1);
        assert_eq!(outcome.unique[0].url, "https://a.test/1");
        assert_eq!(outcome.duplicates.len(), 2);
        assert_eq!(outcome.new_records.len(), 1);
        assert_eq!(outcome.duplicates[0].similar_to, "https://a.test/1");
    }

    #[test]
    fn history_match_drops_item() {
        let history = vec![record("old", vec![0.0, 1.0], NOW - 1000)];
        let outcome = semantic_pass(
            vec![embedded("https://a.test/1", vec![0.05, 1.0]), embedded("https://a.test/2", vec![1.0, 0.0])],
            &history,
            0.85,
            NOW,
        );
        assert_eq!(outcome.duplicates.len(), 1);
        assert_eq!(outcome.duplicates[0].similar_to, "old");
        assert_eq!(outcome.unique.len(), 1);
        assert_eq!(outcome.unique[0].dedup, DedupStatus::Unique);
    }

    #[test]
    fn threshold_is_inclusive() {
        // Axis-aligned unit vectors give a similarity of exactly 1.0.
        let history = vec![record("h", vec![1.0, 0.0], NOW)];
        let outcome = semantic_pass(vec![embedded("https://a.test", vec![1.0, 0.0])], &history, 1.0, NOW);
        assert!(outcome.unique.is_empty());
        assert_eq!(outcome.duplicates[0].similarity, 1.0);
    }

    #[test]
    fn items_without_embedding_pass_url_only() {
        let item = ContentItem::new("https://a.test", "t", "src", SourceClass::Feed);
        let outcome = semantic_pass(vec![item], &[], 0.85, NOW);
        assert_eq!(outcome.unique[0].dedup, DedupStatus::UrlOnly);
        assert!(outcome.new_records.is_empty());
    }

    #[test]
    fn eviction_keeps_newest() {
        let mut records = vec![record("a", vec![1.0], 1), record("b", vec![1.0], 3), record("c", vec![1.0], 2)];
        assert_eq!(evict_oldest_embeddings(&mut records, 2), 1);
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);
    }

    #[test]
    fn expired_records_are_purged() {
        let mut records = vec![record("old", vec![1.0], NOW - 8 * MS_PER_DAY), record("new", vec![1.0], NOW)];
        assert_eq!(purge_expired_embeddings(&mut records, 7, NOW), 1);
        assert_eq!(records.len(), 1);
    }
}
