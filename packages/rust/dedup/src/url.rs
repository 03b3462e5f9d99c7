//! Exact-URL pass against the persisted seen-URL map.

use curator_shared::{ContentItem, DedupConfig, MS_PER_DAY, SeenUrls};

/// Result of one URL pass.
#[derive(Debug, Default)]
pub struct UrlPassOutcome {
    pub unique: Vec<ContentItem>,
    pub duplicates: usize,
    /// Entries purged for age before filtering.
    pub expired: usize,
    /// Entries evicted to get back under the size cap.
    pub evicted: usize,
}

/// Drop entries first seen more than `expiry_days` ago. Returns how many.
pub fn purge_expired_urls(seen: &mut SeenUrls, expiry_days: u32, now_ms: i64) -> usize {
    let cutoff = now_ms - i64::from(expiry_days) * MS_PER_DAY;
    let before = seen.len();
    seen.retain(|_, first_seen| *first_seen >= cutoff);
    before - seen.len()
}

/// Evict oldest-by-timestamp entries until at most `max` remain.
pub fn evict_oldest_urls(seen: &mut SeenUrls, max: usize) -> usize {
    if seen.len() <= max {
        return 0;
    }
    let mut by_age: Vec<(i64, String)> = seen.iter().map(|(url, ts)| (*ts, url.clone())).collect();
    by_age.sort();
    let excess = seen.len() - max;
    for (_, url) in by_age.into_iter().take(excess) {
        seen.remove(&url);
    }
    excess
}

/// Reject items whose URL is already known; record the rest as seen at `now_ms`.
///
/// A URL repeated within `items` is accepted once.
pub fn url_pass(
    items: Vec<ContentItem>,
    seen: &mut SeenUrls,
    config: &DedupConfig,
    now_ms: i64,
) -> UrlPassOutcome {
    let mut outcome = UrlPassOutcome {
        expired: purge_expired_urls(seen, config.url_expiry_days, now_ms),
        ..Default::default()
    };

    for item in items {
        let url = item.url.trim();
        if url.is_empty() {
            // Nothing to key on; let the semantic pass judge it.
            outcome.unique.push(item);
            continue;
        }
        if seen.contains_key(url) {
            outcome.duplicates += 1;
            continue;
        }
        seen.insert(url.to_string(), now_ms);
        outcome.unique.push(item);
    }

    outcome.evicted = evict_oldest_urls(seen, config.max_urls);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use curator_shared::SourceClass;

    const NOW: i64 = 1_750_000_000_000;

    fn item(url: &str) -> ContentItem {
        ContentItem::new(url, format!("title for {url}"), "src", SourceClass::Feed)
    }

    #[test]
    fn rerun_with_seen_urls_yields_nothing_new() {
        let config = DedupConfig::default();
        let mut seen = SeenUrls::new();
        let batch = || vec![item("https://a.test/1"), item("https://a.test/2")];

        let first = url_pass(batch(), &mut seen, &config, NOW);
        assert_eq!(first.unique.len(), 2);

        let second = url_pass(batch(), &mut seen, &config, NOW + 1000);
        assert!(second.unique.is_empty());
        assert_eq!(second.duplicates, 2);
    }

    #[test]
    fn repeated_url_in_one_batch_is_accepted_once() {
        let mut seen = SeenUrls::new();
        let outcome = url_pass(
            vec![item("https://a.test/x"), item("https://a.test/x")],
            &mut seen,
            &DedupConfig::default(),
            NOW,
        );
        assert_eq!(outcome.unique.len(), 1);
        assert_eq!(outcome.duplicates, 1);
    }

    #[test]
    fn expired_entries_are_purged_before_filtering() {
        let mut seen = SeenUrls::new();
        seen.insert("https://old.test".into(), NOW - 8 * MS_PER_DAY);
        seen.insert("https://recent.test".into(), NOW - MS_PER_DAY);

        let outcome = url_pass(
            vec![item("https://old.test"), item("https://recent.test")],
            &mut seen,
            &DedupConfig::default(),
            NOW,
        );
        assert_eq!(outcome.expired, 1);
        assert_eq!(outcome.unique.len(), 1);
        assert_eq!(outcome.unique[0].url, "https://old.test");
        assert_eq!(seen["https://old.test"], NOW);
    }

    #[test]
    fn cap_evicts_oldest_first() {
        let config = DedupConfig {
            max_urls: 3,
            ..Default::default()
        };
        let mut seen = SeenUrls::new();
        seen.insert("https://a.test".into(), NOW - 3000);
        seen.insert("https://b.test".into(), NOW - 2000);
        seen.insert("https://c.test".into(), NOW - 1000);

        let outcome = url_pass(vec![item("https://d.test"), item("https://e.test")], &mut seen, &config, NOW);
        assert_eq!(outcome.evicted, 2);
        assert_eq!(seen.len(), 3);
        assert!(!seen.contains_key("https://a.test"));
        assert!(!seen.contains_key("https://b.test"));
        assert!(seen.contains_key("https://e.test"));
    }
}
