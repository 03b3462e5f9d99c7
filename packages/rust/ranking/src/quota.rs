//! Candidate selection before scoring: class quota, then per-handle buckets.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use curator_shared::{ContentItem, RankingConfig};

/// Slots granted to each source class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPlan {
    pub social: usize,
    pub syndicated: usize,
}

impl QuotaPlan {
    pub fn total(&self) -> usize {
        self.social + self.syndicated
    }
}

/// Split `min(budget, available)` slots between the classes.
///
/// The social share is `round(slots * ratio)`; whichever class cannot fill
/// its share hands the shortfall to the other.
pub fn plan_quota(budget: usize, ratio: f64, social_available: usize, syndicated_available: usize) -> QuotaPlan {
    let slots = budget.min(social_available + syndicated_available);
    let ratio = if ratio.is_finite() { ratio.clamp(0.0, 1.0) } else { 0.4 };

    let mut social = social_available.min((slots as f64 * ratio).round() as usize);
    let syndicated = syndicated_available.min(slots - social);
    if syndicated < slots - social {
        social = social_available.min(slots - syndicated);
    }
    QuotaPlan { social, syndicated }
}

/// Bucket cap for a social handle.
pub fn bucket_cap(source: &str, config: &RankingConfig) -> usize {
    if config.research_sources.iter().any(|s| s == source) {
        config.research_bucket_cap
    } else if config.applied_sources.iter().any(|s| s == source) {
        config.applied_bucket_cap
    } else {
        config.default_bucket_cap
    }
}

/// Syndicated order: tier priority, then newest first; undated items last.
fn syndicated_order(a: &ContentItem, b: &ContentItem) -> Ordering {
    b.tier
        .priority()
        .cmp(&a.tier.priority())
        .then_with(|| b.published_at.cmp(&a.published_at))
}

/// Indices into the engagement-sorted `social` list, at most `quota` of them.
fn pick_social(social: &[ContentItem], quota: usize, config: &RankingConfig) -> Vec<usize> {
    // Buckets keyed by handle, in order of each handle's best item.
    let mut bucket_order: Vec<&str> = Vec::new();
    let mut buckets: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, item) in social.iter().enumerate() {
        let key = if item.source.is_empty() { "X" } else { item.source.as_str() };
        buckets
            .entry(key)
            .or_insert_with(|| {
                bucket_order.push(key);
                Vec::new()
            })
            .push(idx);
    }

    let mut picked: Vec<usize> = Vec::new();
    let mut picked_set: HashSet<usize> = HashSet::new();
    'buckets: for key in &bucket_order {
        let cap = bucket_cap(key, config);
        for &idx in buckets[key].iter().take(cap) {
            if picked.len() >= quota {
                break 'buckets;
            }
            if picked_set.insert(idx) {
                picked.push(idx);
            }
        }
    }
    // Top up from the engagement order when the caps left slots unused.
    for idx in 0..social.len() {
        if picked.len() >= quota {
            break;
        }
        if picked_set.insert(idx) {
            picked.push(idx);
        }
    }
    picked
}

#[derive(Debug)]
pub struct Selection {
    /// Social picks first, then syndicated.
    pub items: Vec<ContentItem>,
    pub plan: QuotaPlan,
    pub social_available: usize,
    pub syndicated_available: usize,
}

/// Pick the items that will be sent for scoring.
pub fn select_candidates(items: Vec<ContentItem>, config: &RankingConfig) -> Selection {
    let (mut social, mut syndicated): (Vec<ContentItem>, Vec<ContentItem>) =
        items.into_iter().partition(|item| item.source_class.is_social());

    social.sort_by(|a, b| b.engagement().total_cmp(&a.engagement()));
    syndicated.sort_by(syndicated_order);

    let social_available = social.len();
    let syndicated_available = syndicated.len();
    let plan = plan_quota(config.max_items, config.social_ratio, social_available, syndicated_available);

    let picked = pick_social(&social, plan.social, config);

    let mut social_slots: Vec<Option<ContentItem>> = social.into_iter().map(Some).collect();
    let mut selected: Vec<ContentItem> = picked
        .into_iter()
        .filter_map(|idx| social_slots[idx].take())
        .collect();
    selected.extend(syndicated.into_iter().take(plan.syndicated));

    Selection {
        items: selected,
        plan,
        social_available,
        syndicated_available,
    }
}
