//! Groups deduplicated items into labelled events.

use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use curator_shared::{
    ClusterConfig, ClusterRef, ContentItem, CuratorError, Degradation, Result, Stage, SummarizationService,
    TimeBudget, types::truncate_chars,
};

use crate::dbscan::{self, DbscanParams, PointLabel};

/// One finished event group.
#[derive(Debug, Clone, Serialize)]
pub struct EventCluster {
    pub cluster_id: String,
    pub label: String,
    /// Member item ids, highest score first.
    pub member_ids: Vec<String>,
    pub representative_title: String,
    pub size: usize,
    pub avg_score: f64,
    pub max_score: f64,
    /// True when `label` is the truncated representative title.
    pub fallback_label: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClusterStats {
    pub input: usize,
    pub clusters: usize,
    pub clustered_items: usize,
    pub noise: usize,
    /// Items without an embedding that bypassed the algorithm.
    pub skipped: usize,
    pub label_fallbacks: usize,
    pub events: Vec<EventCluster>,
    pub degradations: Vec<Degradation>,
}

#[derive(Debug)]
pub struct ClusterOutcome {
    pub items: Vec<ContentItem>,
    pub stats: ClusterStats,
}

pub struct ClusterEngine {
    config: ClusterConfig,
    summarizer: Option<Arc<dyn SummarizationService>>,
    max_concurrency: usize,
}

impl ClusterEngine {
    pub fn new(
        config: ClusterConfig,
        summarizer: Option<Arc<dyn SummarizationService>>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            config,
            summarizer,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Annotate every item with cluster membership or noise.
    ///
    /// Output order: embedded items in input order, then items that had no
    /// embedding (marked noise and skipped).
    #[instrument(skip_all, fields(input = items.len()))]
    pub async fn run(&self, items: Vec<ContentItem>, budget: &TimeBudget) -> ClusterOutcome {
        let mut stats = ClusterStats {
            input: items.len(),
            ..Default::default()
        };

        let (mut valid, mut skipped): (Vec<ContentItem>, Vec<ContentItem>) = items
            .into_iter()
            .partition(|item| item.embedding.as_ref().is_some_and(|e| !e.is_empty()));

        for item in &mut skipped {
            item.cluster = None;
            item.is_noise = true;
            item.clustering_skipped = true;
        }
        stats.skipped = skipped.len();

        if valid.len() < self.config.min_pts.max(1) {
            info!(valid = valid.len(), "not enough embedded items to cluster");
            for item in &mut valid {
                item.cluster = None;
                item.is_noise = true;
            }
            stats.noise = valid.len();
            valid.extend(skipped);
            return ClusterOutcome { items: valid, stats };
        }

        let labels = {
            let points: Vec<&[f32]> = valid
                .iter()
                .map(|item| item.embedding.as_deref().unwrap_or_default())
                .collect();
            dbscan::dbscan(&points, &DbscanParams::from(&self.config))
        };

        // Member indices per cluster, in cluster creation order.
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for (idx, label) in labels.iter().enumerate() {
            if let PointLabel::Cluster(c) = *label {
                if groups.len() <= c {
                    groups.resize_with(c + 1, Vec::new);
                }
                groups[c].push(idx);
            }
        }
        for group in &mut groups {
            // Stable: equal scores keep input order.
            group.sort_by(|a, b| valid[*b].total_score().total_cmp(&valid[*a].total_score()));
        }

        let events = self.label_clusters(&valid, &groups, budget, &mut stats).await;

        for (group, event) in groups.iter().zip(&events) {
            for (rank, &idx) in group.iter().enumerate() {
                let item = &mut valid[idx];
                item.is_noise = false;
                item.cluster = Some(ClusterRef {
                    cluster_id: event.cluster_id.clone(),
                    label: event.label.clone(),
                    size: event.size,
                    avg_score: event.avg_score,
                    is_representative: rank == 0,
                });
            }
        }
        for (item, label) in valid.iter_mut().zip(&labels) {
            if !matches!(label, PointLabel::Cluster(_)) {
                item.cluster = None;
                item.is_noise = true;
                stats.noise += 1;
            }
        }

        stats.clusters = events.len();
        stats.clustered_items = events.iter().map(|e| e.size).sum();
        stats.events = events;
        info!(
            clusters = stats.clusters,
            clustered = stats.clustered_items,
            noise = stats.noise,
            skipped = stats.skipped,
            "clustering complete"
        );

        valid.extend(skipped);
        ClusterOutcome { items: valid, stats }
    }

    async fn label_clusters(
        &self,
        items: &[ContentItem],
        groups: &[Vec<usize>],
        budget: &TimeBudget,
        stats: &mut ClusterStats,
    ) -> Vec<EventCluster> {
        let labels: Vec<Option<String>> = futures::stream::iter(groups.iter().enumerate())
            .map(|(idx, group)| async move {
                let titles: Vec<String> = group.iter().map(|&i| items[i].title.clone()).collect();
                match self.summarize(&titles, idx, budget).await {
                    Ok(label) => Some(label),
                    Err(e) => {
                        debug!(cluster = idx, error = %e, "label generation failed");
                        None
                    }
                }
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut events = Vec::with_capacity(groups.len());
        for (group, label) in groups.iter().zip(labels) {
            let scores: Vec<f64> = group.iter().map(|&i| items[i].total_score()).collect();
            let representative = &items[group[0]];
            let fallback_label = label.is_none();
            let label = label.unwrap_or_else(|| self.fallback_label(&representative.title));

            events.push(EventCluster {
                cluster_id: format!("evt_{}", Uuid::now_v7().simple()),
                label,
                member_ids: group.iter().map(|&i| items[i].id.clone()).collect(),
                representative_title: representative.title.clone(),
                size: group.len(),
                avg_score: scores.iter().sum::<f64>() / scores.len() as f64,
                max_score: scores.iter().copied().fold(f64::MIN, f64::max),
                fallback_label,
            });
        }

        stats.label_fallbacks = events.iter().filter(|e| e.fallback_label).count();
        if stats.label_fallbacks > 0 {
            let reason = if self.summarizer.is_some() {
                format!("{} cluster labels fell back to titles", stats.label_fallbacks)
            } else {
                "no summarization service configured; labels use titles".to_string()
            };
            warn!(fallbacks = stats.label_fallbacks, "cluster labels degraded");
            stats.degradations.push(Degradation::new(Stage::Cluster, reason));
        }
        events
    }

    async fn summarize(&self, titles: &[String], idx: usize, budget: &TimeBudget) -> Result<String> {
        let summarizer = self
            .summarizer
            .as_ref()
            .ok_or_else(|| CuratorError::config("no summarization service"))?;
        budget.check(&format!("label for cluster {idx}"))?;
        let label = summarizer.summarize(titles).await?;
        let label = label.trim();
        if label.is_empty() {
            return Err(CuratorError::data("empty cluster label"));
        }
        Ok(label.to_string())
    }

    fn fallback_label(&self, title: &str) -> String {
        let limit = self.config.label_fallback_chars;
        if title.chars().count() > limit {
            format!("{}...", truncate_chars(title, limit))
        } else {
            title.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use curator_shared::{ScoreVector, SourceClass};

    struct JoinSummarizer;

    #[async_trait]
    impl SummarizationService for JoinSummarizer {
        async fn summarize(&self, titles: &[String]) -> Result<String> {
            Ok(format!("Event: {}", titles.len()))
        }
    }

    struct BrokenSummarizer;

    #[async_trait]
    impl SummarizationService for BrokenSummarizer {
        async fn summarize(&self, _titles: &[String]) -> Result<String> {
            Err(CuratorError::Service("HTTP 400".into()))
        }
    }

    fn item(n: usize, embedding: Option<Vec<f32>>, score: Option<f64>) -> ContentItem {
        let mut item = ContentItem::new(
            format!("https://news.test/{n}"),
            format!("A rather long headline number {n} about an event"),
            "Feed",
            SourceClass::Feed,
        );
        item.embedding = embedding;
        if let Some(total) = score {
            let mut s = ScoreVector::from_dimensions(0.0, 0.0, 0.0, 0.0, "news", "");
            s.total = total;
            item.score = Some(s);
        }
        item
    }

    fn engine(summarizer: Option<Arc<dyn SummarizationService>>) -> ClusterEngine {
        ClusterEngine::new(ClusterConfig::default(), summarizer, 4)
    }

    #[tokio::test]
    async fn clusters_are_labelled_and_ordered_by_score() {
        let items = vec![
            item(0, Some(vec![1.0, 0.0, 0.0]), Some(10.0)),
            item(1, Some(vec![0.0, 1.0, 0.0]), None),
            item(2, Some(vec![0.98, 0.05, 0.0]), Some(20.0)),
            item(3, None, None),
        ];
        let outcome = engine(Some(Arc::new(JoinSummarizer)))
            .run(items, &TimeBudget::unlimited())
            .await;

        let urls: Vec<&str> = outcome.items.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://news.test/0", "https://news.test/1", "https://news.test/2", "https://news.test/3"]
        );

        let first = outcome.items[0].cluster.as_ref().expect("clustered");
        let third = outcome.items[2].cluster.as_ref().expect("clustered");
        assert_eq!(first.cluster_id, third.cluster_id);
        assert_eq!(first.label, "Event: 2");
        assert_eq!(first.size, 2);
        assert!((first.avg_score - 15.0).abs() < 1e-9);
        assert!(third.is_representative);
        assert!(!first.is_representative);

        assert!(outcome.items[1].is_noise);
        assert!(outcome.items[3].clustering_skipped);
        assert_eq!(outcome.stats.clusters, 1);
        assert_eq!(outcome.stats.noise, 1);
        assert_eq!(outcome.stats.skipped, 1);
        assert_eq!(outcome.stats.events[0].max_score, 20.0);
        assert!(outcome.stats.degradations.is_empty());
    }

    #[tokio::test]
    async fn skipped_items_follow_embedded_items() {
        let items = vec![
            item(0, None, None),
            item(1, Some(vec![1.0, 0.0]), None),
            item(2, Some(vec![1.0, 0.01]), None),
        ];
        let outcome = engine(None).run(items, &TimeBudget::unlimited()).await;
        assert_eq!(outcome.items[2].url, "https://news.test/0");
        assert!(outcome.items[2].clustering_skipped);
    }

    #[tokio::test]
    async fn failed_labels_fall_back_to_truncated_title() {
        let items = vec![
            item(0, Some(vec![1.0, 0.0]), None),
            item(1, Some(vec![1.0, 0.02]), None),
        ];
        let outcome = engine(Some(Arc::new(BrokenSummarizer)))
            .run(items, &TimeBudget::unlimited())
            .await;

        let cluster = outcome.items[0].cluster.as_ref().unwrap();
        assert_eq!(cluster.label, "A rather long headline number ...");
        assert!(cluster.is_representative);
        assert_eq!(outcome.stats.label_fallbacks, 1);
        assert_eq!(outcome.stats.degradations[0].stage, Stage::Cluster);
    }

    #[tokio::test]
    async fn too_few_points_are_all_noise() {
        let items = vec![item(0, Some(vec![1.0, 0.0]), None), item(1, None, None)];
        let outcome = engine(None).run(items, &TimeBudget::unlimited()).await;
        assert!(outcome.items.iter().all(|i| i.is_noise && i.cluster.is_none()));
        assert_eq!(outcome.stats.clusters, 0);
        assert!(outcome.items[1].clustering_skipped);
    }

    #[tokio::test]
    async fn max_cluster_size_is_respected() {
        let config = ClusterConfig {
            max_cluster_size: 5,
            ..Default::default()
        };
        let items = (0..10)
            .map(|n| item(n, Some(vec![1.0, n as f32 * 0.001]), None))
            .collect();
        let outcome = ClusterEngine::new(config, None, 2)
            .run(items, &TimeBudget::unlimited())
            .await;
        assert!(outcome.stats.events.iter().all(|e| e.size <= 5));
        assert_eq!(outcome.stats.clustered_items, 10);
    }
}
