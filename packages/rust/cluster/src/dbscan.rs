//! DBSCAN over cosine distance, with a hard cap on cluster size.
//!
//! Assignment is deterministic for a fixed input order but not invariant
//! under permutation: a border point joins whichever cluster reaches it first.

use std::collections::{HashSet, VecDeque};

use curator_shared::{ClusterConfig, cosine_distance};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DbscanParams {
    /// Maximum cosine distance between neighbors.
    pub eps: f64,
    pub min_pts: usize,
    pub max_cluster_size: usize,
}

impl From<&ClusterConfig> for DbscanParams {
    fn from(config: &ClusterConfig) -> Self {
        Self {
            eps: config.eps,
            min_pts: config.min_pts,
            max_cluster_size: config.max_cluster_size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointLabel {
    Unvisited,
    Noise,
    /// Zero-based cluster index, in order of creation.
    Cluster(usize),
}

/// Indices of every other point within `eps`.
fn region_query(points: &[&[f32]], idx: usize, eps: f64) -> Vec<usize> {
    (0..points.len())
        .filter(|&other| other != idx && cosine_distance(points[idx], points[other]) <= eps)
        .collect()
}

/// Breadth-first absorption from a core point until the queue drains or
/// the cluster is full. Returns the final size.
fn expand_cluster(
    points: &[&[f32]],
    labels: &mut [PointLabel],
    seed: usize,
    neighbors: Vec<usize>,
    cluster: usize,
    params: &DbscanParams,
) -> usize {
    labels[seed] = PointLabel::Cluster(cluster);
    let mut size = 1;

    let mut queue: VecDeque<usize> = neighbors.into();
    let mut visited: HashSet<usize> = HashSet::from([seed]);
    let core_threshold = params.min_pts.saturating_sub(1);

    while size < params.max_cluster_size {
        let Some(current) = queue.pop_front() else {
            break;
        };
        if !visited.insert(current) {
            continue;
        }

        match labels[current] {
            // Border point: absorbed, never expanded from.
            PointLabel::Noise => {
                labels[current] = PointLabel::Cluster(cluster);
                size += 1;
            }
            PointLabel::Unvisited => {
                labels[current] = PointLabel::Cluster(cluster);
                size += 1;

                let next = region_query(points, current, params.eps);
                if next.len() >= core_threshold {
                    queue.extend(next.into_iter().filter(|n| !visited.contains(n)));
                }
            }
            PointLabel::Cluster(_) => {}
        }
    }

    size
}

/// Label every point as noise or a cluster member.
pub fn dbscan(points: &[&[f32]], params: &DbscanParams) -> Vec<PointLabel> {
    let mut labels = vec![PointLabel::Unvisited; points.len()];
    let core_threshold = params.min_pts.saturating_sub(1);
    let mut next_cluster = 0;

    for idx in 0..points.len() {
        if labels[idx] != PointLabel::Unvisited {
            continue;
        }
        let neighbors = region_query(points, idx, params.eps);
        if neighbors.len() < core_threshold {
            // May still be absorbed by a later cluster.
            labels[idx] = PointLabel::Noise;
            continue;
        }
        expand_cluster(points, &mut labels, idx, neighbors, next_cluster, params);
        next_cluster += 1;
    }

    labels
}
