//! Chunk clustering.
//!
//! The [`ClusterAssigner`] trait is the seam between the pipeline and the
//! grouping algorithm: ordered embeddings go in, groups of input positions
//! come out. [`SequentialAssigner`] is a deliberately simple placeholder
//! behind that seam; a density-based algorithm can replace it without any
//! change to the orchestrator.

use std::collections::BTreeMap;

use crate::confidence::round2;
use crate::models::{Chunk, Cluster, FEATURE_DIMS};

/// One chunk's feature vector, flattened in canonical field order.
pub type Embedding = [f64; FEATURE_DIMS];

/// Default minimum members before [`SequentialAssigner`] opens a new cluster.
pub const DEFAULT_MIN_CLUSTER_SIZE: usize = 3;

/// Groups embeddings into clusters.
///
/// Returns a map from cluster index to the ordered input positions it
/// contains. Positions not present in any group are treated as noise by the
/// caller. An empty input must yield an empty map.
pub trait ClusterAssigner: Send + Sync {
    fn assign(&self, embeddings: &[Embedding]) -> BTreeMap<usize, Vec<usize>>;
}

/// Fills clusters in input order, starting a new one each time the current
/// cluster reaches `min_cluster_size`.
///
/// Deterministic, single pass, and a total partition of the input; the
/// final cluster may be smaller than `min_cluster_size`.
#[derive(Debug, Clone, Copy)]
pub struct SequentialAssigner {
    pub min_cluster_size: usize,
}

impl SequentialAssigner {
    pub fn new(min_cluster_size: usize) -> Self {
        Self {
            min_cluster_size: min_cluster_size.max(1),
        }
    }
}

impl Default for SequentialAssigner {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CLUSTER_SIZE)
    }
}

impl ClusterAssigner for SequentialAssigner {
    fn assign(&self, embeddings: &[Embedding]) -> BTreeMap<usize, Vec<usize>> {
        let mut clusters: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        let mut cluster_id = 0;

        for idx in 0..embeddings.len() {
            let members = clusters.entry(cluster_id).or_default();
            members.push(idx);
            if members.len() >= self.min_cluster_size {
                cluster_id += 1;
            }
        }

        clusters
    }
}

/// Materialize assigner output into [`Cluster`]s with coherence scores.
///
/// Coherence is the member share of all chunks, clamped to `1.0` and
/// rounded to two decimals. Out-of-range positions are ignored.
pub fn build_clusters(chunks: &[Chunk], assignments: &BTreeMap<usize, Vec<usize>>) -> Vec<Cluster> {
    let total_chunks = chunks.len().max(1) as f64;

    assignments
        .iter()
        .map(|(cluster_id, positions)| {
            let member_chunks: Vec<String> = positions
                .iter()
                .filter_map(|&idx| chunks.get(idx))
                .map(|c| c.chunk_id.clone())
                .collect();
            let coherence = (member_chunks.len() as f64 / total_chunks).min(1.0);
            Cluster {
                cluster_id: format!("cluster_{}", cluster_id),
                label: format!("Cluster {}", cluster_id),
                member_chunks,
                coherence_score: round2(coherence),
            }
        })
        .collect()
}

/// Pick the cluster with the highest `(coherence, member count)`.
///
/// Returns `None` when no clusters were formed. On a full tie the earliest
/// cluster wins.
pub fn select_primary_cluster(clusters: &[Cluster]) -> Option<&Cluster> {
    clusters.iter().fold(None, |best: Option<&Cluster>, c| match best {
        None => Some(c),
        Some(b) => {
            let better = c.coherence_score > b.coherence_score
                || (c.coherence_score == b.coherence_score
                    && c.member_chunks.len() > b.member_chunks.len());
            if better {
                Some(c)
            } else {
                Some(b)
            }
        }
    })
}

/// Placeholder used when no cluster could be selected.
pub fn empty_cluster() -> Cluster {
    Cluster {
        cluster_id: "cluster_0".to_string(),
        label: "Cluster 0".to_string(),
        member_chunks: Vec::new(),
        coherence_score: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn embeddings(n: usize) -> Vec<Embedding> {
        vec![[0.0; FEATURE_DIMS]; n]
    }

    fn chunks(n: usize) -> Vec<Chunk> {
        let now = Utc::now();
        (0..n)
            .map(|i| Chunk {
                chunk_id: format!("d:{}", i),
                document_id: "d".into(),
                content: String::new(),
                index: i,
                timestamp: now,
            })
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(SequentialAssigner::default().assign(&[]).is_empty());
    }

    #[test]
    fn test_fills_in_order() {
        let groups = SequentialAssigner::new(3).assign(&embeddings(9));
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[&0], vec![0, 1, 2]);
        assert_eq!(groups[&1], vec![3, 4, 5]);
        assert_eq!(groups[&2], vec![6, 7, 8]);
    }

    #[test]
    fn test_last_cluster_may_be_short() {
        let groups = SequentialAssigner::new(3).assign(&embeddings(7));
        let sizes: Vec<usize> = groups.values().map(|g| g.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[test]
    fn test_partition_property() {
        for n in 0..25 {
            for min in 1..6 {
                let groups = SequentialAssigner::new(min).assign(&embeddings(n));
                let mut seen: Vec<usize> = groups.values().flatten().copied().collect();
                seen.sort_unstable();
                assert_eq!(seen, (0..n).collect::<Vec<_>>(), "n={} min={}", n, min);
            }
        }
    }

    #[test]
    fn test_zero_min_size_treated_as_one() {
        let groups = SequentialAssigner::new(0).assign(&embeddings(3));
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn test_build_clusters_coherence() {
        let c = chunks(7);
        let groups = SequentialAssigner::new(3).assign(&embeddings(7));
        let clusters = build_clusters(&c, &groups);
        assert_eq!(clusters.len(), 3);
        assert_eq!(clusters[0].cluster_id, "cluster_0");
        assert_eq!(clusters[0].label, "Cluster 0");
        assert_eq!(clusters[0].member_chunks, vec!["d:0", "d:1", "d:2"]);
        assert_eq!(clusters[0].coherence_score, 0.43);
        assert_eq!(clusters[2].coherence_score, 0.14);
        for cl in &clusters {
            assert!((0.0..=1.0).contains(&cl.coherence_score));
        }
    }

    #[test]
    fn test_single_cluster_full_coherence() {
        let c = chunks(3);
        let groups = SequentialAssigner::new(5).assign(&embeddings(3));
        let clusters = build_clusters(&c, &groups);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].coherence_score, 1.0);
    }

    #[test]
    fn test_primary_prefers_coherence_then_size() {
        let mut a = empty_cluster();
        a.cluster_id = "a".into();
        a.coherence_score = 0.5;
        a.member_chunks = vec!["x".into()];
        let mut b = a.clone();
        b.cluster_id = "b".into();
        b.member_chunks = vec!["x".into(), "y".into()];
        let mut c = a.clone();
        c.cluster_id = "c".into();
        c.coherence_score = 0.4;
        c.member_chunks = vec!["x".into(), "y".into(), "z".into()];

        let clusters = vec![a, b, c];
        assert_eq!(select_primary_cluster(&clusters).unwrap().cluster_id, "b");
        assert!(select_primary_cluster(&[]).is_none());
    }

    #[test]
    fn test_primary_full_tie_keeps_first() {
        let c = chunks(6);
        let groups = SequentialAssigner::new(3).assign(&embeddings(6));
        let clusters = build_clusters(&c, &groups);
        assert_eq!(select_primary_cluster(&clusters).unwrap().cluster_id, "cluster_0");
    }
}
