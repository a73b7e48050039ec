//! IVF (Inverted File) index: centroids plus per-cluster member lists.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::vector::distance::compare_distances;
use crate::vector::{DistanceMetric, StoreFingerprint};

/// One partition of the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub centroid: Vec<f32>,
    /// Member record ids, ascending.
    pub members: Vec<u64>,
}

/// A built IVF index over a snapshot of the store.
///
/// The index is a derived artifact: it never owns records, only ids, and it
/// remembers the fingerprint of the snapshot it was built from so staleness
/// can be detected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IvfIndex {
    metric: DistanceMetric,
    clusters: Vec<Cluster>,
    fingerprint: StoreFingerprint,
    iterations: usize,
}

impl IvfIndex {
    pub(crate) fn new(
        metric: DistanceMetric,
        clusters: Vec<Cluster>,
        fingerprint: StoreFingerprint,
        iterations: usize,
    ) -> Self {
        Self {
            metric,
            clusters,
            fingerprint,
            iterations,
        }
    }

    /// An index with no clusters; every search against it is empty.
    pub(crate) fn empty(metric: DistanceMetric, fingerprint: StoreFingerprint) -> Self {
        Self::new(metric, Vec::new(), fingerprint, 0)
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Number of clusters (`nlist` after clamping to the record count).
    pub fn nlist(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Total number of ids across all clusters.
    pub fn member_count(&self) -> usize {
        self.clusters.iter().map(|c| c.members.len()).sum()
    }

    /// Fingerprint of the snapshot the index was built from.
    pub fn fingerprint(&self) -> StoreFingerprint {
        self.fingerprint
    }

    /// Lloyd iterations the build actually ran.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Whether the store has changed since this index was built.
    pub fn is_stale(&self, current: &StoreFingerprint) -> bool {
        self.fingerprint.generation != current.generation
    }

    /// Indices of the `probe_count` clusters whose centroids are nearest to
    /// `query`, nearest first. Ties go to the lower cluster index.
    pub fn nearest_clusters(&self, query: &[f32], probe_count: usize) -> Result<Vec<usize>> {
        let mut ranked = Vec::with_capacity(self.clusters.len());
        for (i, cluster) in self.clusters.iter().enumerate() {
            let distance = centroid_distance(self.metric, query, &cluster.centroid)?;
            ranked.push((i, distance));
        }

        ranked.sort_by(|a, b| compare_distances(a.1, b.1).then(a.0.cmp(&b.0)));

        Ok(ranked
            .into_iter()
            .take(probe_count)
            .map(|(i, _)| i)
            .collect())
    }

    /// Member ids of the nearest `probe_count` clusters.
    pub fn candidate_ids(&self, query: &[f32], probe_count: usize) -> Result<Vec<u64>> {
        let probed = self.nearest_clusters(query, probe_count)?;
        let mut ids = Vec::with_capacity(
            probed
                .iter()
                .map(|&i| self.clusters[i].members.len())
                .sum(),
        );
        for i in probed {
            ids.extend_from_slice(&self.clusters[i].members);
        }
        Ok(ids)
    }
}

/// Distance from a vector to a centroid. A centroid that averaged out to the
/// zero vector has no cosine direction and counts as infinitely far; a
/// degenerate query is still an error.
pub(crate) fn centroid_distance(
    metric: DistanceMetric,
    vector: &[f32],
    centroid: &[f32],
) -> Result<f32> {
    if metric == DistanceMetric::Cosine && centroid.iter().all(|x| *x == 0.0) {
        metric.validate(vector)?;
        return Ok(f32::INFINITY);
    }
    metric.distance(vector, centroid)
}
