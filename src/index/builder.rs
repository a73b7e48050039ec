//! IVF index builder: seeded k-means over a store snapshot.

use std::sync::Arc;

use log::{debug, info};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{HalberdError, Result};
use crate::index::ivf::{Cluster, IvfIndex, centroid_distance};
use crate::util::cancel::CancellationToken;
use crate::vector::{DistanceMetric, Record, Snapshot};

/// Records per cancellation check in the sequential assignment loop.
const CANCEL_CHECK_INTERVAL: usize = 1024;
/// Below this many records assignment runs on the calling thread.
const PARALLEL_ASSIGN_THRESHOLD: usize = 1000;

/// Parameters of an IVF build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IvfBuildConfig {
    /// Number of clusters. Clamped to the record count at build time.
    pub nlist: usize,
    /// Upper bound on Lloyd refinement iterations.
    pub max_iterations: usize,
    /// Seed for initial centroid sampling.
    pub seed: u64,
    /// Assign records to centroids on the rayon pool for large snapshots.
    pub parallel_build: bool,
}

impl Default for IvfBuildConfig {
    fn default() -> Self {
        Self {
            nlist: 128,
            max_iterations: 25,
            seed: 42,
            parallel_build: true,
        }
    }
}

impl IvfBuildConfig {
    pub fn with_nlist(mut self, nlist: usize) -> Self {
        self.nlist = nlist;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.nlist == 0 {
            return Err(HalberdError::invalid_argument("nlist must be at least 1"));
        }
        if self.max_iterations == 0 {
            return Err(HalberdError::invalid_argument(
                "max_iterations must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Builds [`IvfIndex`]es for one metric.
#[derive(Debug, Clone)]
pub struct IvfIndexBuilder {
    metric: DistanceMetric,
    config: IvfBuildConfig,
}

impl IvfIndexBuilder {
    pub fn new(metric: DistanceMetric, config: IvfBuildConfig) -> Self {
        Self { metric, config }
    }

    pub fn config(&self) -> &IvfBuildConfig {
        &self.config
    }

    /// Partition the snapshot into clusters.
    ///
    /// An empty snapshot yields an empty index. Otherwise `nlist` centroids are
    /// sampled without replacement and refined until assignments stop changing
    /// or the iteration budget runs out.
    pub fn build(&self, snapshot: &Snapshot, cancel: &CancellationToken) -> Result<IvfIndex> {
        self.config.validate()?;

        let fingerprint = snapshot.fingerprint();
        if snapshot.is_empty() {
            info!("Built empty IVF index (no live records)");
            return Ok(IvfIndex::empty(self.metric, fingerprint));
        }

        let records = snapshot.records();
        let nlist = self.config.nlist.clamp(1, records.len());
        let mut centroids = self.sample_centroids(records, nlist);

        let mut assignments = self.assign(records, &centroids, cancel)?;
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.config.max_iterations {
            cancel.check("index build")?;
            self.update_centroids(records, &assignments, &mut centroids);
            iterations += 1;

            let next = self.assign(records, &centroids, cancel)?;
            let changed = next
                .iter()
                .zip(assignments.iter())
                .filter(|(a, b)| a != b)
                .count();
            assignments = next;
            debug!("k-means iteration {iterations}: {changed} reassignments");

            if changed == 0 {
                converged = true;
                break;
            }
        }

        let mut clusters: Vec<Cluster> = centroids
            .into_iter()
            .map(|centroid| Cluster {
                centroid,
                members: Vec::new(),
            })
            .collect();
        for (record, &cluster) in records.iter().zip(assignments.iter()) {
            clusters[cluster].members.push(record.id);
        }
        for cluster in &mut clusters {
            cluster.members.sort_unstable();
        }

        info!(
            "Built IVF index: {} records, {} clusters, {} iterations{}",
            records.len(),
            nlist,
            iterations,
            if converged { " (converged)" } else { "" }
        );

        Ok(IvfIndex::new(self.metric, clusters, fingerprint, iterations))
    }

    fn sample_centroids(&self, records: &[Arc<Record>], nlist: usize) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        rand::seq::index::sample(&mut rng, records.len(), nlist)
            .into_iter()
            .map(|i| records[i].vector.clone())
            .collect()
    }

    /// Nearest centroid for every record, in snapshot order.
    fn assign(
        &self,
        records: &[Arc<Record>],
        centroids: &[Vec<f32>],
        cancel: &CancellationToken,
    ) -> Result<Vec<usize>> {
        if self.config.parallel_build && records.len() > PARALLEL_ASSIGN_THRESHOLD {
            return records
                .par_iter()
                .map(|record| {
                    cancel.check("index build")?;
                    self.nearest_centroid(&record.vector, centroids)
                })
                .collect();
        }

        let mut assignments = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if i % CANCEL_CHECK_INTERVAL == 0 {
                cancel.check("index build")?;
            }
            assignments.push(self.nearest_centroid(&record.vector, centroids)?);
        }
        Ok(assignments)
    }

    fn nearest_centroid(&self, vector: &[f32], centroids: &[Vec<f32>]) -> Result<usize> {
        let mut best_cluster = 0;
        let mut best_distance = f32::INFINITY;

        for (i, centroid) in centroids.iter().enumerate() {
            let distance = centroid_distance(self.metric, vector, centroid)?;
            if distance < best_distance {
                best_distance = distance;
                best_cluster = i;
            }
        }

        Ok(best_cluster)
    }

    /// Move every non-empty cluster's centroid to the mean of its members.
    /// Empty clusters keep their previous centroid.
    fn update_centroids(
        &self,
        records: &[Arc<Record>],
        assignments: &[usize],
        centroids: &mut [Vec<f32>],
    ) {
        let dimension = centroids.first().map_or(0, |c| c.len());
        let mut sums = vec![vec![0.0f64; dimension]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];

        for (record, &cluster) in records.iter().zip(assignments.iter()) {
            counts[cluster] += 1;
            for (sum, &value) in sums[cluster].iter_mut().zip(record.vector.iter()) {
                *sum += value as f64;
            }
        }

        for ((centroid, sum), &count) in centroids.iter_mut().zip(sums).zip(counts.iter()) {
            if count == 0 {
                continue;
            }
            *centroid = sum.into_iter().map(|s| (s / count as f64) as f32).collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::VectorStore;

    fn two_blob_store() -> VectorStore {
        let mut store = VectorStore::new(2);
        for i in 0..10u64 {
            let offset = i as f32 * 0.01;
            store
                .insert(Record::new(i, vec![offset, 0.1 + offset]))
                .unwrap();
            store
                .insert(Record::new(100 + i, vec![10.0 + offset, 10.0 - offset]))
                .unwrap();
        }
        store
    }

    #[test]
    fn test_build_separates_blobs() {
        let store = two_blob_store();
        let builder = IvfIndexBuilder::new(
            DistanceMetric::Euclidean,
            IvfBuildConfig::default().with_nlist(2),
        );
        let index = builder
            .build(&store.scan(), &CancellationToken::new())
            .unwrap();

        assert_eq!(index.nlist(), 2);
        assert_eq!(index.member_count(), 20);
        for cluster in index.clusters() {
            let low = cluster.members.iter().all(|&id| id < 100);
            let high = cluster.members.iter().all(|&id| id >= 100);
            assert!(low || high, "cluster mixes blobs: {:?}", cluster.members);
            assert!(cluster.members.windows(2).all(|w| w[0] < w[1]));
        }
        assert!(index.iterations() >= 1);
        assert!(!index.is_stale(&store.fingerprint()));
    }

    #[test]
    fn test_nlist_clamped_to_record_count() {
        let mut store = VectorStore::new(2);
        store.insert(Record::new(1, vec![1.0, 0.0])).unwrap();
        store.insert(Record::new(2, vec![0.0, 1.0])).unwrap();

        let index = IvfIndexBuilder::new(DistanceMetric::Cosine, IvfBuildConfig::default())
            .build(&store.scan(), &CancellationToken::new())
            .unwrap();
        assert_eq!(index.nlist(), 2);
    }

    #[test]
    fn test_empty_snapshot_builds_empty_index() {
        let store = VectorStore::new(4);
        let index = IvfIndexBuilder::new(DistanceMetric::Euclidean, IvfBuildConfig::default())
            .build(&store.scan(), &CancellationToken::new())
            .unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_build_is_deterministic_for_a_seed() {
        let store = two_blob_store();
        let builder = IvfIndexBuilder::new(
            DistanceMetric::Euclidean,
            IvfBuildConfig::default().with_nlist(3).with_seed(7),
        );
        let a = builder.build(&store.scan(), &CancellationToken::new()).unwrap();
        let b = builder.build(&store.scan(), &CancellationToken::new()).unwrap();
        assert_eq!(a.clusters(), b.clusters());
    }

    #[test]
    fn test_iteration_budget_bounds_build() {
        let store = two_blob_store();
        let index = IvfIndexBuilder::new(
            DistanceMetric::Euclidean,
            IvfBuildConfig::default().with_nlist(4).with_max_iterations(1),
        )
        .build(&store.scan(), &CancellationToken::new())
        .unwrap();
        assert_eq!(index.iterations(), 1);
        assert_eq!(index.member_count(), 20);
    }

    #[test]
    fn test_cancelled_build() {
        let store = two_blob_store();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = IvfIndexBuilder::new(DistanceMetric::Euclidean, IvfBuildConfig::default())
            .build(&store.scan(), &cancel);
        assert!(matches!(result, Err(HalberdError::OperationCancelled(_))));
    }

    #[test]
    fn test_invalid_config() {
        let store = two_blob_store();
        let result = IvfIndexBuilder::new(
            DistanceMetric::Euclidean,
            IvfBuildConfig::default().with_nlist(0),
        )
        .build(&store.scan(), &CancellationToken::new());
        assert!(matches!(result, Err(HalberdError::InvalidArgument(_))));
    }
}
