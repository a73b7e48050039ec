//! A single vector collection: records, the current index and search.
//!
//! [`Collection`] is the unit of synchronization. Mutations take the store's
//! write lock; reads, scans and searches share the read lock. Index builds run
//! on a snapshot without holding the store lock and swap the finished index in
//! atomically, so readers see either the old index or the new one in full.
//!
//! ```
//! use halberd::collection::{Collection, CollectionConfig};
//! use halberd::search::{Predicate, SearchRequest};
//! use halberd::vector::{DistanceMetric, Record};
//!
//! # fn main() -> halberd::error::Result<()> {
//! let collection = Collection::new(
//!     CollectionConfig::new(2).with_metric(DistanceMetric::Euclidean),
//! )?;
//! collection.insert(Record::new(1, vec![0.0, 0.0]).with_attribute("score", 10))?;
//! collection.insert(Record::new(2, vec![1.0, 0.0]).with_attribute("score", 60))?;
//! collection.build_index()?;
//!
//! let request = SearchRequest::new(vec![0.0, 0.0], 5)
//!     .with_filter(Predicate::gt("score", 50))
//!     .with_probe_count(2);
//! let results = collection.search(&request)?;
//! assert_eq!(results.ids(), vec![2]);
//! # Ok(())
//! # }
//! ```

mod config;

use std::ops::Range;
use std::sync::Arc;

use log::{info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

pub use self::config::{CollectionConfig, DEFAULT_COLLECTION_NAME, DEFAULT_DIMENSION};
use crate::error::{HalberdError, Result};
use crate::index::{IvfBuildConfig, IvfIndex, IvfIndexBuilder};
use crate::search::{Predicate, QueryPlanner, SearchPath, SearchRequest, SearchResults};
use crate::util::cancel::CancellationToken;
use crate::vector::{DistanceMetric, Record, Snapshot, StoreFingerprint, VectorStore};

/// Relationship between the current index and the record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IndexStatus {
    /// No index has been built (or it was dropped).
    Missing,
    /// The index reflects the current record set.
    Fresh { built: StoreFingerprint, nlist: usize },
    /// Records were inserted or deleted after the build.
    Stale {
        built: StoreFingerprint,
        current: StoreFingerprint,
        nlist: usize,
    },
}

impl IndexStatus {
    pub fn is_fresh(&self) -> bool {
        matches!(self, IndexStatus::Fresh { .. })
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, IndexStatus::Stale { .. })
    }
}

/// Point-in-time collection statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    pub name: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub live_records: usize,
    pub deleted_records: usize,
    pub max_id: Option<u64>,
    pub generation: u64,
    pub index: IndexStatus,
}

/// One collection of records with an optional IVF index.
#[derive(Debug)]
pub struct Collection {
    config: CollectionConfig,
    store: RwLock<VectorStore>,
    index: RwLock<Option<Arc<IvfIndex>>>,
    build_lock: Mutex<()>,
}

impl Collection {
    pub fn new(config: CollectionConfig) -> Result<Self> {
        config.validate()?;
        info!(
            "Created collection '{}' (dimension {}, metric {})",
            config.name, config.dimension, config.metric
        );
        Ok(Self {
            store: RwLock::new(VectorStore::new(config.dimension)),
            index: RwLock::new(None),
            build_lock: Mutex::new(()),
            config,
        })
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    pub fn metric(&self) -> DistanceMetric {
        self.config.metric
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }

    /// Insert one record. A zero vector is rejected under the cosine metric.
    pub fn insert(&self, record: Record) -> Result<()> {
        self.check_vector(&record.vector)?;
        self.store.write().insert(record)
    }

    /// Insert records in order under a single write lock. Stops at the first
    /// failure and returns it; records inserted before it stay inserted.
    pub fn insert_batch<I>(&self, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = Record>,
    {
        let mut store = self.store.write();
        let mut inserted = 0;
        for record in records {
            self.check_vector(&record.vector)?;
            store.insert(record)?;
            inserted += 1;
        }
        Ok(inserted)
    }

    // Length first, so a short zero vector reports the dimension.
    fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.config.dimension {
            return Err(HalberdError::dimension_mismatch(self.config.dimension, vector.len()));
        }
        self.config.metric.validate(vector)
    }

    /// Soft-delete a live record.
    pub fn delete(&self, id: u64) -> Result<()> {
        self.store.write().delete(id)
    }

    pub fn get(&self, id: u64) -> Result<Arc<Record>> {
        self.store.read().get(id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.store.read().contains(id)
    }

    /// Snapshot of all live records.
    pub fn scan(&self) -> Snapshot {
        self.store.read().scan()
    }

    /// Physically remove soft-deleted records; see [`VectorStore::compact`].
    pub fn compact(&self) -> usize {
        let removed = self.store.write().compact();
        if removed > 0 {
            info!("Compacted collection '{}': removed {removed} records", self.config.name);
        }
        removed
    }

    /// Reserve fresh sequential ids; see [`VectorStore::reserve_ids`].
    pub fn reserve_ids(&self, count: usize) -> Result<Range<u64>> {
        self.store.write().reserve_ids(count)
    }

    /// Build the index with the collection's configured parameters.
    pub fn build_index(&self) -> Result<Arc<IvfIndex>> {
        self.build_index_with(&self.config.index, &CancellationToken::new())
    }

    /// Build the index with explicit parameters and a cancellation token.
    ///
    /// Builds are serialized with each other. Inserts and searches proceed
    /// while the k-means runs; an insert that lands meanwhile leaves the new
    /// index stale.
    pub fn build_index_with(
        &self,
        config: &IvfBuildConfig,
        cancel: &CancellationToken,
    ) -> Result<Arc<IvfIndex>> {
        let _build = self.build_lock.lock();

        let snapshot = self.scan();
        let builder = IvfIndexBuilder::new(self.config.metric, config.clone());
        let index = Arc::new(builder.build(&snapshot, cancel)?);

        *self.index.write() = Some(Arc::clone(&index));

        let current = self.store.read().fingerprint();
        if index.is_stale(&current) {
            warn!(
                "Index for '{}' is already stale: records changed during the build",
                self.config.name
            );
        }
        Ok(index)
    }

    /// Rebuild the index when it is missing or stale; otherwise return the
    /// current one.
    pub fn ensure_fresh_index(&self) -> Result<Arc<IvfIndex>> {
        if let Some(index) = self.index() {
            let current = self.store.read().fingerprint();
            if !index.is_stale(&current) {
                return Ok(index);
            }
        }
        self.build_index()
    }

    /// Discard the current index. Returns whether one existed.
    pub fn drop_index(&self) -> bool {
        self.index.write().take().is_some()
    }

    /// The current index, fresh or not.
    pub fn index(&self) -> Option<Arc<IvfIndex>> {
        self.index.read().clone()
    }

    pub fn index_status(&self) -> IndexStatus {
        let current = self.store.read().fingerprint();
        match self.index() {
            None => IndexStatus::Missing,
            Some(index) if index.is_stale(&current) => IndexStatus::Stale {
                built: index.fingerprint(),
                current,
                nlist: index.nlist(),
            },
            Some(index) => IndexStatus::Fresh {
                built: index.fingerprint(),
                nlist: index.nlist(),
            },
        }
    }

    /// Top-k search; see [`QueryPlanner::search`].
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResults> {
        let index = self.index();
        let store = self.store.read();
        QueryPlanner::new(&store, index.as_deref(), self.config.metric).search(request)
    }

    /// How `request` would be executed right now.
    pub fn plan(&self, request: &SearchRequest) -> Result<SearchPath> {
        let index = self.index();
        let store = self.store.read();
        QueryPlanner::new(&store, index.as_deref(), self.config.metric).plan(request)
    }

    /// Attribute-only query: live records matching `filter`, ascending id,
    /// at most `limit` of them.
    pub fn query(&self, filter: &Predicate, limit: usize) -> Vec<Arc<Record>> {
        let store = self.store.read();
        let mut matches: Vec<Arc<Record>> = store
            .live_records()
            .filter(|record| filter.matches(&record.attributes))
            .cloned()
            .collect();
        matches.sort_by_key(|record| record.id);
        matches.truncate(limit);
        matches
    }

    pub fn stats(&self) -> CollectionStats {
        let (live_records, deleted_records, max_id, generation) = {
            let store = self.store.read();
            (
                store.len(),
                store.deleted_len(),
                store.max_id(),
                store.generation(),
            )
        };
        CollectionStats {
            name: self.config.name.clone(),
            dimension: self.config.dimension,
            metric: self.config.metric,
            live_records,
            deleted_records,
            max_id,
            generation,
            index: self.index_status(),
        }
    }
}
