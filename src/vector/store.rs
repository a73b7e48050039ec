//! Append-only record storage with soft delete.
//!
//! [`VectorStore`] owns the raw vectors and attributes of one collection. It is
//! not synchronized on its own; [`Collection`](crate::collection::Collection)
//! wraps it in a reader/writer lock.

use std::ops::Range;
use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{HalberdError, Result};
use crate::vector::record::Record;

/// Identifies the state of a store at one point in time.
///
/// `generation` advances on every successful insert or delete, so two
/// fingerprints with the same generation describe the same live record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreFingerprint {
    pub record_count: usize,
    pub max_id: Option<u64>,
    pub generation: u64,
}

/// Point-in-time view of all live records.
///
/// Cloning is cheap and iteration can be restarted any number of times;
/// mutations made to the store after the snapshot was taken never show up.
#[derive(Debug, Clone)]
pub struct Snapshot {
    records: Arc<[Arc<Record>]>,
    fingerprint: StoreFingerprint,
}

impl Snapshot {
    /// Iterate over the records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Record>> + '_ {
        self.records.iter()
    }

    /// Records as a slice.
    pub fn records(&self) -> &[Arc<Record>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fingerprint of the store at the time the snapshot was taken.
    pub fn fingerprint(&self) -> StoreFingerprint {
        self.fingerprint
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Arc<Record>;
    type IntoIter = std::slice::Iter<'a, Arc<Record>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Raw vector and attribute storage for one collection.
#[derive(Debug)]
pub struct VectorStore {
    dimension: usize,
    /// All records in insertion order, including soft-deleted ones until the
    /// next compaction.
    records: Vec<Arc<Record>>,
    /// Live id -> position in `records`.
    live: AHashMap<u64, usize>,
    deleted_count: usize,
    max_id: Option<u64>,
    next_reserved_id: u64,
    generation: u64,
}

impl VectorStore {
    /// Create an empty store for vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            records: Vec::new(),
            live: AHashMap::new(),
            deleted_count: 0,
            max_id: None,
            next_reserved_id: 0,
            generation: 0,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Number of soft-deleted records still held until compaction.
    pub fn deleted_len(&self) -> usize {
        self.deleted_count
    }

    /// Largest id ever inserted, including ids that were later deleted.
    pub fn max_id(&self) -> Option<u64> {
        self.max_id
    }

    /// Mutation counter, bumped by every successful insert and delete.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn fingerprint(&self) -> StoreFingerprint {
        StoreFingerprint {
            record_count: self.live.len(),
            max_id: self.max_id,
            generation: self.generation,
        }
    }

    /// Check that a vector fits this store.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(HalberdError::dimension_mismatch(self.dimension, vector.len()));
        }
        if !vector.iter().all(|x| x.is_finite()) {
            return Err(HalberdError::invalid_argument(
                "vector contains invalid values (NaN or infinity)",
            ));
        }
        Ok(())
    }

    /// Append a record. Fails without mutating anything when the id is live
    /// or the vector does not fit.
    pub fn insert(&mut self, mut record: Record) -> Result<()> {
        self.validate_vector(&record.vector)?;
        if self.live.contains_key(&record.id) {
            return Err(HalberdError::DuplicateId(record.id));
        }

        record.deleted = false;
        let id = record.id;
        self.live.insert(id, self.records.len());
        self.records.push(Arc::new(record));
        self.max_id = Some(self.max_id.map_or(id, |max| max.max(id)));
        self.generation += 1;
        Ok(())
    }

    /// Mark the live record with this id as deleted.
    pub fn delete(&mut self, id: u64) -> Result<()> {
        let position = self.live.remove(&id).ok_or(HalberdError::NotFound(id))?;

        let mut tombstone = Record::clone(&self.records[position]);
        tombstone.deleted = true;
        self.records[position] = Arc::new(tombstone);
        self.deleted_count += 1;
        self.generation += 1;
        Ok(())
    }

    /// Get the live record with this id.
    pub fn get(&self, id: u64) -> Result<Arc<Record>> {
        self.try_get(id).ok_or(HalberdError::NotFound(id))
    }

    /// Like [`get`](Self::get) but without building an error.
    pub fn try_get(&self, id: u64) -> Option<Arc<Record>> {
        self.live
            .get(&id)
            .map(|&position| Arc::clone(&self.records[position]))
    }

    pub fn contains(&self, id: u64) -> bool {
        self.live.contains_key(&id)
    }

    /// Live records in insertion order, borrowed from the store.
    pub fn live_records(&self) -> impl Iterator<Item = &Arc<Record>> + '_ {
        self.records.iter().filter(|record| !record.deleted)
    }

    /// Snapshot of every live record at call time.
    pub fn scan(&self) -> Snapshot {
        let records: Vec<Arc<Record>> = self.live_records().cloned().collect();

        Snapshot {
            records: records.into(),
            fingerprint: self.fingerprint(),
        }
    }

    /// Physically drop soft-deleted records. Ids are left untouched and the
    /// id high-water mark is kept, so no id is ever handed out twice.
    ///
    /// Returns the number of records removed.
    pub fn compact(&mut self) -> usize {
        if self.deleted_count == 0 {
            return 0;
        }

        let before = self.records.len();
        self.records.retain(|record| !record.deleted);
        self.live = self
            .records
            .iter()
            .enumerate()
            .map(|(position, record)| (record.id, position))
            .collect();
        self.deleted_count = 0;
        before - self.records.len()
    }

    /// Reserve `count` fresh sequential ids above every id inserted or
    /// reserved so far. The first reservation on a never-written store starts
    /// at 0.
    ///
    /// Fails with `InvalidArgument` when the range would pass `u64::MAX`;
    /// nothing is reserved in that case.
    pub fn reserve_ids(&mut self, count: usize) -> Result<Range<u64>> {
        let exhausted = || {
            HalberdError::invalid_argument(format!("cannot reserve {count} ids: id space exhausted"))
        };

        let after_max = match self.max_id {
            Some(max) => max.checked_add(1).ok_or_else(exhausted)?,
            None => 0,
        };
        let start = after_max.max(self.next_reserved_id);
        let end = start.checked_add(count as u64).ok_or_else(exhausted)?;
        self.next_reserved_id = end;
        Ok(start..end)
    }
}
