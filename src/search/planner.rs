//! Search execution: plan selection, candidate gathering, filtering and
//! top-k ranking.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{HalberdError, Result};
use crate::index::IvfIndex;
use crate::search::filter::Predicate;
use crate::util::cancel::CancellationToken;
use crate::vector::distance::compare_distances;
use crate::vector::{Attributes, DistanceMetric, Record, VectorStore};

/// What to do when the index no longer matches the record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalenessPolicy {
    /// Fail with [`HalberdError::StaleIndex`].
    #[default]
    Reject,
    /// Search the stale index anyway. Records inserted after the build are
    /// missed; records deleted after the build are skipped.
    AllowStale,
    /// Ignore the stale index and scan every live record.
    FallbackExhaustive,
}

/// How a search was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPath {
    /// Every live record was a candidate.
    Exhaustive,
    /// Only members of the probed clusters were candidates.
    Index { probed: usize, stale: bool },
}

/// A top-k nearest-neighbour request with an optional attribute filter.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub vector: Vec<f32>,
    pub top_k: usize,
    pub filter: Option<Predicate>,
    /// Number of nearest clusters to visit when the index is used.
    pub probe_count: usize,
    pub staleness: StalenessPolicy,
    pub cancel: CancellationToken,
}

impl SearchRequest {
    pub fn new(vector: Vec<f32>, top_k: usize) -> Self {
        Self {
            vector,
            top_k,
            filter: None,
            probe_count: 1,
            staleness: StalenessPolicy::default(),
            cancel: CancellationToken::default(),
        }
    }

    pub fn with_filter(mut self, filter: Predicate) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_probe_count(mut self, probe_count: usize) -> Self {
        self.probe_count = probe_count;
        self
    }

    pub fn with_staleness(mut self, staleness: StalenessPolicy) -> Self {
        self.staleness = staleness;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// A single ranked result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: u64,
    pub distance: f32,
    pub attributes: Attributes,
}

/// Ranked results plus execution details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    pub path: SearchPath,
    /// Candidates considered before filtering.
    pub candidates_examined: usize,
    pub search_time_ms: f64,
}

impl SearchResults {
    pub fn ids(&self) -> Vec<u64> {
        self.hits.iter().map(|hit| hit.id).collect()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Executes searches against a borrowed store and optional index.
///
/// The caller holds whatever lock protects the store for the planner's
/// lifetime; the planner itself never locks.
#[derive(Debug)]
pub struct QueryPlanner<'a> {
    store: &'a VectorStore,
    index: Option<&'a IvfIndex>,
    metric: DistanceMetric,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(store: &'a VectorStore, index: Option<&'a IvfIndex>, metric: DistanceMetric) -> Self {
        Self {
            store,
            index,
            metric,
        }
    }

    /// Decide how `request` will be executed.
    pub fn plan(&self, request: &SearchRequest) -> Result<SearchPath> {
        let Some(index) = self.index else {
            return Ok(SearchPath::Exhaustive);
        };

        let current = self.store.fingerprint();
        let stale = index.is_stale(&current);
        if stale {
            match request.staleness {
                StalenessPolicy::Reject => {
                    return Err(HalberdError::StaleIndex {
                        built_generation: index.fingerprint().generation,
                        current_generation: current.generation,
                    });
                }
                StalenessPolicy::FallbackExhaustive => {
                    debug!("Index is stale, falling back to exhaustive scan");
                    return Ok(SearchPath::Exhaustive);
                }
                StalenessPolicy::AllowStale => {
                    warn!(
                        "Searching stale index (built at generation {}, store at {})",
                        index.fingerprint().generation,
                        current.generation
                    );
                }
            }
        }

        Ok(SearchPath::Index {
            probed: request.probe_count.min(index.nlist()),
            stale,
        })
    }

    /// Run a search.
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResults> {
        let start = Instant::now();
        self.validate(request)?;

        let path = self.plan(request)?;
        let candidates = self.gather(request, path)?;
        let candidates_examined = candidates.len();

        let mut scored = self.score(request, &candidates)?;
        rank_top_k(&mut scored, request.top_k);

        let hits = scored
            .into_iter()
            .map(|(distance, record)| SearchHit {
                id: record.id,
                distance,
                attributes: record.attributes.clone(),
            })
            .collect::<Vec<_>>();

        debug!(
            "Search via {:?}: {} candidates, {} hits",
            path,
            candidates_examined,
            hits.len()
        );

        Ok(SearchResults {
            hits,
            path,
            candidates_examined,
            search_time_ms: start.elapsed().as_secs_f64() * 1000.0,
        })
    }

    fn validate(&self, request: &SearchRequest) -> Result<()> {
        if request.vector.len() != self.store.dimension() {
            return Err(HalberdError::dimension_mismatch(
                self.store.dimension(),
                request.vector.len(),
            ));
        }
        if request.top_k == 0 {
            return Err(HalberdError::invalid_argument("top_k must be at least 1"));
        }
        if request.probe_count == 0 {
            return Err(HalberdError::invalid_argument(
                "probe_count must be at least 1",
            ));
        }
        self.metric.validate(&request.vector)
    }

    fn gather(&self, request: &SearchRequest, path: SearchPath) -> Result<Vec<Arc<Record>>> {
        match (path, self.index) {
            (SearchPath::Index { probed, .. }, Some(index)) => {
                let ids = index.candidate_ids(&request.vector, probed)?;
                Ok(ids
                    .into_iter()
                    .filter_map(|id| self.store.try_get(id))
                    .collect())
            }
            _ => Ok(self.store.live_records().cloned().collect()),
        }
    }

    /// Distances of every candidate that passes the filter.
    fn score(
        &self,
        request: &SearchRequest,
        candidates: &[Arc<Record>],
    ) -> Result<Vec<(f32, Arc<Record>)>> {
        let mut passing = Vec::with_capacity(candidates.len());
        for record in candidates {
            request.cancel.check("search")?;
            let keep = request
                .filter
                .as_ref()
                .is_none_or(|filter| filter.matches(&record.attributes));
            if keep {
                passing.push(record);
            }
        }

        let vectors: Vec<&[f32]> = passing.iter().map(|record| record.vector.as_slice()).collect();
        let distances = self.metric.batch_distance(&request.vector, &vectors)?;
        request.cancel.check("search")?;

        Ok(distances
            .into_iter()
            .zip(passing)
            .map(|(distance, record)| (distance, Arc::clone(record)))
            .collect())
    }
}

/// Ascending distance with NaN last, ties by ascending id.
fn compare_scored(a: &(f32, Arc<Record>), b: &(f32, Arc<Record>)) -> Ordering {
    compare_distances(a.0, b.0).then(a.1.id.cmp(&b.1.id))
}

/// Keep the `top_k` best entries, sorted.
fn rank_top_k(scored: &mut Vec<(f32, Arc<Record>)>, top_k: usize) {
    if scored.len() > top_k {
        scored.select_nth_unstable_by(top_k - 1, compare_scored);
        scored.truncate(top_k);
    }
    scored.sort_by(compare_scored);
}
