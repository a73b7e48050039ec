//! Chunk, embed, store, retrieve and answer.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::collection::Collection;
use crate::error::{HalberdError, Result};
use crate::index::IvfIndex;
use crate::retrieval::chunker::chunk_documents;
use crate::retrieval::embedder::TextEmbedder;
use crate::retrieval::generator::AnswerGenerator;
use crate::search::{Predicate, SearchRequest, StalenessPolicy};
use crate::vector::Record;

/// Pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Attribute holding the chunk text.
    pub text_attribute: String,
    /// Chunks retrieved per question by [`RetrievalPipeline::answer`].
    pub top_k: usize,
    pub probe_count: usize,
    pub staleness: StalenessPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            text_attribute: "text".to_string(),
            top_k: 3,
            probe_count: 1,
            staleness: StalenessPolicy::Reject,
        }
    }
}

impl PipelineConfig {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
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
}

/// A chunk that failed to ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestFailure {
    /// Position of the chunk in the ingest input.
    pub index: usize,
    pub reason: String,
}

/// Outcome of [`RetrievalPipeline::ingest`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Ids of inserted chunks, in input order.
    pub inserted_ids: Vec<u64>,
    pub failures: Vec<IngestFailure>,
}

impl IngestReport {
    pub fn inserted(&self) -> usize {
        self.inserted_ids.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One retrieved chunk with its relevance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: u64,
    pub text: String,
    /// Higher is more relevant.
    pub score: f32,
}

/// The full answer flow for one question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagAnswer {
    pub query: String,
    pub context: Vec<RetrievedChunk>,
    pub answer: String,
    pub retrieval_ms: f64,
    pub generation_ms: f64,
}

/// Retrieval-augmented question answering over one collection.
///
/// The embedder and generator are passed per call and are never invoked while
/// a collection lock is held.
#[derive(Debug, Clone)]
pub struct RetrievalPipeline {
    collection: Arc<Collection>,
    config: PipelineConfig,
}

impl RetrievalPipeline {
    pub fn new(collection: Arc<Collection>) -> Self {
        Self::with_config(collection, PipelineConfig::default())
    }

    pub fn with_config(collection: Arc<Collection>, config: PipelineConfig) -> Self {
        Self { collection, config }
    }

    pub fn collection(&self) -> &Arc<Collection> {
        &self.collection
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Split documents into paragraph chunks.
    pub fn chunk<S: AsRef<str>>(&self, documents: &[S]) -> Vec<String> {
        chunk_documents(documents)
    }

    /// Embed and insert chunks under freshly reserved ids.
    ///
    /// A chunk whose embedding or insert fails is recorded in the report and
    /// skipped; chunks before and after it are still inserted. Only an
    /// embedder whose dimension disagrees with the collection fails the whole
    /// call.
    pub fn ingest<S, E>(&self, chunks: &[S], embedder: &E) -> Result<IngestReport>
    where
        S: AsRef<str>,
        E: TextEmbedder + ?Sized,
    {
        if embedder.dimension() != self.collection.dimension() {
            return Err(HalberdError::dimension_mismatch(
                self.collection.dimension(),
                embedder.dimension(),
            ));
        }

        let ids = self.collection.reserve_ids(chunks.len())?;
        let mut report = IngestReport::default();

        for ((index, chunk), id) in chunks.iter().enumerate().zip(ids) {
            let text = chunk.as_ref();
            let result = embedder.embed(text).and_then(|vector| {
                self.collection.insert(
                    Record::new(id, vector).with_attribute(self.config.text_attribute.as_str(), text),
                )
            });

            match result {
                Ok(()) => report.inserted_ids.push(id),
                Err(e) => {
                    warn!("Skipping chunk {index}: {e}");
                    report.failures.push(IngestFailure {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Ingested {} chunks into '{}' ({} failed)",
            report.inserted(),
            self.collection.name(),
            report.failures.len()
        );
        Ok(report)
    }

    /// [`chunk`](Self::chunk) followed by [`ingest`](Self::ingest).
    pub fn ingest_documents<S, E>(&self, documents: &[S], embedder: &E) -> Result<IngestReport>
    where
        S: AsRef<str>,
        E: TextEmbedder + ?Sized,
    {
        let chunks = self.chunk(documents);
        self.ingest(&chunks, embedder)
    }

    /// Build the collection index with its configured parameters.
    pub fn build_index(&self) -> Result<Arc<IvfIndex>> {
        self.collection.build_index()
    }

    /// The `top_k` chunks most relevant to `query`, best first. Records
    /// without the text attribute never take a slot.
    pub fn retrieve<E>(&self, query: &str, embedder: &E, top_k: usize) -> Result<Vec<RetrievedChunk>>
    where
        E: TextEmbedder + ?Sized,
    {
        let vector = embedder.embed(query)?;
        let request = SearchRequest::new(vector, top_k)
            .with_probe_count(self.config.probe_count)
            .with_staleness(self.config.staleness)
            .with_filter(Predicate::exists(self.config.text_attribute.as_str()));
        let results = self.collection.search(&request)?;
        debug!(
            "Retrieved {} hits via {:?} in {:.2}ms",
            results.len(),
            results.path,
            results.search_time_ms
        );

        let metric = self.collection.metric();
        let chunks = results
            .hits
            .into_iter()
            .filter_map(|hit| {
                let text = hit
                    .attributes
                    .get(&self.config.text_attribute)
                    .and_then(|value| value.as_text());
                match text {
                    Some(text) => Some(RetrievedChunk {
                        id: hit.id,
                        text: text.to_string(),
                        score: metric.similarity_from_distance(hit.distance),
                    }),
                    None => {
                        warn!(
                            "Record {} has a non-text '{}' attribute; skipping",
                            hit.id, self.config.text_attribute
                        );
                        None
                    }
                }
            })
            .collect();
        Ok(chunks)
    }

    /// Retrieve context for `query` and generate a grounded answer.
    pub fn answer<E, G>(&self, query: &str, embedder: &E, generator: &G) -> Result<RagAnswer>
    where
        E: TextEmbedder + ?Sized,
        G: AnswerGenerator + ?Sized,
    {
        let start = Instant::now();
        let context = self.retrieve(query, embedder, self.config.top_k)?;
        let retrieval_ms = start.elapsed().as_secs_f64() * 1000.0;

        let start = Instant::now();
        let answer = generator.generate(query, &context)?;
        let generation_ms = start.elapsed().as_secs_f64() * 1000.0;

        info!(
            "Answered {query:?} from {} chunks (retrieval {retrieval_ms:.2}ms, generation {generation_ms:.2}ms)",
            context.len()
        );

        Ok(RagAnswer {
            query: query.to_string(),
            context,
            answer,
            retrieval_ms,
            generation_ms,
        })
    }
}
