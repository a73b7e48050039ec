//! Retrieval-augmented answering on top of a [`Collection`](crate::collection::Collection).
//!
//! Documents are split into paragraph chunks, embedded by a [`TextEmbedder`],
//! stored with their text, and retrieved by similarity to a question. An
//! [`AnswerGenerator`] turns the retrieved context into an answer.

pub mod chunker;
pub mod embedder;
pub mod generator;
pub mod pipeline;

pub use self::chunker::chunk_documents;
pub use self::embedder::{FnEmbedder, HashingEmbedder, TextEmbedder};
pub use self::generator::{AnswerGenerator, ExtractiveGenerator, PromptGenerator, build_prompt};
pub use self::pipeline::{
    IngestFailure, IngestReport, PipelineConfig, RagAnswer, RetrievalPipeline, RetrievedChunk,
};
