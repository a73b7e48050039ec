//! # Halberd
//!
//! An embedded vector collection with IVF approximate search, attribute
//! filtering and a retrieval-augmented answering pipeline.
//!
//! ## Features
//!
//! - In-process collections with soft delete and compaction
//! - Euclidean, cosine and inner product metrics
//! - Seeded k-means IVF index with staleness detection
//! - Hybrid search: nearest neighbours under a typed attribute predicate
//! - Chunk, embed, retrieve and answer over text documents
//!
//! ## Example
//!
//! ```
//! use halberd::prelude::*;
//!
//! # fn main() -> halberd::error::Result<()> {
//! let collection = Collection::new(CollectionConfig::new(3).with_metric(DistanceMetric::Euclidean))?;
//! collection.insert(Record::new(0, vec![0.0, 0.0, 1.0]).with_attribute("score", 80))?;
//! collection.insert(Record::new(1, vec![0.0, 1.0, 0.0]).with_attribute("score", 10))?;
//! collection.build_index()?;
//!
//! let results = collection.search(&SearchRequest::new(vec![0.0, 0.1, 0.9], 1))?;
//! assert_eq!(results.ids(), vec![0]);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod collection;
pub mod error;
pub mod index;
pub mod retrieval;
pub mod search;
pub mod util;
pub mod vector;

pub mod prelude {
    pub use crate::collection::{Collection, CollectionConfig, CollectionStats, IndexStatus};
    pub use crate::error::{HalberdError, Result};
    pub use crate::index::{IvfBuildConfig, IvfIndex};
    pub use crate::retrieval::{
        AnswerGenerator, ExtractiveGenerator, HashingEmbedder, RetrievalPipeline, TextEmbedder,
    };
    pub use crate::search::{Predicate, SearchRequest, SearchResults, StalenessPolicy};
    pub use crate::util::cancel::CancellationToken;
    pub use crate::vector::{AttributeValue, DistanceMetric, Record};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
