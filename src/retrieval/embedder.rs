//! Text embedding collaborators.
//!
//! The pipeline depends only on [`TextEmbedder`]. Real deployments plug in a
//! neural model or an embedding API through it; [`FnEmbedder`] adapts any
//! closure, and [`HashingEmbedder`] is a deterministic local embedder used by
//! the CLI and tests.

use std::fmt;
use std::hash::BuildHasher;

use ahash::RandomState;

use crate::error::{HalberdError, Result};

/// Trait for converting text to vector embeddings.
///
/// # Example
///
/// ```
/// use halberd::error::Result;
/// use halberd::retrieval::embedder::TextEmbedder;
///
/// struct Constant;
///
/// impl TextEmbedder for Constant {
///     fn embed(&self, _text: &str) -> Result<Vec<f32>> {
///         Ok(vec![1.0, 0.0])
///     }
///
///     fn dimension(&self) -> usize {
///         2
///     }
/// }
///
/// assert_eq!(Constant.embed("anything").unwrap(), vec![1.0, 0.0]);
/// ```
pub trait TextEmbedder: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the dimension of generated embeddings.
    fn dimension(&self) -> usize;

    /// Generate embeddings for multiple texts, failing on the first error.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    /// Get the name/identifier of this embedder.
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Adapts a closure into a [`TextEmbedder`].
///
/// Output length is checked against the declared dimension.
pub struct FnEmbedder<F> {
    dimension: usize,
    embed_fn: F,
}

impl<F> FnEmbedder<F>
where
    F: Fn(&str) -> Result<Vec<f32>> + Send + Sync,
{
    pub fn new(dimension: usize, embed_fn: F) -> Self {
        Self {
            dimension,
            embed_fn,
        }
    }
}

impl<F> fmt::Debug for FnEmbedder<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnEmbedder")
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl<F> TextEmbedder for FnEmbedder<F>
where
    F: Fn(&str) -> Result<Vec<f32>> + Send + Sync,
{
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = (self.embed_fn)(text)?;
        if vector.len() != self.dimension {
            return Err(HalberdError::embedding(format!(
                "embedder returned {} values, expected {}",
                vector.len(),
                self.dimension
            )));
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "fn"
    }
}

/// Deterministic feature-hashing embedder.
///
/// Features are lowercased alphanumeric words plus character unigrams and
/// bigrams of CJK runs, so both space-delimited and unsegmented text share
/// features with related text. Each feature adds +1 or -1 to one bucket and
/// the result is L2 normalized. Text with no features is an embedding error.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    bucket_hasher: RandomState,
    sign_hasher: RandomState,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(HalberdError::invalid_argument(
                "embedding dimension must be at least 1",
            ));
        }
        Ok(Self {
            dimension,
            bucket_hasher: RandomState::with_seeds(
                0x243f_6a88_85a3_08d3,
                0x1319_8a2e_0370_7344,
                0xa409_3822_299f_31d0,
                0x082e_fa98_ec4e_6c89,
            ),
            sign_hasher: RandomState::with_seeds(
                0x4528_21e6_38d0_1377,
                0xbe54_66cf_34e9_0c6c,
                0xc0ac_29b7_c97c_50dd,
                0x3f84_d5b5_b547_0917,
            ),
        })
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str) {
        let bucket = (BuildHasher::hash_one(&self.bucket_hasher, feature) % self.dimension as u64) as usize;
        let sign = if BuildHasher::hash_one(&self.sign_hasher, feature) & 1 == 0 {
            1.0
        } else {
            -1.0
        };
        vector[bucket] += sign;
    }
}

impl TextEmbedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        for feature in features(text) {
            self.add_feature(&mut vector, &feature);
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            return Err(HalberdError::embedding(format!(
                "no indexable features in {:?}",
                truncate(text, 40)
            )));
        }
        for x in &mut vector {
            *x /= norm;
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{30ff}'
        | '\u{3400}'..='\u{4dbf}'
        | '\u{4e00}'..='\u{9fff}'
        | '\u{ac00}'..='\u{d7af}'
        | '\u{f900}'..='\u{faff}')
}

enum Run {
    None,
    Word(String),
    Cjk(Vec<char>),
}

fn features(text: &str) -> Vec<String> {
    let mut features = Vec::new();
    let mut run = Run::None;

    for c in text.chars() {
        run = match (run, is_cjk(c), c.is_alphanumeric()) {
            (Run::Cjk(mut chars), true, _) => {
                chars.push(c);
                Run::Cjk(chars)
            }
            (Run::Word(mut word), false, true) => {
                word.extend(c.to_lowercase());
                Run::Word(word)
            }
            (previous, true, _) => {
                emit(previous, &mut features);
                Run::Cjk(vec![c])
            }
            (previous, false, true) => {
                emit(previous, &mut features);
                Run::Word(c.to_lowercase().collect())
            }
            (previous, false, false) => {
                emit(previous, &mut features);
                Run::None
            }
        };
    }
    emit(run, &mut features);

    features
}

fn emit(run: Run, features: &mut Vec<String>) {
    match run {
        Run::None => {}
        Run::Word(word) => features.push(word),
        Run::Cjk(chars) => {
            features.extend(chars.iter().map(|c| c.to_string()));
            features.extend(chars.windows(2).map(|pair| pair.iter().collect::<String>()));
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
