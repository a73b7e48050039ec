//! Distance metrics for vector similarity calculation.
//!
//! Every metric is expressed as a distance where smaller is closer, so a single
//! ascending sort ranks results for all of them. Inner product is negated to
//! fit that ordering.

use std::cmp::Ordering;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{HalberdError, Result};

/// Below this many vectors batch distances are computed sequentially.
const PARALLEL_BATCH_THRESHOLD: usize = 100;

/// Distance metrics for vector similarity calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Euclidean (L2) distance
    #[serde(alias = "l2")]
    Euclidean,
    /// Cosine distance (1 - cosine similarity)
    #[default]
    Cosine,
    /// Negated dot product
    #[serde(alias = "ip", alias = "dot_product")]
    InnerProduct,
}

impl DistanceMetric {
    /// Calculate the distance between two vectors using this metric.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> Result<f32> {
        if a.len() != b.len() {
            return Err(HalberdError::dimension_mismatch(a.len(), b.len()));
        }

        let result = match self {
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y).powi(2))
                .sum::<f32>()
                .sqrt(),
            DistanceMetric::Cosine => {
                let norm_a = norm(a);
                let norm_b = norm(b);
                if norm_a == 0.0 || norm_b == 0.0 {
                    return Err(HalberdError::degenerate(
                        "cosine distance is undefined for a zero vector",
                    ));
                }
                1.0 - dot(a, b) / (norm_a * norm_b)
            }
            DistanceMetric::InnerProduct => -dot(a, b),
        };

        Ok(result)
    }

    /// Convert a distance produced by this metric into a similarity score
    /// where larger means more relevant.
    ///
    /// Cosine maps to `1 - d`, inner product back to the raw dot product and
    /// Euclidean to `1 / (1 + d)`.
    pub fn similarity_from_distance(&self, distance: f32) -> f32 {
        match self {
            DistanceMetric::Euclidean => 1.0 / (1.0 + distance),
            DistanceMetric::Cosine => 1.0 - distance,
            DistanceMetric::InnerProduct => -distance,
        }
    }

    /// Check that a vector can take part in distance computations under this
    /// metric. Cosine rejects zero vectors.
    pub fn validate(&self, vector: &[f32]) -> Result<()> {
        if *self == DistanceMetric::Cosine && norm(vector) == 0.0 {
            return Err(HalberdError::degenerate(
                "zero vector cannot be used with the cosine metric",
            ));
        }
        Ok(())
    }

    /// Get the name of this distance metric.
    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::InnerProduct => "inner_product",
        }
    }

    /// Parse a distance metric from a string.
    pub fn parse_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            "cosine" => Ok(DistanceMetric::Cosine),
            "inner_product" | "ip" | "dot_product" | "dot" => Ok(DistanceMetric::InnerProduct),
            _ => Err(HalberdError::invalid_argument(format!(
                "Unknown distance metric: {s}"
            ))),
        }
    }

    /// Calculate distance between a query vector and multiple vectors,
    /// in parallel for large batches.
    pub fn batch_distance(&self, query: &[f32], vectors: &[&[f32]]) -> Result<Vec<f32>> {
        if vectors.len() < PARALLEL_BATCH_THRESHOLD {
            return vectors
                .iter()
                .map(|v| self.distance(query, v))
                .collect::<Result<Vec<_>>>();
        }

        vectors
            .par_iter()
            .map(|v| self.distance(query, v))
            .collect::<Result<Vec<_>>>()
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = HalberdError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_str(s)
    }
}

/// Order two distances ascending, with NaN after every other value.
///
/// Finite inputs can still overflow to NaN (an inner product of huge
/// components summing `inf + -inf`), and such a distance must never rank as
/// the nearest hit.
pub(crate) fn compare_distances(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (true, true) => Ordering::Equal,
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_euclidean_distance() {
        let d = DistanceMetric::Euclidean
            .distance(&[0.0, 0.0], &[3.0, 4.0])
            .unwrap();
        assert!(approx(d, 5.0));
    }

    #[test]
    fn test_cosine_distance() {
        let metric = DistanceMetric::Cosine;
        assert!(approx(metric.distance(&[1.0, 0.0], &[2.0, 0.0]).unwrap(), 0.0));
        assert!(approx(metric.distance(&[1.0, 0.0], &[0.0, 1.0]).unwrap(), 1.0));
        assert!(approx(metric.distance(&[1.0, 0.0], &[-1.0, 0.0]).unwrap(), 2.0));
    }

    #[test]
    fn test_cosine_rejects_zero_vector() {
        let result = DistanceMetric::Cosine.distance(&[0.0, 0.0], &[1.0, 0.0]);
        assert!(matches!(result, Err(HalberdError::DegenerateVector(_))));
        assert!(DistanceMetric::Cosine.validate(&[0.0, 0.0]).is_err());
        assert!(DistanceMetric::Euclidean.validate(&[0.0, 0.0]).is_ok());
    }

    #[test]
    fn test_inner_product_is_negated() {
        let metric = DistanceMetric::InnerProduct;
        let near = metric.distance(&[1.0, 1.0], &[2.0, 2.0]).unwrap();
        let far = metric.distance(&[1.0, 1.0], &[0.5, 0.5]).unwrap();
        assert!(approx(near, -4.0));
        assert!(near < far);
        assert!(approx(metric.similarity_from_distance(near), 4.0));
    }

    #[test]
    fn test_mismatched_lengths() {
        let result = DistanceMetric::Euclidean.distance(&[1.0], &[1.0, 2.0]);
        assert!(matches!(
            result,
            Err(HalberdError::DimensionMismatch {
                expected: 1,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_similarity_from_distance() {
        assert!(approx(DistanceMetric::Cosine.similarity_from_distance(0.25), 0.75));
        assert!(approx(DistanceMetric::Euclidean.similarity_from_distance(1.0), 0.5));
    }

    #[test]
    fn test_parse_str() {
        assert_eq!(DistanceMetric::parse_str("L2").unwrap(), DistanceMetric::Euclidean);
        assert_eq!(DistanceMetric::parse_str("cosine").unwrap(), DistanceMetric::Cosine);
        assert_eq!(DistanceMetric::parse_str("ip").unwrap(), DistanceMetric::InnerProduct);
        assert!(DistanceMetric::parse_str("hamming").is_err());
    }

    #[test]
    fn test_serde_aliases() {
        let metric: DistanceMetric = serde_json::from_str("\"l2\"").unwrap();
        assert_eq!(metric, DistanceMetric::Euclidean);
        assert_eq!(
            serde_json::to_string(&DistanceMetric::InnerProduct).unwrap(),
            "\"inner_product\""
        );
    }

    #[test]
    fn test_compare_distances_puts_nan_last() {
        assert_eq!(compare_distances(-4e30, -2e30), Ordering::Less);
        assert_eq!(compare_distances(f32::NAN, f32::NEG_INFINITY), Ordering::Greater);
        assert_eq!(compare_distances(1.0, f32::NAN), Ordering::Less);
        assert_eq!(compare_distances(f32::NAN, f32::NAN), Ordering::Equal);
        assert_eq!(compare_distances(0.0, -0.0), Ordering::Equal);

        let overflow = DistanceMetric::InnerProduct
            .distance(&[1e30, -1e30], &[1e30, 1e30])
            .unwrap();
        assert!(overflow.is_nan());

        let mut distances = vec![overflow, -4e30, 0.5, f32::NAN, -2e30];
        distances.sort_by(|a, b| compare_distances(*a, *b));
        assert_eq!(&distances[..3], &[-4e30, -2e30, 0.5]);
        assert!(distances[3..].iter().all(|d| d.is_nan()));
    }

    #[test]
    fn test_batch_distance_matches_single() {
        let query = [1.0f32, 2.0, 3.0];
        let data: Vec<Vec<f32>> = (0..250)
            .map(|i| vec![i as f32, (i % 7) as f32, 1.0])
            .collect();
        let refs: Vec<&[f32]> = data.iter().map(|v| v.as_slice()).collect();

        let batch = DistanceMetric::Euclidean.batch_distance(&query, &refs).unwrap();
        for (v, d) in refs.iter().zip(batch) {
            let single = DistanceMetric::Euclidean.distance(&query, v).unwrap();
            assert!(approx(single, d));
        }
    }
}
