//! Approximate nearest-neighbour index over a collection's vectors.
//!
//! The index is inverted-file style: records are partitioned into clusters
//! around k-means centroids, and a search only visits the clusters nearest to
//! the query.

pub mod builder;
pub mod ivf;

pub use self::builder::{IvfBuildConfig, IvfIndexBuilder};
pub use self::ivf::{Cluster, IvfIndex};
