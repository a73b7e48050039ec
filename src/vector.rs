//! Vector records, distance metrics and raw storage.
//!
//! # Module Structure
//!
//! - `distance`: distance metrics (Euclidean, Cosine, Inner-Product)
//! - `record`: records and scalar attribute values
//! - `store`: append-only storage with soft delete and snapshots

pub mod distance;
pub mod record;
pub mod store;

pub use self::distance::DistanceMetric;
pub use self::record::{AttributeValue, Attributes, Record};
pub use self::store::{Snapshot, StoreFingerprint, VectorStore};
