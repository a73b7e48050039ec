//! Hybrid search: vector ranking combined with attribute predicates.

pub mod filter;
pub mod planner;

pub use self::filter::{CompareOp, Predicate};
pub use self::planner::{
    QueryPlanner, SearchHit, SearchPath, SearchRequest, SearchResults, StalenessPolicy,
};
