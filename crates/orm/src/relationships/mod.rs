//! Relation Graph - named relations with cardinality and join conditions
//!
//! Built once from the schema registry. Every relation is backed by a
//! registered foreign key, so a graph that builds successfully can always
//! resolve its join conditions.

pub mod graph;
pub mod types;

pub use graph::{RelationGraph, RelationGraphBuilder};
pub use types::{JoinCondition, RelationDef, RelationKind};
