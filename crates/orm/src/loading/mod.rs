//! Nested Fetch Resolver
//!
//! Resolves a root entity together with a recursively nested set of
//! relations. Related rows are always fetched batched over the collected
//! root keys, so the number of statements depends on the shape of the
//! relation tree, never on the number of root rows.

pub mod resolver;
pub mod spec;

pub use resolver::Resolver;
pub use spec::{FetchOptions, RelationSpec};
