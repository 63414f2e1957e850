//! # quarry-orm: typed relational schema and query core
//!
//! A schema registry with relation-aware querying: declarative entity
//! definitions, a validated query builder with projection, grouping,
//! joins and paging, batched nested fetches over a relation graph, and
//! constraint-aware mutations.
//!
//! Everything statically checkable is checked before a statement
//! reaches a backend; backends only ever see compiled statements.

pub mod backends;
pub mod blog;
pub mod error;
pub mod loading;
pub mod mutation;
pub mod query;
pub mod relationships;
pub mod schema;

// Re-export core types
pub use backends::{Backend, MemoryBackend, PostgresBackend, Row, StatementOutcome};
pub use error::{ConstraintKind, OrmError, OrmResult};
pub use loading::{FetchOptions, RelationSpec, Resolver};
pub use mutation::{DeleteBuilder, InsertBuilder, UpdateBuilder};
pub use query::QueryBuilder;
pub use relationships::{RelationGraph, RelationGraphBuilder, RelationKind};
pub use schema::{ColumnDef, ColumnType, EntityDef, SchemaBuilder, SchemaRegistry};
