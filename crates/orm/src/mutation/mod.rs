//! Mutation Executor - constraint-aware inserts, updates, and deletes
//!
//! Updates and deletes require an explicit filter or an explicit
//! `all_rows()` opt-in; an unconstrained bulk mutation is a build-time
//! error, never the default path.

pub mod delete;
pub mod insert;
pub mod update;

pub use delete::DeleteBuilder;
pub use insert::{InsertBuilder, OnConflictBuilder};
pub use update::UpdateBuilder;
