//! Schema Registry - declarative entity definitions
//!
//! Entities are declared against a [`SchemaBuilder`], which validates the
//! whole registry at `build()` time and produces an immutable
//! [`SchemaRegistry`] shared by reference with every other component.

pub mod column;
pub mod registry;

pub use column::{ColumnDef, ColumnDefault, ColumnType};
pub use registry::{EntityDef, ForeignKeyDef, SchemaBuilder, SchemaRegistry, UniqueConstraint};
