//! Database backends
//!
//! Backends consume compiled statements. `PostgresBackend` renders them
//! to parameterized SQL over sqlx; `MemoryBackend` interprets them
//! against in-memory tables with full constraint enforcement, which is
//! what the test suite runs on.

pub mod core;
pub mod memory;
pub mod postgres;

pub use core::{Backend, Row, StatementOutcome};
pub use memory::MemoryBackend;
pub use postgres::{PgDecodeError, PostgresBackend};
