//! Query Builder - composition and compilation of statements
//!
//! Descriptors are built fluently and validated in full by `compile()`;
//! an invalid descriptor never reaches a backend. Projection items carry
//! their provenance (raw column, computed scalar, or aggregate) so that
//! HAVING validation is a structural check.

pub mod builder;
pub mod expr;
pub mod predicate;
pub mod sql;
pub mod statement;
pub mod types;

pub(crate) mod validate;

pub use builder::QueryBuilder;
pub use expr::{
    avg, coalesce, col, count, count_all, lit, lower, max, min, qcol, sum, upper, AggregateExpr,
    AggregateFn, ColumnRef, ProjectionExpr, ScalarExpr, SelectItem,
};
pub use predicate::{
    and, between, eq, gt, gte, is_in, is_not_null, is_null, like, lt, lte, ne, or, Predicate,
};
pub use statement::{
    DeleteStatement, InsertStatement, JoinSpec, OnConflict, SelectStatement, Statement,
    UpdateStatement,
};
pub use types::{ComparisonOp, JoinKind, OrderDirection};
