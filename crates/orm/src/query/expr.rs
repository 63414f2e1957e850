//! Projection expressions
//!
//! Scalar expressions and aggregates are separate types, so the builder
//! can tell at compile time whether a projected field is a raw attribute,
//! a computed value, or an aggregate result.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reference to a column, optionally qualified by its entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub entity: Option<String>,
    pub column: String,
}

impl ColumnRef {
    /// Resolve against the root entity of the query
    pub fn unqualified(column: &str) -> Self {
        Self {
            entity: None,
            column: column.to_string(),
        }
    }

    /// Resolve against a named entity in scope
    pub fn qualified(entity: &str, column: &str) -> Self {
        Self {
            entity: Some(entity.to_string()),
            column: column.to_string(),
        }
    }

    /// Parse `"entity.column"` or a bare column name
    pub fn parse(reference: &str) -> Self {
        match reference.split_once('.') {
            Some((entity, column)) => Self::qualified(entity, column),
            None => Self::unqualified(reference),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entity {
            Some(entity) => write!(f, "{}.{}", entity, self.column),
            None => write!(f, "{}", self.column),
        }
    }
}

/// Scalar expression over row attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarExpr {
    Column(ColumnRef),
    Literal(Value),
    Lower(Box<ScalarExpr>),
    Upper(Box<ScalarExpr>),
    Coalesce(Vec<ScalarExpr>),
}

impl ScalarExpr {
    /// Collect every column referenced by the expression
    pub(crate) fn referenced_columns<'a>(&'a self, out: &mut Vec<&'a ColumnRef>) {
        match self {
            ScalarExpr::Column(column) => out.push(column),
            ScalarExpr::Literal(_) => {}
            ScalarExpr::Lower(inner) | ScalarExpr::Upper(inner) => inner.referenced_columns(out),
            ScalarExpr::Coalesce(args) => {
                for arg in args {
                    arg.referenced_columns(out);
                }
            }
        }
    }
}

impl From<&str> for ScalarExpr {
    fn from(column: &str) -> Self {
        ScalarExpr::Column(ColumnRef::parse(column))
    }
}

/// Aggregate functions computed over a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl fmt::Display for AggregateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateFn::Count => write!(f, "COUNT"),
            AggregateFn::Sum => write!(f, "SUM"),
            AggregateFn::Avg => write!(f, "AVG"),
            AggregateFn::Min => write!(f, "MIN"),
            AggregateFn::Max => write!(f, "MAX"),
        }
    }
}

/// An aggregate applied to a scalar argument; `None` is `COUNT(*)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateExpr {
    pub func: AggregateFn,
    pub arg: Option<ScalarExpr>,
}

/// A projected field: either a scalar expression or an aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProjectionExpr {
    Scalar(ScalarExpr),
    Aggregate(AggregateExpr),
}

impl ProjectionExpr {
    pub fn is_aggregate(&self) -> bool {
        matches!(self, ProjectionExpr::Aggregate(_))
    }
}

/// An output field: alias plus the expression producing it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectItem {
    pub alias: String,
    pub expr: ProjectionExpr,
}

/// Unqualified column reference
pub fn col(column: &str) -> ScalarExpr {
    ScalarExpr::Column(ColumnRef::parse(column))
}

/// Entity-qualified column reference
pub fn qcol(entity: &str, column: &str) -> ScalarExpr {
    ScalarExpr::Column(ColumnRef::qualified(entity, column))
}

/// Literal value
pub fn lit<T: Into<Value>>(value: T) -> ScalarExpr {
    ScalarExpr::Literal(value.into())
}

/// Case-lowered string expression
pub fn lower<E: Into<ScalarExpr>>(expr: E) -> ScalarExpr {
    ScalarExpr::Lower(Box::new(expr.into()))
}

/// Case-raised string expression
pub fn upper<E: Into<ScalarExpr>>(expr: E) -> ScalarExpr {
    ScalarExpr::Upper(Box::new(expr.into()))
}

/// First non-null argument
pub fn coalesce(args: Vec<ScalarExpr>) -> ScalarExpr {
    ScalarExpr::Coalesce(args)
}

/// `COUNT(expr)`
pub fn count<E: Into<ScalarExpr>>(expr: E) -> AggregateExpr {
    AggregateExpr {
        func: AggregateFn::Count,
        arg: Some(expr.into()),
    }
}

/// `COUNT(*)`
pub fn count_all() -> AggregateExpr {
    AggregateExpr {
        func: AggregateFn::Count,
        arg: None,
    }
}

/// `AVG(expr)`
pub fn avg<E: Into<ScalarExpr>>(expr: E) -> AggregateExpr {
    AggregateExpr {
        func: AggregateFn::Avg,
        arg: Some(expr.into()),
    }
}

/// `SUM(expr)`
pub fn sum<E: Into<ScalarExpr>>(expr: E) -> AggregateExpr {
    AggregateExpr {
        func: AggregateFn::Sum,
        arg: Some(expr.into()),
    }
}

/// `MIN(expr)`
pub fn min<E: Into<ScalarExpr>>(expr: E) -> AggregateExpr {
    AggregateExpr {
        func: AggregateFn::Min,
        arg: Some(expr.into()),
    }
}

/// `MAX(expr)`
pub fn max<E: Into<ScalarExpr>>(expr: E) -> AggregateExpr {
    AggregateExpr {
        func: AggregateFn::Max,
        arg: Some(expr.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_ref_parse() {
        assert_eq!(ColumnRef::parse("name"), ColumnRef::unqualified("name"));
        assert_eq!(
            ColumnRef::parse("users.name"),
            ColumnRef::qualified("users", "name")
        );
    }

    #[test]
    fn test_referenced_columns_walks_nesting() {
        let expr = lower(coalesce(vec![col("name"), lit("anonymous")]));
        let mut refs = Vec::new();
        expr.referenced_columns(&mut refs);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].column, "name");
    }
}
