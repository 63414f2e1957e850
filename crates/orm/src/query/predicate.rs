//! Boolean predicates over row attributes
//!
//! Predicates form a tree composable with AND/OR. The left side of a
//! comparison is always a scalar expression, so aggregates cannot leak
//! into WHERE clauses by construction.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::expr::ScalarExpr;
use crate::query::types::ComparisonOp;

/// A boolean expression evaluated per row (or per group, in HAVING)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Compare {
        left: ScalarExpr,
        op: ComparisonOp,
        values: Vec<Value>,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Combine with another predicate under AND
    pub fn and(self, other: Predicate) -> Predicate {
        match self {
            Predicate::And(mut parts) => {
                parts.push(other);
                Predicate::And(parts)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    /// Combine with another predicate under OR
    pub fn or(self, other: Predicate) -> Predicate {
        match self {
            Predicate::Or(mut parts) => {
                parts.push(other);
                Predicate::Or(parts)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }
}

fn compare<L: Into<ScalarExpr>, V: Into<Value>>(left: L, op: ComparisonOp, value: V) -> Predicate {
    Predicate::Compare {
        left: left.into(),
        op,
        values: vec![value.into()],
    }
}

/// `left = value`
pub fn eq<L: Into<ScalarExpr>, V: Into<Value>>(left: L, value: V) -> Predicate {
    compare(left, ComparisonOp::Equal, value)
}

/// `left != value`
pub fn ne<L: Into<ScalarExpr>, V: Into<Value>>(left: L, value: V) -> Predicate {
    compare(left, ComparisonOp::NotEqual, value)
}

/// `left > value`
pub fn gt<L: Into<ScalarExpr>, V: Into<Value>>(left: L, value: V) -> Predicate {
    compare(left, ComparisonOp::GreaterThan, value)
}

/// `left >= value`
pub fn gte<L: Into<ScalarExpr>, V: Into<Value>>(left: L, value: V) -> Predicate {
    compare(left, ComparisonOp::GreaterThanOrEqual, value)
}

/// `left < value`
pub fn lt<L: Into<ScalarExpr>, V: Into<Value>>(left: L, value: V) -> Predicate {
    compare(left, ComparisonOp::LessThan, value)
}

/// `left <= value`
pub fn lte<L: Into<ScalarExpr>, V: Into<Value>>(left: L, value: V) -> Predicate {
    compare(left, ComparisonOp::LessThanOrEqual, value)
}

/// `left LIKE pattern`
pub fn like<L: Into<ScalarExpr>>(left: L, pattern: &str) -> Predicate {
    compare(left, ComparisonOp::Like, pattern)
}

/// `left BETWEEN low AND high`
pub fn between<L: Into<ScalarExpr>, V: Into<Value>>(left: L, low: V, high: V) -> Predicate {
    Predicate::Compare {
        left: left.into(),
        op: ComparisonOp::Between,
        values: vec![low.into(), high.into()],
    }
}

/// `left IN (values...)`
pub fn is_in<L: Into<ScalarExpr>, V: Into<Value>>(left: L, values: Vec<V>) -> Predicate {
    Predicate::Compare {
        left: left.into(),
        op: ComparisonOp::In,
        values: values.into_iter().map(|v| v.into()).collect(),
    }
}

/// `left IS NULL`
pub fn is_null<L: Into<ScalarExpr>>(left: L) -> Predicate {
    Predicate::Compare {
        left: left.into(),
        op: ComparisonOp::IsNull,
        values: Vec::new(),
    }
}

/// `left IS NOT NULL`
pub fn is_not_null<L: Into<ScalarExpr>>(left: L) -> Predicate {
    Predicate::Compare {
        left: left.into(),
        op: ComparisonOp::IsNotNull,
        values: Vec::new(),
    }
}

/// All predicates must hold
pub fn and(predicates: Vec<Predicate>) -> Predicate {
    Predicate::And(predicates)
}

/// At least one predicate must hold
pub fn or(predicates: Vec<Predicate>) -> Predicate {
    Predicate::Or(predicates)
}
