//! Core backend trait and result types

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::OrmResult;
use crate::query::Statement;

/// A result row: projected alias to value
pub type Row = Map<String, Value>;

/// Result of running a statement
#[derive(Debug, Clone, Default)]
pub struct StatementOutcome {
    /// Rows produced by a select or a RETURNING clause
    pub rows: Vec<Row>,
    /// Rows affected by a mutation
    pub rows_affected: u64,
}

impl StatementOutcome {
    pub fn rows(rows: Vec<Row>) -> Self {
        let rows_affected = rows.len() as u64;
        Self {
            rows,
            rows_affected,
        }
    }

    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows: Vec::new(),
            rows_affected,
        }
    }
}

/// Abstract database capability: run one compiled statement as one
/// atomic unit of work
#[async_trait]
pub trait Backend: Send + Sync {
    async fn run(&self, statement: &Statement) -> OrmResult<StatementOutcome>;
}
