//! Compiled statements
//!
//! A statement is the validated, backend-ready form of a query or
//! mutation descriptor. Backends consume statements; they never see a
//! descriptor that failed compilation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::expr::{ColumnRef, SelectItem};
use crate::query::predicate::Predicate;
use crate::query::types::{JoinKind, OrderDirection};

/// A compiled join clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSpec {
    pub kind: JoinKind,
    /// Joined entity (and table) name
    pub entity: String,
    pub on_left: ColumnRef,
    pub on_right: ColumnRef,
}

/// A compiled SELECT
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectStatement {
    pub entity: String,
    pub projection: Vec<SelectItem>,
    pub joins: Vec<JoinSpec>,
    pub filter: Option<Predicate>,
    pub group_by: Vec<String>,
    pub having: Option<Predicate>,
    pub order_by: Vec<(String, OrderDirection)>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Explicit conflict policy for an insert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnConflict {
    /// Columns of the unique constraint the policy targets
    pub target: Vec<String>,
    /// Name of the targeted constraint, resolved at compile time
    pub constraint: String,
    /// Column updates applied to the existing row on conflict
    pub set: Vec<(String, Value)>,
}

/// A compiled INSERT; every row carries the full column set with
/// defaults already materialized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertStatement {
    pub entity: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub on_conflict: Option<OnConflict>,
    pub returning: Option<Vec<String>>,
}

/// A compiled UPDATE; a `None` filter means the caller explicitly opted
/// into an all-rows update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateStatement {
    pub entity: String,
    pub set: Vec<(String, Value)>,
    pub filter: Option<Predicate>,
    pub returning: Option<Vec<String>>,
}

/// A compiled DELETE; a `None` filter means the caller explicitly opted
/// into an all-rows delete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteStatement {
    pub entity: String,
    pub filter: Option<Predicate>,
}

/// Any compiled statement a backend can run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

impl Statement {
    /// The root entity the statement operates on
    pub fn entity(&self) -> &str {
        match self {
            Statement::Select(s) => &s.entity,
            Statement::Insert(s) => &s.entity,
            Statement::Update(s) => &s.entity,
            Statement::Delete(s) => &s.entity,
        }
    }

    /// Whether the statement produces rows
    pub fn returns_rows(&self) -> bool {
        match self {
            Statement::Select(_) => true,
            Statement::Insert(s) => s.returning.is_some(),
            Statement::Update(s) => s.returning.is_some(),
            Statement::Delete(_) => false,
        }
    }
}
