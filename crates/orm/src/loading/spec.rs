//! Relation-spec trees for nested fetches
//!
//! The set of valid relation names is closed: every name is checked
//! against the relation graph before any query is issued.

use std::collections::BTreeMap;

use crate::query::{OrderDirection, Predicate};

/// How a requested relation is fetched: everything, or a nested
/// sub-selection
#[derive(Debug, Clone)]
pub enum RelationSpec {
    /// All columns, no nested relations
    All,
    /// A nested column/filter/relation selection
    Nested(FetchOptions),
}

/// Options for a (root or nested) fetch
///
/// Relations iterate in name order, so the assembled tree does not
/// depend on insertion order. Limit and offset apply to the root fetch
/// only; inside a nested spec they are a build-time error.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Columns to return; `None` selects every column
    pub columns: Option<Vec<String>>,
    /// Row filter applied to this level
    pub filter: Option<Predicate>,
    /// Ordering applied to this level
    pub order_by: Vec<(String, OrderDirection)>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Requested relations, by name
    pub with: BTreeMap<String, RelationSpec>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a subset of columns
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Add a filter; multiple calls combine under AND
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// Order ascending by a column
    pub fn order_by(mut self, column: &str) -> Self {
        self.order_by.push((column.to_string(), OrderDirection::Asc));
        self
    }

    /// Order descending by a column
    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.order_by
            .push((column.to_string(), OrderDirection::Desc));
        self
    }

    /// Bound the root result set
    pub fn limit(mut self, count: i64) -> Self {
        self.limit = Some(count);
        self
    }

    /// Skip leading root rows
    pub fn offset(mut self, count: i64) -> Self {
        self.offset = Some(count);
        self
    }

    /// Request a relation with all of its columns
    pub fn with(mut self, relation: &str) -> Self {
        self.with.insert(relation.to_string(), RelationSpec::All);
        self
    }

    /// Request a relation with a nested selection
    pub fn with_nested(mut self, relation: &str, options: FetchOptions) -> Self {
        self.with
            .insert(relation.to_string(), RelationSpec::Nested(options));
        self
    }
}
