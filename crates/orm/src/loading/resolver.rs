//! Nested fetch resolution
//!
//! Per level: one query for the rows of that level, plus one batched
//! query per requested relation (`WHERE fk IN (keys)`), recursively.
//! Assembly is deterministic: relations iterate in name order and
//! related rows keep backend order within each group.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::backends::{Backend, Row};
use crate::error::{OrmError, OrmResult};
use crate::loading::spec::{FetchOptions, RelationSpec};
use crate::query::{col, is_in, QueryBuilder};
use crate::query::validate;
use crate::relationships::RelationGraph;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Resolves nested fetches against a relation graph and a backend
pub struct Resolver {
    graph: Arc<RelationGraph>,
    backend: Arc<dyn Backend>,
}

impl Resolver {
    pub fn new(graph: Arc<RelationGraph>, backend: Arc<dyn Backend>) -> Self {
        Self { graph, backend }
    }

    /// Fetch root rows together with the requested relation tree
    ///
    /// One-cardinality relations attach a single object or `null`;
    /// many-cardinality relations attach an ordered, possibly empty,
    /// array. The whole spec is validated before any query is issued.
    pub async fn find_many(&self, entity: &str, options: FetchOptions) -> OrmResult<Vec<Value>> {
        self.validate_spec(entity, &options, true)?;
        let rows = self.fetch_tree(entity, &options, &[]).await?;
        Ok(rows.into_iter().map(Value::Object).collect())
    }

    // Build-time validation of the whole spec tree: entity and column
    // names, filters, relation names, and the nested-paging restriction.
    fn validate_spec(&self, entity: &str, options: &FetchOptions, is_root: bool) -> OrmResult<()> {
        let registry = self.graph.registry();
        let entity_def = registry.entity(entity)?;

        if let Some(columns) = &options.columns {
            for column in columns {
                if !entity_def.has_column(column) {
                    return Err(OrmError::Query(format!(
                        "unknown column '{}' on entity '{}'",
                        column, entity
                    )));
                }
            }
        }
        if let Some(filter) = &options.filter {
            validate::validate_entity_predicate(registry, entity, filter)?;
        }
        for (column, _) in &options.order_by {
            if !entity_def.has_column(column) {
                return Err(OrmError::Query(format!(
                    "unknown column '{}' on entity '{}'",
                    column, entity
                )));
            }
        }
        if !is_root && (options.limit.is_some() || options.offset.is_some()) {
            return Err(OrmError::Query(
                "limit/offset are not supported inside a nested relation spec".to_string(),
            ));
        }

        for (name, spec) in &options.with {
            let relation = self.graph.relation(entity, name)?;
            if let RelationSpec::Nested(nested) = spec {
                self.validate_spec(&relation.target, nested, false)?;
            }
        }
        Ok(())
    }

    // Fetch one level of the tree. `keep` columns are force-included and
    // left in place for the caller (they carry the grouping keys);
    // everything else not requested is stripped before returning.
    fn fetch_tree<'a>(
        &'a self,
        entity: &'a str,
        options: &'a FetchOptions,
        keep: &'a [String],
    ) -> BoxFuture<'a, OrmResult<Vec<Row>>> {
        Box::pin(async move {
            let registry = self.graph.registry();
            let entity_def = registry.entity(entity)?;

            let requested: Vec<String> = match &options.columns {
                Some(columns) => columns.clone(),
                None => entity_def
                    .column_names()
                    .into_iter()
                    .map(|c| c.to_string())
                    .collect(),
            };

            let mut fetch_columns = requested.clone();
            for column in keep {
                if !fetch_columns.contains(column) {
                    fetch_columns.push(column.clone());
                }
            }
            for name in options.with.keys() {
                let relation = self.graph.relation(entity, name)?;
                let local = relation.join.local_column.clone();
                if !fetch_columns.contains(&local) {
                    fetch_columns.push(local);
                }
            }

            let refs: Vec<&str> = fetch_columns.iter().map(|c| c.as_str()).collect();
            let mut query = QueryBuilder::new(registry.clone(), entity).select_columns(&refs);
            if let Some(filter) = &options.filter {
                query = query.filter(filter.clone());
            }
            for (column, direction) in &options.order_by {
                query = match direction {
                    crate::query::OrderDirection::Asc => query.order_by(column),
                    crate::query::OrderDirection::Desc => query.order_by_desc(column),
                };
            }
            if let Some(limit) = options.limit {
                query = query.limit(limit);
            }
            if let Some(offset) = options.offset {
                query = query.offset(offset);
            }

            let mut rows = query.fetch_all(self.backend.as_ref()).await?;

            for (name, spec) in &options.with {
                let relation = self.graph.relation(entity, name)?.clone();
                let local = relation.join.local_column.clone();
                let foreign = relation.join.foreign_column.clone();

                // Batch the related fetch over the distinct root keys.
                let mut keys: Vec<Value> = Vec::new();
                for row in &rows {
                    if let Some(value) = row.get(&local) {
                        if !value.is_null() && !keys.contains(value) {
                            keys.push(value.clone());
                        }
                    }
                }

                let child_options = match spec {
                    RelationSpec::All => FetchOptions::new(),
                    RelationSpec::Nested(nested) => nested.clone(),
                };
                let child_keeps_key = child_options
                    .columns
                    .as_ref()
                    .map_or(true, |columns| columns.contains(&foreign));

                let children: Vec<Row> = if keys.is_empty() {
                    Vec::new()
                } else {
                    let batched =
                        child_options.clone().filter(is_in(col(&foreign), keys.clone()));
                    self.fetch_tree(&relation.target, &batched, std::slice::from_ref(&foreign))
                        .await?
                };
                debug!(
                    entity,
                    relation = %name,
                    roots = rows.len(),
                    related = children.len(),
                    "resolved relation batch"
                );

                // Group related rows by key, preserving fetch order.
                let mut grouped: HashMap<String, Vec<Value>> = HashMap::new();
                for mut child in children {
                    let key = child
                        .get(&foreign)
                        .cloned()
                        .unwrap_or(Value::Null)
                        .to_string();
                    if !child_keeps_key {
                        child.remove(&foreign);
                    }
                    grouped.entry(key).or_default().push(Value::Object(child));
                }

                for row in &mut rows {
                    let key = row.get(&local).cloned().unwrap_or(Value::Null);
                    let matches = if key.is_null() {
                        Vec::new()
                    } else {
                        grouped.get(&key.to_string()).cloned().unwrap_or_default()
                    };
                    let value = if relation.kind.is_collection() {
                        Value::Array(matches)
                    } else {
                        // One-cardinality: a single object or null. A
                        // backend without the uniqueness constraint may
                        // return several rows; the first one wins.
                        matches.into_iter().next().unwrap_or(Value::Null)
                    };
                    row.insert(name.clone(), value);
                }
            }

            // Strip fetch-only columns, keeping the caller's group keys.
            for row in &mut rows {
                let extra: Vec<String> = row
                    .keys()
                    .filter(|key| {
                        fetch_columns.contains(*key)
                            && !requested.contains(*key)
                            && !keep.contains(*key)
                    })
                    .cloned()
                    .collect();
                for key in extra {
                    row.remove(&key);
                }
            }

            Ok(rows)
        })
    }
}
