//! Update builder

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::backends::{Backend, StatementOutcome};
use crate::error::{OrmError, OrmResult};
use crate::mutation::insert::check_value;
use crate::query::validate::validate_entity_predicate;
use crate::query::{Predicate, Statement, UpdateStatement};
use crate::schema::SchemaRegistry;

/// Fluent builder for updates; a filter (or an explicit `all_rows()`)
/// is mandatory
#[derive(Debug, Clone)]
pub struct UpdateBuilder {
    registry: Arc<SchemaRegistry>,
    entity: String,
    set: Vec<(String, Value)>,
    filter: Option<Predicate>,
    all_rows: bool,
    returning: Option<Vec<String>>,
}

impl UpdateBuilder {
    pub fn new(registry: Arc<SchemaRegistry>, entity: &str) -> Self {
        Self {
            registry,
            entity: entity.to_string(),
            set: Vec::new(),
            filter: None,
            all_rows: false,
            returning: None,
        }
    }

    /// Set a column to a new value
    pub fn set<T: Into<Value>>(mut self, column: &str, value: T) -> Self {
        self.set.push((column.to_string(), value.into()));
        self
    }

    /// Restrict the update; multiple calls combine under AND
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// Explicitly opt into updating every row of the entity
    pub fn all_rows(mut self) -> Self {
        self.all_rows = true;
        self
    }

    /// Project the given columns of every updated row
    pub fn returning(mut self, columns: &[&str]) -> Self {
        self.returning = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Validate the descriptor and produce a compiled statement
    pub fn compile(&self) -> OrmResult<UpdateStatement> {
        let entity = self.registry.entity(&self.entity)?;

        if self.set.is_empty() {
            return Err(OrmError::Query(format!(
                "update on '{}' sets no columns",
                self.entity
            )));
        }
        for (column, value) in &self.set {
            let column_def = entity.column(column).ok_or_else(|| {
                OrmError::Query(format!(
                    "unknown column '{}' on entity '{}'",
                    column, self.entity
                ))
            })?;
            check_value(entity, column_def, value)?;
        }

        match (&self.filter, self.all_rows) {
            (None, false) => {
                return Err(OrmError::Query(format!(
                    "update on '{}' has no filter; call filter() or opt in with all_rows()",
                    self.entity
                )))
            }
            (Some(_), true) => {
                return Err(OrmError::Query(format!(
                    "update on '{}' combines a filter with all_rows()",
                    self.entity
                )))
            }
            (Some(filter), false) => {
                validate_entity_predicate(&self.registry, &self.entity, filter)?
            }
            (None, true) => {}
        }

        if let Some(returning) = &self.returning {
            for column in returning {
                if !entity.has_column(column) {
                    return Err(OrmError::Query(format!(
                        "returning references unknown column '{}' on '{}'",
                        column, self.entity
                    )));
                }
            }
        }

        debug!(entity = %self.entity, columns = self.set.len(), "compiled update");

        Ok(UpdateStatement {
            entity: self.entity.clone(),
            set: self.set.clone(),
            filter: self.filter.clone(),
            returning: self.returning.clone(),
        })
    }

    /// Compile and execute
    pub async fn execute(&self, backend: &dyn Backend) -> OrmResult<StatementOutcome> {
        let statement = Statement::Update(self.compile()?);
        backend.run(&statement).await
    }
}
