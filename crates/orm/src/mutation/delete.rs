//! Delete builder
//!
//! Deleting a row still referenced by a foreign key fails with a
//! referential-integrity error; no cascade is ever assumed.

use std::sync::Arc;

use tracing::debug;

use crate::backends::{Backend, StatementOutcome};
use crate::error::{OrmError, OrmResult};
use crate::query::validate::validate_entity_predicate;
use crate::query::{DeleteStatement, Predicate, Statement};
use crate::schema::SchemaRegistry;

/// Fluent builder for deletes; a filter (or an explicit `all_rows()`)
/// is mandatory
#[derive(Debug, Clone)]
pub struct DeleteBuilder {
    registry: Arc<SchemaRegistry>,
    entity: String,
    filter: Option<Predicate>,
    all_rows: bool,
}

impl DeleteBuilder {
    pub fn new(registry: Arc<SchemaRegistry>, entity: &str) -> Self {
        Self {
            registry,
            entity: entity.to_string(),
            filter: None,
            all_rows: false,
        }
    }

    /// Restrict the delete; multiple calls combine under AND
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// Explicitly opt into deleting every row of the entity
    pub fn all_rows(mut self) -> Self {
        self.all_rows = true;
        self
    }

    /// Validate the descriptor and produce a compiled statement
    pub fn compile(&self) -> OrmResult<DeleteStatement> {
        self.registry.entity(&self.entity)?;

        match (&self.filter, self.all_rows) {
            (None, false) => {
                return Err(OrmError::Query(format!(
                    "delete on '{}' has no filter; call filter() or opt in with all_rows()",
                    self.entity
                )))
            }
            (Some(_), true) => {
                return Err(OrmError::Query(format!(
                    "delete on '{}' combines a filter with all_rows()",
                    self.entity
                )))
            }
            (Some(filter), false) => {
                validate_entity_predicate(&self.registry, &self.entity, filter)?
            }
            (None, true) => {}
        }

        debug!(entity = %self.entity, "compiled delete");

        Ok(DeleteStatement {
            entity: self.entity.clone(),
            filter: self.filter.clone(),
        })
    }

    /// Compile and execute
    pub async fn execute(&self, backend: &dyn Backend) -> OrmResult<StatementOutcome> {
        let statement = Statement::Delete(self.compile()?);
        backend.run(&statement).await
    }
}
