//! Insert builder
//!
//! Validates rows against the registry (unknown columns, missing
//! required values, type and length mismatches) and materializes column
//! defaults before anything reaches a backend. Conflict handling is an
//! explicit opt-in targeting a declared unique key.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::backends::{Backend, StatementOutcome};
use crate::error::{OrmError, OrmResult};
use crate::query::{InsertStatement, OnConflict, Statement};
use crate::schema::{ColumnDef, ColumnDefault, ColumnType, EntityDef, SchemaRegistry};

/// Fluent builder for multi-row inserts
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    registry: Arc<SchemaRegistry>,
    entity: String,
    rows: Vec<Value>,
    on_conflict: Option<(Vec<String>, Vec<(String, Value)>)>,
    returning: Option<Vec<String>>,
}

impl InsertBuilder {
    pub fn new(registry: Arc<SchemaRegistry>, entity: &str) -> Self {
        Self {
            registry,
            entity: entity.to_string(),
            rows: Vec::new(),
            on_conflict: None,
            returning: None,
        }
    }

    /// Add a row as a JSON object of column values
    pub fn values(mut self, row: Value) -> Self {
        self.rows.push(row);
        self
    }

    /// Add several rows at once
    pub fn values_many(mut self, rows: Vec<Value>) -> Self {
        self.rows.extend(rows);
        self
    }

    /// Project the given columns of every inserted row
    pub fn returning(mut self, columns: &[&str]) -> Self {
        self.returning = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Opt into update-on-conflict for the unique key over `target`
    pub fn on_conflict(self, target: &[&str]) -> OnConflictBuilder {
        OnConflictBuilder {
            insert: self,
            target: target.iter().map(|c| c.to_string()).collect(),
            set: Vec::new(),
        }
    }

    /// Validate every row, materialize defaults, and produce a compiled
    /// statement
    pub fn compile(&self) -> OrmResult<InsertStatement> {
        let entity = self.registry.entity(&self.entity)?;
        if self.rows.is_empty() {
            return Err(OrmError::Query(format!(
                "insert into '{}' has no rows",
                self.entity
            )));
        }

        let mut rows = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let fields = row.as_object().ok_or_else(|| {
                OrmError::Query(format!(
                    "insert row for '{}' must be a JSON object",
                    self.entity
                ))
            })?;
            for column in fields.keys() {
                if !entity.has_column(column) {
                    return Err(OrmError::Query(format!(
                        "unknown column '{}' on entity '{}'",
                        column, self.entity
                    )));
                }
            }

            let mut values = Vec::with_capacity(entity.columns.len());
            for column in &entity.columns {
                let value = match fields.get(&column.name) {
                    Some(provided) => {
                        check_value(entity, column, provided)?;
                        provided.clone()
                    }
                    None => materialize_default(entity, column)?,
                };
                values.push(value);
            }
            rows.push(values);
        }

        let on_conflict = match &self.on_conflict {
            Some((target, set)) => Some(self.compile_conflict(entity, target, set)?),
            None => None,
        };

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

        debug!(entity = %self.entity, rows = rows.len(), "compiled insert");

        Ok(InsertStatement {
            entity: self.entity.clone(),
            columns: entity.column_names().iter().map(|c| c.to_string()).collect(),
            rows,
            on_conflict,
            returning: self.returning.clone(),
        })
    }

    // The conflict target must match the primary key or a declared
    // unique constraint; an arbitrary column set is rejected.
    fn compile_conflict(
        &self,
        entity: &EntityDef,
        target: &[String],
        set: &[(String, Value)],
    ) -> OrmResult<OnConflict> {
        let mut sorted_target = target.to_vec();
        sorted_target.sort_unstable();

        let constraint = if sorted_set(&entity.primary_key) == sorted_target {
            entity.primary_key_constraint_name()
        } else {
            entity
                .uniques
                .iter()
                .find(|unique| sorted_set(&unique.columns) == sorted_target)
                .map(|unique| unique.name.clone())
                .ok_or_else(|| {
                    OrmError::Query(format!(
                        "on-conflict target {:?} does not match a unique constraint on '{}'",
                        target, entity.name
                    ))
                })?
        };

        if set.is_empty() {
            return Err(OrmError::Query(
                "on-conflict policy has no update columns".to_string(),
            ));
        }
        for (column, value) in set {
            let column_def = entity.column(column).ok_or_else(|| {
                OrmError::Query(format!(
                    "on-conflict update references unknown column '{}' on '{}'",
                    column, entity.name
                ))
            })?;
            check_value(entity, column_def, value)?;
        }

        Ok(OnConflict {
            target: target.to_vec(),
            constraint,
            set: set.to_vec(),
        })
    }

    /// Compile and execute
    pub async fn execute(&self, backend: &dyn Backend) -> OrmResult<StatementOutcome> {
        let statement = Statement::Insert(self.compile()?);
        backend.run(&statement).await
    }
}

/// Builder for the update-on-conflict policy of an insert
#[derive(Debug, Clone)]
pub struct OnConflictBuilder {
    insert: InsertBuilder,
    target: Vec<String>,
    set: Vec<(String, Value)>,
}

impl OnConflictBuilder {
    /// Column update applied to the existing row on conflict
    pub fn update_set<T: Into<Value>>(mut self, column: &str, value: T) -> Self {
        self.set.push((column.to_string(), value.into()));
        self
    }

    /// Finish the policy and return to the insert builder
    pub fn finish(mut self) -> InsertBuilder {
        self.insert.on_conflict = Some((self.target, self.set));
        self.insert
    }
}

fn sorted_set(columns: &[String]) -> Vec<String> {
    let mut sorted = columns.to_vec();
    sorted.sort_unstable();
    sorted
}

fn materialize_default(entity: &EntityDef, column: &ColumnDef) -> OrmResult<Value> {
    match &column.default {
        Some(ColumnDefault::GeneratedUuid) => Ok(Value::String(Uuid::new_v4().to_string())),
        Some(ColumnDefault::Now) => Ok(Value::String(Utc::now().to_rfc3339())),
        Some(ColumnDefault::Value(value)) => Ok(value.clone()),
        None if column.nullable => Ok(Value::Null),
        None => Err(OrmError::Query(format!(
            "missing required column '{}.{}'",
            entity.name, column.name
        ))),
    }
}

pub(crate) fn check_value(entity: &EntityDef, column: &ColumnDef, value: &Value) -> OrmResult<()> {
    if value.is_null() {
        if column.nullable {
            return Ok(());
        }
        return Err(OrmError::Query(format!(
            "column '{}.{}' is not nullable",
            entity.name, column.name
        )));
    }

    let ok = match &column.column_type {
        ColumnType::Uuid | ColumnType::Timestamp => value.is_string(),
        ColumnType::VarChar(max_len) => match value.as_str() {
            Some(text) => {
                if text.chars().count() > *max_len as usize {
                    return Err(OrmError::Query(format!(
                        "value for '{}.{}' exceeds length {}",
                        entity.name, column.name, max_len
                    )));
                }
                true
            }
            None => false,
        },
        ColumnType::Integer => value.as_i64().is_some(),
        ColumnType::Real => value.is_number(),
        ColumnType::Boolean => value.is_boolean(),
        ColumnType::Enum { name, variants } => match value.as_str() {
            Some(text) => {
                if !variants.iter().any(|variant| variant == text) {
                    return Err(OrmError::Query(format!(
                        "'{}' is not a variant of enum '{}'",
                        text, name
                    )));
                }
                true
            }
            None => false,
        },
    };

    if !ok {
        return Err(OrmError::Query(format!(
            "value {} does not match the type of '{}.{}'",
            value, entity.name, column.name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaBuilder;
    use serde_json::json;

    fn registry() -> Arc<SchemaRegistry> {
        SchemaBuilder::new()
            .entity(
                EntityDef::new("users")
                    .with_column(ColumnDef::new("id", ColumnType::Uuid).default_generated_uuid())
                    .with_column(ColumnDef::new("name", ColumnType::VarChar(8)))
                    .with_column(ColumnDef::new("age", ColumnType::Integer))
                    .with_column(
                        ColumnDef::new(
                            "role",
                            ColumnType::Enum {
                                name: "user_role".to_string(),
                                variants: vec!["ADMIN".to_string(), "BASIC".to_string()],
                            },
                        )
                        .default_value("BASIC"),
                    )
                    .with_primary_key(&["id"])
                    .with_unique("users_name_age_key", &["name", "age"]),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_defaults_are_materialized() {
        let statement = InsertBuilder::new(registry(), "users")
            .values(json!({"name": "derek", "age": 18}))
            .compile()
            .unwrap();

        assert_eq!(statement.columns, vec!["id", "name", "age", "role"]);
        let row = &statement.rows[0];
        assert!(row[0].is_string());
        assert_eq!(row[3], json!("BASIC"));
    }

    #[test]
    fn test_missing_required_column_is_a_build_error() {
        let err = InsertBuilder::new(registry(), "users")
            .values(json!({"name": "derek"}))
            .compile()
            .unwrap_err();
        assert!(err.to_string().contains("missing required column"));
    }

    #[test]
    fn test_length_bound_is_enforced() {
        let err = InsertBuilder::new(registry(), "users")
            .values(json!({"name": "a-very-long-name", "age": 18}))
            .compile()
            .unwrap_err();
        assert!(err.to_string().contains("exceeds length"));
    }

    #[test]
    fn test_enum_variants_are_closed() {
        let err = InsertBuilder::new(registry(), "users")
            .values(json!({"name": "derek", "age": 18, "role": "ROOT"}))
            .compile()
            .unwrap_err();
        assert!(err.to_string().contains("user_role"));
    }

    #[test]
    fn test_conflict_target_must_match_a_unique_key() {
        let err = InsertBuilder::new(registry(), "users")
            .values(json!({"name": "derek", "age": 18}))
            .on_conflict(&["age"])
            .update_set("name", "updated")
            .finish()
            .compile()
            .unwrap_err();
        assert!(err.to_string().contains("does not match a unique constraint"));

        let statement = InsertBuilder::new(registry(), "users")
            .values(json!({"name": "derek", "age": 18}))
            .on_conflict(&["name", "age"])
            .update_set("age", 19)
            .finish()
            .compile()
            .unwrap();
        assert_eq!(
            statement.on_conflict.unwrap().constraint,
            "users_name_age_key"
        );
    }
}
