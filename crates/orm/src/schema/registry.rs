//! Entity definitions and the registry builder
//!
//! `SchemaBuilder::build` performs the whole-registry validation pass:
//! duplicate entity, column, and constraint names are rejected, key and
//! constraint columns must exist, and every foreign key must resolve to
//! the primary key of a registered target entity. Nothing downstream ever
//! sees a registry that failed these checks.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{OrmError, OrmResult};
use crate::schema::column::ColumnDef;

/// A named uniqueness constraint over one or more columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    pub name: String,
    pub columns: Vec<String>,
}

/// A named foreign key edge from this entity to a target entity's primary key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyDef {
    pub name: String,
    /// Columns on the owning entity
    pub columns: Vec<String>,
    /// Target entity name
    pub references_entity: String,
    /// Referenced columns on the target entity (its primary key)
    pub references_columns: Vec<String>,
}

/// A registered entity: columns, primary key, uniqueness constraints,
/// and foreign key edges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    /// Entity name, also used as the table name
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<String>,
    pub uniques: Vec<UniqueConstraint>,
    pub foreign_keys: Vec<ForeignKeyDef>,
}

impl EntityDef {
    /// Create an entity with no columns or constraints
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            uniques: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Add a column
    pub fn with_column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Set the primary key columns
    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Add a named uniqueness constraint
    pub fn with_unique(mut self, name: &str, columns: &[&str]) -> Self {
        self.uniques.push(UniqueConstraint {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    /// Add a named foreign key referencing the target entity's primary key
    pub fn with_foreign_key(
        mut self,
        name: &str,
        columns: &[&str],
        references_entity: &str,
        references_columns: &[&str],
    ) -> Self {
        self.foreign_keys.push(ForeignKeyDef {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            references_entity: references_entity.to_string(),
            references_columns: references_columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether the entity declares the named column
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Column names in declaration order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// The conventional name of the implicit primary key constraint
    pub fn primary_key_constraint_name(&self) -> String {
        format!("{}_pkey", self.name)
    }

    fn validate_local(&self) -> OrmResult<()> {
        if self.columns.is_empty() {
            return Err(OrmError::Schema(format!(
                "entity '{}' declares no columns",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(OrmError::Schema(format!(
                    "entity '{}' declares column '{}' more than once",
                    self.name, column.name
                )));
            }
        }

        if self.primary_key.is_empty() {
            return Err(OrmError::Schema(format!(
                "entity '{}' has no primary key",
                self.name
            )));
        }
        for key_column in &self.primary_key {
            match self.column(key_column) {
                None => {
                    return Err(OrmError::Schema(format!(
                        "primary key of '{}' references unknown column '{}'",
                        self.name, key_column
                    )))
                }
                Some(column) if column.nullable => {
                    return Err(OrmError::Schema(format!(
                        "primary key column '{}.{}' cannot be nullable",
                        self.name, key_column
                    )))
                }
                Some(_) => {}
            }
        }

        for unique in &self.uniques {
            for column in &unique.columns {
                if !self.has_column(column) {
                    return Err(OrmError::Schema(format!(
                        "unique constraint '{}' references unknown column '{}.{}'",
                        unique.name, self.name, column
                    )));
                }
            }
        }

        for fk in &self.foreign_keys {
            for column in &fk.columns {
                if !self.has_column(column) {
                    return Err(OrmError::Schema(format!(
                        "foreign key '{}' references unknown column '{}.{}'",
                        fk.name, self.name, column
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Collects entity definitions and validates them as a whole
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    entities: Vec<EntityDef>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity definition
    pub fn entity(mut self, entity: EntityDef) -> Self {
        self.entities.push(entity);
        self
    }

    /// Validate every entity and cross-entity reference, producing the
    /// immutable registry
    pub fn build(self) -> OrmResult<Arc<SchemaRegistry>> {
        let mut entities = BTreeMap::new();
        for entity in &self.entities {
            entity.validate_local()?;
            if entities
                .insert(entity.name.clone(), entity.clone())
                .is_some()
            {
                return Err(OrmError::Schema(format!(
                    "entity '{}' registered more than once",
                    entity.name
                )));
            }
        }

        // Constraint names share a namespace across the whole schema.
        let mut constraint_names = HashSet::new();
        for entity in entities.values() {
            for name in entity
                .uniques
                .iter()
                .map(|u| u.name.as_str())
                .chain(entity.foreign_keys.iter().map(|fk| fk.name.as_str()))
            {
                if !constraint_names.insert(name.to_string()) {
                    return Err(OrmError::Schema(format!(
                        "duplicate constraint name '{}'",
                        name
                    )));
                }
            }
        }

        // Every foreign key must land on the primary key of a registered
        // target entity.
        for entity in entities.values() {
            for fk in &entity.foreign_keys {
                let target = entities.get(&fk.references_entity).ok_or_else(|| {
                    OrmError::Schema(format!(
                        "foreign key '{}' references unknown entity '{}'",
                        fk.name, fk.references_entity
                    ))
                })?;
                for column in &fk.references_columns {
                    if !target.has_column(column) {
                        return Err(OrmError::Schema(format!(
                            "foreign key '{}' references unknown column '{}.{}'",
                            fk.name, target.name, column
                        )));
                    }
                }
                if fk.references_columns != target.primary_key {
                    return Err(OrmError::Schema(format!(
                        "foreign key '{}' must reference the primary key of '{}'",
                        fk.name, target.name
                    )));
                }
                if fk.columns.len() != fk.references_columns.len() {
                    return Err(OrmError::Schema(format!(
                        "foreign key '{}' has mismatched column counts",
                        fk.name
                    )));
                }
            }
        }

        Ok(Arc::new(SchemaRegistry { entities }))
    }
}

/// Immutable registry of entity definitions, built once at startup
#[derive(Debug)]
pub struct SchemaRegistry {
    entities: BTreeMap<String, EntityDef>,
}

impl SchemaRegistry {
    /// Look up an entity, failing with a schema error if unknown
    pub fn entity(&self, name: &str) -> OrmResult<&EntityDef> {
        self.entities
            .get(name)
            .ok_or_else(|| OrmError::Schema(format!("unknown entity '{}'", name)))
    }

    /// Look up an entity without failing
    pub fn get(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    /// Registered entity names, sorted
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.keys().map(|k| k.as_str()).collect()
    }

    /// All registered entities, sorted by name
    pub fn entities(&self) -> impl Iterator<Item = &EntityDef> {
        self.entities.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::column::ColumnType;

    fn users() -> EntityDef {
        EntityDef::new("users")
            .with_column(ColumnDef::new("id", ColumnType::Uuid).default_generated_uuid())
            .with_column(ColumnDef::new("name", ColumnType::VarChar(255)))
            .with_primary_key(&["id"])
    }

    #[test]
    fn test_build_accepts_well_formed_schema() {
        let registry = SchemaBuilder::new()
            .entity(users())
            .entity(
                EntityDef::new("posts")
                    .with_column(ColumnDef::new("id", ColumnType::Uuid).default_generated_uuid())
                    .with_column(ColumnDef::new("author_id", ColumnType::Uuid))
                    .with_primary_key(&["id"])
                    .with_foreign_key("posts_author_id_fkey", &["author_id"], "users", &["id"]),
            )
            .build()
            .unwrap();

        assert_eq!(registry.entity_names(), vec!["posts", "users"]);
        assert!(registry.entity("posts").unwrap().has_column("author_id"));
    }

    #[test]
    fn test_build_rejects_foreign_key_to_unknown_entity() {
        let err = SchemaBuilder::new()
            .entity(
                EntityDef::new("posts")
                    .with_column(ColumnDef::new("id", ColumnType::Uuid))
                    .with_column(ColumnDef::new("author_id", ColumnType::Uuid))
                    .with_primary_key(&["id"])
                    .with_foreign_key("posts_author_id_fkey", &["author_id"], "users", &["id"]),
            )
            .build()
            .unwrap_err();

        assert!(matches!(err, OrmError::Schema(_)));
    }

    #[test]
    fn test_build_rejects_foreign_key_off_primary_key() {
        let err = SchemaBuilder::new()
            .entity(users())
            .entity(
                EntityDef::new("posts")
                    .with_column(ColumnDef::new("id", ColumnType::Uuid))
                    .with_column(ColumnDef::new("author_name", ColumnType::VarChar(255)))
                    .with_primary_key(&["id"])
                    .with_foreign_key("posts_author_fkey", &["author_name"], "users", &["name"]),
            )
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("primary key"));
    }

    #[test]
    fn test_build_rejects_duplicate_constraint_names() {
        let err = SchemaBuilder::new()
            .entity(
                users().with_unique("shared_name", &["name"]),
            )
            .entity(
                EntityDef::new("categories")
                    .with_column(ColumnDef::new("id", ColumnType::Uuid))
                    .with_column(ColumnDef::new("name", ColumnType::VarChar(255)))
                    .with_primary_key(&["id"])
                    .with_unique("shared_name", &["name"]),
            )
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("duplicate constraint name"));
    }

    #[test]
    fn test_build_rejects_unknown_primary_key_column() {
        let err = SchemaBuilder::new()
            .entity(
                EntityDef::new("users")
                    .with_column(ColumnDef::new("id", ColumnType::Uuid))
                    .with_primary_key(&["uuid"]),
            )
            .build()
            .unwrap_err();

        assert!(matches!(err, OrmError::Schema(_)));
    }
}
