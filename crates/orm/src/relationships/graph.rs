//! Relation graph construction and lookup

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{OrmError, OrmResult};
use crate::relationships::types::{JoinCondition, RelationDef, RelationKind};
use crate::schema::SchemaRegistry;

/// Declares relations against a built registry and validates each edge
#[derive(Debug)]
pub struct RelationGraphBuilder {
    registry: Arc<SchemaRegistry>,
    relations: Vec<RelationDef>,
}

impl RelationGraphBuilder {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            relations: Vec::new(),
        }
    }

    /// Declare a one-to-one relation; `foreign_key` is the column on the
    /// target entity referencing the source's primary key
    pub fn has_one(self, source: &str, name: &str, target: &str, foreign_key: &str) -> Self {
        self.push(source, name, target, RelationKind::HasOne, foreign_key)
    }

    /// Declare a one-to-many relation; `foreign_key` is the column on the
    /// target entity referencing the source's primary key
    pub fn has_many(self, source: &str, name: &str, target: &str, foreign_key: &str) -> Self {
        self.push(source, name, target, RelationKind::HasMany, foreign_key)
    }

    /// Declare the owning side of a relation; `foreign_key` is the column
    /// on the source entity referencing the target's primary key
    pub fn belongs_to(self, source: &str, name: &str, target: &str, foreign_key: &str) -> Self {
        self.push(source, name, target, RelationKind::BelongsTo, foreign_key)
    }

    fn push(
        mut self,
        source: &str,
        name: &str,
        target: &str,
        kind: RelationKind,
        foreign_key: &str,
    ) -> Self {
        // The join condition is derived below in build(), once the edge
        // has been validated against the registry.
        self.relations.push(RelationDef {
            name: name.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            kind,
            join: JoinCondition {
                local_column: String::new(),
                foreign_column: foreign_key.to_string(),
            },
        });
        self
    }

    /// Validate every declared relation and produce the immutable graph
    pub fn build(self) -> OrmResult<Arc<RelationGraph>> {
        let mut relations: HashMap<String, HashMap<String, RelationDef>> = HashMap::new();

        for mut relation in self.relations {
            let source = self.registry.entity(&relation.source)?;
            let target = self.registry.entity(&relation.target)?;
            let fk_column = relation.join.foreign_column.clone();

            let (fk_owner, referenced) = match relation.kind {
                RelationKind::HasOne | RelationKind::HasMany => (target, source),
                RelationKind::BelongsTo => (source, target),
            };

            if referenced.primary_key.len() != 1 {
                return Err(OrmError::Schema(format!(
                    "relation '{}.{}' requires a single-column primary key on '{}'",
                    relation.source, relation.name, referenced.name
                )));
            }
            let pk_column = referenced.primary_key[0].clone();

            // Every edge must be backed by a registered foreign key.
            let backing = fk_owner.foreign_keys.iter().find(|fk| {
                fk.references_entity == referenced.name && fk.columns == vec![fk_column.clone()]
            });
            if backing.is_none() {
                return Err(OrmError::Schema(format!(
                    "relation '{}.{}' is not backed by a foreign key on '{}' ({} -> {}.{})",
                    relation.source,
                    relation.name,
                    fk_owner.name,
                    fk_column,
                    referenced.name,
                    pk_column
                )));
            }

            relation.join = match relation.kind {
                RelationKind::HasOne | RelationKind::HasMany => JoinCondition {
                    local_column: pk_column,
                    foreign_column: fk_column,
                },
                RelationKind::BelongsTo => JoinCondition {
                    local_column: fk_column,
                    foreign_column: pk_column,
                },
            };

            let per_source = relations.entry(relation.source.clone()).or_default();
            if per_source
                .insert(relation.name.clone(), relation.clone())
                .is_some()
            {
                return Err(OrmError::Schema(format!(
                    "relation '{}' declared more than once on '{}'",
                    relation.name, relation.source
                )));
            }
        }

        Ok(Arc::new(RelationGraph {
            registry: self.registry,
            relations,
        }))
    }
}

/// Immutable relation graph, built once alongside the registry
#[derive(Debug)]
pub struct RelationGraph {
    registry: Arc<SchemaRegistry>,
    relations: HashMap<String, HashMap<String, RelationDef>>,
}

impl RelationGraph {
    /// The registry this graph was built against
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Resolve a relation by source entity and name
    pub fn relation(&self, entity: &str, name: &str) -> OrmResult<&RelationDef> {
        self.relations
            .get(entity)
            .and_then(|per_source| per_source.get(name))
            .ok_or_else(|| {
                OrmError::Query(format!(
                    "entity '{}' declares no relation named '{}'",
                    entity, name
                ))
            })
    }

    /// Names of all relations declared on an entity
    pub fn relation_names(&self, entity: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .relations
            .get(entity)
            .map(|per_source| per_source.keys().map(|k| k.as_str()).collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, ColumnType, EntityDef, SchemaBuilder};

    fn registry() -> Arc<SchemaRegistry> {
        SchemaBuilder::new()
            .entity(
                EntityDef::new("users")
                    .with_column(ColumnDef::new("id", ColumnType::Uuid).default_generated_uuid())
                    .with_column(ColumnDef::new("name", ColumnType::VarChar(255)))
                    .with_primary_key(&["id"]),
            )
            .entity(
                EntityDef::new("posts")
                    .with_column(ColumnDef::new("id", ColumnType::Uuid).default_generated_uuid())
                    .with_column(ColumnDef::new("author_id", ColumnType::Uuid))
                    .with_primary_key(&["id"])
                    .with_foreign_key("posts_author_id_fkey", &["author_id"], "users", &["id"]),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_graph_derives_join_conditions() {
        let graph = RelationGraphBuilder::new(registry())
            .has_many("users", "posts", "posts", "author_id")
            .belongs_to("posts", "author", "users", "author_id")
            .build()
            .unwrap();

        let posts = graph.relation("users", "posts").unwrap();
        assert_eq!(posts.kind, RelationKind::HasMany);
        assert_eq!(posts.join.local_column, "id");
        assert_eq!(posts.join.foreign_column, "author_id");

        let author = graph.relation("posts", "author").unwrap();
        assert_eq!(author.kind, RelationKind::BelongsTo);
        assert_eq!(author.join.local_column, "author_id");
        assert_eq!(author.join.foreign_column, "id");
    }

    #[test]
    fn test_graph_rejects_relation_without_backing_foreign_key() {
        let err = RelationGraphBuilder::new(registry())
            .has_many("users", "posts", "posts", "id")
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("not backed by a foreign key"));
    }

    #[test]
    fn test_unknown_relation_is_a_query_error() {
        let graph = RelationGraphBuilder::new(registry())
            .has_many("users", "posts", "posts", "author_id")
            .build()
            .unwrap();

        let err = graph.relation("users", "preferences").unwrap_err();
        assert!(matches!(err, OrmError::Query(_)));
    }
}
