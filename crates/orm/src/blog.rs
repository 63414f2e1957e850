//! The blog schema: users, preferences, posts, categories, and the
//! post↔category association
//!
//! `user_preferences.user_id` carries a unique constraint, so the
//! user↔preferences relation is a real one-to-one. No cascade is
//! declared anywhere; deleting a referenced user fails.

use std::sync::Arc;

use crate::error::OrmResult;
use crate::relationships::{RelationGraph, RelationGraphBuilder};
use crate::schema::{ColumnDef, ColumnType, EntityDef, SchemaBuilder, SchemaRegistry};

pub const USERS: &str = "users";
pub const USER_PREFERENCES: &str = "user_preferences";
pub const POSTS: &str = "posts";
pub const CATEGORIES: &str = "categories";
pub const POST_CATEGORIES: &str = "post_categories";

/// User role variants
pub mod role {
    pub const ADMIN: &str = "ADMIN";
    pub const BASIC: &str = "BASIC";
}

fn user_role() -> ColumnType {
    ColumnType::Enum {
        name: "user_role".to_string(),
        variants: vec![role::ADMIN.to_string(), role::BASIC.to_string()],
    }
}

/// Build the blog schema registry
pub fn schema() -> OrmResult<Arc<SchemaRegistry>> {
    SchemaBuilder::new()
        .entity(
            EntityDef::new(USERS)
                .with_column(ColumnDef::new("id", ColumnType::Uuid).default_generated_uuid())
                .with_column(ColumnDef::new("name", ColumnType::VarChar(255)))
                .with_column(ColumnDef::new("age", ColumnType::Integer))
                .with_column(ColumnDef::new("email", ColumnType::VarChar(255)))
                .with_column(ColumnDef::new("role", user_role()).default_value(role::BASIC))
                .with_primary_key(&["id"])
                .with_unique("users_email_key", &["email"])
                .with_unique("users_name_age_key", &["name", "age"]),
        )
        .entity(
            EntityDef::new(USER_PREFERENCES)
                .with_column(ColumnDef::new("id", ColumnType::Uuid).default_generated_uuid())
                .with_column(
                    ColumnDef::new("email_update", ColumnType::Boolean).default_value(false),
                )
                .with_column(ColumnDef::new("user_id", ColumnType::Uuid))
                .with_primary_key(&["id"])
                .with_unique("user_preferences_user_id_key", &["user_id"])
                .with_foreign_key(
                    "user_preferences_user_id_fkey",
                    &["user_id"],
                    USERS,
                    &["id"],
                ),
        )
        .entity(
            EntityDef::new(POSTS)
                .with_column(ColumnDef::new("id", ColumnType::Uuid).default_generated_uuid())
                .with_column(ColumnDef::new("title", ColumnType::VarChar(255)))
                .with_column(ColumnDef::new("average_rating", ColumnType::Real).default_value(0))
                .with_column(ColumnDef::new("created_at", ColumnType::Timestamp).default_now())
                .with_column(ColumnDef::new("updated_at", ColumnType::Timestamp).default_now())
                .with_column(ColumnDef::new("author_id", ColumnType::Uuid))
                .with_primary_key(&["id"])
                .with_foreign_key("posts_author_id_fkey", &["author_id"], USERS, &["id"]),
        )
        .entity(
            EntityDef::new(CATEGORIES)
                .with_column(ColumnDef::new("id", ColumnType::Uuid).default_generated_uuid())
                .with_column(ColumnDef::new("name", ColumnType::VarChar(255)))
                .with_primary_key(&["id"]),
        )
        .entity(
            EntityDef::new(POST_CATEGORIES)
                .with_column(ColumnDef::new("post_id", ColumnType::Uuid))
                .with_column(ColumnDef::new("category_id", ColumnType::Uuid))
                .with_primary_key(&["post_id", "category_id"])
                .with_foreign_key("post_categories_post_id_fkey", &["post_id"], POSTS, &["id"])
                .with_foreign_key(
                    "post_categories_category_id_fkey",
                    &["category_id"],
                    CATEGORIES,
                    &["id"],
                ),
        )
        .build()
}

/// Build the relation graph over the blog schema
///
/// Post↔Category is encoded through the association entity: `posts` has
/// many `post_categories`, each of which belongs to one `category`.
pub fn relations(registry: Arc<SchemaRegistry>) -> OrmResult<Arc<RelationGraph>> {
    RelationGraphBuilder::new(registry)
        .has_one(USERS, "preferences", USER_PREFERENCES, "user_id")
        .has_many(USERS, "posts", POSTS, "author_id")
        .belongs_to(USER_PREFERENCES, "user", USERS, "user_id")
        .belongs_to(POSTS, "author", USERS, "author_id")
        .has_many(POSTS, "post_categories", POST_CATEGORIES, "post_id")
        .has_many(CATEGORIES, "post_categories", POST_CATEGORIES, "category_id")
        .belongs_to(POST_CATEGORIES, "post", POSTS, "post_id")
        .belongs_to(POST_CATEGORIES, "category", CATEGORIES, "category_id")
        .build()
}

/// Build the registry and graph together
pub fn model() -> OrmResult<(Arc<SchemaRegistry>, Arc<RelationGraph>)> {
    let registry = schema()?;
    let graph = relations(registry.clone())?;
    Ok((registry, graph))
}
