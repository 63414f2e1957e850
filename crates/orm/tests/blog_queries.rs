//! Query integration tests over the blog schema and the memory backend

use std::sync::Arc;

use serde_json::json;

use quarry_orm::query::{between, col, count, count_all, eq, gt, lower, ne, qcol};
use quarry_orm::{blog, InsertBuilder, MemoryBackend, QueryBuilder};

async fn seeded_backend() -> (Arc<quarry_orm::SchemaRegistry>, MemoryBackend) {
    let registry = blog::schema().unwrap();
    let backend = MemoryBackend::new(registry.clone());

    InsertBuilder::new(registry.clone(), blog::USERS)
        .values_many(vec![
            json!({"id": "00000000-0000-0000-0000-000000000001", "name": "a", "age": 18, "email": "a@test.com"}),
            json!({"id": "00000000-0000-0000-0000-000000000002", "name": "b", "age": 18, "email": "b@test.com"}),
            json!({"id": "00000000-0000-0000-0000-000000000003", "name": "c", "age": 20, "email": "c@test.com"}),
        ])
        .execute(&backend)
        .await
        .unwrap();

    InsertBuilder::new(registry.clone(), blog::USER_PREFERENCES)
        .values(json!({
            "user_id": "00000000-0000-0000-0000-000000000001",
            "email_update": true,
        }))
        .execute(&backend)
        .await
        .unwrap();

    (registry, backend)
}

#[tokio::test]
async fn select_with_computed_lower_case_projection() {
    let (registry, backend) = seeded_backend().await;

    let rows = QueryBuilder::new(registry, blog::USERS)
        .select_columns(&["email", "name"])
        .select("lower_case_name", lower(col("name")))
        .order_by("name")
        .limit(10)
        .offset(0)
        .fetch_all(&backend)
        .await
        .unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["email"], json!("a@test.com"));
    assert_eq!(rows[0]["lower_case_name"], json!("a"));
}

#[tokio::test]
async fn filter_by_equality_and_range() {
    let (registry, backend) = seeded_backend().await;

    let adults = QueryBuilder::new(registry.clone(), blog::USERS)
        .select_columns(&["name", "age"])
        .filter(eq("age", 18))
        .order_by("name")
        .fetch_all(&backend)
        .await
        .unwrap();
    assert_eq!(adults.len(), 2);
    assert_eq!(adults[0]["name"], json!("a"));

    let in_range = QueryBuilder::new(registry.clone(), blog::USERS)
        .select_columns(&["name"])
        .filter(between("age", 1, 18))
        .fetch_all(&backend)
        .await
        .unwrap();
    assert_eq!(in_range.len(), 2);

    let excluded = QueryBuilder::new(registry, blog::USERS)
        .select_columns(&["name"])
        .filter(ne("name", "a").and(gt("age", 10)))
        .fetch_all(&backend)
        .await
        .unwrap();
    assert_eq!(excluded.len(), 2);
}

#[tokio::test]
async fn group_by_name_with_count() {
    let (registry, backend) = seeded_backend().await;

    let rows = QueryBuilder::new(registry, blog::USERS)
        .select_column("name")
        .select_aggregate("count", count(col("name")))
        .group_by(&["name"])
        .order_by("name")
        .fetch_all(&backend)
        .await
        .unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["count"], json!(1));
}

// Given ages {(18,a),(18,b),(20,c)}, only the 18 group survives
// having(count > 1).
#[tokio::test]
async fn group_by_age_having_count_greater_than_one() {
    let (registry, backend) = seeded_backend().await;

    let rows = QueryBuilder::new(registry, blog::USERS)
        .select_column("age")
        .select_aggregate("count", count_all())
        .group_by(&["age"])
        .having(gt("count", 1))
        .fetch_all(&backend)
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["age"], json!(18));
    assert_eq!(rows[0]["count"], json!(2));
}

// A user without preferences keeps their row; the preference column
// comes back null, not dropped.
#[tokio::test]
async fn left_join_keeps_users_without_preferences() {
    let (registry, backend) = seeded_backend().await;

    let rows = QueryBuilder::new(registry, blog::USERS)
        .select("id", qcol(blog::USERS, "id"))
        .select("name", qcol(blog::USERS, "name"))
        .select("email_update", qcol(blog::USER_PREFERENCES, "email_update"))
        .left_join(blog::USER_PREFERENCES, "users.id", "user_preferences.user_id")
        .order_by("name")
        .fetch_all(&backend)
        .await
        .unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["email_update"], json!(true));
    assert_eq!(rows[1]["email_update"], json!(null));
    assert_eq!(rows[2]["email_update"], json!(null));
}

#[tokio::test]
async fn inner_join_drops_users_without_preferences() {
    let (registry, backend) = seeded_backend().await;

    let rows = QueryBuilder::new(registry, blog::USERS)
        .select("name", qcol(blog::USERS, "name"))
        .join(blog::USER_PREFERENCES, "users.id", "user_preferences.user_id")
        .fetch_all(&backend)
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], json!("a"));
}

#[tokio::test]
async fn ordering_is_deterministic_and_paged() {
    let (registry, backend) = seeded_backend().await;

    let page = QueryBuilder::new(registry, blog::USERS)
        .select_columns(&["name", "age"])
        .order_by_desc("age")
        .order_by("name")
        .limit(2)
        .offset(1)
        .fetch_all(&backend)
        .await
        .unwrap();

    assert_eq!(page.len(), 2);
    assert_eq!(page[0]["name"], json!("a"));
    assert_eq!(page[1]["name"], json!("b"));
}

#[tokio::test]
async fn statement_count_is_observable() {
    let (registry, backend) = seeded_backend().await;
    backend.reset_statement_count();

    QueryBuilder::new(registry, blog::USERS)
        .fetch_all(&backend)
        .await
        .unwrap();

    assert_eq!(backend.statements_issued(), 1);
}

#[tokio::test]
async fn invalid_descriptors_never_reach_the_backend() {
    let (registry, backend) = seeded_backend().await;
    backend.reset_statement_count();

    let err = QueryBuilder::new(registry.clone(), blog::USERS)
        .select_column("missing")
        .fetch_all(&backend)
        .await
        .unwrap_err();
    assert!(matches!(err, quarry_orm::OrmError::Query(_)));

    let err = QueryBuilder::new(registry, blog::USERS)
        .limit(-1)
        .fetch_all(&backend)
        .await
        .unwrap_err();
    assert!(matches!(err, quarry_orm::OrmError::Query(_)));

    assert_eq!(backend.statements_issued(), 0);
}
