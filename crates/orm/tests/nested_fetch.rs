//! Nested fetch resolution tests: tree shape, empty relations, and the
//! bounded-query batching property

use std::sync::Arc;

use serde_json::json;

use quarry_orm::query::eq;
use quarry_orm::{blog, Backend, FetchOptions, InsertBuilder, MemoryBackend, OrmError, Resolver};

const USER_A: &str = "00000000-0000-0000-0000-0000000000a1";
const USER_B: &str = "00000000-0000-0000-0000-0000000000b2";
const USER_C: &str = "00000000-0000-0000-0000-0000000000c3";

async fn seed(registry: &Arc<quarry_orm::SchemaRegistry>, backend: &MemoryBackend) {
    InsertBuilder::new(registry.clone(), blog::USERS)
        .values_many(vec![
            json!({"id": USER_A, "name": "a", "age": 18, "email": "a@test.com"}),
            json!({"id": USER_B, "name": "b", "age": 18, "email": "b@test.com"}),
            json!({"id": USER_C, "name": "c", "age": 20, "email": "c@test.com"}),
        ])
        .execute(backend)
        .await
        .unwrap();

    InsertBuilder::new(registry.clone(), blog::USER_PREFERENCES)
        .values(json!({"user_id": USER_A, "email_update": true}))
        .execute(backend)
        .await
        .unwrap();

    InsertBuilder::new(registry.clone(), blog::CATEGORIES)
        .values(json!({"id": "00000000-0000-0000-0000-00000000ca01", "name": "rust"}))
        .execute(backend)
        .await
        .unwrap();

    InsertBuilder::new(registry.clone(), blog::POSTS)
        .values_many(vec![
            json!({"id": "00000000-0000-0000-0000-0000000000f1", "title": "first", "author_id": USER_A}),
            json!({"id": "00000000-0000-0000-0000-0000000000f2", "title": "second", "author_id": USER_A}),
            json!({"id": "00000000-0000-0000-0000-0000000000f3", "title": "third", "author_id": USER_B}),
        ])
        .execute(backend)
        .await
        .unwrap();

    InsertBuilder::new(registry.clone(), blog::POST_CATEGORIES)
        .values(json!({
            "post_id": "00000000-0000-0000-0000-0000000000f1",
            "category_id": "00000000-0000-0000-0000-00000000ca01",
        }))
        .execute(backend)
        .await
        .unwrap();
}

async fn resolver() -> (Arc<MemoryBackend>, Resolver) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let (registry, graph) = blog::model().unwrap();
    let backend = Arc::new(MemoryBackend::new(registry.clone()));
    seed(&registry, &backend).await;
    let resolver = Resolver::new(graph, backend.clone() as Arc<dyn Backend>);
    (backend, resolver)
}

#[tokio::test]
async fn nested_tree_matches_the_requested_shape() {
    let (_, resolver) = resolver().await;

    let users = resolver
        .find_many(
            blog::USERS,
            FetchOptions::new()
                .columns(&["name", "age"])
                .filter(eq("age", 18))
                .order_by("name")
                .with_nested("posts", FetchOptions::new().with("post_categories")),
        )
        .await
        .unwrap();

    assert_eq!(users.len(), 2);

    let first = users[0].as_object().unwrap();
    assert_eq!(first["name"], json!("a"));
    // Only the requested columns survive; the join key fetched
    // internally is stripped.
    assert!(!first.contains_key("id"));

    let posts = first["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0]["title"], json!("first"));
    let post_categories = posts[0]["post_categories"].as_array().unwrap();
    assert_eq!(post_categories.len(), 1);
    assert_eq!(posts[1]["post_categories"].as_array().unwrap().len(), 0);

    let second = users[1].as_object().unwrap();
    assert_eq!(second["posts"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn user_with_no_posts_gets_an_empty_sequence() {
    let (_, resolver) = resolver().await;

    let users = resolver
        .find_many(
            blog::USERS,
            FetchOptions::new().filter(eq("name", "c")).with("posts"),
        )
        .await
        .unwrap();

    assert_eq!(users.len(), 1);
    let posts = users[0].as_object().unwrap()["posts"].as_array().unwrap();
    assert!(posts.is_empty());
}

#[tokio::test]
async fn one_cardinality_relation_is_object_or_null() {
    let (_, resolver) = resolver().await;

    let users = resolver
        .find_many(
            blog::USERS,
            FetchOptions::new()
                .columns(&["name"])
                .order_by("name")
                .with("preferences"),
        )
        .await
        .unwrap();

    let with_preferences = users[0].as_object().unwrap();
    assert_eq!(
        with_preferences["preferences"]["email_update"],
        json!(true)
    );

    let without_preferences = users[1].as_object().unwrap();
    assert_eq!(without_preferences["preferences"], json!(null));
}

// The defining performance property: the statement count depends on the
// relation tree, never on the number of root rows.
#[tokio::test]
async fn batched_fetch_issues_a_bounded_number_of_statements() {
    let (backend, resolver) = resolver().await;
    let registry = blog::schema().unwrap();

    let options = || {
        FetchOptions::new().with_nested("posts", FetchOptions::new().with("post_categories"))
    };

    backend.reset_statement_count();
    resolver.find_many(blog::USERS, options()).await.unwrap();
    let for_three_roots = backend.statements_issued();
    assert_eq!(for_three_roots, 3); // users + posts + post_categories

    // Ten times the root rows, same statement count.
    let extra: Vec<_> = (10..40)
        .map(|i| {
            json!({
                "name": format!("user-{}", i),
                "age": i,
                "email": format!("user-{}@test.com", i),
            })
        })
        .collect();
    InsertBuilder::new(registry, blog::USERS)
        .values_many(extra)
        .execute(backend.as_ref())
        .await
        .unwrap();

    backend.reset_statement_count();
    resolver.find_many(blog::USERS, options()).await.unwrap();
    assert_eq!(backend.statements_issued(), for_three_roots);
}

#[tokio::test]
async fn undeclared_relation_fails_before_any_query() {
    let (backend, resolver) = resolver().await;
    backend.reset_statement_count();

    let err = resolver
        .find_many(blog::USERS, FetchOptions::new().with("comments"))
        .await
        .unwrap_err();

    assert!(matches!(err, OrmError::Query(_)));
    assert_eq!(backend.statements_issued(), 0);
}

#[tokio::test]
async fn nested_paging_is_rejected_at_build_time() {
    let (backend, resolver) = resolver().await;
    backend.reset_statement_count();

    let err = resolver
        .find_many(
            blog::USERS,
            FetchOptions::new().with_nested("posts", FetchOptions::new().limit(1)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, OrmError::Query(_)));
    assert_eq!(backend.statements_issued(), 0);
}

#[tokio::test]
async fn belongs_to_resolves_through_the_association() {
    let (_, resolver) = resolver().await;

    let memberships = resolver
        .find_many(
            blog::POST_CATEGORIES,
            FetchOptions::new().with("post").with("category"),
        )
        .await
        .unwrap();

    assert_eq!(memberships.len(), 1);
    let membership = memberships[0].as_object().unwrap();
    assert_eq!(membership["post"]["title"], json!("first"));
    assert_eq!(membership["category"]["name"], json!("rust"));
}
