//! Integration tests for the frontier queue repository.
//!
//! These run against a real PostgreSQL instance (see `test_fixtures` for the
//! connection defaults) and are ignored by default:
//!
//! ```sh
//! DATABASE_URL=postgres://… cargo test -p lookout-db -- --ignored
//! ```

use lookout_core::{FrontierItem, FrontierRepository};
use lookout_db::test_fixtures::{fresh_scope, TestDatabase};
use lookout_db::PgFrontierRepository;

fn item(id: &str, priority: f64) -> FrontierItem {
    FrontierItem {
        id: id.to_string(),
        provider: "web_search".to_string(),
        cursor: format!("cursor-{id}"),
        priority,
        angle: Some("policy".to_string()),
        meta: None,
        payload: None,
    }
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn push_pop_in_priority_order() {
    let test_db = TestDatabase::new().await;
    let scope = fresh_scope();
    let frontier = &test_db.db.frontier;

    for (id, priority) in [("low", 0.1), ("high", 0.9), ("mid", 0.5)] {
        frontier.push(&scope, &item(id, priority)).await.unwrap();
    }
    assert_eq!(frontier.size(&scope).await.unwrap(), 3);

    let mut popped = Vec::new();
    while let Some(item) = frontier.pop(&scope).await.unwrap() {
        popped.push(item.id);
    }
    assert_eq!(popped, vec!["high", "mid", "low"]);
    assert_eq!(frontier.size(&scope).await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn equal_priority_pops_oldest_first() {
    let test_db = TestDatabase::new().await;
    let scope = fresh_scope();
    let frontier = &test_db.db.frontier;

    for id in ["first", "second", "third"] {
        frontier.push(&scope, &item(id, 0.5)).await.unwrap();
    }

    assert_eq!(frontier.pop(&scope).await.unwrap().unwrap().id, "first");
    assert_eq!(frontier.pop(&scope).await.unwrap().unwrap().id, "second");
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn capacity_evicts_lowest_priority() {
    let test_db = TestDatabase::new().await;
    let scope = fresh_scope();
    let frontier = PgFrontierRepository::new(test_db.db.pool.clone()).with_capacity(5);

    for i in 0..8 {
        frontier
            .push(&scope, &item(&format!("c{i}"), i as f64))
            .await
            .unwrap();
    }

    // Size never exceeds the cap and the highest priorities survive.
    assert_eq!(frontier.size(&scope).await.unwrap(), 5);
    let top = frontier.pop(&scope).await.unwrap().unwrap();
    assert_eq!(top.id, "c7");

    let mut survivors = vec![top.id];
    while let Some(item) = frontier.pop(&scope).await.unwrap() {
        survivors.push(item.id);
    }
    assert_eq!(survivors, vec!["c7", "c6", "c5", "c4", "c3"]);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn concurrent_pops_never_share_an_item() {
    let test_db = TestDatabase::new().await;
    let scope = fresh_scope();
    let frontier = &test_db.db.frontier;

    for i in 0..20 {
        frontier
            .push(&scope, &item(&format!("c{i}"), i as f64))
            .await
            .unwrap();
    }

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..4 {
        let db = test_db.db.clone();
        let scope = scope;
        tasks.spawn(async move {
            let mut seen = Vec::new();
            while let Some(item) = db.frontier.pop(&scope).await.unwrap() {
                seen.push(item.id);
            }
            seen
        });
    }

    let mut all: Vec<String> = Vec::new();
    while let Some(result) = tasks.join_next().await {
        all.extend(result.unwrap());
    }

    all.sort();
    all.dedup();
    assert_eq!(all.len(), 20, "every item popped exactly once");
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn clear_empties_only_this_scope() {
    let test_db = TestDatabase::new().await;
    let scope_a = fresh_scope();
    let scope_b = fresh_scope();
    let frontier = &test_db.db.frontier;

    frontier.push(&scope_a, &item("a", 0.5)).await.unwrap();
    frontier.push(&scope_b, &item("b", 0.5)).await.unwrap();

    frontier.clear(&scope_a).await.unwrap();
    assert_eq!(frontier.size(&scope_a).await.unwrap(), 0);
    assert_eq!(frontier.size(&scope_b).await.unwrap(), 1);
}
