//! End-to-end visit accounting: redirect, queue, consumer, store.

mod common;

use axum_test::TestServer;
use link_shortener::domain::visit_consumer::VisitConsumer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

async fn wait_for_visits(links: &common::InMemoryLinkRepository, code: &str, expected: i64) -> i64 {
    for _ in 0..200 {
        let visited = links.get(code).map(|l| l.visited).unwrap_or_default();
        if visited == expected {
            return visited;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    links.get(code).map(|l| l.visited).unwrap_or_default()
}

#[tokio::test]
async fn test_cold_then_warm_resolution_counts_every_visit() {
    let (state, backends) = common::create_test_state();
    backends
        .links
        .seed("user-1", "ab12CD34", "https://example.com", 5);

    let consumer = Arc::new(VisitConsumer::new(
        backends.links.clone(),
        Arc::new(backends.queue.clone()),
        3,
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = {
        let consumer = consumer.clone();
        tokio::spawn(async move { consumer.run("pipeline-test", shutdown_rx).await })
    };

    let server = TestServer::new(common::test_router(state)).unwrap();

    // Cold: served from the store, cache populated.
    let response = server.get("/ab12CD34").await;
    assert_eq!(response.status_code(), 307);
    assert_eq!(response.header("location"), "https://example.com");
    assert_eq!(
        backends.cache.get("ab12CD34").as_deref(),
        Some("https://example.com")
    );
    assert_eq!(wait_for_visits(&backends.links, "ab12CD34", 6).await, 6);

    // Warm: served from the cache, still counted.
    let response = server.get("/ab12CD34").await;
    assert_eq!(response.header("location"), "https://example.com");
    assert_eq!(wait_for_visits(&backends.links, "ab12CD34", 7).await, 7);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), worker)
        .await
        .expect("consumer did not stop")
        .unwrap();

    assert!(backends.queue.dead_letters().is_empty());
}

#[tokio::test]
async fn test_concurrent_visits_are_not_lost() {
    let (state, backends) = common::create_test_state();
    backends
        .links
        .seed("user-1", "busy1234", "https://example.com", 0);

    let server = TestServer::new(common::test_router(state)).unwrap();

    for _ in 0..25 {
        assert_eq!(server.get("/busy1234").await.status_code(), 307);
    }
    assert_eq!(backends.queue.len(), 25);

    let consumer = Arc::new(VisitConsumer::new(
        backends.links.clone(),
        Arc::new(backends.queue.clone()),
        3,
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let consumer = consumer.clone();
            let shutdown = shutdown_rx.clone();
            tokio::spawn(async move { consumer.run(&format!("worker-{i}"), shutdown).await })
        })
        .collect();

    assert_eq!(wait_for_visits(&backends.links, "busy1234", 25).await, 25);

    shutdown_tx.send(true).unwrap();
    for worker in workers {
        tokio::time::timeout(Duration::from_secs(2), worker)
            .await
            .expect("consumer did not stop")
            .unwrap();
    }
}

#[tokio::test]
async fn test_visit_for_deleted_link_is_discarded() {
    let (state, backends) = common::create_test_state();
    let link = backends
        .links
        .seed("user-1", "gone1234", "https://example.com", 0);

    let server = TestServer::new(common::test_router(state)).unwrap();
    server.get("/gone1234").await;

    server
        .delete(&format!("/api/links/{}", link.id))
        .add_header("Authorization", common::bearer())
        .await;

    let consumer = VisitConsumer::new(
        backends.links.clone(),
        Arc::new(backends.queue.clone()),
        3,
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(async move { consumer.run("deleted-test", shutdown_rx).await });

    for _ in 0..200 {
        if backends.queue.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    shutdown_tx.send(true).unwrap();
    worker.await.unwrap();

    assert!(backends.queue.is_empty());
    assert!(backends.queue.dead_letters().is_empty());
    assert!(backends.links.get("gone1234").is_none());
}

#[tokio::test]
async fn test_empty_code_is_rejected_without_side_effects() {
    let (state, backends) = common::create_test_state();

    let err = state.resolver.resolve("").await.unwrap_err();

    assert_eq!(err.to_string(), "short code cannot be empty");
    assert!(matches!(err, link_shortener::AppError::Validation { .. }));
    assert!(backends.queue.is_empty());
}
