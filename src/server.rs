//! HTTP server initialization and runtime setup.
//!
//! Handles database connections, cache and queue setup, visit consumer spawning,
//! and the Axum server lifecycle including graceful shutdown.

use crate::config::Config;
use crate::domain::repositories::LinkRepository;
use crate::domain::visit_consumer::VisitConsumer;
use crate::infrastructure::cache::{CacheService, NullCache, RedisCache};
use crate::infrastructure::persistence::PgLinkRepository;
use crate::infrastructure::queue::{MemoryQueue, RedisStreamQueue, VisitQueue};
use crate::routes::app_router;
use crate::state::AppState;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - PostgreSQL connection pool
/// - Apply migrations
/// - Redis cache and visit stream (or NullCache and in-process queue fallback)
/// - Background visit consumers
/// - Axum HTTP server
///
/// On SIGINT or SIGTERM the server stops accepting connections, drains in-flight
/// requests, then lets every consumer finish its current event before returning.
///
/// # Errors
///
/// Returns an error if:
/// - Database connection or migration fails
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let pool = connect_database(&config).await?;
    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to migrate")?;

    let links: Arc<dyn LinkRepository> = Arc::new(PgLinkRepository::new(Arc::new(pool)));
    let (cache, visit_queue) = connect_redis(&config).await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let consumer = Arc::new(VisitConsumer::new(
        links.clone(),
        visit_queue.clone(),
        config.visit_max_attempts,
    ));
    let mut consumers = JoinSet::new();
    for index in 0..config.visit_consumer_concurrency {
        let consumer = consumer.clone();
        let name = format!("{}-{}", config.visit_consumer_name, index);
        let shutdown = shutdown_rx.clone();
        consumers.spawn(async move { consumer.run(&name, shutdown).await });
    }
    tracing::info!(count = config.visit_consumer_concurrency, "Visit consumers started");

    let state = AppState::new(
        links,
        cache,
        visit_queue,
        config.resolver_settings(),
        &config.base_url,
        &config.internal_api_token,
    );

    let app = app_router(state);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    let served = axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    if let Err(e) = &served {
        tracing::error!(error = %e, "HTTP server failed");
    }
    tracing::info!("HTTP server stopped, waiting for visit consumers");
    stop_consumers(&shutdown_tx, consumers).await;

    served.context("HTTP server error")?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Signals shutdown and waits until every consumer has finished its current event.
async fn stop_consumers(shutdown_tx: &watch::Sender<bool>, mut consumers: JoinSet<()>) {
    let _ = shutdown_tx.send(true);

    while let Some(result) = consumers.join_next().await {
        if let Err(e) = result {
            tracing::error!(error = %e, "Visit consumer task failed");
        }
    }
}

async fn connect_database(config: &Config) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")
}

/// Picks the cache and visit queue backends.
///
/// An unreachable Redis degrades to no caching and the in-process queue; the
/// service keeps redirecting, but visit events no longer survive a restart.
async fn connect_redis(config: &Config) -> (Arc<dyn CacheService>, Arc<dyn VisitQueue>) {
    let memory_queue = || -> Arc<dyn VisitQueue> { Arc::new(MemoryQueue::new(config.visit_queue_capacity)) };

    let Some(redis_url) = &config.redis_url else {
        tracing::info!("Cache disabled (NullCache), visit queue in-process");
        return (Arc::new(NullCache::new()), memory_queue());
    };

    let cache: Arc<dyn CacheService> = match RedisCache::connect(redis_url).await {
        Ok(redis) => {
            tracing::info!("Cache enabled (Redis)");
            Arc::new(redis)
        }
        Err(e) => {
            tracing::warn!("Failed to connect to Redis cache: {}. Using NullCache.", e);
            Arc::new(NullCache::new())
        }
    };

    let queue: Arc<dyn VisitQueue> =
        match RedisStreamQueue::connect(redis_url, config.stream_topology()).await {
            Ok(queue) => {
                tracing::info!(stream = %config.visit_stream, "Visit queue enabled (Redis Streams)");
                Arc::new(queue)
            }
            Err(e) => {
                tracing::warn!("Failed to set up visit stream: {}. Using in-process queue.", e);
                memory_queue()
            }
        };

    (cache, queue)
}

/// Resolves when SIGINT (Ctrl+C) or, on Unix, SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::MockLinkRepository;
    use crate::domain::visit_event::VisitEvent;

    #[tokio::test]
    async fn test_stop_consumers_finishes_in_flight_work_and_joins() {
        let mut links = MockLinkRepository::new();
        links.expect_increment_visits().returning(|_, _| Ok(true));

        let queue = MemoryQueue::with_poll_interval(100, Duration::from_millis(10));
        queue
            .publish(&VisitEvent::new("ab12CD34").encode())
            .await
            .unwrap();

        let consumer = Arc::new(VisitConsumer::new(Arc::new(links), Arc::new(queue.clone()), 3));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut consumers = JoinSet::new();
        for index in 0..3 {
            let consumer = consumer.clone();
            let shutdown = shutdown_rx.clone();
            consumers.spawn(async move { consumer.run(&format!("test-{index}"), shutdown).await });
        }

        for _ in 0..100 {
            if queue.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        tokio::time::timeout(Duration::from_secs(2), stop_consumers(&shutdown_tx, consumers))
            .await
            .expect("consumers did not stop");

        assert!(*shutdown_rx.borrow());
        assert!(queue.is_empty());
    }
}
