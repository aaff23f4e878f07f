//! Liveness endpoint
//!
//! A tiny HTTP server so hosting platforms that expect a listening port keep
//! the process up. It never touches trading state.

use anyhow::{Context, Result};
use axum::routing::get;
use axum::{Json, Router};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::config::KeepaliveConfig;

pub fn router() -> Router {
    Router::new()
        .route("/", get(alive))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
}

async fn alive() -> &'static str {
    "I am alive"
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown)
        .await
        .context("Keep-alive server failed")
}

/// Bind `host:port` and serve in a background task
pub async fn spawn<F>(config: &KeepaliveConfig, shutdown: F) -> Result<(SocketAddr, JoinHandle<()>)>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind keep-alive endpoint on {addr}"))?;
    let local = listener.local_addr()?;

    tracing::info!("💓 Keep-alive endpoint listening on http://{}", local);

    let handle = tokio::spawn(async move {
        if let Err(e) = serve(listener, shutdown).await {
            tracing::warn!(error = %format!("{e:#}"), "Keep-alive endpoint stopped");
        }
    });

    Ok((local, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn serves_alive_and_health() {
        let config = KeepaliveConfig {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        let (tx, rx) = oneshot::channel::<()>();
        let (addr, handle) = spawn(&config, async {
            let _ = rx.await;
        })
        .await
        .unwrap();

        let body = reqwest::get(format!("http://{addr}/")).await.unwrap().text().await.unwrap();
        assert_eq!(body, "I am alive");

        let health: serde_json::Value = reqwest::get(format!("http://{addr}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");

        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
