//! Hosted store: identity endpoints under `/auth/v1`, tables under `/rest/v1`.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod password;
mod routes;

use std::time::Instant;

use anyhow::Context;
use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

use crate::config::ServeArgs;
use crate::database::db::identity;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub session_ttl: chrono::Duration,
    pub token_ttl: chrono::Duration,
}

async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if response.status().is_server_error() {
        warn!(%method, %path, status, elapsed_ms, "request failed");
    } else {
        info!(%method, %path, status, elapsed_ms, "request handled");
    }
    response
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(routes::auth_routes())
        .merge(routes::rest_routes())
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

pub async fn run_server(pool: Pool<Sqlite>, args: &ServeArgs) -> anyhow::Result<()> {
    let purged = identity::purge_expired(&pool, Utc::now()).await?;
    if purged > 0 {
        info!(purged, "expired sessions and tokens removed");
    }

    let state = AppState {
        db: pool,
        session_ttl: args.session_ttl(),
        token_ttl: args.token_ttl(),
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    info!(addr = %args.bind, "hosted store listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to listen for shutdown signal");
            }
            info!("shutting down");
        })
        .await?;

    Ok(())
}
