//! REST surface over the node's local mini-protocols.

mod error;
mod localstatequery;
mod localtxmonitor;
mod localtxsubmission;

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use error::ErrorBody;

use crate::node::NodeConnector;

#[derive(Clone)]
pub struct AppState<C> {
    pub connector: C,
}

/// Healthchecks are polled often, they only show up in the access log when `log_healthchecks`
/// is set.
pub fn router<C: NodeConnector>(connector: C, log_healthchecks: bool) -> Router {
    let api = Router::new()
        .nest("/localstatequery", localstatequery::routes())
        .nest("/localtxmonitor", localtxmonitor::routes())
        .nest("/localtxsubmission", localtxsubmission::routes())
        .layer(middleware::from_fn(access_log));

    let mut health = Router::new().route("/healthcheck", get(healthcheck));
    if log_healthchecks {
        health = health.layer(middleware::from_fn(access_log));
    }

    Router::new()
        .nest("/api", api)
        .merge(health)
        .with_state(AppState { connector })
}

/// Serves the REST api on `addr` until `cancel` fires.
pub async fn serve<C: NodeConnector>(
    addr: SocketAddr,
    connector: C,
    log_healthchecks: bool,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(address = %listener.local_addr()?, "REST api listening");

    axum::serve(listener, router(connector, log_healthchecks))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

async fn healthcheck() -> Json<Value> {
    Json(json!({ "healthy": true }))
}

async fn access_log(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        target: "access",
        %method,
        %path,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}
