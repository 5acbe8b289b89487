//! HTTP Module
//!
//! JSON API over the rule repository.
//!
//! ## Routes
//! - `GET    /rules/ip/`        list stored entries
//! - `POST   /rules/ip/`        create or replace one rule
//! - `PATCH  /rules/ip/`        create or replace many rules atomically
//! - `DELETE /rules/ip/{ip}/`   delete one rule
//! - `GET    /rules/db/backup/` download a store snapshot
//!
//! Every route is also served without the trailing slash.

use std::future::Future;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, MethodRouter};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::Result;
use crate::repository::RuleRepository;

mod error;
mod handlers;

pub use error::{status_for, ApiError};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    repo: RuleRepository,
}

impl AppState {
    pub fn new(repo: RuleRepository) -> Self {
        Self { repo }
    }
}

fn rules_routes() -> MethodRouter<AppState> {
    get(handlers::list_rules)
        .post(handlers::create_rule)
        .patch(handlers::bulk_rules)
}

/// Build the API router
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/rules/ip", rules_routes())
        .route("/rules/ip/", rules_routes())
        .route("/rules/ip/:ip", delete(handlers::delete_rule))
        .route("/rules/ip/:ip/", delete(handlers::delete_rule))
        .route("/rules/db/backup", get(handlers::backup))
        .route("/rules/db/backup/", get(handlers::backup))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the API until `shutdown` resolves
pub async fn serve<S>(config: &Config, state: AppState, shutdown: S) -> Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let app = router(state, config.max_body_bytes);

    let listener = TcpListener::bind(config.listen_addr.as_str()).await?;
    tracing::info!(addr = %listener.local_addr()?, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
