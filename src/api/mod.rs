use crate::orchestrator::Orchestrator;
use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use std::sync::{Arc, RwLock};

pub mod handlers;
pub mod responses;

#[derive(Clone)]
pub struct ApiContext {
    pub state: Arc<RwLock<AppState>>,
    pub orchestrator: Arc<Orchestrator>,
}

pub fn router(context: ApiContext) -> Router {
    Router::new()
        .route("/api/lots", get(handlers::get_lots))
        .route("/api/health", get(handlers::get_health))
        .route("/api/refresh", post(handlers::post_refresh))
        .route("/api/polling/start", post(handlers::post_polling_start))
        .route("/api/polling/stop", post(handlers::post_polling_stop))
        .with_state(context)
}
