//! HTTP API: маршрутизация и состояние приложения.

pub mod middleware;
pub mod server_routes;
pub mod user_routes;

use crate::mailer::Mailer;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use sea_orm::{ConnectionTrait, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Общее состояние приложения.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub admin_username: String,
    pub admin_password_hash: String,
    pub operator_email: String,
    pub liveness_window: Duration,
    pub verification_time_limit: Duration,
    pub signup_delay: Duration,
    pub mailer: Arc<dyn Mailer>,
}

/// Редирект на тот же ресурс: «уже существует» как мягкий успех.
pub fn redirect_to(location: &str) -> Response {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
}

/// Построить маршрутизатор Axum.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .merge(server_routes::routes())
        .merge(user_routes::routes())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::notify_on_internal_error,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health — проверка работоспособности сервера.
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let db_ok = state.db.execute_unprepared("SELECT 1").await.is_ok();
    Json(serde_json::json!({
        "status": if db_ok { "ok" } else { "error" },
        "database": db_ok,
        "service": "master-server"
    }))
}
