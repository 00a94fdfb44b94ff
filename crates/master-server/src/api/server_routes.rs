//! Маршруты реестра серверов: листинг, группы, регистрация, heartbeat.

use crate::api::middleware::{authenticate, require_group_owner, BasicCredentials, Identity};
use crate::api::{redirect_to, AppState};
use crate::error::AppError;
use crate::services::registry_service::{self, CreateOutcome, Listing};
use crate::services::store::Store;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/servers", get(list_all_servers))
        .route(
            "/servers/{group}",
            get(list_group_servers)
                .put(create_group)
                .delete(delete_group),
        )
        .route(
            "/servers/{group}/{name}",
            get(get_server)
                .put(create_server)
                .post(update_server_state)
                .delete(delete_server),
        )
}

// ── Обработчики ──────────────────────────────────────────────────────────────

/// GET /servers — живые серверы всех групп.
async fn list_all_servers(State(state): State<AppState>) -> Result<Response, AppError> {
    list_servers(state, None).await
}

/// GET /servers/{group} — живые серверы одной группы.
async fn list_group_servers(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> Result<Response, AppError> {
    list_servers(state, Some(group)).await
}

async fn list_servers(state: AppState, group: Option<String>) -> Result<Response, AppError> {
    let now = chrono::Utc::now();
    let store = Store::begin(&state.db).await?;
    let listing =
        registry_service::list_servers(&store, &state, group.as_deref(), now).await?;
    // Попутные удаления устаревших записей фиксируются до ответа
    store.commit().await?;
    match listing {
        Listing::Empty => Ok(StatusCode::NO_CONTENT.into_response()),
        Listing::Servers(docs) => Ok(Json(docs).into_response()),
    }
}

/// PUT /servers/{group} — создать группу (нужна аутентификация).
async fn create_group(
    State(state): State<AppState>,
    Path(group): Path<String>,
    BasicCredentials(creds): BasicCredentials,
) -> Result<Response, AppError> {
    let store = Store::begin(&state.db).await?;
    let identity = authenticate(&store, &state, creds).await?;
    let Identity::Stored(user) = identity else {
        return Err(AppError::Unauthorized(
            "Администратор не может владеть группами".into(),
        ));
    };
    let outcome = registry_service::create_group(&store, &group, &user.id).await?;
    store.commit().await?;
    match outcome {
        CreateOutcome::Created => {
            tracing::info!("Группа {group} создана пользователем {}", user.username);
            Ok(StatusCode::CREATED.into_response())
        }
        CreateOutcome::Exists => Ok(redirect_to(&format!("/servers/{group}"))),
    }
}

/// DELETE /servers/{group} — удалить группу вместе с серверами (владелец).
async fn delete_group(
    State(state): State<AppState>,
    Path(group): Path<String>,
    BasicCredentials(creds): BasicCredentials,
) -> Result<Response, AppError> {
    let store = Store::begin(&state.db).await?;
    let (_identity, group_row) = require_group_owner(&store, &state, creds, &group).await?;
    store.delete_group(group_row).await?;
    store.commit().await?;
    tracing::info!("Группа {group} удалена");
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// GET /servers/{group}/{name} — публичный документ одного сервера.
async fn get_server(
    State(state): State<AppState>,
    Path((group, name)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let now = chrono::Utc::now();
    let store = Store::begin(&state.db).await?;
    let document = registry_service::get_server(&store, &state, &group, &name, now).await?;
    store.commit().await?;
    match document {
        Some(doc) => Ok(Json(doc).into_response()),
        None => Err(AppError::NotFound(format!(
            "Сервер не найден: {group}/{name}"
        ))),
    }
}

/// PUT /servers/{group}/{name} — зарегистрировать сервер (владелец группы).
async fn create_server(
    State(state): State<AppState>,
    Path((group, name)): Path<(String, String)>,
    BasicCredentials(creds): BasicCredentials,
    Json(config): Json<serde_json::Value>,
) -> Result<Response, AppError> {
    let now = chrono::Utc::now();
    let store = Store::begin(&state.db).await?;
    let (_identity, group_row) = require_group_owner(&store, &state, creds, &group).await?;
    let outcome =
        registry_service::create_server(&store, &state, &group_row, &name, &config, now).await?;
    store.commit().await?;
    match outcome {
        CreateOutcome::Created => {
            tracing::info!("Сервер {group}/{name} зарегистрирован");
            Ok(StatusCode::CREATED.into_response())
        }
        CreateOutcome::Exists => Ok(redirect_to(&format!("/servers/{group}/{name}"))),
    }
}

/// POST /servers/{group}/{name} — heartbeat с текущим состоянием.
async fn update_server_state(
    State(state): State<AppState>,
    Path((group, name)): Path<(String, String)>,
    BasicCredentials(creds): BasicCredentials,
    Json(state_doc): Json<serde_json::Value>,
) -> Result<Response, AppError> {
    let now = chrono::Utc::now();
    let store = Store::begin(&state.db).await?;
    let (_identity, group_row) = require_group_owner(&store, &state, creds, &group).await?;
    let updated = registry_service::update_server_state(
        &store, &state, &group_row, &name, &state_doc, now,
    )
    .await?;
    store.commit().await?;
    if updated {
        Ok(StatusCode::ACCEPTED.into_response())
    } else {
        Err(AppError::NotFound(format!(
            "Сервер не найден: {group}/{name}"
        )))
    }
}

/// DELETE /servers/{group}/{name} — снять сервер с учёта (владелец).
async fn delete_server(
    State(state): State<AppState>,
    Path((group, name)): Path<(String, String)>,
    BasicCredentials(creds): BasicCredentials,
) -> Result<Response, AppError> {
    let store = Store::begin(&state.db).await?;
    let (_identity, group_row) = require_group_owner(&store, &state, creds, &group).await?;
    let Some(server) = store.find_server(&group_row.id, &name).await? else {
        return Err(AppError::NotFound(format!(
            "Сервер не найден: {group}/{name}"
        )));
    };
    store.delete_server(server).await?;
    store.commit().await?;
    tracing::info!("Сервер {group}/{name} удалён владельцем");
    Ok(StatusCode::NO_CONTENT.into_response())
}
