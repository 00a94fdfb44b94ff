//! Аутентификация: разбор учётных данных и проверка владения группой.

use crate::api::AppState;
use crate::config::{hash_password, verify_password};
use crate::error::AppError;
use crate::mailer::notify_operator;
use crate::services::store::Store;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use master_entities::groups;

/// Аутентифицированная личность. Администратор — синтетическая учётная
/// запись из конфигурации, а не строка в БД: его нельзя ни удалить, ни
/// назначить владельцем группы.
pub enum Identity {
    Stored(master_entities::users::Model),
    Admin,
}

/// Учётные данные из заголовка `Authorization: Basic`. Любой дефект
/// разбора означает «данных нет», а не ошибку.
pub struct BasicCredentials(pub Option<(String, String)>);

impl<S: Send + Sync> FromRequestParts<S> for BasicCredentials {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(BasicCredentials(decode_basic_header(parts)))
    }
}

fn decode_basic_header(parts: &Parts) -> Option<(String, String)> {
    let header = parts.headers.get("Authorization")?.to_str().ok()?;
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let pair = String::from_utf8(decoded).ok()?;
    let (name, password) = pair.split_once(':')?;
    Some((name.to_string(), password.to_string()))
}

/// Раскодировать base64-параметр формы; дефект разбора — отсутствие.
pub fn decode_param(value: Option<&str>) -> Option<String> {
    let decoded = BASE64.decode(value?.trim()).ok()?;
    String::from_utf8(decoded).ok()
}

/// Проверить учётные данные: либо администратор по сконфигурированной
/// паре имя/хэш, либо подтверждённый пользователь из БД.
pub async fn authenticate(
    store: &Store,
    app: &AppState,
    creds: Option<(String, String)>,
) -> Result<Identity, AppError> {
    let (name, password) = creds
        .ok_or_else(|| AppError::Unauthorized("Требуются учётные данные".into()))?;

    if name == app.admin_username && verify_password(&password, &app.admin_password_hash) {
        return Ok(Identity::Admin);
    }

    match store
        .find_user_by_credentials(&name, &hash_password(&password))
        .await?
    {
        Some(user) if user.validated => Ok(Identity::Stored(user)),
        _ => Err(AppError::Unauthorized("Неверные учётные данные".into())),
    }
}

/// Разрешить операцию только владельцу группы. Группа разрешается до
/// аутентификации: отсутствующая группа — 404, чужая — 401.
pub async fn require_group_owner(
    store: &Store,
    app: &AppState,
    creds: Option<(String, String)>,
    group_name: &str,
) -> Result<(Identity, groups::Model), AppError> {
    let group = store
        .find_group(group_name)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Группа не найдена: {group_name}")))?;
    let identity = authenticate(store, app, creds).await?;
    match &identity {
        Identity::Stored(user) if user.id == group.owner_id => Ok((identity, group)),
        _ => Err(AppError::Unauthorized("Группа принадлежит не вам".into())),
    }
}

/// Пограничный слой: любой ответ 500 уходит оператору письмом. Детали
/// инцидента клиент не видит.
pub async fn notify_on_internal_error(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let response = next.run(req).await;
    if response.status() == StatusCode::INTERNAL_SERVER_ERROR {
        notify_operator(
            &state,
            "Внутренняя ошибка мастер-сервера",
            &format!("Запрос {method} {path} завершился с кодом 500"),
        )
        .await;
    }
    response
}
