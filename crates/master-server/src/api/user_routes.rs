//! Маршруты аккаунтов: регистрация, погашение токена, управление.

use crate::api::middleware::{authenticate, decode_param, BasicCredentials, Identity};
use crate::api::{redirect_to, AppState};
use crate::config::hash_password;
use crate::error::AppError;
use crate::services::registration_service::{self, RedeemOutcome, SignUpOutcome};
use crate::services::store::Store;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Json, Router};
use master_entities::users;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SignUpParams {
    /// base64(имя)
    pub username: Option<String>,
    /// base64(хэш пароля на стороне клиента)
    pub password: Option<String>,
    /// адрес как есть, без кодирования
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordParams {
    /// base64(новый хэш пароля)
    pub new_password: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/users/{name}",
            get(list_own_groups)
                .put(sign_up)
                .post(change_password)
                .delete(delete_account),
        )
        .route("/registration/{token}", get(redeem_token))
}

// ── Обработчики ──────────────────────────────────────────────────────────────

/// PUT /users/{name} — регистрация аккаунта.
///
/// Учётные данные приходят параметрами (base64), не заголовком: у формы
/// лаунчера ещё нет аккаунта, которым можно было бы авторизоваться.
async fn sign_up(
    State(state): State<AppState>,
    Path(_name): Path<String>,
    Form(params): Form<SignUpParams>,
) -> Result<Response, AppError> {
    // Принудительная пауза: перебор регистраций не должен позволять
    // быстро выедать пространство токенов
    tokio::time::sleep(state.signup_delay).await;

    let username = decode_param(params.username.as_deref());
    let password = decode_param(params.password.as_deref());
    let email = params.email.clone().filter(|e| !e.is_empty());
    let (Some(username), Some(password), Some(email)) = (username, password, email) else {
        return Err(AppError::BadRequest(
            "Требуются имя, пароль и e-mail".into(),
        ));
    };

    let now = chrono::Utc::now();
    let store = Store::begin(&state.db).await?;
    let outcome = registration_service::sign_up(&store, &state, &username, &password, now).await?;
    let token = match outcome {
        SignUpOutcome::Created { token } => token,
        SignUpOutcome::Exists => return Ok(redirect_to(&format!("/users/{username}"))),
    };
    // Фиксация до письма: сбой доставки не откатывает аккаунт и токен,
    // оператор сможет переслать письмо вручную
    store.commit().await?;

    let body = format!(
        "Для подтверждения регистрации откройте /registration/{token} \
         в течение отведённого срока."
    );
    state
        .mailer
        .send(&[email], "Подтверждение регистрации", &body)
        .await
        .map_err(|e| AppError::Transport(e.to_string()))?;

    tracing::info!("Пользователь {username} зарегистрирован, токен выслан");
    Ok(StatusCode::CREATED.into_response())
}

/// GET /registration/{token} — погасить регистрационный токен.
async fn redeem_token(
    State(state): State<AppState>,
    Path(token): Path<i64>,
) -> Result<Response, AppError> {
    let now = chrono::Utc::now();
    let store = Store::begin(&state.db).await?;
    let outcome = registration_service::redeem_token(&store, &state, token, now).await?;
    // Просроченное погашение тоже пишет в БД: токен и аккаунт сгорают
    store.commit().await?;
    match outcome {
        RedeemOutcome::Validated => Ok(StatusCode::CREATED.into_response()),
        RedeemOutcome::Expired => Err(AppError::BadRequest(
            "Срок действия токена истёк, регистрация аннулирована".into(),
        )),
    }
}

/// GET /users/{name} — группы, которыми владеет пользователь.
async fn list_own_groups(
    State(state): State<AppState>,
    Path(name): Path<String>,
    BasicCredentials(creds): BasicCredentials,
) -> Result<Response, AppError> {
    let store = Store::begin(&state.db).await?;
    let identity = authenticate(&store, &state, creds).await?;
    let target = resolve_target(&store, &identity, &name).await?;
    let names: Vec<String> = store
        .groups_of(&target.id)
        .await?
        .into_iter()
        .map(|g| g.name)
        .collect();
    store.commit().await?;
    Ok(Json(names).into_response())
}

/// POST /users/{name} — сменить пароль (сам пользователь или админ).
async fn change_password(
    State(state): State<AppState>,
    Path(name): Path<String>,
    BasicCredentials(creds): BasicCredentials,
    Form(params): Form<ChangePasswordParams>,
) -> Result<Response, AppError> {
    let Some(new_password) = decode_param(params.new_password.as_deref()) else {
        return Err(AppError::BadRequest("Требуется новый пароль".into()));
    };
    let store = Store::begin(&state.db).await?;
    let identity = authenticate(&store, &state, creds).await?;
    let target = resolve_target(&store, &identity, &name).await?;
    store
        .set_password_hash(target, &hash_password(&new_password))
        .await?;
    store.commit().await?;
    tracing::info!("Пароль пользователя {name} изменён");
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// DELETE /users/{name} — удалить аккаунт со всеми группами и серверами.
/// Администратор — не строка в БД, поэтому удалить его нельзя в принципе.
async fn delete_account(
    State(state): State<AppState>,
    Path(name): Path<String>,
    BasicCredentials(creds): BasicCredentials,
) -> Result<Response, AppError> {
    let store = Store::begin(&state.db).await?;
    let identity = authenticate(&store, &state, creds).await?;
    let target = resolve_target(&store, &identity, &name).await?;
    store.delete_user(target).await?;
    store.commit().await?;
    tracing::info!("Аккаунт {name} удалён");
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Разрешить управляемый аккаунт: пользователь управляет только собой,
/// администратор — кем угодно.
async fn resolve_target(
    store: &Store,
    identity: &Identity,
    name: &str,
) -> Result<users::Model, AppError> {
    match identity {
        Identity::Stored(user) if user.username == name => Ok(user.clone()),
        Identity::Stored(_) => Err(AppError::Unauthorized(
            "Можно управлять только собственным аккаунтом".into(),
        )),
        Identity::Admin => store
            .find_user(name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Пользователь не найден: {name}"))),
    }
}
