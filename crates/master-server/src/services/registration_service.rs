//! Регистрация аккаунтов: создание пользователя, выдача и погашение
//! e-mail токенов, управление паролем.

use crate::api::AppState;
use crate::config::hash_password;
use crate::error::AppError;
use crate::mailer::notify_operator;
use crate::services::store::Store;
use chrono::{DateTime, TimeDelta, Utc};
use master_entities::users;
use rand::Rng;

/// Бюджет попыток вытянуть свободное значение токена.
pub const TOKEN_ATTEMPTS: u32 = 50_000;

/// Случайное значение регистрационного токена.
pub fn random_token() -> i64 {
    rand::thread_rng().gen_range(1..i64::MAX)
}

/// Исход создания аккаунта.
pub enum SignUpOutcome {
    /// Пользователь создан, токен выдан; письмо отправляет вызывающая
    /// сторона после фиксации транзакции.
    Created { token: i64 },
    /// Имя занято: для клиента это мягкий успех (redirect).
    Exists,
}

/// Исход погашения токена.
pub enum RedeemOutcome {
    Validated,
    /// Срок вышел: токен и пользователь удалены, регистрация сгорела.
    Expired,
}

/// Создать неподтверждённого пользователя и выдать ему токен.
///
/// Значения токена тянутся случайно до первого свободного; исчерпание
/// бюджета — внутренняя ошибка, транзакция откатывается целиком и
/// осиротевший пользователь не остаётся.
pub async fn sign_up(
    store: &Store,
    app: &AppState,
    username: &str,
    password: &str,
    now: DateTime<Utc>,
) -> Result<SignUpOutcome, AppError> {
    let user = match store
        .create_user(username, &hash_password(password), now)
        .await
    {
        Ok(user) => user,
        Err(AppError::AlreadyExists(_)) => return Ok(SignUpOutcome::Exists),
        Err(e) => return Err(e),
    };

    let token = issue_token(store, &user, random_token).await;
    match token {
        Ok(value) => Ok(SignUpOutcome::Created { token: value }),
        Err(e @ AppError::Exhausted(_)) => {
            notify_operator(
                app,
                "Исчерпано пространство токенов",
                &format!("Регистрация пользователя {username} не удалась: нет свободных значений"),
            )
            .await;
            Err(e)
        }
        Err(e) => Err(e),
    }
}

/// TokenIssuer: вытянуть свободное значение и закрепить его за
/// пользователем. Коллизии отсекает первичный ключ таблицы токенов.
pub async fn issue_token<F>(
    store: &Store,
    user: &users::Model,
    mut draw: F,
) -> Result<i64, AppError>
where
    F: FnMut() -> i64,
{
    for _ in 0..TOKEN_ATTEMPTS {
        let value = draw();
        match store.create_token(value, &user.id).await {
            Ok(()) => return Ok(value),
            Err(AppError::AlreadyExists(_)) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(AppError::Exhausted(format!(
        "не найдено свободное значение токена за {TOKEN_ATTEMPTS} попыток"
    )))
}

/// Погасить токен: единственное использование, сверка срока действия.
pub async fn redeem_token(
    store: &Store,
    app: &AppState,
    value: i64,
    now: DateTime<Utc>,
) -> Result<RedeemOutcome, AppError> {
    let token = store
        .find_token(value)
        .await?
        .ok_or_else(|| AppError::NotFound("Токен не найден".into()))?;
    let user = store
        .find_user_by_id(&token.user_id)
        .await?
        .ok_or_else(|| AppError::Internal("токен без владельца".into()))?;

    // Инвариант одноразовости делает это недостижимым, но гонку двойного
    // погашения отрабатываем явно
    if user.validated {
        return Err(AppError::Conflict("Аккаунт уже подтверждён".into()));
    }

    let registered = DateTime::parse_from_rfc3339(&user.registered_at)
        .map_err(|e| AppError::Internal(format!("нечитаемое время регистрации: {e}")))?
        .with_timezone(&Utc);
    let limit = TimeDelta::from_std(app.verification_time_limit).unwrap_or(TimeDelta::MAX);
    if now.signed_duration_since(registered) > limit {
        tracing::info!("Токен {} просрочен, удаляю пользователя {}", value, user.username);
        store.delete_token(token).await?;
        store.delete_user(user).await?;
        return Ok(RedeemOutcome::Expired);
    }

    store.set_validated(user).await?;
    store.delete_token(token).await?;
    Ok(RedeemOutcome::Validated)
}
