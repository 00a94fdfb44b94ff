//! Типы ошибок мастер-сервера.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Неверная конфигурация сервера: {0}")]
    ConfigurationInvalid(String),

    #[error("Неверное состояние сервера: {0}")]
    StateInvalid(String),

    /// Нарушение уникальности в БД. Никогда не отдаётся клиенту как есть:
    /// каждая операция перехватывает его и применяет свою политику
    /// (redirect, повтор вставки, 409).
    #[error("Уже существует: {0}")]
    AlreadyExists(String),

    #[error("Не найдено: {0}")]
    NotFound(String),

    #[error("Не авторизован: {0}")]
    Unauthorized(String),

    #[error("Конфликт: {0}")]
    Conflict(String),

    #[error("Исчерпано: {0}")]
    Exhausted(String),

    #[error("Ошибка доставки почты: {0}")]
    Transport(String),

    #[error("Неверный запрос: {0}")]
    BadRequest(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::ConfigurationInvalid(m)
            | AppError::StateInvalid(m)
            | AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            AppError::AlreadyExists(m) | AppError::Conflict(m) => {
                (StatusCode::CONFLICT, m.clone())
            }
            // Детали внутренних ошибок уходят оператору, не клиенту
            AppError::Exhausted(_) | AppError::Transport(_) | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Внутренняя ошибка сервера".to_string(),
            ),
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Внутренняя ошибка: {self}");
        }
        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(e: sea_orm::DbErr) -> Self {
        // Нарушения уникальности различимы: на них строится политика
        // разрешения конфликтов имён и токенов
        if matches!(
            e.sql_err(),
            Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
        ) {
            AppError::AlreadyExists(e.to_string())
        } else {
            AppError::Internal(e.to_string())
        }
    }
}
