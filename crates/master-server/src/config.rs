//! Конфигурация мастер-сервера.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MasterConfig {
    /// Адрес для прослушивания (например "0.0.0.0:8080")
    pub listen: String,

    /// URL подключения к БД (sqlite или postgres)
    pub db_url: String,

    /// Имя администратора (синтетическая учётная запись, не строка в БД)
    pub admin_username: String,

    /// Хэш пароля администратора (SHA-256 hex)
    pub admin_password_hash: String,

    /// E-mail оператора для уведомлений об инцидентах
    pub operator_email: String,

    /// Окно живости сервера: без heartbeat дольше этого срока сервер
    /// считается мёртвым и подлежит удалению
    pub liveness_window: Duration,

    /// Срок действия регистрационного токена
    pub verification_time_limit: Duration,

    /// Принудительная задержка обработки регистрации (защита от
    /// исчерпания токенов перебором)
    pub signup_delay: Duration,
}

/// Хэшировать пароль (SHA-256 hex).
pub fn hash_password(password: &str) -> String {
    use sha2::{Digest, Sha256};
    let hash = Sha256::digest(password.as_bytes());
    hex::encode(hash)
}

/// Проверить пароль по хэшу.
pub fn verify_password(password: &str, hash: &str) -> bool {
    hash_password(password) == hash
}
