//! Отправка почты: интерфейс и журнальная реализация.

use crate::api::AppState;
use crate::error::AppError;
use async_trait::async_trait;

/// Внешняя возможность отправки почты. Реальный SMTP-транспорт живёт за
/// пределами мастер-сервера; здесь только его интерфейс.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, recipients: &[String], subject: &str, body: &str)
        -> Result<(), AppError>;
}

/// Mailer, пишущий письма в журнал вместо отправки (разработка, тесты).
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), AppError> {
        tracing::info!(
            "Письмо для {}: [{subject}] {body}",
            recipients.join(", ")
        );
        Ok(())
    }
}

/// Уведомить оператора об инциденте. Сбой доставки уведомления не должен
/// ломать обработку запроса: он только журналируется.
pub async fn notify_operator(state: &AppState, subject: &str, body: &str) {
    let recipients = [state.operator_email.clone()];
    if let Err(e) = state.mailer.send(&recipients, subject, body).await {
        tracing::error!("Не удалось уведомить оператора: {e}");
    }
}
