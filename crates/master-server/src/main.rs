//! Точка входа мастер-сервера.

use clap::Parser;
use master_server::config::{hash_password, MasterConfig};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "master-server",
    about = "Мастер-сервер — каталог живых игровых серверов"
)]
struct Cli {
    /// Адрес для прослушивания (host:port)
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// URL базы данных
    #[arg(
        long,
        default_value = "sqlite:./master.db?mode=rwc",
        env = "DATABASE_URL"
    )]
    db_url: String,

    /// Имя администратора
    #[arg(long, default_value = "admin")]
    admin_username: String,

    /// Пароль администратора
    #[arg(long, env = "ADMIN_PASSWORD")]
    admin_password: Option<String>,

    /// E-mail оператора для уведомлений
    #[arg(long, default_value = "operator@localhost")]
    operator_email: String,

    /// Окно живости сервера в секундах
    #[arg(long, default_value_t = 5)]
    liveness_window_secs: u64,

    /// Срок действия регистрационного токена в секундах
    #[arg(long, default_value_t = 86_400)]
    verification_time_limit_secs: u64,

    /// Задержка обработки регистрации в миллисекундах
    #[arg(long, default_value_t = 2_000)]
    signup_delay_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Инициализация логгера
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Хэш пароля администратора
    let admin_password = cli.admin_password.unwrap_or_else(|| {
        tracing::warn!("Пароль администратора не задан, используется 'admin' (небезопасно!)");
        "admin".to_string()
    });
    let admin_password_hash = hash_password(&admin_password);

    let config = MasterConfig {
        listen: cli.listen,
        db_url: cli.db_url,
        admin_username: cli.admin_username,
        admin_password_hash,
        operator_email: cli.operator_email,
        liveness_window: Duration::from_secs(cli.liveness_window_secs),
        verification_time_limit: Duration::from_secs(cli.verification_time_limit_secs),
        signup_delay: Duration::from_millis(cli.signup_delay_ms),
    };

    master_server::run(config).await
}
