//! Ядро мастер-сервера: реестр игровых серверов с heartbeat-ливнесом.

pub mod api;
pub mod config;
pub mod error;
pub mod mailer;
pub mod schema;
pub mod services;

#[cfg(test)]
mod tests;

use api::AppState;
use config::MasterConfig;
use mailer::{LogMailer, Mailer};
use master_migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Запустить мастер-сервер.
pub async fn run(config: MasterConfig) -> anyhow::Result<()> {
    run_with_mailer(config, Arc::new(LogMailer)).await
}

/// Запуск с внешним транспортом почты.
pub async fn run_with_mailer(
    config: MasterConfig,
    mailer: Arc<dyn Mailer>,
) -> anyhow::Result<()> {
    // 1. Подключение к БД
    info!("Подключение к базе данных: {}", config.db_url);
    let db: DatabaseConnection = Database::connect(&config.db_url).await?;

    // 2. Автоматические миграции
    info!("Выполнение миграций...");
    Migrator::up(&db, None).await?;

    // 3. Состояние приложения
    let state = AppState {
        db,
        admin_username: config.admin_username.clone(),
        admin_password_hash: config.admin_password_hash.clone(),
        operator_email: config.operator_email.clone(),
        liveness_window: config.liveness_window,
        verification_time_limit: config.verification_time_limit,
        signup_delay: config.signup_delay,
        mailer,
    };

    // 4. Маршрутизатор
    let app = api::build_router(state);

    // 5. Graceful shutdown
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Получен сигнал завершения, останавливаю сервер...");
        let _ = shutdown_tx.send(true);
    });

    // 6. Запуск сервера
    let addr: SocketAddr = config.listen.parse()?;
    info!("Мастер-сервер запущен на {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !*shutdown_rx.borrow_and_update() {
                if shutdown_rx.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;

    info!("Мастер-сервер остановлен");
    Ok(())
}
