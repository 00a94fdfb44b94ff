//! Сервис реестра: список, выдача, регистрация и вытеснение серверов.
//!
//! Живость сервера — производное свойство: она каждый раз вычисляется из
//! `last_update` против часов запроса, а не хранится. Устаревший сервер
//! никогда не прячется — его удаляет та операция, которая его увидела.

use crate::api::AppState;
use crate::error::AppError;
use crate::mailer::notify_operator;
use crate::schema;
use crate::services::store::Store;
use chrono::{DateTime, TimeDelta, Utc};
use master_entities::{groups, servers};
use serde_json::{json, Value};
use std::time::Duration;

/// Устарел ли сервер: чистая функция от (last_update, now, окно живости).
/// Нечитаемая метка времени считается устаревшей и подлежит уборке.
pub fn is_stale(last_update: &str, now: DateTime<Utc>, window: Duration) -> bool {
    let Ok(ts) = DateTime::parse_from_rfc3339(last_update) else {
        return true;
    };
    let elapsed = now.signed_duration_since(ts.with_timezone(&Utc));
    elapsed > TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX)
}

/// Результат листинга: пустой реестр и отсутствующая группа — разные
/// исходы (204 против 404), клиенты обязаны их различать.
pub enum Listing {
    Empty,
    Servers(Vec<Value>),
}

/// Исход создания сервера или группы.
pub enum CreateOutcome {
    Created,
    /// Живая запись с этим именем уже есть — мягкий успех (redirect).
    Exists,
}

/// Собрать публичный документ сервера из сохранённых JSON-блобов.
/// `server.group` и `server.name` подставляются из строки реестра: на них
/// полагается лаунчер.
fn public_document(group_name: &str, server: &servers::Model) -> Result<Value, AppError> {
    let mut config: Value = serde_json::from_str(&server.configuration)
        .map_err(|e| AppError::ConfigurationInvalid(format!("конфигурация нечитаема: {e}")))?;
    schema::validate_configuration(&config)?;
    if let Some(section) = config.get_mut("server").and_then(Value::as_object_mut) {
        section.insert("group".into(), Value::String(group_name.to_string()));
        section.insert("name".into(), Value::String(server.name.clone()));
    }
    let state: Value = match &server.current_state {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| AppError::StateInvalid(format!("состояние нечитаемо: {e}")))?,
        None => json!({}),
    };
    Ok(json!({ "configuration": config, "state": state }))
}

/// Перечислить живые серверы одной группы или всех групп.
///
/// Устаревшие и невалидные записи собираются и удаляются одной пачкой в
/// рамках транзакции запроса; фиксация — на вызывающей стороне.
pub async fn list_servers(
    store: &Store,
    app: &AppState,
    group_name: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Listing, AppError> {
    let groups: Vec<groups::Model> = match group_name {
        Some(name) => {
            let group = store
                .find_group(name)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Группа не найдена: {name}")))?;
            vec![group]
        }
        None => store.all_groups().await?,
    };

    let mut documents = Vec::new();
    let mut doomed: Vec<servers::Model> = Vec::new();
    for group in &groups {
        for server in store.servers_in_group(&group.id).await? {
            if is_stale(&server.last_update, now, app.liveness_window) {
                tracing::info!("Вытесняю устаревший сервер {}/{}", group.name, server.name);
                doomed.push(server);
                continue;
            }
            match public_document(&group.name, &server) {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    notify_operator(
                        app,
                        "Невалидная запись в реестре",
                        &format!("Сервер {}/{} удалён: {e}", group.name, server.name),
                    )
                    .await;
                    doomed.push(server);
                }
            }
        }
    }
    for server in doomed {
        store.delete_server(server).await?;
    }

    if documents.is_empty() {
        Ok(Listing::Empty)
    } else {
        Ok(Listing::Servers(documents))
    }
}

/// Выдать публичный документ одного сервера.
///
/// `Ok(None)` означает «записи нет» — в том числе когда устаревшая или
/// невалидная запись была только что удалена. Вызывающая сторона обязана
/// зафиксировать транзакцию и лишь потом ответить 404.
pub async fn get_server(
    store: &Store,
    app: &AppState,
    group_name: &str,
    name: &str,
    now: DateTime<Utc>,
) -> Result<Option<Value>, AppError> {
    let group = store
        .find_group(group_name)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Группа не найдена: {group_name}")))?;
    let Some(server) = store.find_server(&group.id, name).await? else {
        return Ok(None);
    };
    if is_stale(&server.last_update, now, app.liveness_window) {
        tracing::info!("Вытесняю устаревший сервер {}/{}", group.name, server.name);
        store.delete_server(server).await?;
        return Ok(None);
    }
    match public_document(&group.name, &server) {
        Ok(doc) => Ok(Some(doc)),
        Err(e) => {
            notify_operator(
                app,
                "Невалидная запись в реестре",
                &format!("Сервер {}/{} удалён: {e}", group.name, server.name),
            )
            .await;
            store.delete_server(server).await?;
            Ok(None)
        }
    }
}

/// Создать группу с именем `name` во владении `owner_id`.
pub async fn create_group(
    store: &Store,
    name: &str,
    owner_id: &str,
) -> Result<CreateOutcome, AppError> {
    match store.create_group(name, owner_id).await {
        Ok(_) => Ok(CreateOutcome::Created),
        // Занятое имя считается эквивалентной группой: мягкий успех
        Err(AppError::AlreadyExists(_)) => Ok(CreateOutcome::Exists),
        Err(e) => Err(e),
    }
}

/// Зарегистрировать сервер в группе.
///
/// Гонки одноимённых регистраций разрешает ограничение уникальности БД:
/// проигравший перечитывает победившую строку и либо вытесняет её (если
/// она устарела) с единственным повтором вставки, либо отступает.
pub async fn create_server(
    store: &Store,
    app: &AppState,
    group: &groups::Model,
    name: &str,
    config: &Value,
    now: DateTime<Utc>,
) -> Result<CreateOutcome, AppError> {
    if let Err(e) = schema::validate_configuration(config) {
        notify_operator(
            app,
            "Отклонена конфигурация сервера",
            &format!("Сервер {}/{name}: {e}", group.name),
        )
        .await;
        return Err(e);
    }
    let document = config.to_string();

    match store.create_server(&group.id, name, &document, now).await {
        Ok(_) => Ok(CreateOutcome::Created),
        Err(AppError::AlreadyExists(_)) => {
            if let Some(existing) = store.find_server(&group.id, name).await? {
                if !is_stale(&existing.last_update, now, app.liveness_window) {
                    return Ok(CreateOutcome::Exists);
                }
                tracing::info!("Вытесняю устаревший сервер {}/{name}", group.name);
                store.delete_server(existing).await?;
            }
            match store.create_server(&group.id, name, &document, now).await {
                Ok(_) => Ok(CreateOutcome::Created),
                // Повторный конфликт после вытеснения — нарушение
                // инварианта хранилища
                Err(AppError::AlreadyExists(_)) => Err(AppError::Internal(format!(
                    "повторный конфликт имени {}/{name} после вытеснения",
                    group.name
                ))),
                Err(e) => Err(e),
            }
        }
        Err(e) => Err(e),
    }
}

/// Heartbeat: принять состояние и сдвинуть `last_update` на часы запроса.
///
/// `Ok(false)` — сервера нет (либо была устаревшая запись, уже удалённая
/// здесь); фиксация и 404 — на вызывающей стороне.
pub async fn update_server_state(
    store: &Store,
    app: &AppState,
    group: &groups::Model,
    name: &str,
    state_doc: &Value,
    now: DateTime<Utc>,
) -> Result<bool, AppError> {
    let Some(server) = store.find_server(&group.id, name).await? else {
        return Ok(false);
    };
    if is_stale(&server.last_update, now, app.liveness_window) {
        tracing::info!("Вытесняю устаревший сервер {}/{name}", group.name);
        store.delete_server(server).await?;
        return Ok(false);
    }
    schema::validate_state(state_doc)?;
    store
        .update_server_state(server, &state_doc.to_string(), now)
        .await?;
    Ok(true)
}
