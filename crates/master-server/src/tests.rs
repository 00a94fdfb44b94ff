//! Тесты: валидация схемы, живость, интеграционные тесты HTTP.

#[cfg(test)]
mod tests {
    use crate::schema::{validate_configuration, validate_state};
    use crate::services::registry_service::is_stale;
    use chrono::Utc;
    use serde_json::json;
    use std::time::Duration;

    fn sample_config() -> serde_json::Value {
        json!({
            "resources": [
                "doom2.wad",
                {
                    "name": "gothic99.wad",
                    "type": "wad",
                    "alternates": ["gothic99_fix.wad"]
                }
            ],
            "server": {
                "address": "203.0.113.7",
                "game": "doom2",
                "game_type": "ctf",
                "hostname": "Вечерний сервер",
                "max_clients": 16,
                "port": 10666,
                "requires_player_password": false,
                "requires_spectator_password": false,
                "join_time_limit": 30,
                "wad_repository": "https://wads.example.com/"
            },
            "options": {
                "frag_limit": 50,
                "allow_jump": true,
                "skill": 4,
                "death_time_expired_action": "respawn"
            },
            "maps": [
                "MAP01",
                {
                    "name": "MAP02",
                    "wads": ["gothic99.wad"],
                    "overrides": { "time_limit": 10 }
                }
            ]
        })
    }

    // ── Живость ───────────────────────────────────────────────────────────

    #[test]
    fn test_is_stale_threshold() {
        let now = Utc::now();
        let window = Duration::from_secs(5);

        let fresh = (now - chrono::Duration::seconds(4)).to_rfc3339();
        assert!(
            !is_stale(&fresh, now, window),
            "Heartbeat внутри окна — сервер жив"
        );

        let stale = (now - chrono::Duration::seconds(6)).to_rfc3339();
        assert!(
            is_stale(&stale, now, window),
            "Heartbeat за пределами окна — сервер мёртв"
        );

        // Та же запись, другой `now`: классификация — функция только часов
        let later = now + chrono::Duration::seconds(3);
        assert!(is_stale(&fresh, later, window));
    }

    #[test]
    fn test_is_stale_unparsable_timestamp() {
        assert!(
            is_stale("мусор", Utc::now(), Duration::from_secs(5)),
            "Нечитаемая метка времени подлежит уборке"
        );
    }

    // ── Валидация конфигурации ────────────────────────────────────────────

    #[test]
    fn test_empty_configuration_names_missing_section() {
        let err = validate_configuration(&json!({})).unwrap_err();
        assert!(
            err.to_string().contains("resources"),
            "Ошибка должна называть отсутствующую секцию: {err}"
        );
    }

    #[test]
    fn test_sample_configuration_is_valid() {
        validate_configuration(&sample_config()).unwrap();
    }

    #[test]
    fn test_override_with_wrong_type_is_rejected() {
        let mut config = sample_config();
        config["maps"][1]["overrides"]["skill"] = json!("x");
        let err = validate_configuration(&config).unwrap_err();
        let message = err.to_string();
        assert!(
            message.contains("skill") && message.contains("целое число"),
            "Ошибка должна называть опцию и ожидаемый тип: {message}"
        );
    }

    #[test]
    fn test_unknown_death_action_is_rejected() {
        let mut config = sample_config();
        config["options"]["death_time_expired_action"] = json!("explode");
        assert!(validate_configuration(&config).is_err());
    }

    #[test]
    fn test_null_death_action_is_rejected() {
        // Проверка по перечислению строгая: null — не член множества
        let mut config = sample_config();
        config["options"]["death_time_expired_action"] = json!(null);
        assert!(validate_configuration(&config).is_err());
    }

    #[test]
    fn test_missing_server_field_is_rejected() {
        let mut config = sample_config();
        config["server"].as_object_mut().unwrap().remove("port");
        let err = validate_configuration(&config).unwrap_err();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn test_bad_resource_type_is_rejected() {
        let mut config = sample_config();
        config["resources"][1]["type"] = json!("texture_pack");
        assert!(validate_configuration(&config).is_err());
    }

    #[test]
    fn test_null_fields_pass_type_checks() {
        let mut config = sample_config();
        config["options"]["frag_limit"] = json!(null);
        config["server"]["wad_repository"] = json!(null);
        validate_configuration(&config).unwrap();
    }

    #[test]
    fn test_state_schema_is_a_placeholder() {
        // Схема состояния не определена: валидно всё
        validate_state(&json!({"произвольный": ["мусор", 1, null]})).unwrap();
        validate_state(&json!(null)).unwrap();
    }

    // ── Пароли ────────────────────────────────────────────────────────────

    #[test]
    fn test_password_hash_and_verify() {
        use crate::config::{hash_password, verify_password};

        let password = "SuperSecret123!";
        let hash = hash_password(password);

        assert!(verify_password(password, &hash));
        assert!(!verify_password("WrongPassword", &hash));
    }

    // ── HTTP интеграционные тесты ─────────────────────────────────────────

    mod integration {
        use super::sample_config;
        use crate::api::{build_router, AppState};
        use crate::config::hash_password;
        use crate::error::AppError;
        use crate::mailer::Mailer;
        use crate::services::registration_service::{issue_token, sign_up, SignUpOutcome};
        use crate::services::store::Store;
        use async_trait::async_trait;
        use axum::body::Body;
        use axum::http::{header, Request, StatusCode};
        use base64::engine::general_purpose::STANDARD as BASE64;
        use base64::Engine;
        use chrono::Utc;
        use master_entities::{groups, servers, tokens, users};
        use master_migration::{Migrator, MigratorTrait};
        use sea_orm::{
            ActiveModelTrait, ActiveValue::Set, ColumnTrait, Database, DatabaseConnection,
            EntityTrait, PaginatorTrait, QueryFilter,
        };
        use serde_json::json;
        use std::sync::{Arc, Mutex};
        use std::time::Duration;
        use tower::ServiceExt;

        /// Mailer, складывающий письма в память.
        #[derive(Default)]
        struct RecordingMailer {
            sent: Mutex<Vec<(Vec<String>, String, String)>>,
        }

        #[async_trait]
        impl Mailer for RecordingMailer {
            async fn send(
                &self,
                recipients: &[String],
                subject: &str,
                body: &str,
            ) -> Result<(), AppError> {
                self.sent.lock().unwrap().push((
                    recipients.to_vec(),
                    subject.to_string(),
                    body.to_string(),
                ));
                Ok(())
            }
        }

        /// Mailer, у которого транспорт всегда лежит.
        struct FailingMailer;

        #[async_trait]
        impl Mailer for FailingMailer {
            async fn send(
                &self,
                _recipients: &[String],
                _subject: &str,
                _body: &str,
            ) -> Result<(), AppError> {
                Err(AppError::Transport("SMTP недоступен".into()))
            }
        }

        async fn build_test_app() -> (axum::Router, DatabaseConnection, Arc<RecordingMailer>) {
            // Одно соединение: вся память теста — одна БД
            let mut opts = sea_orm::ConnectOptions::new("sqlite::memory:");
            opts.max_connections(1);
            let db = Database::connect(opts).await.unwrap();
            Migrator::up(&db, None).await.unwrap();

            let mailer = Arc::new(RecordingMailer::default());
            let state = AppState {
                db: db.clone(),
                admin_username: "admin".to_string(),
                admin_password_hash: hash_password("admin123"),
                operator_email: "operator@example.com".to_string(),
                liveness_window: Duration::from_secs(5),
                verification_time_limit: Duration::from_secs(3600),
                signup_delay: Duration::ZERO,
                mailer: mailer.clone(),
            };
            (build_router(state), db, mailer)
        }

        fn test_state(db: &DatabaseConnection, mailer: Arc<dyn Mailer>) -> AppState {
            AppState {
                db: db.clone(),
                admin_username: "admin".to_string(),
                admin_password_hash: hash_password("admin123"),
                operator_email: "operator@example.com".to_string(),
                liveness_window: Duration::from_secs(5),
                verification_time_limit: Duration::from_secs(3600),
                signup_delay: Duration::ZERO,
                mailer,
            }
        }

        fn basic_auth(user: &str, password: &str) -> String {
            format!("Basic {}", BASE64.encode(format!("{user}:{password}")))
        }

        fn form_value(v: &str) -> String {
            BASE64
                .encode(v)
                .replace('%', "%25")
                .replace('+', "%2B")
                .replace('/', "%2F")
                .replace('=', "%3D")
        }

        async fn send(app: &axum::Router, req: Request<Body>) -> axum::http::Response<Body> {
            app.clone().oneshot(req).await.unwrap()
        }

        async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            serde_json::from_slice(&bytes).unwrap()
        }

        /// PUT /users/{name}: вернуть статус ответа.
        async fn sign_up_request(app: &axum::Router, name: &str, password: &str) -> StatusCode {
            let body = format!(
                "username={}&password={}&email={}",
                form_value(name),
                form_value(password),
                format!("{name}%40example.com")
            );
            let response = send(
                app,
                Request::builder()
                    .method("PUT")
                    .uri(format!("/users/{name}"))
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await;
            response.status()
        }

        async fn token_of(db: &DatabaseConnection, name: &str) -> i64 {
            let user = users::Entity::find()
                .filter(users::Column::Username.eq(name))
                .one(db)
                .await
                .unwrap()
                .unwrap();
            tokens::Entity::find()
                .filter(tokens::Column::UserId.eq(user.id))
                .one(db)
                .await
                .unwrap()
                .unwrap()
                .value
        }

        /// Полный цикл: регистрация + погашение токена.
        async fn register_user(app: &axum::Router, db: &DatabaseConnection, name: &str) {
            assert_eq!(sign_up_request(app, name, "pass").await, StatusCode::CREATED);
            let token = token_of(db, name).await;
            let response = send(
                app,
                Request::builder()
                    .uri(format!("/registration/{token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        async fn create_group(app: &axum::Router, name: &str, group: &str) -> StatusCode {
            let response = send(
                app,
                Request::builder()
                    .method("PUT")
                    .uri(format!("/servers/{group}"))
                    .header(header::AUTHORIZATION, basic_auth(name, "pass"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            response.status()
        }

        async fn put_server(
            app: &axum::Router,
            user: &str,
            group: &str,
            name: &str,
        ) -> axum::http::Response<Body> {
            send(
                app,
                Request::builder()
                    .method("PUT")
                    .uri(format!("/servers/{group}/{name}"))
                    .header(header::AUTHORIZATION, basic_auth(user, "pass"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(sample_config().to_string()))
                    .unwrap(),
            )
            .await
        }

        async fn backdate_server(db: &DatabaseConnection, group: &str, name: &str, secs: i64) {
            let group = groups::Entity::find()
                .filter(groups::Column::Name.eq(group))
                .one(db)
                .await
                .unwrap()
                .unwrap();
            let server = servers::Entity::find()
                .filter(servers::Column::GroupId.eq(group.id))
                .filter(servers::Column::Name.eq(name))
                .one(db)
                .await
                .unwrap()
                .unwrap();
            let mut model: servers::ActiveModel = server.into();
            model.last_update = Set((Utc::now() - chrono::Duration::seconds(secs)).to_rfc3339());
            model.update(db).await.unwrap();
        }

        // ── Тесты ─────────────────────────────────────────────────────────

        #[tokio::test]
        async fn test_health_check() {
            let (app, _db, _mailer) = build_test_app().await;
            let response = send(
                &app,
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        #[tokio::test]
        async fn test_signup_sends_token_and_redeems_once() {
            let (app, db, mailer) = build_test_app().await;
            assert_eq!(
                sign_up_request(&app, "alice", "pass").await,
                StatusCode::CREATED
            );

            // Письмо ушло на указанный адрес и содержит токен
            let token = token_of(&db, "alice").await;
            {
                let sent = mailer.sent.lock().unwrap();
                assert_eq!(sent.len(), 1);
                assert_eq!(sent[0].0, vec!["alice@example.com".to_string()]);
                assert!(sent[0].2.contains(&token.to_string()));
            }

            let redeem = |token: i64| {
                Request::builder()
                    .uri(format!("/registration/{token}"))
                    .body(Body::empty())
                    .unwrap()
            };
            assert_eq!(send(&app, redeem(token)).await.status(), StatusCode::CREATED);

            let user = users::Entity::find()
                .filter(users::Column::Username.eq("alice"))
                .one(&db)
                .await
                .unwrap()
                .unwrap();
            assert!(user.validated, "Погашение токена подтверждает аккаунт");

            // Токен одноразовый: повторное погашение — 404
            assert_eq!(
                send(&app, redeem(token)).await.status(),
                StatusCode::NOT_FOUND
            );
        }

        #[tokio::test]
        async fn test_duplicate_signup_redirects_without_duplicate_row() {
            let (app, db, _mailer) = build_test_app().await;
            assert_eq!(
                sign_up_request(&app, "alice", "pass").await,
                StatusCode::CREATED
            );
            assert_eq!(
                sign_up_request(&app, "alice", "other").await,
                StatusCode::MOVED_PERMANENTLY
            );
            let count = users::Entity::find()
                .filter(users::Column::Username.eq("alice"))
                .count(&db)
                .await
                .unwrap();
            assert_eq!(count, 1);
        }

        #[tokio::test]
        async fn test_mail_failure_keeps_committed_registration() {
            let mut opts = sea_orm::ConnectOptions::new("sqlite::memory:");
            opts.max_connections(1);
            let db = Database::connect(opts).await.unwrap();
            Migrator::up(&db, None).await.unwrap();
            let app = build_router(test_state(&db, Arc::new(FailingMailer)));

            // Сбой доставки — 500 клиенту, но аккаунт и токен уже
            // зафиксированы: оператор может переслать письмо вручную
            assert_eq!(
                sign_up_request(&app, "alice", "pass").await,
                StatusCode::INTERNAL_SERVER_ERROR
            );
            assert_eq!(users::Entity::find().count(&db).await.unwrap(), 1);
            assert_eq!(tokens::Entity::find().count(&db).await.unwrap(), 1);
        }

        #[tokio::test]
        async fn test_expired_redemption_burns_user_and_token() {
            let (app, db, _mailer) = build_test_app().await;
            assert_eq!(
                sign_up_request(&app, "alice", "pass").await,
                StatusCode::CREATED
            );
            let token = token_of(&db, "alice").await;

            // Отодвигаем регистрацию за срок действия токена
            let user = users::Entity::find()
                .filter(users::Column::Username.eq("alice"))
                .one(&db)
                .await
                .unwrap()
                .unwrap();
            let mut model: users::ActiveModel = user.into();
            model.registered_at =
                Set((Utc::now() - chrono::Duration::seconds(7200)).to_rfc3339());
            model.update(&db).await.unwrap();

            let response = send(
                &app,
                Request::builder()
                    .uri(format!("/registration/{token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);

            assert_eq!(users::Entity::find().count(&db).await.unwrap(), 0);
            assert_eq!(tokens::Entity::find().count(&db).await.unwrap(), 0);
        }

        #[tokio::test]
        async fn test_token_exhaustion_leaves_no_orphan_user() {
            let (_app, db, mailer) = build_test_app().await;
            let state = test_state(&db, mailer);

            // Занимаем единственное значение, которое будет тянуть draw
            let store = Store::begin(&db).await.unwrap();
            let victim = store
                .create_user("bob", &hash_password("pass"), Utc::now())
                .await
                .unwrap();
            store.create_token(42, &victim.id).await.unwrap();
            store.commit().await.unwrap();

            let store = Store::begin(&db).await.unwrap();
            let outcome = sign_up(&store, &state, "alice", "pass", Utc::now())
                .await
                .unwrap();
            let SignUpOutcome::Created { .. } = outcome else {
                panic!("ожидалось создание пользователя");
            };
            let alice = store.find_user("alice").await.unwrap().unwrap();
            let err = issue_token(&store, &alice, || 42).await.unwrap_err();
            assert!(matches!(err, AppError::Exhausted(_)));
            drop(store); // откат: сироты не остаётся

            assert_eq!(
                users::Entity::find()
                    .filter(users::Column::Username.eq("alice"))
                    .count(&db)
                    .await
                    .unwrap(),
                0
            );
        }

        #[tokio::test]
        async fn test_group_creation_and_conflict() {
            let (app, db, _mailer) = build_test_app().await;
            register_user(&app, &db, "alice").await;
            register_user(&app, &db, "mallory").await;

            assert_eq!(create_group(&app, "alice", "dm").await, StatusCode::CREATED);
            // Занятое имя — мягкий успех для кого угодно
            assert_eq!(
                create_group(&app, "mallory", "dm").await,
                StatusCode::MOVED_PERMANENTLY
            );

            // Без учётных данных группу не создать
            let response = send(
                &app,
                Request::builder()
                    .method("PUT")
                    .uri("/servers/coop")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        #[tokio::test]
        async fn test_missing_group_and_empty_group_are_distinct() {
            let (app, db, _mailer) = build_test_app().await;
            register_user(&app, &db, "alice").await;
            assert_eq!(create_group(&app, "alice", "dm").await, StatusCode::CREATED);

            let get = |uri: String| Request::builder().uri(uri).body(Body::empty()).unwrap();
            // Пустая группа — 204, несуществующая — 404
            assert_eq!(
                send(&app, get("/servers/dm".into())).await.status(),
                StatusCode::NO_CONTENT
            );
            assert_eq!(
                send(&app, get("/servers/ctf".into())).await.status(),
                StatusCode::NOT_FOUND
            );
        }

        #[tokio::test]
        async fn test_register_server_and_list() {
            let (app, db, _mailer) = build_test_app().await;
            register_user(&app, &db, "alice").await;
            assert_eq!(create_group(&app, "alice", "dm").await, StatusCode::CREATED);

            let response = put_server(&app, "alice", "dm", "east").await;
            assert_eq!(response.status(), StatusCode::CREATED);

            let response = send(
                &app,
                Request::builder()
                    .uri("/servers")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
            let listing = body_json(response).await;
            let docs = listing.as_array().unwrap();
            assert_eq!(docs.len(), 1);
            // Реестр подставляет group/name, лаунчер на них полагается
            assert_eq!(docs[0]["configuration"]["server"]["group"], json!("dm"));
            assert_eq!(docs[0]["configuration"]["server"]["name"], json!("east"));
            assert_eq!(docs[0]["state"], json!({}));

            let response = send(
                &app,
                Request::builder()
                    .uri("/servers/dm/east")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        #[tokio::test]
        async fn test_invalid_configuration_notifies_operator() {
            let (app, db, mailer) = build_test_app().await;
            register_user(&app, &db, "alice").await;
            assert_eq!(create_group(&app, "alice", "dm").await, StatusCode::CREATED);

            let response = send(
                &app,
                Request::builder()
                    .method("PUT")
                    .uri("/servers/dm/east")
                    .header(header::AUTHORIZATION, basic_auth("alice", "pass"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = body_json(response).await;
            assert!(body["error"].as_str().unwrap().contains("resources"));

            let sent = mailer.sent.lock().unwrap();
            assert!(
                sent.iter()
                    .any(|(to, _, _)| to == &vec!["operator@example.com".to_string()]),
                "Оператор должен узнать о невалидной конфигурации"
            );
        }

        #[tokio::test]
        async fn test_stale_server_evicted_on_list() {
            let (app, db, _mailer) = build_test_app().await;
            register_user(&app, &db, "alice").await;
            assert_eq!(create_group(&app, "alice", "dm").await, StatusCode::CREATED);
            put_server(&app, "alice", "dm", "east").await;

            backdate_server(&db, "dm", "east", 10).await;

            let response = send(
                &app,
                Request::builder()
                    .uri("/servers")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
            // Наблюдение устаревшей записи её удалило
            assert_eq!(servers::Entity::find().count(&db).await.unwrap(), 0);
        }

        #[tokio::test]
        async fn test_stale_server_evicted_on_get() {
            let (app, db, _mailer) = build_test_app().await;
            register_user(&app, &db, "alice").await;
            assert_eq!(create_group(&app, "alice", "dm").await, StatusCode::CREATED);
            put_server(&app, "alice", "dm", "east").await;

            backdate_server(&db, "dm", "east", 10).await;

            let response = send(
                &app,
                Request::builder()
                    .uri("/servers/dm/east")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            assert_eq!(servers::Entity::find().count(&db).await.unwrap(), 0);
        }

        #[tokio::test]
        async fn test_fresh_name_conflict_redirects() {
            let (app, db, _mailer) = build_test_app().await;
            register_user(&app, &db, "alice").await;
            assert_eq!(create_group(&app, "alice", "dm").await, StatusCode::CREATED);

            assert_eq!(
                put_server(&app, "alice", "dm", "east").await.status(),
                StatusCode::CREATED
            );
            // Живая запись не перезаписывается
            assert_eq!(
                put_server(&app, "alice", "dm", "east").await.status(),
                StatusCode::MOVED_PERMANENTLY
            );
            assert_eq!(servers::Entity::find().count(&db).await.unwrap(), 1);
        }

        #[tokio::test]
        async fn test_stale_loser_gets_evicted_and_replaced() {
            let (app, db, _mailer) = build_test_app().await;
            register_user(&app, &db, "alice").await;
            assert_eq!(create_group(&app, "alice", "dm").await, StatusCode::CREATED);

            put_server(&app, "alice", "dm", "east").await;
            backdate_server(&db, "dm", "east", 10).await;

            // Повторная регистрация вытесняет устаревшую запись
            assert_eq!(
                put_server(&app, "alice", "dm", "east").await.status(),
                StatusCode::CREATED
            );
            let rows = servers::Entity::find().all(&db).await.unwrap();
            assert_eq!(rows.len(), 1);
            assert!(!super::is_stale(
                &rows[0].last_update,
                Utc::now(),
                Duration::from_secs(5)
            ));
        }

        #[tokio::test]
        async fn test_heartbeat_refreshes_state_and_liveness() {
            let (app, db, _mailer) = build_test_app().await;
            register_user(&app, &db, "alice").await;
            assert_eq!(create_group(&app, "alice", "dm").await, StatusCode::CREATED);
            put_server(&app, "alice", "dm", "east").await;
            backdate_server(&db, "dm", "east", 3).await;

            let state_doc = json!({ "map": "MAP01", "connected_clients": 4 });
            let response = send(
                &app,
                Request::builder()
                    .method("POST")
                    .uri("/servers/dm/east")
                    .header(header::AUTHORIZATION, basic_auth("alice", "pass"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(state_doc.to_string()))
                    .unwrap(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::ACCEPTED);

            let row = servers::Entity::find().one(&db).await.unwrap().unwrap();
            assert!(row.current_state.unwrap().contains("MAP01"));
            assert!(!super::is_stale(
                &row.last_update,
                Utc::now(),
                Duration::from_secs(4)
            ));

            // Состояние видно в публичном документе
            let response = send(
                &app,
                Request::builder()
                    .uri("/servers/dm/east")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            let doc = body_json(response).await;
            assert_eq!(doc["state"]["map"], json!("MAP01"));
        }

        #[tokio::test]
        async fn test_heartbeat_for_missing_server_is_not_found() {
            let (app, db, _mailer) = build_test_app().await;
            register_user(&app, &db, "alice").await;
            assert_eq!(create_group(&app, "alice", "dm").await, StatusCode::CREATED);

            let response = send(
                &app,
                Request::builder()
                    .method("POST")
                    .uri("/servers/dm/ghost")
                    .header(header::AUTHORIZATION, basic_auth("alice", "pass"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }

        #[tokio::test]
        async fn test_foreign_group_is_off_limits() {
            let (app, db, _mailer) = build_test_app().await;
            register_user(&app, &db, "alice").await;
            register_user(&app, &db, "mallory").await;
            assert_eq!(create_group(&app, "alice", "dm").await, StatusCode::CREATED);

            let response = put_server(&app, "mallory", "dm", "east").await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

            // Администратор — тоже не владелец
            let response = send(
                &app,
                Request::builder()
                    .method("DELETE")
                    .uri("/servers/dm")
                    .header(header::AUTHORIZATION, basic_auth("admin", "admin123"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        #[tokio::test]
        async fn test_delete_group_cascades_to_servers() {
            let (app, db, _mailer) = build_test_app().await;
            register_user(&app, &db, "alice").await;
            assert_eq!(create_group(&app, "alice", "dm").await, StatusCode::CREATED);
            put_server(&app, "alice", "dm", "east").await;

            let response = send(
                &app,
                Request::builder()
                    .method("DELETE")
                    .uri("/servers/dm")
                    .header(header::AUTHORIZATION, basic_auth("alice", "pass"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
            assert_eq!(groups::Entity::find().count(&db).await.unwrap(), 0);
            assert_eq!(servers::Entity::find().count(&db).await.unwrap(), 0);
        }

        #[tokio::test]
        async fn test_account_management_self_and_admin() {
            let (app, db, _mailer) = build_test_app().await;
            register_user(&app, &db, "alice").await;
            assert_eq!(create_group(&app, "alice", "dm").await, StatusCode::CREATED);

            // Список собственных групп
            let response = send(
                &app,
                Request::builder()
                    .uri("/users/alice")
                    .header(header::AUTHORIZATION, basic_auth("alice", "pass"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_json(response).await, json!(["dm"]));

            // Чужой аккаунт недоступен обычному пользователю
            register_user(&app, &db, "mallory").await;
            let response = send(
                &app,
                Request::builder()
                    .uri("/users/alice")
                    .header(header::AUTHORIZATION, basic_auth("mallory", "pass"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

            // Администратор меняет пароль пользователя
            let body = format!("new_password={}", form_value("xyzzy"));
            let response = send(
                &app,
                Request::builder()
                    .method("POST")
                    .uri("/users/alice")
                    .header(header::AUTHORIZATION, basic_auth("admin", "admin123"))
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::NO_CONTENT);

            // Старый пароль больше не подходит, новый — работает
            let response = send(
                &app,
                Request::builder()
                    .uri("/users/alice")
                    .header(header::AUTHORIZATION, basic_auth("alice", "pass"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            let response = send(
                &app,
                Request::builder()
                    .uri("/users/alice")
                    .header(header::AUTHORIZATION, basic_auth("alice", "xyzzy"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);

            // Удаление аккаунта уносит группы и серверы
            let response = send(
                &app,
                Request::builder()
                    .method("DELETE")
                    .uri("/users/alice")
                    .header(header::AUTHORIZATION, basic_auth("alice", "xyzzy"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
            assert_eq!(groups::Entity::find().count(&db).await.unwrap(), 0);
        }
    }
}
