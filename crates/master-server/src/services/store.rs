//! Хранилище учётных записей, групп, серверов и токенов.
//!
//! `Store` владеет транзакцией, живущей ровно один запрос: открывается в
//! начале обработчика, фиксируется явным `commit`, а на любом раннем
//! выходе откатывается при Drop (гарантия sea-orm). Вся межзапросная
//! координация — ограничения уникальности самой БД.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use master_entities::{groups, servers, tokens, users};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use uuid::Uuid;

pub struct Store {
    txn: DatabaseTransaction,
}

impl Store {
    /// Открыть транзакцию запроса.
    pub async fn begin(db: &DatabaseConnection) -> Result<Self, AppError> {
        Ok(Self {
            txn: db.begin().await?,
        })
    }

    /// Зафиксировать транзакцию. Не вызванный commit означает откат.
    pub async fn commit(self) -> Result<(), AppError> {
        self.txn.commit().await.map_err(AppError::from)
    }

    // ── Пользователи ─────────────────────────────────────────────────────

    pub async fn find_user(&self, username: &str) -> Result<Option<users::Model>, AppError> {
        Ok(users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.txn)
            .await?)
    }

    pub async fn find_user_by_id(&self, id: &str) -> Result<Option<users::Model>, AppError> {
        Ok(users::Entity::find_by_id(id).one(&self.txn).await?)
    }

    pub async fn find_user_by_credentials(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<Option<users::Model>, AppError> {
        Ok(users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .filter(users::Column::PasswordHash.eq(password_hash))
            .one(&self.txn)
            .await?)
    }

    /// Создать неподтверждённого пользователя.
    pub async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<users::Model, AppError> {
        let model = users::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            username: Set(username.to_string()),
            password_hash: Set(password_hash.to_string()),
            registered_at: Set(now.to_rfc3339()),
            validated: Set(false),
        };
        Ok(model.insert(&self.txn).await?)
    }

    pub async fn set_validated(&self, user: users::Model) -> Result<(), AppError> {
        let mut model: users::ActiveModel = user.into();
        model.validated = Set(true);
        model.update(&self.txn).await?;
        Ok(())
    }

    pub async fn set_password_hash(
        &self,
        user: users::Model,
        password_hash: &str,
    ) -> Result<(), AppError> {
        let mut model: users::ActiveModel = user.into();
        model.password_hash = Set(password_hash.to_string());
        model.update(&self.txn).await?;
        Ok(())
    }

    /// Удалить пользователя вместе с токеном, группами и их серверами.
    pub async fn delete_user(&self, user: users::Model) -> Result<(), AppError> {
        tokens::Entity::delete_many()
            .filter(tokens::Column::UserId.eq(user.id.clone()))
            .exec(&self.txn)
            .await?;
        for group in self.groups_of(&user.id).await? {
            self.delete_group(group).await?;
        }
        let model: users::ActiveModel = user.into();
        model.delete(&self.txn).await?;
        Ok(())
    }

    // ── Токены регистрации ───────────────────────────────────────────────

    pub async fn find_token(&self, value: i64) -> Result<Option<tokens::Model>, AppError> {
        Ok(tokens::Entity::find_by_id(value).one(&self.txn).await?)
    }

    pub async fn create_token(&self, value: i64, user_id: &str) -> Result<(), AppError> {
        let model = tokens::ActiveModel {
            value: Set(value),
            user_id: Set(user_id.to_string()),
        };
        model.insert(&self.txn).await?;
        Ok(())
    }

    pub async fn delete_token(&self, token: tokens::Model) -> Result<(), AppError> {
        let model: tokens::ActiveModel = token.into();
        model.delete(&self.txn).await?;
        Ok(())
    }

    // ── Группы ───────────────────────────────────────────────────────────

    pub async fn find_group(&self, name: &str) -> Result<Option<groups::Model>, AppError> {
        Ok(groups::Entity::find()
            .filter(groups::Column::Name.eq(name))
            .one(&self.txn)
            .await?)
    }

    pub async fn all_groups(&self) -> Result<Vec<groups::Model>, AppError> {
        Ok(groups::Entity::find()
            .order_by_asc(groups::Column::Name)
            .all(&self.txn)
            .await?)
    }

    pub async fn groups_of(&self, owner_id: &str) -> Result<Vec<groups::Model>, AppError> {
        Ok(groups::Entity::find()
            .filter(groups::Column::OwnerId.eq(owner_id))
            .order_by_asc(groups::Column::Name)
            .all(&self.txn)
            .await?)
    }

    pub async fn create_group(
        &self,
        name: &str,
        owner_id: &str,
    ) -> Result<groups::Model, AppError> {
        let model = groups::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            name: Set(name.to_string()),
            owner_id: Set(owner_id.to_string()),
        };
        Ok(model.insert(&self.txn).await?)
    }

    /// Удалить группу вместе с её серверами.
    pub async fn delete_group(&self, group: groups::Model) -> Result<(), AppError> {
        servers::Entity::delete_many()
            .filter(servers::Column::GroupId.eq(group.id.clone()))
            .exec(&self.txn)
            .await?;
        let model: groups::ActiveModel = group.into();
        model.delete(&self.txn).await?;
        Ok(())
    }

    // ── Серверы ──────────────────────────────────────────────────────────

    pub async fn find_server(
        &self,
        group_id: &str,
        name: &str,
    ) -> Result<Option<servers::Model>, AppError> {
        Ok(servers::Entity::find()
            .filter(servers::Column::GroupId.eq(group_id))
            .filter(servers::Column::Name.eq(name))
            .one(&self.txn)
            .await?)
    }

    pub async fn servers_in_group(
        &self,
        group_id: &str,
    ) -> Result<Vec<servers::Model>, AppError> {
        Ok(servers::Entity::find()
            .filter(servers::Column::GroupId.eq(group_id))
            .order_by_asc(servers::Column::Name)
            .all(&self.txn)
            .await?)
    }

    pub async fn create_server(
        &self,
        group_id: &str,
        name: &str,
        configuration: &str,
        now: DateTime<Utc>,
    ) -> Result<servers::Model, AppError> {
        let model = servers::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            group_id: Set(group_id.to_string()),
            name: Set(name.to_string()),
            configuration: Set(configuration.to_string()),
            current_state: Set(None),
            last_update: Set(now.to_rfc3339()),
        };
        Ok(model.insert(&self.txn).await?)
    }

    /// Heartbeat: единственная запись, сдвигающая `last_update`.
    pub async fn update_server_state(
        &self,
        server: servers::Model,
        state_json: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut model: servers::ActiveModel = server.into();
        model.current_state = Set(Some(state_json.to_string()));
        model.last_update = Set(now.to_rfc3339());
        model.update(&self.txn).await?;
        Ok(())
    }

    pub async fn delete_server(&self, server: servers::Model) -> Result<(), AppError> {
        let model: servers::ActiveModel = server.into();
        model.delete(&self.txn).await?;
        Ok(())
    }
}
