//! Entity для таблицы users.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// UUID первичного ключа
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Уникальное имя пользователя
    #[sea_orm(unique)]
    pub username: String,

    /// Односторонний хэш пароля (SHA-256 hex)
    pub password_hash: String,

    /// Время регистрации (ISO-8601)
    pub registered_at: String,

    /// Подтверждён ли аккаунт по e-mail токену
    pub validated: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
