//! Entity для таблицы registration_tokens.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "registration_tokens")]
pub struct Model {
    /// Случайное значение токена; уникальность гарантирует БД
    #[sea_orm(primary_key, auto_increment = false)]
    pub value: i64,

    /// Владелец токена (users.id); ровно один токен на пользователя
    #[sea_orm(unique)]
    pub user_id: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
