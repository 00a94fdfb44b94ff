//! Entity для таблицы servers.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "servers")]
pub struct Model {
    /// UUID первичного ключа
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Группа-владелец (groups.id); пара (group_id, name) уникальна
    pub group_id: String,

    /// Имя сервера внутри группы
    pub name: String,

    /// Конфигурация сервера (JSON, неизменяема после создания)
    pub configuration: String,

    /// Текущее состояние (JSON); NULL до первого heartbeat
    pub current_state: Option<String>,

    /// Время последнего heartbeat (ISO-8601)
    pub last_update: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
