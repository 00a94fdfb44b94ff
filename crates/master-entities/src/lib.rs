//! Сущности БД мастер-сервера: пользователи, группы, игровые серверы, токены.

pub mod groups;
pub mod servers;
pub mod tokens;
pub mod users;
