pub mod registration_service;
pub mod registry_service;
pub mod store;
