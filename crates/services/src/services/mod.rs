pub mod associations;
pub mod auth;
pub mod chat;
pub mod database_validator;
pub mod donations;
pub mod form;
pub mod logo_storage;
pub mod users;
