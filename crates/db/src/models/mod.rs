pub mod access_token;
pub mod association;
pub mod message;
pub mod offer;
pub mod user;
