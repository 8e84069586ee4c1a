use axum::Router;

use crate::AppState;

pub mod associations;
pub mod auth;
pub mod chat;
pub mod health;
pub mod me;
pub mod offers;
pub mod users;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(me::router())
        .merge(users::router())
        .merge(associations::router())
        .merge(offers::router())
        .merge(chat::router())
}
