use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod artists;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod chat;
pub mod comments;
pub mod doc;
pub mod exhibitions;
pub mod favorites;
pub mod health;
pub mod notifications;
pub mod orders;
pub mod params;
pub mod payments;
pub mod products;
pub mod reports;
pub mod users;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/artists", artists::router())
        .nest("/categories", categories::router())
        .nest("/products", products::router())
        .nest("/comments", comments::router())
        .nest("/cart", cart::router())
        .nest("/favorites", favorites::router())
        .nest("/orders", orders::router())
        .merge(payments::router())
        .nest("/chat", chat::router())
        .nest("/notifications", notifications::router())
        .nest("/reports", reports::router())
        .nest("/exhibitions", exhibitions::router())
        .nest("/admin", admin::router())
}
