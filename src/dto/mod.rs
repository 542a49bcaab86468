pub mod admin;
pub mod artists;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod chat;
pub mod comments;
pub mod exhibitions;
pub mod favorites;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reports;
pub mod users;
