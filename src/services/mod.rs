pub mod admin_service;
pub mod artist_service;
pub mod auth_service;
pub mod cart_service;
pub mod category_service;
pub mod chat_service;
pub mod comment_service;
pub mod exhibition_service;
pub mod favorite_service;
pub mod notification_service;
pub mod order_service;
pub mod payment_service;
pub mod product_service;
pub mod report_service;
pub mod user_service;
