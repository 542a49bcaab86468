pub mod artist_profiles;
pub mod audit_logs;
pub mod cart_items;
pub mod categories;
pub mod chat_messages;
pub mod comment_replies;
pub mod comments;
pub mod exhibitions;
pub mod favorites;
pub mod financial_reports;
pub mod notifications;
pub mod order_details;
pub mod orders;
pub mod payments;
pub mod products;
pub mod users;

pub use artist_profiles::Entity as ArtistProfiles;
pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use categories::Entity as Categories;
pub use chat_messages::Entity as ChatMessages;
pub use comment_replies::Entity as CommentReplies;
pub use comments::Entity as Comments;
pub use exhibitions::Entity as Exhibitions;
pub use favorites::Entity as Favorites;
pub use financial_reports::Entity as FinancialReports;
pub use notifications::Entity as Notifications;
pub use order_details::Entity as OrderDetails;
pub use orders::Entity as Orders;
pub use payments::Entity as Payments;
pub use products::Entity as Products;
pub use users::Entity as Users;
