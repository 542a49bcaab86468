use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::ChatMessage;

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SendMessageRequest {
    pub receiver_id: Uuid,
    #[validate(length(min = 1, max = 4000, message = "Message must be 1 to 4000 characters"))]
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatMessageList {
    pub items: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
pub struct ConversationSummary {
    pub partner_id: Uuid,
    pub partner_name: String,
    pub last_message: String,
    pub last_sent_at: DateTime<Utc>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationList {
    pub items: Vec<ConversationSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MarkedRead {
    pub updated: u64,
}
