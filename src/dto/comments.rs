use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{Comment, CommentReply};

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 2000, message = "Comment must be 1 to 2000 characters"))]
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommentWithReplies {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<CommentReply>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommentList {
    pub items: Vec<CommentWithReplies>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReplyList {
    pub items: Vec<CommentReply>,
}
