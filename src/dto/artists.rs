use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::ArtistProfile;

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct BecomeArtistRequest {
    #[validate(length(min = 1, max = 100, message = "Display name is required"))]
    pub display_name: String,
    #[validate(length(max = 2000))]
    pub bio: Option<String>,
    #[validate(url(message = "Avatar must be a URL"))]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateArtistProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub display_name: Option<String>,
    #[validate(length(max = 2000))]
    pub bio: Option<String>,
    #[validate(url(message = "Avatar must be a URL"))]
    pub avatar_url: Option<String>,
}

/// The new profile plus a token carrying the caller's updated role.
#[derive(Debug, Serialize, ToSchema)]
pub struct BecomeArtistResponse {
    pub profile: ArtistProfile,
    pub token: String,
}
