use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::Product;

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1 to 200 characters"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 1, message = "Price must be greater than 0"))]
    pub price: i64,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1 to 200 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 1, message = "Price must be greater than 0"))]
    pub price: Option<i64>,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: Option<i32>,
    pub category_id: Option<Uuid>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}

/// Multipart form for artwork uploads.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct ProductImageUpload {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}
