use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct Meta {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub total: Option<i64>,
}

impl Meta {
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
            total: Some(total),
        }
    }

    pub fn empty() -> Self {
        Self {
            page: None,
            per_page: None,
            total: None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
    pub meta: Option<Meta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T, meta: Option<Meta>) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta,
        }
    }

    /// Success envelope without pagination metadata.
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::success(message, data, Some(Meta::empty()))
    }

    pub fn paginated(message: impl Into<String>, data: T, page: Page, total: i64) -> Self {
        Self::success(
            message,
            data,
            Some(Meta::new(page.page, page.per_page, total)),
        )
    }
}

/// A normalized page request: 1-based page number, page size and row offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub per_page: i64,
    pub offset: i64,
}

impl Page {
    pub fn limit_u64(&self) -> u64 {
        self.per_page as u64
    }

    pub fn offset_u64(&self) -> u64 {
        self.offset.max(0) as u64
    }
}

/// Empty JSON object used as `data` by delete-style endpoints.
pub fn empty_data() -> serde_json::Value {
    serde_json::json!({})
}
