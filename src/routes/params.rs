use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::response::Page;

// Query structs repeat `page`/`per_page` instead of flattening `Pagination`:
// flattened numeric fields do not deserialize from query strings.

/// Highest page number honoured; larger requests land on this page.
pub const MAX_PAGE: i64 = 1_000_000;

#[derive(Debug, Default, Clone, Copy, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self { page, per_page }
    }

    pub fn normalize(&self) -> Page {
        let page = self.page.unwrap_or(1).clamp(1, MAX_PAGE);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        Page {
            page,
            per_page,
            offset,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductSortBy {
    CreatedAt,
    Price,
    Name,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ProductQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub q: Option<String>,
    pub category_id: Option<Uuid>,
    pub artist_id: Option<Uuid>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub sort_by: Option<ProductSortBy>,
    pub sort_order: Option<SortOrder>,
}

impl ProductQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.per_page)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct OrderListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<String>,
    pub sort_order: Option<SortOrder>,
}

impl OrderListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.per_page)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LowStockQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub threshold: Option<i32>,
}

impl LowStockQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.per_page)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UserListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub role: Option<String>,
}

impl UserListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.per_page)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct NotificationQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    #[serde(default)]
    pub unread_only: bool,
}

impl NotificationQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.per_page)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReportQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub artist_id: Option<Uuid>,
}

impl ReportQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page_of_twenty() {
        let page = Pagination::default().normalize();
        assert_eq!(
            page,
            Page {
                page: 1,
                per_page: 20,
                offset: 0
            }
        );
    }

    #[test]
    fn clamps_page_size_and_computes_offset() {
        let page = Pagination::new(Some(3), Some(500)).normalize();
        assert_eq!(page.per_page, 100);
        assert_eq!(page.offset, 200);

        let page = Pagination::new(Some(-4), Some(0)).normalize();
        assert_eq!((page.page, page.per_page, page.offset), (1, 1, 0));
    }

    #[test]
    fn huge_page_numbers_are_capped() {
        let page = Pagination::new(Some(i64::MAX), Some(100)).normalize();
        assert_eq!(page.page, MAX_PAGE);
        assert_eq!(page.offset, (MAX_PAGE - 1) * 100);
        assert_eq!(page.offset_u64(), page.offset as u64);
    }
}
