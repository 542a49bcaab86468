use serde::Serialize;
use utoipa::ToSchema;

use crate::models::Exhibition;

#[derive(Debug, Serialize, ToSchema)]
pub struct ExhibitionList {
    pub items: Vec<Exhibition>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CrawlSummary {
    pub upserted: usize,
}
