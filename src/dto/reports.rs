use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::FinancialReport;

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct GenerateReportRequest {
    /// Admins may generate for any artist; artists always get their own.
    pub artist_id: Option<Uuid>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReportList {
    pub items: Vec<FinancialReport>,
}
