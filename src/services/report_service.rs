use chrono::{Days, NaiveDate, NaiveTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use uuid::Uuid;

use crate::{
    audit::record_audit,
    dto::reports::{GenerateReportRequest, ReportList},
    entity::financial_reports::{Column, Entity as FinancialReports, Model as ReportModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_artist},
    models::FinancialReport,
    response::ApiResponse,
    routes::params::ReportQuery,
    services::order_service::PAYMENT_PAID,
    state::AppState,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
struct SalesTotals {
    total_orders: i64,
    items_sold: i64,
    gross_revenue: i64,
}

/// Platform commission and artist net for a gross amount; the commission is rounded down.
pub fn split_commission(gross: i64, percent: i64) -> (i64, i64) {
    let commission = (i128::from(gross) * i128::from(percent) / 100) as i64;
    (commission, gross - commission)
}

/// Aggregates an artist's paid sales between two dates (inclusive) and stores the report.
pub async fn generate_report(
    state: &AppState,
    user: &AuthUser,
    payload: GenerateReportRequest,
) -> AppResult<ApiResponse<FinancialReport>> {
    ensure_artist(user)?;
    let artist_id = match payload.artist_id {
        Some(id) if user.is_admin() => id,
        Some(id) if id != user.user_id => return Err(AppError::Forbidden),
        _ => user.user_id,
    };
    if payload.period_end < payload.period_start {
        return Err(AppError::BadRequest(
            "period_end must not be before period_start".into(),
        ));
    }
    let (from, until) = period_bounds(payload.period_start, payload.period_end)?;

    let totals: SalesTotals = sqlx::query_as(
        r#"
        SELECT COUNT(DISTINCT o.id) AS total_orders,
               COALESCE(SUM(od.quantity), 0)::BIGINT AS items_sold,
               COALESCE(SUM(od.price * od.quantity), 0)::BIGINT AS gross_revenue
        FROM order_details od
        JOIN orders o ON o.id = od.order_id
        JOIN products p ON p.id = od.product_id
        WHERE p.artist_id = $1
          AND o.payment_status = $2
          AND o.paid_at >= $3
          AND o.paid_at < $4
        "#,
    )
    .bind(artist_id)
    .bind(PAYMENT_PAID)
    .bind(from)
    .bind(until)
    .fetch_one(&state.pool)
    .await?;

    let (commission, net_revenue) =
        split_commission(totals.gross_revenue, state.config.commission_percent);

    let report: FinancialReport = sqlx::query_as(
        r#"
        INSERT INTO financial_reports
            (id, artist_id, period_start, period_end, total_orders, items_sold,
             gross_revenue, commission, net_revenue)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (artist_id, period_start, period_end) DO UPDATE SET
            total_orders = EXCLUDED.total_orders,
            items_sold = EXCLUDED.items_sold,
            gross_revenue = EXCLUDED.gross_revenue,
            commission = EXCLUDED.commission,
            net_revenue = EXCLUDED.net_revenue,
            created_at = now()
        RETURNING id, artist_id, period_start, period_end, total_orders, items_sold,
                  gross_revenue, commission, net_revenue, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(artist_id)
    .bind(payload.period_start)
    .bind(payload.period_end)
    .bind(totals.total_orders)
    .bind(totals.items_sold)
    .bind(totals.gross_revenue)
    .bind(commission)
    .bind(net_revenue)
    .fetch_one(&state.pool)
    .await?;

    record_audit(
        &state.pool,
        Some(user.user_id),
        "financial_report_generate",
        Some("financial_reports"),
        Some(serde_json::json!({ "report_id": report.id, "artist_id": artist_id })),
    )
    .await;

    Ok(ApiResponse::ok("Report generated", report))
}

pub async fn list_reports(
    state: &AppState,
    user: &AuthUser,
    query: ReportQuery,
) -> AppResult<ApiResponse<ReportList>> {
    ensure_artist(user)?;
    let page = query.pagination().normalize();

    let mut condition = Condition::all();
    if !user.is_admin() {
        condition = condition.add(Column::ArtistId.eq(user.user_id));
    } else if let Some(artist_id) = query.artist_id {
        condition = condition.add(Column::ArtistId.eq(artist_id));
    }

    let finder = FinancialReports::find()
        .filter(condition)
        .order_by_desc(Column::PeriodStart)
        .order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(page.limit_u64())
        .offset(page.offset_u64())
        .all(&state.orm)
        .await?
        .into_iter()
        .map(report_from_entity)
        .collect();

    Ok(ApiResponse::paginated(
        "Reports",
        ReportList { items },
        page,
        total,
    ))
}

/// `[start 00:00 UTC, day after end 00:00 UTC)`.
fn period_bounds(
    start: NaiveDate,
    end: NaiveDate,
) -> AppResult<(chrono::DateTime<Utc>, chrono::DateTime<Utc>)> {
    let next_day = end
        .checked_add_days(Days::new(1))
        .ok_or_else(|| AppError::BadRequest("period_end is out of range".into()))?;
    Ok((
        start.and_time(NaiveTime::MIN).and_utc(),
        next_day.and_time(NaiveTime::MIN).and_utc(),
    ))
}

fn report_from_entity(model: ReportModel) -> FinancialReport {
    FinancialReport {
        id: model.id,
        artist_id: model.artist_id,
        period_start: model.period_start,
        period_end: model.period_end,
        total_orders: model.total_orders,
        items_sold: model.items_sold,
        gross_revenue: model.gross_revenue,
        commission: model.commission,
        net_revenue: model.net_revenue,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commission_rounds_down() {
        assert_eq!(split_commission(1_000_000, 10), (100_000, 900_000));
        assert_eq!(split_commission(999, 10), (99, 900));
        assert_eq!(split_commission(0, 10), (0, 0));
        assert_eq!(split_commission(12_345, 0), (0, 12_345));
    }

    #[test]
    fn period_covers_whole_end_day() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        let (from, until) = period_bounds(start, end).unwrap();
        assert_eq!(from.to_rfc3339(), "2026-01-01T00:00:00+00:00");
        assert_eq!(until.to_rfc3339(), "2026-02-01T00:00:00+00:00");
    }
}
