use chrono::Utc;
use sea_orm::{EntityTrait, PaginatorTrait, QueryOrder, QuerySelect};
use uuid::Uuid;

use crate::{
    audit::record_audit,
    dto::exhibitions::{CrawlSummary, ExhibitionList},
    entity::exhibitions::{Column, Entity as Exhibitions, Model as ExhibitionModel},
    error::{AppError, AppResult},
    integrations::crawler::CrawledExhibition,
    middleware::auth::{AuthUser, ensure_admin},
    models::Exhibition,
    response::ApiResponse,
    routes::params::Pagination,
    state::AppState,
};

/// Fetches the configured listing page and upserts every exhibition found by its source URL.
pub async fn crawl_exhibitions(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<CrawlSummary>> {
    ensure_admin(user)?;
    let crawler = state
        .crawler
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("No exhibition source configured".into()))?;

    let items = crawler.crawl().await?;

    store_exhibitions(state, &items).await?;

    record_audit(
        &state.pool,
        Some(user.user_id),
        "exhibition_crawl",
        Some("exhibitions"),
        Some(serde_json::json!({ "upserted": items.len() })),
    )
    .await;

    Ok(ApiResponse::ok(
        "Exhibitions crawled",
        CrawlSummary {
            upserted: items.len(),
        },
    ))
}

/// Upserts crawled exhibitions keyed by source URL; re-crawled pages refresh their row.
pub async fn store_exhibitions(state: &AppState, items: &[CrawledExhibition]) -> AppResult<usize> {
    let mut tx = state.pool.begin().await?;
    for item in items {
        sqlx::query(
            r#"
            INSERT INTO exhibitions (id, title, venue, schedule, source_url, image_url, crawled_at)
            VALUES ($1, $2, $3, $4, $5, $6, now())
            ON CONFLICT (source_url) DO UPDATE SET
                title = EXCLUDED.title,
                venue = EXCLUDED.venue,
                schedule = EXCLUDED.schedule,
                image_url = EXCLUDED.image_url,
                crawled_at = EXCLUDED.crawled_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&item.title)
        .bind(&item.venue)
        .bind(&item.schedule)
        .bind(&item.source_url)
        .bind(&item.image_url)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(items.len())
}

pub async fn list_exhibitions(
    state: &AppState,
    pagination: Pagination,
) -> AppResult<ApiResponse<ExhibitionList>> {
    let page = pagination.normalize();
    let finder = Exhibitions::find()
        .order_by_desc(Column::CrawledAt)
        .order_by_asc(Column::Title);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(page.limit_u64())
        .offset(page.offset_u64())
        .all(&state.orm)
        .await?
        .into_iter()
        .map(exhibition_from_entity)
        .collect();

    Ok(ApiResponse::paginated(
        "Exhibitions",
        ExhibitionList { items },
        page,
        total,
    ))
}

fn exhibition_from_entity(model: ExhibitionModel) -> Exhibition {
    Exhibition {
        id: model.id,
        title: model.title,
        venue: model.venue,
        schedule: model.schedule,
        source_url: model.source_url,
        image_url: model.image_url,
        crawled_at: model.crawled_at.with_timezone(&Utc),
    }
}
