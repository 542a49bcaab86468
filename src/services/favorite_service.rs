use uuid::Uuid;

use crate::{
    audit::record_audit,
    dto::favorites::{AddFavoriteRequest, FavoriteProductList},
    error::{AppError, AppResult, conflict_on_unique_sqlx},
    middleware::auth::AuthUser,
    models::{Favorite, Product},
    response::{ApiResponse, empty_data},
    routes::params::Pagination,
    state::AppState,
};

pub async fn list_favorites(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<FavoriteProductList>> {
    let page = pagination.normalize();
    let products = sqlx::query_as::<_, Product>(
        r#"
        SELECT p.id, p.artist_id, p.category_id, p.name, p.description, p.price, p.stock,
               (p.image_key IS NOT NULL) AS has_image, p.created_at, p.updated_at
        FROM favorites f
        JOIN products p ON p.id = f.product_id
        WHERE f.user_id = $1
        ORDER BY f.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user.user_id)
    .bind(page.per_page)
    .bind(page.offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM favorites WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(&state.pool)
        .await?;

    Ok(ApiResponse::paginated(
        "OK",
        FavoriteProductList { items: products },
        page,
        total.0,
    ))
}

/// A second favourite for the same product is rejected by the unique constraint.
pub async fn add_favorite(
    state: &AppState,
    user: &AuthUser,
    payload: AddFavoriteRequest,
) -> AppResult<ApiResponse<Favorite>> {
    let product_exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(payload.product_id)
        .fetch_optional(&state.pool)
        .await?;

    if product_exists.is_none() {
        return Err(AppError::BadRequest("Product not found".into()));
    }

    let favorite = sqlx::query_as::<_, Favorite>(
        r#"
        INSERT INTO favorites (id, user_id, product_id)
        VALUES ($1, $2, $3)
        RETURNING id, product_id, user_id, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(payload.product_id)
    .fetch_one(&state.pool)
    .await
    .map_err(conflict_on_unique_sqlx("Product is already in favorites"))?;

    record_audit(
        &state.pool,
        Some(user.user_id),
        "favorite_add",
        Some("favorites"),
        Some(serde_json::json!({ "product_id": payload.product_id })),
    )
    .await;

    Ok(ApiResponse::ok("Added to favorites", favorite))
}

pub async fn remove_favorite(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND product_id = $2")
        .bind(user.user_id)
        .bind(product_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    record_audit(
        &state.pool,
        Some(user.user_id),
        "favorite_remove",
        Some("favorites"),
        Some(serde_json::json!({ "product_id": product_id })),
    )
    .await;

    Ok(ApiResponse::ok("Removed from favorites", empty_data()))
}
