use std::sync::Arc;

use chrono::Utc;
use image::ImageFormat;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr,
};
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use uuid::Uuid;

use crate::{
    audit::record_audit,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    entity::{
        categories::Entity as Categories,
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    integrations::{
        storage::product_image_key,
        watermark::{WatermarkedImage, Watermarker},
    },
    middleware::auth::{AuthUser, ensure_artist, ensure_owner_or_admin},
    models::Product,
    response::{ApiResponse, empty_data},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let page = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    if let Some(category_id) = query.category_id {
        condition = condition.add(Column::CategoryId.eq(category_id));
    }

    if let Some(artist_id) = query.artist_id {
        condition = condition.add(Column::ArtistId.eq(artist_id));
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(page.limit_u64())
        .offset(page.offset_u64())
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    Ok(ApiResponse::paginated(
        "Products",
        ProductList { items },
        page,
        total,
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = find_product(state, id).await?;
    Ok(ApiResponse::ok("Product", product_from_entity(product)))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_artist(user)?;
    if let Some(category_id) = payload.category_id {
        ensure_category_exists(state, category_id).await?;
    }

    let now = Utc::now();
    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        artist_id: Set(user.user_id),
        category_id: Set(payload.category_id),
        name: Set(payload.name.trim().to_string()),
        description: Set(payload.description),
        price: Set(payload.price),
        stock: Set(payload.stock),
        image_key: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    record_audit(
        &state.pool,
        Some(user.user_id),
        "product_create",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    Ok(ApiResponse::ok(
        "Product created",
        product_from_entity(product),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let existing = find_product(state, id).await?;
    ensure_owner_or_admin(user, existing.artist_id)?;
    if let Some(category_id) = payload.category_id {
        ensure_category_exists(state, category_id).await?;
    }

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }
    if let Some(category_id) = payload.category_id {
        active.category_id = Set(Some(category_id));
    }
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;

    record_audit(
        &state.pool,
        Some(user.user_id),
        "product_update",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    Ok(ApiResponse::ok("Updated", product_from_entity(product)))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let existing = find_product(state, id).await?;
    ensure_owner_or_admin(user, existing.artist_id)?;

    Products::delete_by_id(id)
        .exec(&state.orm)
        .await
        .map_err(|err: DbErr| match err.sql_err() {
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                AppError::Conflict("Product has been ordered and cannot be deleted".into())
            }
            _ => AppError::OrmError(err),
        })?;

    if let Some(key) = existing.image_key {
        if let Err(err) = state.storage.delete(&key).await {
            tracing::warn!(error = %err, key = %key, "failed to delete product image");
        }
    }

    record_audit(
        &state.pool,
        Some(user.user_id),
        "product_delete",
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
    )
    .await;

    Ok(ApiResponse::ok("Deleted", empty_data()))
}

/// Stores the original artwork and records its key on the product.
pub async fn upload_image(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    bytes: Vec<u8>,
) -> AppResult<ApiResponse<Product>> {
    let existing = find_product(state, id).await?;
    ensure_owner_or_admin(user, existing.artist_id)?;

    let (extension, content_type) = sniff_image(&bytes)?;
    let key = product_image_key(id, extension);
    state.storage.put(&key, bytes, content_type).await?;

    if let Some(old_key) = existing.image_key.clone().filter(|old| *old != key) {
        if let Err(err) = state.storage.delete(&old_key).await {
            tracing::warn!(error = %err, key = %old_key, "failed to delete replaced image");
        }
    }

    let mut active: ActiveModel = existing.into();
    active.image_key = Set(Some(key.clone()));
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&state.orm).await?;

    tracing::info!(product_id = %id, key = %key, "product image stored");
    record_audit(
        &state.pool,
        Some(user.user_id),
        "product_image_upload",
        Some("products"),
        Some(serde_json::json!({ "product_id": id, "key": key })),
    )
    .await;

    Ok(ApiResponse::ok("Image uploaded", product_from_entity(product)))
}

/// The public copy of an artwork: the stored original with the watermark applied.
pub async fn watermarked_image(state: &AppState, id: Uuid) -> AppResult<WatermarkedImage> {
    let product = find_product(state, id).await?;
    let key = product.image_key.ok_or(AppError::NotFound)?;
    let watermarker: Arc<Watermarker> = state
        .watermarker
        .clone()
        .ok_or_else(|| AppError::ServiceUnavailable("Watermarking is not configured".into()))?;

    let original = state.storage.get(&key).await?;
    let image = tokio::task::spawn_blocking(move || watermarker.apply(&original.bytes))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))??;
    Ok(image)
}

pub(crate) async fn find_product(state: &AppState, id: Uuid) -> AppResult<ProductModel> {
    Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

async fn ensure_category_exists(state: &AppState, category_id: Uuid) -> AppResult<()> {
    let exists = Categories::find_by_id(category_id)
        .count(&state.orm)
        .await?
        > 0;
    if !exists {
        return Err(AppError::BadRequest("Category not found".into()));
    }
    Ok(())
}

/// Accepted upload formats, detected from the file content rather than its name.
fn sniff_image(bytes: &[u8]) -> AppResult<(&'static str, &'static str)> {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => Ok(("png", "image/png")),
        Ok(ImageFormat::Jpeg) => Ok(("jpg", "image/jpeg")),
        Ok(ImageFormat::WebP) => Ok(("webp", "image/webp")),
        _ => Err(AppError::BadRequest(
            "Only PNG, JPEG or WebP images are accepted".into(),
        )),
    }
}

pub(crate) fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        artist_id: model.artist_id,
        category_id: model.category_id,
        name: model.name,
        description: model.description,
        price: model.price,
        stock: model.stock,
        has_image: model.image_key.is_some(),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_supported_formats_by_magic_bytes() {
        let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
        let jpeg = b"\xff\xd8\xff\xe0\0\x10JFIF\0";
        assert_eq!(sniff_image(png).unwrap(), ("png", "image/png"));
        assert_eq!(sniff_image(jpeg).unwrap(), ("jpg", "image/jpeg"));
        assert!(matches!(
            sniff_image(b"GIF89a...."),
            Err(AppError::BadRequest(_))
        ));
    }
}
