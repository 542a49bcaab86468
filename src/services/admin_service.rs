use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::record_audit,
    dto::{
        admin::{InventoryAdjustRequest, LowStockList, UpdateOrderStatusRequest},
        orders::{OrderList, OrderWithDetails},
    },
    entity::{
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, Product},
    response::ApiResponse,
    routes::params::{LowStockQuery, OrderListQuery, SortOrder},
    services::{
        notification_service::{KIND_ORDER, notify_quietly},
        order_service::{
            ORDER_CANCELLED, ORDER_PENDING, ORDER_STATUSES, PAYMENT_PAID, PAYMENT_REFUNDED,
            load_details, mark_cancelled, order_from_entity,
        },
        product_service::product_from_entity,
    },
    state::AppState,
};

const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let page = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let mut finder = Orders::find().filter(condition);

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(page.limit_u64())
        .offset(page.offset_u64())
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    Ok(ApiResponse::paginated(
        "Orders",
        OrderList { items: orders },
        page,
        total,
    ))
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithDetails>> {
    ensure_admin(user)?;
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let details = load_details(&state.orm, order.id).await?;

    Ok(ApiResponse::ok(
        "Order found",
        OrderWithDetails {
            order: order_from_entity(order),
            details,
        },
    ))
}

/// Moves an order to another status and notifies the buyer.
///
/// Cancelling returns the items to stock; a paid order cancelled this way is marked refunded.
/// Cancelled orders are final, and only paid orders move past `pending`.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let status = validate_order_status(&payload.status)?;

    let txn = state.orm.begin().await?;
    let existing = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if existing.status == status {
        txn.commit().await?;
        return Ok(ApiResponse::ok("Order unchanged", order_from_entity(existing)));
    }
    check_transition(&existing.status, &existing.payment_status, status)?;

    let order = if status == ORDER_CANCELLED {
        let was_paid = existing.payment_status == PAYMENT_PAID;
        let cancelled = mark_cancelled(&txn, existing).await?;
        if was_paid {
            let mut active: OrderActive = cancelled.into();
            active.payment_status = Set(PAYMENT_REFUNDED.into());
            active.update(&txn).await?
        } else {
            cancelled
        }
    } else {
        let mut active: OrderActive = existing.into();
        active.status = Set(status.to_string());
        active.updated_at = Set(Utc::now().into());
        active.update(&txn).await?
    };

    txn.commit().await?;

    record_audit(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": order.status })),
    )
    .await;

    notify_quietly(
        state,
        order.user_id,
        "Order updated",
        &format!("Order {} is now {}", order.invoice_number, order.status),
        KIND_ORDER,
    )
    .await;

    Ok(ApiResponse::ok("Order updated", order_from_entity(order)))
}

pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<LowStockList>> {
    ensure_admin(user)?;
    let threshold = query.threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
    let page = query.pagination().normalize();

    let finder = Products::find()
        .filter(ProdCol::Stock.lte(threshold))
        .order_by_asc(ProdCol::Stock)
        .order_by_desc(ProdCol::CreatedAt);

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
        "Low stock",
        LowStockList { items },
        page,
        total,
    ))
}

pub async fn adjust_inventory(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: InventoryAdjustRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    if payload.delta == 0 {
        return Err(AppError::BadRequest("delta must not be 0".into()));
    }

    let txn = state.orm.begin().await?;
    let product = Products::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let new_stock = adjusted_stock(product.stock, payload.delta)?;

    let mut active: ProductActive = product.into();
    active.stock = Set(new_stock);
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&txn).await?;

    txn.commit().await?;

    record_audit(
        &state.pool,
        Some(user.user_id),
        "inventory_adjust",
        Some("products"),
        Some(serde_json::json!({ "product_id": updated.id, "delta": payload.delta })),
    )
    .await;

    Ok(ApiResponse::ok(
        "Inventory updated",
        product_from_entity(updated),
    ))
}

fn validate_order_status(status: &str) -> AppResult<&'static str> {
    ORDER_STATUSES
        .iter()
        .copied()
        .find(|s| *s == status)
        .ok_or_else(|| AppError::BadRequest("Invalid order status".into()))
}

fn check_transition(current: &str, payment_status: &str, next: &str) -> AppResult<()> {
    if current == ORDER_CANCELLED {
        return Err(AppError::BadRequest(
            "Cancelled orders cannot be reopened".into(),
        ));
    }
    if payment_status != PAYMENT_PAID && next != ORDER_CANCELLED && next != ORDER_PENDING {
        return Err(AppError::BadRequest("Order has not been paid".into()));
    }
    Ok(())
}

fn adjusted_stock(stock: i32, delta: i32) -> AppResult<i32> {
    match stock.checked_add(delta) {
        Some(next) if next >= 0 => Ok(next),
        _ => Err(AppError::BadRequest("stock cannot be negative".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_known_statuses_are_accepted() {
        assert_eq!(validate_order_status("shipped").unwrap(), "shipped");
        assert!(matches!(
            validate_order_status("lost"),
            Err(AppError::BadRequest(_))
        ));
        assert!(validate_order_status("PAID").is_err());
    }

    #[test]
    fn stock_never_goes_negative() {
        assert_eq!(adjusted_stock(3, -3).unwrap(), 0);
        assert_eq!(adjusted_stock(3, 4).unwrap(), 7);
        assert!(adjusted_stock(3, -4).is_err());
        assert!(adjusted_stock(i32::MAX, 1).is_err());
    }

    #[test]
    fn unpaid_orders_can_only_be_cancelled() {
        assert!(check_transition("pending", "unpaid", "cancelled").is_ok());
        assert!(matches!(
            check_transition("pending", "unpaid", "shipped"),
            Err(AppError::BadRequest(_))
        ));
        assert!(check_transition("pending", "unpaid", "paid").is_err());
        assert!(check_transition("paid", "paid", "shipped").is_ok());
        assert!(check_transition("cancelled", "refunded", "paid").is_err());
    }
}
