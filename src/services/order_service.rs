use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, FromQueryResult,
    JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
    TransactionTrait,
};
use sea_orm::sea_query::{Expr, LockType};
use uuid::Uuid;

use crate::{
    audit::record_audit,
    dto::orders::{CheckoutRequest, OrderList, OrderWithDetails},
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems, Relation as CartRelation},
        order_details::{
            ActiveModel as DetailActive, Column as DetailCol, Entity as OrderDetails,
            Model as DetailModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        payments::{Column as PaymentCol, Entity as Payments},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    integrations::storage::StoredObject,
    middleware::auth::AuthUser,
    models::{Order, OrderDetail},
    response::ApiResponse,
    routes::params::{OrderListQuery, SortOrder},
    services::payment_service::{LINK_CANCELLED, LINK_PENDING},
    state::AppState,
};

pub const ORDER_PENDING: &str = "pending";
pub const ORDER_PAID: &str = "paid";
pub const ORDER_SHIPPED: &str = "shipped";
pub const ORDER_COMPLETED: &str = "completed";
pub const ORDER_CANCELLED: &str = "cancelled";
pub const ORDER_STATUSES: [&str; 5] = [
    ORDER_PENDING,
    ORDER_PAID,
    ORDER_SHIPPED,
    ORDER_COMPLETED,
    ORDER_CANCELLED,
];

pub const PAYMENT_UNPAID: &str = "unpaid";
pub const PAYMENT_PAID: &str = "paid";
pub const PAYMENT_REFUNDED: &str = "refunded";

/// PayOS order codes must stay below 2^53.
const MAX_ORDER_CODE: i64 = (1 << 53) - 1;

#[derive(Debug, FromQueryResult)]
struct CartProductRow {
    product_id: Uuid,
    quantity: i32,
    price: i64,
    stock: i32,
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let page = query.pagination().normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
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
        "Ok",
        OrderList { items: orders },
        page,
        total,
    ))
}

pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithDetails>> {
    let txn = state.orm.begin().await?;

    let rows = CartItems::find()
        .select_only()
        .column_as(CartCol::ProductId, "product_id")
        .column_as(CartCol::Quantity, "quantity")
        .column_as(ProdCol::Price, "price")
        .column_as(ProdCol::Stock, "stock")
        .join(JoinType::InnerJoin, CartRelation::Products.def())
        .filter(CartCol::UserId.eq(user.user_id))
        .lock(LockType::Update)
        .into_model::<CartProductRow>()
        .all(&txn)
        .await?;

    if rows.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    for row in &rows {
        if row.quantity <= 0 {
            return Err(AppError::BadRequest("Cart has invalid quantity".into()));
        }
        if row.stock < row.quantity {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for product {}",
                row.product_id
            )));
        }
    }
    let lines: Vec<(i64, i32)> = rows.iter().map(|r| (r.price, r.quantity)).collect();
    let total_amount = order_total(&lines)?;

    let order_id = Uuid::new_v4();
    let now = Utc::now();
    let order = OrderActive {
        id: Set(order_id),
        user_id: Set(user.user_id),
        order_code: Set(generate_order_code(now, random_suffix())),
        invoice_number: Set(build_invoice_number(order_id, now)),
        shipping_address: Set(payload.shipping_address.trim().to_string()),
        status: Set(ORDER_PENDING.into()),
        payment_status: Set(PAYMENT_UNPAID.into()),
        total_amount: Set(total_amount),
        paid_at: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    let mut details: Vec<OrderDetail> = Vec::new();

    for row in &rows {
        let detail = DetailActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(row.product_id),
            quantity: Set(row.quantity),
            price: Set(row.price),
            certificate_key: Set(None),
        }
        .insert(&txn)
        .await?;

        details.push(detail_from_entity(detail));

        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(row.quantity))
            .filter(ProdCol::Id.eq(row.product_id))
            .exec(&txn)
            .await?;
    }

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    tracing::info!(order_id = %order.id, total_amount, lines = details.len(), "order created");
    record_audit(
        &state.pool,
        Some(user.user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await;

    Ok(ApiResponse::ok(
        "Checkout success",
        OrderWithDetails {
            order: order_from_entity(order),
            details,
        },
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithDetails>> {
    let order = find_own_order(state, user, id).await?;
    let details = load_details(&state.orm, order.id).await?;

    Ok(ApiResponse::ok(
        "OK",
        OrderWithDetails {
            order: order_from_entity(order),
            details,
        },
    ))
}

/// Cancels a pending, unpaid order and puts its items back in stock.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;

    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if order.status != ORDER_PENDING || order.payment_status != PAYMENT_UNPAID {
        return Err(AppError::BadRequest(
            "Only pending, unpaid orders can be cancelled".into(),
        ));
    }

    let order_code = order.order_code;
    let order = mark_cancelled(&txn, order).await?;
    let open_links = Payments::update_many()
        .col_expr(PaymentCol::Status, Expr::value(LINK_CANCELLED))
        .col_expr(PaymentCol::UpdatedAt, Expr::value(Utc::now()))
        .filter(
            Condition::all()
                .add(PaymentCol::OrderId.eq(order.id))
                .add(PaymentCol::Status.eq(LINK_PENDING)),
        )
        .exec(&txn)
        .await?
        .rows_affected;

    txn.commit().await?;

    if open_links > 0 {
        if let Some(payos) = &state.payos {
            if let Err(err) = payos
                .cancel_payment_link(order_code, "Order cancelled")
                .await
            {
                tracing::warn!(error = %err, order_id = %order.id, "failed to cancel payment link");
            }
        }
    }

    record_audit(
        &state.pool,
        Some(user.user_id),
        "order_cancel",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await;

    Ok(ApiResponse::ok("Order cancelled", order_from_entity(order)))
}

/// Sets the order to `cancelled` and returns its quantities to stock, inside the caller's transaction.
pub(crate) async fn mark_cancelled<C: ConnectionTrait>(
    conn: &C,
    order: OrderModel,
) -> AppResult<OrderModel> {
    let details = OrderDetails::find()
        .filter(DetailCol::OrderId.eq(order.id))
        .all(conn)
        .await?;
    for detail in &details {
        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(detail.quantity))
            .filter(ProdCol::Id.eq(detail.product_id))
            .exec(conn)
            .await?;
    }

    let mut active: OrderActive = order.into();
    active.status = Set(ORDER_CANCELLED.into());
    active.updated_at = Set(Utc::now().into());
    Ok(active.update(conn).await?)
}

/// PDF certificate of a purchased line, available once the order is paid.
pub async fn certificate(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    detail_id: Uuid,
) -> AppResult<StoredObject> {
    let detail = find_paid_detail(state, user, order_id, detail_id).await?;
    let key = detail.certificate_key.ok_or(AppError::NotFound)?;
    Ok(state.storage.get(&key).await?)
}

/// The un-watermarked artwork image of a purchased line.
pub async fn original_artwork(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    detail_id: Uuid,
) -> AppResult<StoredObject> {
    let detail = find_paid_detail(state, user, order_id, detail_id).await?;
    let product = Products::find_by_id(detail.product_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let key = product.image_key.ok_or(AppError::NotFound)?;

    record_audit(
        &state.pool,
        Some(user.user_id),
        "artwork_download",
        Some("order_details"),
        Some(serde_json::json!({ "order_id": order_id, "detail_id": detail_id })),
    )
    .await;

    Ok(state.storage.get(&key).await?)
}

async fn find_own_order(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<OrderModel> {
    Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

async fn find_paid_detail(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    detail_id: Uuid,
) -> AppResult<DetailModel> {
    let order = find_own_order(state, user, order_id).await?;
    if order.payment_status != PAYMENT_PAID {
        return Err(AppError::Forbidden);
    }
    OrderDetails::find()
        .filter(
            Condition::all()
                .add(DetailCol::Id.eq(detail_id))
                .add(DetailCol::OrderId.eq(order.id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

pub(crate) async fn load_details<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> AppResult<Vec<OrderDetail>> {
    Ok(OrderDetails::find()
        .filter(DetailCol::OrderId.eq(order_id))
        .all(conn)
        .await?
        .into_iter()
        .map(detail_from_entity)
        .collect())
}

/// Σ price × quantity over `(unit price, quantity)` lines.
pub fn order_total(lines: &[(i64, i32)]) -> AppResult<i64> {
    lines
        .iter()
        .try_fold(0_i64, |acc, &(price, quantity)| {
            price
                .checked_mul(i64::from(quantity))
                .and_then(|line| acc.checked_add(line))
        })
        .ok_or_else(|| AppError::BadRequest("Order total is too large".into()))
}

/// Millisecond timestamp followed by three random digits.
pub fn generate_order_code(now: DateTime<Utc>, random: u16) -> i64 {
    let code = now.timestamp_millis() * 1000 + i64::from(random % 1000);
    code.min(MAX_ORDER_CODE)
}

fn random_suffix() -> u16 {
    (Uuid::new_v4().as_u128() % 1000) as u16
}

fn build_invoice_number(order_id: Uuid, now: DateTime<Utc>) -> String {
    let date = now.format("%Y%m%d");
    let suffix = order_id.to_string();
    let short = &suffix[..8];
    format!("INV-{}-{}", date, short)
}

pub(crate) fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        order_code: model.order_code,
        invoice_number: model.invoice_number,
        shipping_address: model.shipping_address,
        total_amount: model.total_amount,
        status: model.status,
        payment_status: model.payment_status,
        paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn detail_from_entity(model: DetailModel) -> OrderDetail {
    OrderDetail {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        price: model.price,
        has_certificate: model.certificate_key.is_some(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn total_is_sum_of_price_times_quantity() {
        assert_eq!(order_total(&[(1_500_000, 1), (250_000, 3)]).unwrap(), 2_250_000);
        assert_eq!(order_total(&[]).unwrap(), 0);
    }

    #[test]
    fn total_overflow_is_rejected() {
        assert!(matches!(
            order_total(&[(i64::MAX, 2)]),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn order_code_is_timestamp_with_random_digits() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap();
        let code = generate_order_code(now, 1042);
        assert_eq!(code, now.timestamp_millis() * 1000 + 42);
        assert!(code < MAX_ORDER_CODE);
    }

    #[test]
    fn invoice_number_uses_date_and_id_prefix() {
        let id = Uuid::parse_str("a1b2c3d4-0000-4000-8000-000000000000").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap();
        assert_eq!(build_invoice_number(id, now), "INV-20260301-a1b2c3d4");
    }

    #[test]
    fn status_set_is_closed() {
        assert!(ORDER_STATUSES.contains(&"shipped"));
        assert!(!ORDER_STATUSES.contains(&"refunded"));
    }
}
