use std::collections::BTreeSet;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    Set, TransactionTrait,
};
use sea_orm::sea_query::LockType;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::record_audit,
    dto::payments::{PaymentLinkResponse, PaymentList, WebhookAck},
    entity::{
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        payments::{ActiveModel, Column, Entity as Payments, Model as PaymentModel},
    },
    error::{AppError, AppResult},
    integrations::{
        certificate::{CertificateData, certificate_number, render_certificate},
        mailer::ReceiptLine,
        payos::{PaymentLinkRequest, PayosError, SUCCESS_CODE, WebhookData, WebhookPayload, verify_webhook},
        storage::certificate_key,
    },
    middleware::auth::AuthUser,
    models::{Payment, User},
    response::ApiResponse,
    services::{
        notification_service::{KIND_PAYMENT, KIND_SALE, notify_quietly},
        order_service::{
            ORDER_CANCELLED, ORDER_PAID, ORDER_PENDING, PAYMENT_PAID, PAYMENT_REFUNDED,
            PAYMENT_UNPAID,
        },
    },
    state::AppState,
};

pub const PROVIDER_PAYOS: &str = "payos";

pub const LINK_PENDING: &str = "pending";
pub const LINK_PAID: &str = "paid";
pub const LINK_CANCELLED: &str = "cancelled";
pub const LINK_FAILED: &str = "failed";

#[derive(Debug, FromRow)]
struct FulfilmentLine {
    detail_id: Uuid,
    quantity: i32,
    price: i64,
    product_name: String,
    artist_id: Uuid,
    artist_name: String,
}

/// Opens (or reuses) a PayOS checkout for a pending order of the caller.
pub async fn create_payment_link(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<PaymentLinkResponse>> {
    let payos = state
        .payos
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("Online payment is not configured".into()))?;

    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::Id.eq(order_id))
                .add(OrderCol::UserId.eq(user.user_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if order.status != ORDER_PENDING || order.payment_status != PAYMENT_UNPAID {
        return Err(AppError::BadRequest("Order is not awaiting payment".into()));
    }

    // PayOS allows one link per order code; hand back the open one.
    if let Some(open) = Payments::find()
        .filter(
            Condition::all()
                .add(Column::OrderId.eq(order.id))
                .add(Column::Status.eq(LINK_PENDING)),
        )
        .order_by_desc(Column::CreatedAt)
        .one(&state.orm)
        .await?
    {
        if let Some(checkout_url) = open.checkout_url.clone() {
            return Ok(ApiResponse::ok(
                "Payment link",
                PaymentLinkResponse {
                    payment: payment_from_entity(open),
                    checkout_url,
                    qr_code: None,
                },
            ));
        }
    }

    let buyer: Option<User> = sqlx::query_as(
        "SELECT id, email, full_name, phone, role, created_at FROM users WHERE id = $1",
    )
    .bind(user.user_id)
    .fetch_optional(&state.pool)
    .await?;

    let link = payos
        .create_payment_link(&PaymentLinkRequest {
            order_code: order.order_code,
            amount: order.total_amount,
            description: order.invoice_number.clone(),
            buyer_name: buyer.as_ref().map(|b| b.full_name.clone()),
            buyer_email: buyer.map(|b| b.email),
        })
        .await?;

    let now = Utc::now();
    let payment = ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        provider: Set(PROVIDER_PAYOS.into()),
        provider_ref: Set(Some(link.payment_link_id.clone())),
        amount: Set(order.total_amount),
        status: Set(LINK_PENDING.into()),
        checkout_url: Set(Some(link.checkout_url.clone())),
        raw_payload: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    record_audit(
        &state.pool,
        Some(user.user_id),
        "payment_link_create",
        Some("payments"),
        Some(serde_json::json!({ "order_id": order.id, "payment_id": payment.id })),
    )
    .await;

    Ok(ApiResponse::ok(
        "Payment link created",
        PaymentLinkResponse {
            payment: payment_from_entity(payment),
            checkout_url: link.checkout_url,
            qr_code: link.qr_code,
        },
    ))
}

pub async fn list_payments(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<PaymentList>> {
    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    if order.user_id != user.user_id && !user.is_admin() {
        return Err(AppError::NotFound);
    }

    let items = Payments::find()
        .filter(Column::OrderId.eq(order.id))
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(payment_from_entity)
        .collect();

    Ok(ApiResponse::ok("Payments", PaymentList { items }))
}

/// Applies a PayOS payment notification. Re-delivered notifications for a paid or refunded order
/// are acknowledged without side effects; a cancelled order only gets a failed payment row.
pub async fn handle_webhook(
    state: &AppState,
    payload: WebhookPayload,
) -> AppResult<ApiResponse<WebhookAck>> {
    let payos = state
        .payos
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("Online payment is not configured".into()))?;

    let data = verify_webhook(payos.checksum_key(), &payload).map_err(|err| match err {
        PayosError::InvalidSignature => AppError::Unauthorized("Invalid webhook signature".into()),
        PayosError::Malformed(msg) => AppError::BadRequest(msg),
        other => AppError::Payment(other),
    })?;
    let raw = serde_json::to_value(&payload).map_err(|e| AppError::Internal(e.into()))?;

    let succeeded = payload.code == SUCCESS_CODE && data.code == SUCCESS_CODE;
    let txn = state.orm.begin().await?;

    let order = Orders::find()
        .filter(OrderCol::OrderCode.eq(data.order_code))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if order.payment_status == PAYMENT_PAID || order.payment_status == PAYMENT_REFUNDED {
        txn.commit().await?;
        tracing::info!(order_id = %order.id, "duplicate payment notification ignored");
        return Ok(ApiResponse::ok("Already processed", WebhookAck { success: true }));
    }

    // Stock of a cancelled order is already released; never reopen it.
    if order.status == ORDER_CANCELLED {
        tracing::warn!(order_id = %order.id, "payment notification for a cancelled order");
        record_payment_result(&txn, &order, &data, LINK_FAILED, raw).await?;
        txn.commit().await?;
        return Ok(ApiResponse::ok("Order closed", WebhookAck { success: true }));
    }

    if !succeeded || data.amount < order.total_amount {
        if succeeded {
            tracing::warn!(
                order_id = %order.id,
                paid = data.amount,
                expected = order.total_amount,
                "payment amount below order total"
            );
        }
        record_payment_result(&txn, &order, &data, LINK_FAILED, raw).await?;
        txn.commit().await?;
        return Ok(ApiResponse::ok("Payment failed", WebhookAck { success: true }));
    }

    let now = Utc::now();
    let mut active: OrderActive = order.into();
    active.status = Set(ORDER_PAID.into());
    active.payment_status = Set(PAYMENT_PAID.into());
    active.paid_at = Set(Some(now.into()));
    active.updated_at = Set(now.into());
    let order = active.update(&txn).await?;

    record_payment_result(&txn, &order, &data, LINK_PAID, raw).await?;
    txn.commit().await?;

    tracing::info!(order_id = %order.id, order_code = order.order_code, "order paid");
    record_audit(
        &state.pool,
        Some(order.user_id),
        "order_paid",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "reference": data.reference })),
    )
    .await;

    fulfil_paid_order(state, &order).await;

    Ok(ApiResponse::ok("Payment recorded", WebhookAck { success: true }))
}

/// Updates the payment row the notification refers to, creating one when the link was made elsewhere.
async fn record_payment_result<C: sea_orm::ConnectionTrait>(
    conn: &C,
    order: &OrderModel,
    data: &WebhookData,
    status: &str,
    raw: serde_json::Value,
) -> AppResult<PaymentModel> {
    let mut condition = Condition::all()
        .add(Column::OrderId.eq(order.id))
        .add(Column::Status.eq(LINK_PENDING));
    if let Some(link_id) = &data.payment_link_id {
        condition = condition.add(Column::ProviderRef.eq(link_id.clone()));
    }

    let now = Utc::now();
    let existing = Payments::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt)
        .one(conn)
        .await?;

    let payment = match existing {
        Some(payment) => {
            let mut active: ActiveModel = payment.into();
            active.status = Set(status.to_string());
            active.raw_payload = Set(Some(raw));
            active.updated_at = Set(now.into());
            active.update(conn).await?
        }
        None => {
            ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                provider: Set(PROVIDER_PAYOS.into()),
                provider_ref: Set(data.payment_link_id.clone()),
                amount: Set(data.amount),
                status: Set(status.to_string()),
                checkout_url: Set(None),
                raw_payload: Set(Some(raw)),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            }
            .insert(conn)
            .await?
        }
    };
    Ok(payment)
}

/// Post-payment work: certificates, receipt email, notifications. Each step logs its own failure.
pub(crate) async fn fulfil_paid_order(state: &AppState, order: &OrderModel) {
    let lines = match sqlx::query_as::<_, FulfilmentLine>(
        r#"
        SELECT od.id AS detail_id, od.quantity, od.price,
               p.name AS product_name, p.artist_id,
               COALESCE(ap.display_name, u.full_name) AS artist_name
        FROM order_details od
        JOIN products p ON p.id = od.product_id
        JOIN users u ON u.id = p.artist_id
        LEFT JOIN artist_profiles ap ON ap.user_id = p.artist_id
        WHERE od.order_id = $1
        ORDER BY od.id
        "#,
    )
    .bind(order.id)
    .fetch_all(&state.pool)
    .await
    {
        Ok(lines) => lines,
        Err(err) => {
            tracing::error!(error = %err, order_id = %order.id, "failed to load order lines for fulfilment");
            return;
        }
    };

    let buyer: Option<User> = match sqlx::query_as(
        "SELECT id, email, full_name, phone, role, created_at FROM users WHERE id = $1",
    )
    .bind(order.user_id)
    .fetch_optional(&state.pool)
    .await
    {
        Ok(buyer) => buyer,
        Err(err) => {
            tracing::error!(error = %err, order_id = %order.id, "failed to load buyer");
            None
        }
    };
    let buyer_name = buyer
        .as_ref()
        .map(|b| b.full_name.clone())
        .unwrap_or_default();

    let issued_at = order
        .paid_at
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    for (index, line) in lines.iter().enumerate() {
        let data = CertificateData {
            certificate_no: certificate_number(&order.invoice_number, index),
            artwork_title: line.product_name.clone(),
            artist_name: line.artist_name.clone(),
            buyer_name: buyer_name.clone(),
            invoice_number: order.invoice_number.clone(),
            quantity: line.quantity,
            price: line.price,
            issued_at,
        };
        if let Err(err) = issue_certificate(state, order.id, line.detail_id, &data).await {
            tracing::error!(error = %err, detail_id = %line.detail_id, "certificate issuance failed");
        }
    }

    if let (Some(mailer), Some(buyer)) = (&state.mailer, &buyer) {
        let receipt: Vec<ReceiptLine> = lines
            .iter()
            .map(|l| ReceiptLine {
                artwork: l.product_name.clone(),
                quantity: l.quantity,
                price: l.price,
            })
            .collect();
        if let Err(err) = mailer
            .send_payment_receipt(
                &buyer.email,
                &buyer.full_name,
                &order.invoice_number,
                order.total_amount,
                &receipt,
            )
            .await
        {
            tracing::warn!(error = %err, order_id = %order.id, "receipt email failed");
        }
    }

    notify_quietly(
        state,
        order.user_id,
        "Payment received",
        &format!("Order {} is paid. Your certificates are ready.", order.invoice_number),
        KIND_PAYMENT,
    )
    .await;

    let artists: BTreeSet<Uuid> = lines.iter().map(|l| l.artist_id).collect();
    for artist_id in artists {
        let sold: Vec<&str> = lines
            .iter()
            .filter(|l| l.artist_id == artist_id)
            .map(|l| l.product_name.as_str())
            .collect();
        notify_quietly(
            state,
            artist_id,
            "Artwork sold",
            &format!("Sold in order {}: {}", order.invoice_number, sold.join(", ")),
            KIND_SALE,
        )
        .await;
    }
}

async fn issue_certificate(
    state: &AppState,
    order_id: Uuid,
    detail_id: Uuid,
    data: &CertificateData,
) -> AppResult<()> {
    let font = state.watermarker.as_ref().map(|w| w.font_data());
    let pdf = render_certificate(data, font)?;
    let key = certificate_key(order_id, detail_id);
    state.storage.put(&key, pdf, "application/pdf").await?;

    sqlx::query("UPDATE order_details SET certificate_key = $2 WHERE id = $1")
        .bind(detail_id)
        .bind(&key)
        .execute(&state.pool)
        .await?;
    tracing::debug!(detail_id = %detail_id, key = %key, "certificate stored");
    Ok(())
}

fn payment_from_entity(model: PaymentModel) -> Payment {
    Payment {
        id: model.id,
        order_id: model.order_id,
        provider: model.provider,
        provider_ref: model.provider_ref,
        amount: model.amount,
        status: model.status,
        checkout_url: model.checkout_url,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
