mod common;

use art_marketplace_api::{
    dto::{
        admin::UpdateOrderStatusRequest, comments::CreateCommentRequest,
        favorites::AddFavoriteRequest, orders::CheckoutRequest, reports::GenerateReportRequest,
    },
    error::AppError,
    middleware::auth::{ROLE_ADMIN, ROLE_ARTIST, ROLE_CUSTOMER},
    routes::params::{LowStockQuery, NotificationQuery, Pagination},
    services::{
        admin_service, cart_service, comment_service, favorite_service, notification_service,
        order_service, payment_service, product_service, report_service,
    },
};
use chrono::Utc;
use common::{
    add_to_cart, checkout, create_product, create_user, database_url, png_bytes, setup_state,
    stock_of, webhook,
};

// Integration flow: customer buys an artwork, PayOS confirms it, certificates are issued;
// a second order is cancelled; the artist reports on the sale; an admin cancels the sale.

#[tokio::test]
async fn checkout_payment_and_fulfilment_flow() -> anyhow::Result<()> {
    let Some(database_url) = database_url() else {
        return Ok(());
    };

    let storage_dir = tempfile::tempdir()?;
    let state = setup_state(&database_url, storage_dir.path()).await?;

    let customer = create_user(&state, ROLE_CUSTOMER, "customer@example.com").await?;
    let artist = create_user(&state, ROLE_ARTIST, "artist@example.com").await?;
    let admin = create_user(&state, ROLE_ADMIN, "admin@example.com").await?;

    let painting = create_product(&state, artist.user_id, "Lotus Pond", 1_500_000, 3).await?;
    let print = create_product(&state, artist.user_id, "Old Quarter", 250_000, 10).await?;

    product_service::upload_image(&state, &artist, painting, png_bytes()).await?;

    // Favourites reject duplicates.
    favorite_service::add_favorite(&state, &customer, AddFavoriteRequest { product_id: painting })
        .await?;
    let duplicate = favorite_service::add_favorite(
        &state,
        &customer,
        AddFavoriteRequest { product_id: painting },
    )
    .await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    // Comment from the customer reaches the artist.
    comment_service::create_comment(
        &state,
        &customer,
        painting,
        CreateCommentRequest {
            content: "Is the frame included?".into(),
        },
    )
    .await?;

    add_to_cart(&state, &customer, painting, 1).await?;
    add_to_cart(&state, &customer, print, 3).await?;

    let checkout = checkout(&state, &customer).await?;
    let order = checkout.order;
    assert_eq!(order.total_amount, 1_500_000 + 3 * 250_000);
    assert_eq!(order.status, "pending");
    assert_eq!(order.payment_status, "unpaid");
    assert_eq!(checkout.details.len(), 2);
    assert!(order.invoice_number.starts_with("INV-"));

    assert_eq!(stock_of(&state, painting).await?, 2);
    assert_eq!(stock_of(&state, print).await?, 7);
    let cart = cart_service::list_cart(&state, &customer, Pagination::default())
        .await?
        .data
        .expect("cart data");
    assert!(cart.items.is_empty());

    let empty = order_service::checkout(
        &state,
        &customer,
        CheckoutRequest {
            shipping_address: "12 Tran Hung Dao, Hue".into(),
        },
    )
    .await;
    assert!(matches!(empty, Err(AppError::BadRequest(_))));

    // Downloads stay locked until payment.
    let painting_line = checkout
        .details
        .iter()
        .find(|d| d.product_id == painting)
        .expect("painting line");
    let locked = order_service::certificate(&state, &customer, order.id, painting_line.id).await;
    assert!(matches!(locked, Err(AppError::Forbidden)));

    // A forged notification is rejected.
    let mut forged = webhook(order.order_code, order.total_amount, "00");
    forged.signature = "00".repeat(32);
    let rejected = payment_service::handle_webhook(&state, forged).await;
    assert!(matches!(rejected, Err(AppError::Unauthorized(_))));

    let ack = payment_service::handle_webhook(
        &state,
        webhook(order.order_code, order.total_amount, "00"),
    )
    .await?;
    assert_eq!(ack.message, "Payment recorded");

    let paid = order_service::get_order(&state, &customer, order.id)
        .await?
        .data
        .expect("order data");
    assert_eq!(paid.order.status, "paid");
    assert_eq!(paid.order.payment_status, "paid");
    assert!(paid.order.paid_at.is_some());
    assert!(paid.details.iter().all(|d| d.has_certificate));

    let pdf = order_service::certificate(&state, &customer, order.id, painting_line.id).await?;
    assert_eq!(pdf.content_type, "application/pdf");
    assert!(pdf.bytes.starts_with(b"%PDF"));

    let original =
        order_service::original_artwork(&state, &customer, order.id, painting_line.id).await?;
    assert_eq!(original.bytes, png_bytes());

    // Re-delivery is acknowledged without processing twice.
    let again = payment_service::handle_webhook(
        &state,
        webhook(order.order_code, order.total_amount, "00"),
    )
    .await?;
    assert_eq!(again.message, "Already processed");
    let payments = payment_service::list_payments(&state, &customer, order.id)
        .await?
        .data
        .expect("payments data");
    assert_eq!(payments.items.len(), 1);
    assert_eq!(payments.items[0].status, "paid");

    // Buyer and artist were notified.
    let artist_notes = notification_service::list_notifications(
        &state,
        &artist,
        NotificationQuery {
            unread_only: true,
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("notifications");
    assert!(artist_notes.items.iter().any(|n| n.kind == "sale"));
    assert!(artist_notes.items.iter().any(|n| n.kind == "comment"));
    let buyer_unread = notification_service::unread_count(&state, &customer)
        .await?
        .data
        .expect("unread");
    assert!(buyer_unread.unread >= 1);

    // Admin ships the order.
    let shipped = admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "shipped".into(),
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(shipped.status, "shipped");

    // A second order is cancelled and its stock comes back.
    add_to_cart(&state, &customer, print, 2).await?;
    let second = common::checkout(&state, &customer).await?.order;
    assert_eq!(stock_of(&state, print).await?, 5);

    let cancelled = order_service::cancel_order(&state, &customer, second.id)
        .await?
        .data
        .expect("order");
    assert_eq!(cancelled.status, "cancelled");
    assert_eq!(stock_of(&state, print).await?, 7);

    let cancel_again = order_service::cancel_order(&state, &customer, second.id).await;
    assert!(matches!(cancel_again, Err(AppError::BadRequest(_))));

    // A late payment for the cancelled order does not reopen it.
    let late = payment_service::handle_webhook(
        &state,
        webhook(second.order_code, second.total_amount, "00"),
    )
    .await?;
    assert_eq!(late.message, "Order closed");
    let still_cancelled = order_service::get_order(&state, &customer, second.id)
        .await?
        .data
        .expect("order data");
    assert_eq!(still_cancelled.order.status, "cancelled");
    assert_eq!(still_cancelled.order.payment_status, "unpaid");
    assert!(still_cancelled.details.iter().all(|d| !d.has_certificate));
    assert_eq!(stock_of(&state, print).await?, 7);
    let late_payments = payment_service::list_payments(&state, &customer, second.id)
        .await?
        .data
        .expect("payments data");
    assert!(late_payments.items.iter().all(|p| p.status != "paid"));

    // Low stock includes the painting (2 left).
    let low = admin_service::list_low_stock(
        &state,
        &admin,
        LowStockQuery {
            threshold: Some(2),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("low stock");
    assert!(low.items.iter().any(|p| p.id == painting));
    assert!(low.items.iter().all(|p| p.stock <= 2));

    // Financial report over today covers the paid order only.
    let today = Utc::now().date_naive();
    let report = report_service::generate_report(
        &state,
        &artist,
        GenerateReportRequest {
            artist_id: None,
            period_start: today,
            period_end: today,
        },
    )
    .await?
    .data
    .expect("report");
    assert_eq!(report.total_orders, 1);
    assert_eq!(report.items_sold, 4);
    assert_eq!(report.gross_revenue, 2_250_000);
    assert_eq!(report.commission, 225_000);
    assert_eq!(report.net_revenue, 2_025_000);

    let backwards = report_service::generate_report(
        &state,
        &artist,
        GenerateReportRequest {
            artist_id: None,
            period_start: today,
            period_end: today.pred_opt().expect("yesterday"),
        },
    )
    .await;
    assert!(matches!(backwards, Err(AppError::BadRequest(_))));

    let customer_report = report_service::generate_report(
        &state,
        &customer,
        GenerateReportRequest {
            artist_id: None,
            period_start: today,
            period_end: today,
        },
    )
    .await;
    assert!(matches!(customer_report, Err(AppError::Forbidden)));

    // Admin cancels the shipped order: stock returns and the payment is refunded.
    let refunded = admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "cancelled".into(),
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(refunded.status, "cancelled");
    assert_eq!(refunded.payment_status, "refunded");
    assert_eq!(stock_of(&state, painting).await?, 3);
    assert_eq!(stock_of(&state, print).await?, 10);

    let reopen = admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "paid".into(),
        },
    )
    .await;
    assert!(matches!(reopen, Err(AppError::BadRequest(_))));

    // Redelivering the original notification changes nothing.
    let redelivered = payment_service::handle_webhook(
        &state,
        webhook(order.order_code, order.total_amount, "00"),
    )
    .await?;
    assert_eq!(redelivered.message, "Already processed");
    let after = order_service::get_order(&state, &customer, order.id)
        .await?
        .data
        .expect("order data");
    assert_eq!(after.order.status, "cancelled");
    assert_eq!(after.order.payment_status, "refunded");
    assert_eq!(stock_of(&state, painting).await?, 3);
    assert_eq!(stock_of(&state, print).await?, 10);

    Ok(())
}
