mod common;

use art_marketplace_api::{
    dto::{
        admin::{InventoryAdjustRequest, UpdateOrderStatusRequest},
        artists::BecomeArtistRequest,
        auth::{LoginRequest, RegisterRequest},
        categories::CreateCategoryRequest,
        chat::SendMessageRequest,
        products::CreateProductRequest,
    },
    error::AppError,
    integrations::crawler::CrawledExhibition,
    middleware::auth::{
        AuthUser, ROLE_ADMIN, ROLE_ARTIST, ROLE_CUSTOMER, decode_token, ensure_artist,
    },
    routes::params::Pagination,
    services::{
        admin_service, artist_service, auth_service, category_service, chat_service,
        exhibition_service, order_service, payment_service, product_service,
    },
};
use common::{
    JWT_SECRET, add_to_cart, checkout, create_product, create_user, database_url, png_bytes,
    setup_state, stock_of, webhook,
};
use uuid::Uuid;

// Rules around accounts, chat, failed payments, images, inventory and exhibitions.
#[tokio::test]
async fn marketplace_rules() -> anyhow::Result<()> {
    let Some(database_url) = database_url() else {
        return Ok(());
    };

    let storage_dir = tempfile::tempdir()?;
    let state = setup_state(&database_url, storage_dir.path()).await?;

    // Registration and login.
    let registered = auth_service::register_user(&state, register("Mai@Example.com")).await?;
    assert_eq!(registered.data.expect("user").email, "mai@example.com");
    let duplicate = auth_service::register_user(&state, register("mai@example.com")).await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    let logged_in = auth_service::login_user(&state, login("mai@example.com", "correct horse"))
        .await?
        .data
        .expect("login");
    assert!(logged_in.token.starts_with("Bearer "));

    let wrong_password =
        auth_service::login_user(&state, login("mai@example.com", "wrong horse")).await;
    let unknown_email =
        auth_service::login_user(&state, login("nobody@example.com", "correct horse")).await;
    match (wrong_password, unknown_email) {
        (Err(AppError::BadRequest(a)), Err(AppError::BadRequest(b))) => assert_eq!(a, b),
        other => panic!("expected matching bad requests, got {other:?}"),
    }

    // Becoming an artist hands back a token that can sell straight away.
    let mai = logged_in.user;
    let mai_customer = AuthUser {
        user_id: mai.id,
        role: ROLE_CUSTOMER.into(),
    };
    let upgraded = artist_service::become_artist(
        &state,
        &mai_customer,
        BecomeArtistRequest {
            display_name: "Mai Lacquer".into(),
            bio: None,
            avatar_url: None,
        },
    )
    .await?
    .data
    .expect("artist profile");
    assert_eq!(upgraded.profile.user_id, mai.id);
    let token = upgraded
        .token
        .strip_prefix("Bearer ")
        .expect("bearer token");
    let mai_artist = decode_token(JWT_SECRET, token)?;
    assert_eq!(mai_artist.role, ROLE_ARTIST);
    ensure_artist(&mai_artist)?;
    product_service::create_product(
        &state,
        &mai_artist,
        CreateProductRequest {
            name: "Red Lacquer".into(),
            description: None,
            price: 900_000,
            stock: 1,
            category_id: None,
        },
    )
    .await?;

    // Categories reject duplicate names.
    let admin = create_user(&state, ROLE_ADMIN, "admin@example.com").await?;
    category_service::create_category(&state, &admin, category("Lacquer")).await?;
    let same_name = category_service::create_category(&state, &admin, category("Lacquer")).await;
    assert!(matches!(same_name, Err(AppError::Conflict(_))));

    // Chat.
    let buyer = create_user(&state, ROLE_CUSTOMER, "buyer@example.com").await?;
    let to_self = chat_service::send_message(&state, &buyer, message(buyer.user_id, "hi")).await;
    assert!(matches!(to_self, Err(AppError::BadRequest(_))));
    let to_nobody =
        chat_service::send_message(&state, &buyer, message(Uuid::new_v4(), "hi")).await;
    assert!(matches!(to_nobody, Err(AppError::NotFound)));

    chat_service::send_message(&state, &buyer, message(mai.id, "Is it framed?")).await?;
    chat_service::send_message(&state, &buyer, message(mai.id, "And shipped to Hue?")).await?;

    let inbox = chat_service::list_conversations(&state, &mai_artist)
        .await?
        .data
        .expect("conversations");
    assert_eq!(inbox.items.len(), 1);
    assert_eq!(inbox.items[0].partner_id, buyer.user_id);
    assert_eq!(inbox.items[0].unread_count, 2);
    assert_eq!(inbox.items[0].last_message, "And shipped to Hue?");

    let outbox = chat_service::list_conversations(&state, &buyer)
        .await?
        .data
        .expect("conversations");
    assert_eq!(outbox.items[0].unread_count, 0);

    let marked = chat_service::mark_conversation_read(&state, &mai_artist, buyer.user_id)
        .await?
        .data
        .expect("marked");
    assert_eq!(marked.updated, 2);
    let inbox = chat_service::list_conversations(&state, &mai_artist)
        .await?
        .data
        .expect("conversations");
    assert_eq!(inbox.items[0].unread_count, 0);

    let thread = chat_service::conversation(&state, &buyer, mai.id, Pagination::default())
        .await?
        .data
        .expect("thread");
    assert_eq!(thread.items.len(), 2);
    assert!(thread.items.iter().all(|m| m.read_at.is_some()));

    // Failed or short payments leave the order open.
    let artist = create_user(&state, ROLE_ARTIST, "artist@example.com").await?;
    let vase = create_product(&state, artist.user_id, "Blue Vase", 400_000, 4).await?;
    add_to_cart(&state, &buyer, vase, 2).await?;
    let order = checkout(&state, &buyer).await?.order;

    let declined = payment_service::handle_webhook(
        &state,
        webhook(order.order_code, order.total_amount, "01"),
    )
    .await?;
    assert_eq!(declined.message, "Payment failed");
    let short = payment_service::handle_webhook(
        &state,
        webhook(order.order_code, order.total_amount - 1, "00"),
    )
    .await?;
    assert_eq!(short.message, "Payment failed");

    let open = order_service::get_order(&state, &buyer, order.id)
        .await?
        .data
        .expect("order");
    assert_eq!(open.order.status, "pending");
    assert_eq!(open.order.payment_status, "unpaid");
    assert!(open.order.paid_at.is_none());
    let payments = payment_service::list_payments(&state, &buyer, order.id)
        .await?
        .data
        .expect("payments");
    assert_eq!(payments.items.len(), 2);
    assert!(payments.items.iter().all(|p| p.status == "failed"));

    // Admins cannot ship an unpaid order.
    let ship_unpaid = admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "shipped".into(),
        },
    )
    .await;
    assert!(matches!(ship_unpaid, Err(AppError::BadRequest(_))));

    // Watermarked images: 404 without an upload, 503 without a font.
    let missing = product_service::watermarked_image(&state, vase).await;
    assert!(matches!(missing, Err(AppError::NotFound)));
    product_service::upload_image(&state, &artist, vase, png_bytes()).await?;
    let unconfigured = product_service::watermarked_image(&state, vase).await;
    assert!(matches!(unconfigured, Err(AppError::ServiceUnavailable(_))));

    // Inventory never goes below zero.
    assert_eq!(stock_of(&state, vase).await?, 2);
    let overdrawn =
        admin_service::adjust_inventory(&state, &admin, vase, InventoryAdjustRequest { delta: -3 })
            .await;
    assert!(matches!(overdrawn, Err(AppError::BadRequest(_))));
    assert_eq!(stock_of(&state, vase).await?, 2);
    let restocked =
        admin_service::adjust_inventory(&state, &admin, vase, InventoryAdjustRequest { delta: 5 })
            .await?
            .data
            .expect("product");
    assert_eq!(restocked.stock, 7);

    // Exhibitions are keyed by their source URL.
    let mut show = CrawledExhibition {
        title: "Silk & Lacquer".into(),
        venue: Some("Hall A".into()),
        schedule: Some("1 Mar - 30 Apr".into()),
        source_url: "https://gallery.example/exhibitions/silk".into(),
        image_url: None,
    };
    exhibition_service::store_exhibitions(&state, std::slice::from_ref(&show)).await?;
    show.title = "Silk & Lacquer (extended)".into();
    show.schedule = Some("1 Mar - 31 May".into());
    exhibition_service::store_exhibitions(&state, std::slice::from_ref(&show)).await?;

    let listed = exhibition_service::list_exhibitions(&state, Pagination::default()).await?;
    let total = listed.meta.as_ref().and_then(|m| m.total);
    let items = listed.data.expect("exhibitions").items;
    assert_eq!(total, Some(1));
    assert_eq!(items[0].title, "Silk & Lacquer (extended)");
    assert_eq!(items[0].schedule.as_deref(), Some("1 Mar - 31 May"));

    let crawl_as_buyer = exhibition_service::crawl_exhibitions(&state, &buyer).await;
    assert!(matches!(crawl_as_buyer, Err(AppError::Forbidden)));
    let crawl_unconfigured = exhibition_service::crawl_exhibitions(&state, &admin).await;
    assert!(matches!(
        crawl_unconfigured,
        Err(AppError::ServiceUnavailable(_))
    ));

    Ok(())
}

fn register(email: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.into(),
        password: "correct horse".into(),
        full_name: "Mai Tran".into(),
    }
}

fn login(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email: email.into(),
        password: password.into(),
    }
}

fn category(name: &str) -> CreateCategoryRequest {
    CreateCategoryRequest {
        name: name.into(),
        description: None,
    }
}

fn message(receiver_id: Uuid, content: &str) -> SendMessageRequest {
    SendMessageRequest {
        receiver_id,
        content: content.into(),
    }
}
