#![allow(dead_code)]

use std::{collections::HashMap, io::Cursor, path::Path, sync::Arc};

use art_marketplace_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    dto::{
        cart::AddToCartRequest,
        orders::{CheckoutRequest, OrderWithDetails},
    },
    entity::{products::ActiveModel as ProductActive, users::ActiveModel as UserActive},
    integrations::{
        payos::{WebhookPayload, sign_data},
        storage::LocalStorage,
    },
    middleware::auth::AuthUser,
    services::{cart_service, order_service, product_service},
    state::AppState,
};
use image::{ImageFormat, Rgba, RgbaImage};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, Statement};
use serde_json::json;
use uuid::Uuid;

pub const CHECKSUM_KEY: &str = "test-checksum-key";
pub const JWT_SECRET: &str = "test-secret";

/// Allow skipping when no DB is configured in the environment.
pub fn database_url() -> Option<String> {
    match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
        Ok(url) => Some(url),
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            None
        }
    }
}

pub async fn checkout(state: &AppState, user: &AuthUser) -> anyhow::Result<OrderWithDetails> {
    let response = order_service::checkout(
        state,
        user,
        CheckoutRequest {
            shipping_address: "12 Tran Hung Dao, Hue".into(),
        },
    )
    .await?;
    Ok(response.data.expect("checkout data"))
}

pub async fn setup_state(database_url: &str, storage_dir: &Path) -> anyhow::Result<AppState> {
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE audit_logs, notifications, chat_messages, comment_replies, comments, \
         payments, order_details, orders, cart_items, favorites, financial_reports, \
         exhibitions, products, categories, artist_profiles, users CASCADE",
    ))
    .await?;

    let env: HashMap<&str, String> = HashMap::from([
        ("DATABASE_URL", database_url.to_string()),
        ("JWT_SECRET", JWT_SECRET.to_string()),
        ("COMMISSION_PERCENT", "10".to_string()),
        ("LOCAL_STORAGE_DIR", storage_dir.display().to_string()),
        ("PAYOS_CLIENT_ID", "client".to_string()),
        ("PAYOS_API_KEY", "api-key".to_string()),
        ("PAYOS_CHECKSUM_KEY", CHECKSUM_KEY.to_string()),
        ("PAYOS_BASE_URL", "http://127.0.0.1:9".to_string()),
    ]);
    let config = AppConfig::from_lookup(|key: &str| env.get(key).cloned())?;

    AppState::with_parts(config, orm, Arc::new(LocalStorage::new(storage_dir))).await
}

pub async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<AuthUser> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        full_name: Set(email.split('@').next().unwrap_or(email).to_string()),
        phone: Set(None),
        role: Set(role.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        role: user.role,
    })
}

pub async fn create_product(
    state: &AppState,
    artist_id: Uuid,
    name: &str,
    price: i64,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        artist_id: Set(artist_id),
        category_id: Set(None),
        name: Set(name.into()),
        description: Set(Some("Original work".into())),
        price: Set(price),
        stock: Set(stock),
        image_key: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(product.id)
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    quantity: i32,
) -> anyhow::Result<()> {
    cart_service::add_to_cart(
        state,
        user,
        AddToCartRequest {
            product_id,
            quantity,
        },
    )
    .await?;
    Ok(())
}

pub async fn stock_of(state: &AppState, product_id: Uuid) -> anyhow::Result<i32> {
    let product = product_service::get_product(state, product_id)
        .await?
        .data
        .expect("product");
    Ok(product.stock)
}

pub fn webhook(order_code: i64, amount: i64, code: &str) -> WebhookPayload {
    let data = json!({
        "orderCode": order_code,
        "amount": amount,
        "description": "artwork",
        "accountNumber": "12345678",
        "reference": "FT26001",
        "transactionDateTime": "2026-01-01 10:00:00",
        "currency": "VND",
        "paymentLinkId": "link-1",
        "code": code,
        "desc": "success",
        "counterAccountName": null,
    });
    let signature = sign_data(CHECKSUM_KEY, &data).expect("sign webhook");
    WebhookPayload {
        code: code.into(),
        desc: "success".into(),
        success: Some(code == "00"),
        data,
        signature,
    }
}

pub fn png_bytes() -> Vec<u8> {
    let image = RgbaImage::from_pixel(4, 4, Rgba([200, 30, 30, 255]));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}
