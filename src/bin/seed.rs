use art_marketplace_api::{
    config::AppConfig,
    db::{create_orm_conn, pool_from_orm, run_migrations},
    middleware::auth::{ROLE_ADMIN, ROLE_ARTIST, ROLE_CUSTOMER},
    services::auth_service::hash_password,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;
    let pool = pool_from_orm(&orm);

    let admin_id = ensure_user(&pool, "admin@example.com", "admin12345", "Site Admin", ROLE_ADMIN).await?;
    let artist_id =
        ensure_user(&pool, "artist@example.com", "artist12345", "Lan Nguyen", ROLE_ARTIST).await?;
    let customer_id = ensure_user(
        &pool,
        "customer@example.com",
        "customer12345",
        "Minh Tran",
        ROLE_CUSTOMER,
    )
    .await?;

    ensure_artist_profile(&pool, artist_id, "Lan Nguyen", "Lacquer and silk painter from Hue.").await?;
    let painting = ensure_category(&pool, "Painting", "Oil, acrylic, lacquer and silk").await?;
    let print = ensure_category(&pool, "Print", "Woodblock prints and etchings").await?;
    seed_artworks(&pool, artist_id, painting, print).await?;

    println!(
        "Seed completed. Admin ID: {admin_id}, Artist ID: {artist_id}, Customer ID: {customer_id}"
    );
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    full_name: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, full_name, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(full_name)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn ensure_artist_profile(
    pool: &sqlx::PgPool,
    user_id: Uuid,
    display_name: &str,
    bio: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO artist_profiles (id, user_id, display_name, bio)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(display_name)
    .bind(bio)
    .execute(pool)
    .await?;
    Ok(())
}

async fn ensure_category(pool: &sqlx::PgPool, name: &str, description: &str) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO categories (id, name, description)
        VALUES ($1, $2, $3)
        ON CONFLICT (name) DO UPDATE SET description = EXCLUDED.description
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(description)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn seed_artworks(
    pool: &sqlx::PgPool,
    artist_id: Uuid,
    painting: Uuid,
    print: Uuid,
) -> anyhow::Result<()> {
    let artworks = vec![
        ("Morning on the Perfume River", "Lacquer on wood, 60x90 cm", 12_500_000_i64, 1, painting),
        ("Lotus Pond at Dusk", "Silk painting, 50x70 cm", 8_200_000, 1, painting),
        ("Old Quarter Rooftops", "Woodblock print, edition of 20", 1_800_000, 12, print),
        ("Fishing Boats, Hoi An", "Etching on cotton paper", 2_400_000, 6, print),
    ];

    for (name, desc, price, stock, category_id) in artworks {
        sqlx::query(
            r#"
            INSERT INTO products (id, artist_id, category_id, name, description, price, stock)
            SELECT $1, $2, $3, $4, $5, $6, $7
            WHERE NOT EXISTS (SELECT 1 FROM products WHERE artist_id = $2 AND name = $4)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(artist_id)
        .bind(category_id)
        .bind(name)
        .bind(desc)
        .bind(price)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    println!("Seeded artworks");
    Ok(())
}
