use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use password_hash::rand_core::OsRng;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::record_audit,
    dto::auth::{LoginRequest, LoginResponse, RegisterRequest},
    error::{AppError, AppResult, conflict_on_unique_sqlx},
    middleware::auth::{AuthUser, ROLE_CUSTOMER, issue_token},
    models::User,
    response::ApiResponse,
    state::AppState,
};

#[derive(FromRow)]
struct UserCredentials {
    #[sqlx(flatten)]
    user: User,
    password_hash: String,
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let RegisterRequest {
        email,
        password,
        full_name,
    } = payload;
    let email = email.trim().to_lowercase();
    let password_hash = hash_password(&password)?;

    let user: User = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, full_name, role)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, email, full_name, phone, role, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&email)
    .bind(password_hash)
    .bind(full_name.trim())
    .bind(ROLE_CUSTOMER)
    .fetch_one(&state.pool)
    .await
    .map_err(conflict_on_unique_sqlx("Email is already taken"))?;

    record_audit(
        &state.pool,
        Some(user.id),
        "user_register",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await;

    if let Some(mailer) = &state.mailer {
        if let Err(err) = mailer.send_welcome(&user.email, &user.full_name).await {
            tracing::warn!(error = %err, user_id = %user.id, "welcome email failed");
        }
    }

    Ok(ApiResponse::ok("User created", user))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { email, password } = payload;
    let credentials: Option<UserCredentials> = sqlx::query_as(
        r#"
        SELECT id, email, full_name, phone, role, created_at, password_hash
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(email.trim().to_lowercase())
    .fetch_optional(&state.pool)
    .await?;

    let Some(UserCredentials {
        user,
        password_hash,
    }) = credentials
    else {
        return Err(AppError::BadRequest("Invalid email or password".into()));
    };

    if !verify_password(&password, &password_hash)? {
        return Err(AppError::BadRequest("Invalid email or password".into()));
    }

    let token = issue_token(&state.config.jwt_secret, user.id, &user.role)?;

    record_audit(
        &state.pool,
        Some(user.id),
        "user_login",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await;

    Ok(ApiResponse::ok(
        "Logged in",
        LoginResponse {
            token: format!("Bearer {}", token),
            user,
        },
    ))
}

pub async fn me(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let found: Option<User> = sqlx::query_as(
        "SELECT id, email, full_name, phone, role, created_at FROM users WHERE id = $1",
    )
    .bind(user.user_id)
    .fetch_optional(&state.pool)
    .await?;

    let found = found.ok_or(AppError::NotFound)?;
    Ok(ApiResponse::ok("OK", found))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
    }
}
