use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use super::ApiJson;
use crate::{
    error::{AppError, AppResult},
    middleware::AuthUser,
    models::User,
    services::auth,
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/token", post(obtain_token))
        .route("/me", get(me))
}

#[derive(Debug, Serialize)]
struct UserResponse {
    id: i64,
    email: String,
    is_staff: bool,
    date_joined: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        UserResponse {
            id: u.id,
            email: u.email,
            is_staff: u.is_staff,
            date_joined: u.date_joined,
        }
    }
}

// POST /api/user/register
#[derive(Debug, Deserialize, Validate)]
struct RegisterRequest {
    #[validate(email(message = "Enter a valid email address."))]
    email: String,
    #[validate(length(min = 5, message = "Ensure this field has at least 5 characters."))]
    password: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;
    let email = req.email.trim().to_lowercase();

    if User::find_by_email(&email, &state.db.pool).await?.is_some() {
        return Err(AppError::field("email", "user with this email already exists."));
    }

    let hash = auth::hash_password(req.password, state.config.jwt.bcrypt_cost).await?;
    let user = User::create(&email, &hash, false, &state.db.pool)
        .await
        .map_err(|e| {
            // Параллельная регистрация с тем же email
            let duplicate = matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation());
            if duplicate {
                AppError::field("email", "user with this email already exists.")
            } else {
                e.into()
            }
        })?;

    tracing::info!("registered user {} (id={})", user.email, user.id);
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

// POST /api/user/token
#[derive(Debug, Deserialize)]
struct TokenRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    access: String,
    token_type: &'static str,
    expires_in: i64,
}

async fn obtain_token(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<TokenRequest>,
) -> AppResult<impl IntoResponse> {
    let user = User::find_by_email(req.email.trim(), &state.db.pool)
        .await?
        .filter(|u| u.is_active)
        .ok_or(AppError::Unauthorized)?;

    if !auth::verify_password(req.password, user.password_hash.clone()).await {
        return Err(AppError::Unauthorized);
    }

    let access = auth::issue_token(&user, &state.config.jwt)
        .map_err(|e| AppError::Internal(e.into()))?;
    if let Err(e) = User::touch_last_login(user.id, &state.db.pool).await {
        tracing::warn!("failed to update last_login for user {}: {}", user.id, e);
    }

    Ok(Json(TokenResponse {
        access,
        token_type: "Bearer",
        expires_in: state.config.jwt.expires_in_hours * 3600,
    }))
}

// GET /api/user/me
async fn me(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let user = User::find_by_id(user.user_id, &state.db.pool)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(Json(UserResponse::from(user)))
}
