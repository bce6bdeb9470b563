use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;

use crate::{error::AppError, models::User, services::auth, AppState};

/// Аутентифицированный пользователь.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
    pub is_staff: bool,
}

/// Пользователь со статусом администратора (staff).
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

/// Читатель каталога: аутентифицированный пользователь или, если разрешено
/// флагом `ALLOW_ANONYMOUS_READ`, аноним.
#[derive(Debug, Clone)]
pub struct CatalogReader(pub Option<AuthUser>);

// Bearer JWT или Basic email:password
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            return from_bearer(token.trim(), state);
        }
        if let Some(encoded) = auth_header.strip_prefix("Basic ") {
            return from_basic(encoded.trim(), state).await;
        }
        Err(AppError::Unauthorized)
    }
}

// Отсутствие заголовка - аноним; неверные учётные данные - всё равно 401
impl OptionalFromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Option<Self>, Self::Rejection> {
        if !parts.headers.contains_key(header::AUTHORIZATION) {
            return Ok(None);
        }
        <AuthUser as FromRequestParts<Arc<AppState>>>::from_request_parts(parts, state)
            .await
            .map(Some)
    }
}

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = <AuthUser as FromRequestParts<Arc<AppState>>>::from_request_parts(parts, state).await?;
        if !user.is_staff {
            tracing::debug!("user {} denied admin access", user.user_id);
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}

impl FromRequestParts<Arc<AppState>> for CatalogReader {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = <AuthUser as OptionalFromRequestParts<Arc<AppState>>>::from_request_parts(parts, state).await?;
        if user.is_none() && !state.config.features.allow_anonymous_read {
            return Err(AppError::Unauthorized);
        }
        Ok(CatalogReader(user))
    }
}

fn from_bearer(token: &str, state: &AppState) -> Result<AuthUser, AppError> {
    let claims = auth::decode_token(token, &state.config.jwt).map_err(|e| {
        tracing::debug!("rejected bearer token: {}", e);
        AppError::Unauthorized
    })?;
    let user_id = claims.user_id().ok_or(AppError::Unauthorized)?;

    Ok(AuthUser {
        user_id,
        email: claims.email,
        is_staff: claims.is_staff,
    })
}

async fn from_basic(encoded: &str, state: &AppState) -> Result<AuthUser, AppError> {
    let (email, password) = parse_basic_credentials(encoded).ok_or(AppError::Unauthorized)?;

    let user = User::find_by_email(&email, &state.db.pool)
        .await?
        .filter(|u| u.is_active)
        .ok_or(AppError::Unauthorized)?;

    if !auth::verify_password(password, user.password_hash.clone()).await {
        return Err(AppError::Unauthorized);
    }

    // last_login не критичен для входа
    if let Err(e) = User::touch_last_login(user.id, &state.db.pool).await {
        tracing::warn!("failed to update last_login for user {}: {}", user.id, e);
    }

    Ok(AuthUser {
        user_id: user.id,
        email: user.email,
        is_staff: user.is_staff,
    })
}

/// Декодирует `base64(email:password)`.
fn parse_basic_credentials(encoded: &str) -> Option<(String, String)> {
    let decoded = general_purpose::STANDARD.decode(encoded).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (email, password) = credentials.split_once(':')?;
    if email.is_empty() {
        return None;
    }
    Some((email.to_string(), password.to_string()))
}
