use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    config::{AdminConfig, JwtConfig},
    database::Database,
    models::User,
};

/// Полезная нагрузка access-токена.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub is_staff: bool,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

pub fn issue_token(user: &User, jwt: &JwtConfig) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        is_staff: user.is_staff,
        iat: now.timestamp(),
        exp: (now + Duration::hours(jwt.expires_in_hours)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt.secret.as_bytes()),
    )
}

pub fn decode_token(token: &str, jwt: &JwtConfig) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

// bcrypt нагружает CPU, поэтому выполняется в blocking-пуле
pub async fn hash_password(password: String, cost: u32) -> anyhow::Result<String> {
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
    Ok(hash)
}

pub async fn verify_password(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .unwrap_or(false)
}

/// Создаёт администратора из конфигурации, если пользователя с таким email ещё нет.
pub async fn ensure_admin(db: &Database, admin: &AdminConfig, bcrypt_cost: u32) -> anyhow::Result<()> {
    let email = admin.email.trim().to_lowercase();
    if User::find_by_email(&email, &db.pool).await?.is_some() {
        return Ok(());
    }

    let hash = hash_password(admin.password.clone(), bcrypt_cost).await?;
    let user = User::create(&email, &hash, true, &db.pool).await?;
    info!("Created admin user {} (id={})", user.email, user.id);
    Ok(())
}
