#![allow(dead_code)]

use chrono::Utc;
use planetarium_api::{
    config::{AppConfig, Config, DatabaseConfig, FeatureFlags, JwtConfig, MediaConfig},
    models::User,
    services::auth,
};

pub const JWT_SECRET: &str = "test-secret";

pub fn test_config(database_url: &str) -> Config {
    Config {
        app: AppConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            rust_log: "planetarium_api=debug".to_string(),
            log_json: false,
        },
        database: DatabaseConfig {
            url: database_url.to_string(),
            pool_size: 5,
        },
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
            expires_in_hours: 1,
            bcrypt_cost: 4,
        },
        media: MediaConfig {
            root: std::env::temp_dir().join(format!("planetarium-test-media-{}", uuid::Uuid::new_v4())),
            base_url: "/media".to_string(),
            max_upload_bytes: 1024 * 1024,
        },
        admin: None,
        features: FeatureFlags {
            allow_anonymous_read: false,
        },
    }
}

/// Bearer-заголовок для пользователя, которого не обязательно иметь в базе.
pub fn bearer_for(user_id: i64, is_staff: bool) -> String {
    let user = User {
        id: user_id,
        email: format!("user{user_id}@planetarium.test"),
        password_hash: String::new(),
        is_staff,
        is_active: true,
        date_joined: Utc::now(),
        last_login: None,
    };
    let config = test_config("postgres://unused");
    let token = auth::issue_token(&user, &config.jwt).expect("token");
    format!("Bearer {token}")
}
