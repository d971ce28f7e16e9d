//! Password accounts and signed session tokens.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use db::models::user::{CreateUser, User};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};
use ts_rs::TS;
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 8;
const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 32;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Validation(String),
    #[error("username already taken")]
    UsernameTaken,
    #[error("Invalid username or password.")]
    InvalidCredentials,
    #[error("invalid or expired session")]
    InvalidSession,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

/// Registration form
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct RegisterUser {
    pub username: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub location: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

#[derive(Clone)]
pub struct AuthService {
    pool: SqlitePool,
    keys: Arc<SessionKeys>,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(pool: SqlitePool, secret: &[u8], session_ttl: Duration) -> Self {
        Self {
            pool,
            keys: Arc::new(SessionKeys {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
            }),
            session_ttl,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    pub async fn register(&self, data: &RegisterUser) -> Result<User, AuthError> {
        let username = data.username.trim();
        validate_username(username)?;
        if data.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let full_name = data.full_name.trim();
        if full_name.is_empty() {
            return Err(AuthError::Validation("full name is required".to_string()));
        }
        let email = normalize_email(data.email.as_deref())?;

        if User::username_exists(&self.pool, username).await? {
            return Err(AuthError::UsernameTaken);
        }

        let create = CreateUser {
            username: username.to_string(),
            full_name: full_name.to_string(),
            location: data.location.trim().to_string(),
            email,
            password_hash: Some(hash_password(&data.password)?),
            oauth_provider: None,
            oauth_subject: None,
        };

        // the existence check above can race with a concurrent registration
        let user = User::create(&self.pool, &create, Uuid::new_v4())
            .await
            .map_err(|e| match e.as_database_error() {
                Some(db) if db.is_unique_violation() => AuthError::UsernameTaken,
                _ => AuthError::Database(e),
            })?;

        info!(user_id = %user.id, username = %user.username, "Registered user");
        Ok(user)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let user = User::find_by_username(&self.pool, username.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let Some(hash) = user.password_hash.as_deref() else {
            debug!(username = %user.username, "Password login attempted on OAuth-only account");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, hash) {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }

    pub fn issue_session(&self, user: &User) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user.id,
            username: user.username.clone(),
            iat: now.timestamp(),
            exp: (now + self.session_ttl).timestamp(),
        };
        Ok(encode(&Header::default(), &claims, &self.keys.encoding)?)
    }

    pub fn verify_session(&self, token: &str) -> Result<SessionClaims, AuthError> {
        decode::<SessionClaims>(token, &self.keys.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "Rejected session token");
                AuthError::InvalidSession
            })
    }

    /// Resolve a session token to a live user; tokens for deleted users are rejected
    pub async fn current_user(&self, token: &str) -> Result<User, AuthError> {
        let claims = self.verify_session(token)?;
        User::find_by_id(&self.pool, claims.sub)
            .await?
            .ok_or(AuthError::InvalidSession)
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| AuthError::Hashing(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub fn validate_username(username: &str) -> Result<(), AuthError> {
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(AuthError::Validation(format!(
            "username must be {USERNAME_MIN}-{USERNAME_MAX} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(AuthError::Validation(
            "username may only contain letters, digits, '_' and '-'".to_string(),
        ));
    }
    Ok(())
}

fn normalize_email(email: Option<&str>) -> Result<Option<String>, AuthError> {
    match email.map(str::trim).filter(|e| !e.is_empty()) {
        None => Ok(None),
        Some(email) => match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
                Ok(Some(email.to_string()))
            }
            _ => Err(AuthError::Validation("invalid email address".to_string())),
        },
    }
}
