use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, full_name, location, email, password_hash, oauth_provider, oauth_subject, created_at";

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub location: String,
    pub email: Option<String>,
    pub password_hash: Option<String>, // None for OAuth-only accounts
    pub oauth_provider: Option<String>,
    pub oauth_subject: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Public view of a user, safe to return from the API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub location: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            location: user.location,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub full_name: String,
    pub location: String,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub oauth_provider: Option<String>,
    pub oauth_subject: Option<String>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        self.clone().into()
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateUser,
        user_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"INSERT INTO users (id, username, full_name, location, email, password_hash, oauth_provider, oauth_subject, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(user_id)
        .bind(&data.username)
        .bind(&data.full_name)
        .bind(&data.location)
        .bind(&data.email)
        .bind(&data.password_hash)
        .bind(&data.oauth_provider)
        .bind(&data.oauth_subject)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_username(
        pool: &SqlitePool,
        username: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_oauth_identity(
        pool: &SqlitePool,
        provider: &str,
        subject: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE oauth_provider = $1 AND oauth_subject = $2"
        ))
        .bind(provider)
        .bind(subject)
        .fetch_optional(pool)
        .await
    }

    pub async fn username_exists(pool: &SqlitePool, username: &str) -> Result<bool, sqlx::Error> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE username = $1")
                .bind(username)
                .fetch_one(pool)
                .await?;
        Ok(count > 0)
    }

    /// All users in creation order, used by the legacy exporter
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, rowid ASC"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn update_email(
        pool: &SqlitePool,
        id: Uuid,
        email: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET email = $2 WHERE id = $1")
            .bind(id)
            .bind(email)
            .execute(pool)
            .await?;
        Ok(())
    }
}
