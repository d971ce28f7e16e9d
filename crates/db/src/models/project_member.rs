//! Many-to-many link between projects and the users collaborating on them.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use super::user::{User, UserProfile};

#[derive(Debug, Clone, FromRow)]
pub struct ProjectMember {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub added_at: DateTime<Utc>,
}

impl ProjectMember {
    pub async fn add(
        pool: &SqlitePool,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ProjectMember>(
            r#"INSERT INTO project_members (project_id, user_id, added_at)
               VALUES ($1, $2, $3)
               RETURNING project_id, user_id, added_at"#,
        )
        .bind(project_id)
        .bind(user_id)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn remove(
        pool: &SqlitePool,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM project_members WHERE project_id = $1 AND user_id = $2")
                .bind(project_id)
                .bind(user_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }

    pub async fn is_member(
        pool: &SqlitePool,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM project_members WHERE project_id = $1 AND user_id = $2",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;
        Ok(count > 0)
    }

    /// Collaborators of a project, in the order they were added
    pub async fn find_collaborators(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<UserProfile>, sqlx::Error> {
        let users = sqlx::query_as::<_, User>(
            r#"SELECT u.id, u.username, u.full_name, u.location, u.email, u.password_hash,
                      u.oauth_provider, u.oauth_subject, u.created_at
               FROM users u
               JOIN project_members m ON m.user_id = u.id
               WHERE m.project_id = $1
               ORDER BY m.added_at ASC, m.rowid ASC"#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await?;

        Ok(users.into_iter().map(UserProfile::from).collect())
    }
}
