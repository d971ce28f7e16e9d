use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

const MILESTONE_COLUMNS: &str =
    "id, project_id, title, description, due_date, completed, position, created_at, updated_at";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Milestone {
    pub id: Uuid,
    pub project_id: Uuid, // Foreign key to Project
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed: bool,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateMilestone {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateMilestone {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub clear_due_date: Option<bool>,
    pub completed: Option<bool>,
    pub position: Option<i64>,
}

impl Milestone {
    /// Appends a milestone after the project's current last position
    pub async fn create(
        pool: &SqlitePool,
        project_id: Uuid,
        data: &CreateMilestone,
        milestone_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Milestone>(&format!(
            r#"INSERT INTO milestones (id, project_id, title, description, due_date, completed, position, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, 0,
                       (SELECT COALESCE(MAX(position), -1) + 1 FROM milestones WHERE project_id = $2),
                       $6, $6)
               RETURNING {MILESTONE_COLUMNS}"#
        ))
        .bind(milestone_id)
        .bind(project_id)
        .bind(data.title.trim())
        .bind(data.description.as_deref())
        .bind(data.due_date)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Milestone>(&format!(
            "SELECT {MILESTONE_COLUMNS} FROM milestones WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        // NULL due dates sort last within the same position
        sqlx::query_as::<_, Milestone>(&format!(
            r#"SELECT {MILESTONE_COLUMNS}
               FROM milestones
               WHERE project_id = $1
               ORDER BY position ASC, due_date IS NULL, due_date ASC, created_at ASC"#
        ))
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        title: &str,
        description: Option<&str>,
        due_date: Option<DateTime<Utc>>,
        completed: bool,
        position: i64,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Milestone>(&format!(
            r#"UPDATE milestones
               SET title = $2, description = $3, due_date = $4, completed = $5, position = $6, updated_at = $7
               WHERE id = $1
               RETURNING {MILESTONE_COLUMNS}"#
        ))
        .bind(id)
        .bind(title)
        .bind(description)
        .bind(due_date)
        .bind(completed)
        .bind(position)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM milestones WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
