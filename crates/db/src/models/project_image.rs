use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

/// An uploaded image attached to a project; `filename` is relative to the upload dir
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ProjectImage {
    pub id: Uuid,
    pub project_id: Uuid,
    pub filename: String,
    pub created_at: DateTime<Utc>,
}

impl ProjectImage {
    pub async fn create(
        pool: &SqlitePool,
        project_id: Uuid,
        filename: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ProjectImage>(
            r#"INSERT INTO project_images (id, project_id, filename, created_at)
               VALUES ($1, $2, $3, $4)
               RETURNING id, project_id, filename, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(project_id)
        .bind(filename)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ProjectImage>(
            "SELECT id, project_id, filename, created_at FROM project_images WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ProjectImage>(
            r#"SELECT id, project_id, filename, created_at
               FROM project_images
               WHERE project_id = $1
               ORDER BY created_at ASC, rowid ASC"#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    /// Images for several projects at once, in upload order
    pub async fn find_by_project_ids(
        pool: &SqlitePool,
        project_ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error> {
        if project_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, project_id, filename, created_at FROM project_images WHERE project_id IN (",
        );
        let mut separated = query.separated(", ");
        for id in project_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY created_at ASC, rowid ASC");

        query.build_query_as::<ProjectImage>().fetch_all(pool).await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM project_images WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
