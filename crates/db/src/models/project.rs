use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    milestone::Milestone,
    pagination::{Page, PageRequest},
    project_image::ProjectImage,
    user::UserProfile,
};

const PROJECT_COLUMNS: &str =
    "p.id, p.title, p.description, p.owner_id, p.category, p.deadline, p.created_at, p.updated_at";

pub const DEFAULT_DESCRIPTION: &str = "No description";

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "project_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProjectCategory {
    Hackathon,
    GameJam,
    Event,
    #[default]
    Other,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub owner_id: Uuid, // Foreign key to User
    pub category: ProjectCategory,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Project as shown in listings and search results
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ProjectSummary {
    #[serde(flatten)]
    #[ts(flatten)]
    pub project: Project,
    pub owner: String,
    pub images: Vec<String>,
}

impl std::ops::Deref for ProjectSummary {
    type Target = Project;
    fn deref(&self) -> &Self::Target {
        &self.project
    }
}

/// Everything the project page needs in one payload
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ProjectDetails {
    #[serde(flatten)]
    #[ts(flatten)]
    pub summary: ProjectSummary,
    pub image_records: Vec<ProjectImage>,
    pub collaborators: Vec<UserProfile>,
    pub milestones: Vec<Milestone>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateProject {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<ProjectCategory>,
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateProject {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<ProjectCategory>,
    pub deadline: Option<DateTime<Utc>>,
    pub clear_deadline: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub category: Option<ProjectCategory>,
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, FromRow)]
struct ProjectWithOwner {
    #[sqlx(flatten)]
    project: Project,
    owner_username: String,
}

impl Project {
    pub async fn create(
        pool: &SqlitePool,
        data: &CreateProject,
        owner_id: Uuid,
        project_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let description = data
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DESCRIPTION);
        let category = data.category.unwrap_or_default();
        let now = Utc::now();

        sqlx::query_as::<_, Project>(
            r#"INSERT INTO projects (id, title, description, owner_id, category, deadline, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
               RETURNING id, title, description, owner_id, category, deadline, created_at, updated_at"#,
        )
        .bind(project_id)
        .bind(data.title.trim())
        .bind(description)
        .bind(owner_id)
        .bind(category)
        .bind(data.deadline)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_summary_by_id(
        pool: &SqlitePool,
        id: Uuid,
    ) -> Result<Option<ProjectSummary>, sqlx::Error> {
        let row = sqlx::query_as::<_, ProjectWithOwner>(&format!(
            r#"SELECT {PROJECT_COLUMNS}, u.username AS owner_username
               FROM projects p
               JOIN users u ON u.id = p.owner_id
               WHERE p.id = $1"#
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        match row {
            Some(row) => Ok(Self::attach_images(pool, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        title: &str,
        description: &str,
        category: ProjectCategory,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"UPDATE projects
               SET title = $2, description = $3, category = $4, deadline = $5, updated_at = $6
               WHERE id = $1
               RETURNING id, title, description, owner_id, category, deadline, created_at, updated_at"#,
        )
        .bind(id)
        .bind(title)
        .bind(description)
        .bind(category)
        .bind(deadline)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    /// Deletes the project; images, members and milestones go with it via ON DELETE CASCADE
    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Newest-first page of projects matching `filter`
    pub async fn list(
        pool: &SqlitePool,
        filter: &ProjectFilter,
        request: PageRequest,
    ) -> Result<Page<ProjectSummary>, sqlx::Error> {
        let mut count_query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM projects p WHERE 1 = 1");
        push_filter(&mut count_query, filter);
        let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {PROJECT_COLUMNS}, u.username AS owner_username FROM projects p JOIN users u ON u.id = p.owner_id WHERE 1 = 1"
        ));
        push_filter(&mut query, filter);
        query
            .push(" ORDER BY p.created_at DESC, p.rowid DESC LIMIT ")
            .push_bind(request.limit())
            .push(" OFFSET ")
            .push_bind(request.offset());

        let rows = query
            .build_query_as::<ProjectWithOwner>()
            .fetch_all(pool)
            .await?;
        let items = Self::attach_images(pool, rows).await?;

        Ok(Page::new(items, request, total))
    }

    /// Case-insensitive substring match on the title, newest first.
    /// SQLite's `lower()` only folds ASCII, so titles are folded here instead.
    pub async fn search_by_title(
        pool: &SqlitePool,
        query: &str,
        limit: i64,
    ) -> Result<Vec<ProjectSummary>, sqlx::Error> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, ProjectWithOwner>(&format!(
            r#"SELECT {PROJECT_COLUMNS}, u.username AS owner_username
               FROM projects p
               JOIN users u ON u.id = p.owner_id
               ORDER BY p.created_at DESC, p.rowid DESC"#
        ))
        .fetch_all(pool)
        .await?;

        let limit = usize::try_from(limit).unwrap_or(0);
        let hits = rows
            .into_iter()
            .filter(|row| row.project.title.to_lowercase().contains(&needle))
            .take(limit)
            .collect();
        Self::attach_images(pool, hits).await
    }

    pub async fn find_owned_by(
        pool: &SqlitePool,
        owner_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects p WHERE p.owner_id = $1 ORDER BY p.created_at DESC, p.rowid DESC"
        ))
        .bind(owner_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_collaborating(
        pool: &SqlitePool,
        user_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            r#"SELECT {PROJECT_COLUMNS}
               FROM projects p
               JOIN project_members m ON m.project_id = p.id
               WHERE m.user_id = $1
               ORDER BY p.created_at DESC, p.rowid DESC"#
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Every project in creation order, used by the legacy exporter
    pub async fn find_all_summaries(pool: &SqlitePool) -> Result<Vec<ProjectSummary>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ProjectWithOwner>(&format!(
            r#"SELECT {PROJECT_COLUMNS}, u.username AS owner_username
               FROM projects p
               JOIN users u ON u.id = p.owner_id
               ORDER BY p.created_at ASC, p.rowid ASC"#
        ))
        .fetch_all(pool)
        .await?;

        Self::attach_images(pool, rows).await
    }

    async fn attach_images(
        pool: &SqlitePool,
        rows: Vec<ProjectWithOwner>,
    ) -> Result<Vec<ProjectSummary>, sqlx::Error> {
        let ids: Vec<Uuid> = rows.iter().map(|row| row.project.id).collect();
        let mut images: HashMap<Uuid, Vec<String>> = HashMap::new();
        for image in ProjectImage::find_by_project_ids(pool, &ids).await? {
            images.entry(image.project_id).or_default().push(image.filename);
        }

        Ok(rows
            .into_iter()
            .map(|row| ProjectSummary {
                images: images.remove(&row.project.id).unwrap_or_default(),
                owner: row.owner_username,
                project: row.project,
            })
            .collect())
    }
}

fn push_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &ProjectFilter) {
    if let Some(category) = filter.category {
        query.push(" AND p.category = ").push_bind(category);
    }
    if let Some(owner_id) = filter.owner_id {
        query.push(" AND p.owner_id = ").push_bind(owner_id);
    }
}
