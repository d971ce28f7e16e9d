//! Project posting, browsing, search and image attachments, with the
//! ownership rules every project mutation goes through.

use db::models::{
    milestone::Milestone,
    pagination::{Page, PageRequest},
    project::{
        CreateProject, DEFAULT_DESCRIPTION, Project, ProjectCategory, ProjectDetails,
        ProjectFilter, ProjectSummary, UpdateProject,
    },
    project_image::ProjectImage,
    project_member::ProjectMember,
    user::{User, UserProfile},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    mailer::NotificationService,
    uploads::{ImageStore, UploadError},
};

pub const TITLE_MAX_LEN: usize = 120;
pub const DESCRIPTION_MAX_LEN: usize = 5000;
pub const SEARCH_LIMIT: i64 = 50;

#[derive(Debug, Error)]
pub enum ProjectServiceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("project not found")]
    ProjectNotFound,
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("upload error: {0}")]
    Upload(#[from] UploadError),
}

/// Query string for browsing
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct BrowseQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category: Option<ProjectCategory>,
    pub owner: Option<String>,
}

/// Outcome of a multi-file upload
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UploadReport {
    pub saved: Vec<ProjectImage>,
    pub rejected: Vec<String>,
}

/// A user's public page
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UserOverview {
    pub profile: UserProfile,
    pub owned_projects: Vec<Project>,
    pub collaborating_on: Vec<Project>,
}

/// How the acting user relates to a project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectRole {
    Owner,
    Collaborator,
    Outsider,
}

#[derive(Clone)]
pub struct ProjectService {
    pub(super) pool: SqlitePool,
    pub(super) images: ImageStore,
    pub(super) notifications: NotificationService,
}

impl ProjectService {
    pub fn new(pool: SqlitePool, images: ImageStore, notifications: NotificationService) -> Self {
        Self {
            pool,
            images,
            notifications,
        }
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    pub(super) async fn load(&self, project_id: Uuid) -> Result<Project, ProjectServiceError> {
        Project::find_by_id(&self.pool, project_id)
            .await?
            .ok_or(ProjectServiceError::ProjectNotFound)
    }

    pub async fn role_of(
        &self,
        project: &Project,
        user: &User,
    ) -> Result<ProjectRole, ProjectServiceError> {
        if project.owner_id == user.id {
            Ok(ProjectRole::Owner)
        } else if ProjectMember::is_member(&self.pool, project.id, user.id).await? {
            Ok(ProjectRole::Collaborator)
        } else {
            Ok(ProjectRole::Outsider)
        }
    }

    pub(super) fn require_owner(
        project: &Project,
        user: &User,
        action: &'static str,
    ) -> Result<(), ProjectServiceError> {
        if project.owner_id == user.id {
            Ok(())
        } else {
            Err(ProjectServiceError::Forbidden(action))
        }
    }

    pub(super) async fn require_member(
        &self,
        project: &Project,
        user: &User,
        action: &'static str,
    ) -> Result<(), ProjectServiceError> {
        match self.role_of(project, user).await? {
            ProjectRole::Owner | ProjectRole::Collaborator => Ok(()),
            ProjectRole::Outsider => Err(ProjectServiceError::Forbidden(action)),
        }
    }

    pub async fn create(
        &self,
        owner: &User,
        mut data: CreateProject,
    ) -> Result<Project, ProjectServiceError> {
        data.title = validate_title(&data.title)?;
        if let Some(description) = data.description.as_deref() {
            validate_description(description)?;
        }

        let project = Project::create(&self.pool, &data, owner.id, Uuid::new_v4()).await?;
        info!(
            project_id = %project.id,
            owner = %owner.username,
            category = %project.category,
            "Project posted"
        );
        Ok(project)
    }

    pub async fn details(&self, project_id: Uuid) -> Result<ProjectDetails, ProjectServiceError> {
        let summary = Project::find_summary_by_id(&self.pool, project_id)
            .await?
            .ok_or(ProjectServiceError::ProjectNotFound)?;
        let image_records = ProjectImage::find_by_project_id(&self.pool, project_id).await?;
        let collaborators = ProjectMember::find_collaborators(&self.pool, project_id).await?;
        let milestones = Milestone::find_by_project_id(&self.pool, project_id).await?;

        Ok(ProjectDetails {
            summary,
            image_records,
            collaborators,
            milestones,
        })
    }

    pub async fn update(
        &self,
        actor: &User,
        project_id: Uuid,
        changes: UpdateProject,
    ) -> Result<Project, ProjectServiceError> {
        let project = self.load(project_id).await?;
        Self::require_owner(&project, actor, "only the owner can edit this project")?;

        let title = match changes.title.as_deref() {
            Some(title) => validate_title(title)?,
            None => project.title.clone(),
        };
        let description = match changes.description.as_deref().map(str::trim) {
            Some("") => DEFAULT_DESCRIPTION.to_string(),
            Some(description) => {
                validate_description(description)?;
                description.to_string()
            }
            None => project.description.clone(),
        };
        let category = changes.category.unwrap_or(project.category);
        let deadline = if changes.clear_deadline.unwrap_or(false) {
            None
        } else {
            changes.deadline.or(project.deadline)
        };

        let updated =
            Project::update(&self.pool, project_id, &title, &description, category, deadline)
                .await?;
        Ok(updated)
    }

    pub async fn delete(&self, actor: &User, project_id: Uuid) -> Result<(), ProjectServiceError> {
        let project = self.load(project_id).await?;
        Self::require_owner(&project, actor, "only the owner can delete this project")?;

        let images = ProjectImage::find_by_project_id(&self.pool, project_id).await?;
        Project::delete(&self.pool, project_id).await?;

        for image in images {
            if let Err(e) = self.images.remove(&image.filename).await {
                warn!(project_id = %project_id, filename = %image.filename, error = %e, "Failed to remove image file");
            }
        }

        info!(project_id = %project_id, "Project deleted");
        Ok(())
    }

    pub async fn browse(
        &self,
        query: &BrowseQuery,
    ) -> Result<Page<ProjectSummary>, ProjectServiceError> {
        let request = PageRequest::new(query.page, query.per_page);
        let owner_id = match query.owner.as_deref().map(str::trim).filter(|o| !o.is_empty()) {
            Some(username) => match User::find_by_username(&self.pool, username).await? {
                Some(owner) => Some(owner.id),
                // unknown owner: nothing can match
                None => return Ok(Page::new(Vec::new(), request, 0)),
            },
            None => None,
        };

        let filter = ProjectFilter {
            category: query.category,
            owner_id,
        };
        Ok(Project::list(&self.pool, &filter, request).await?)
    }

    pub async fn search(&self, query: &str) -> Result<Vec<ProjectSummary>, ProjectServiceError> {
        Ok(Project::search_by_title(&self.pool, query, SEARCH_LIMIT).await?)
    }

    /// Store each allowed file and attach it; disallowed or empty files are reported back
    pub async fn add_images(
        &self,
        actor: &User,
        project_id: Uuid,
        files: Vec<(String, Vec<u8>)>,
    ) -> Result<UploadReport, ProjectServiceError> {
        let project = self.load(project_id).await?;
        self.require_member(&project, actor, "only project members can add images")
            .await?;

        let mut report = UploadReport {
            saved: Vec::new(),
            rejected: Vec::new(),
        };
        for (original, bytes) in files {
            match self.images.save(&original, &bytes).await {
                Ok(stored) => {
                    let image = ProjectImage::create(&self.pool, project_id, &stored).await?;
                    report.saved.push(image);
                }
                Err(UploadError::DisallowedType(_) | UploadError::Empty(_)) => {
                    report.rejected.push(original);
                }
                Err(e) => return Err(e.into()),
            }
        }

        if report.saved.is_empty() && report.rejected.is_empty() {
            info!(project_id = %project_id, "No images attached");
        }
        Ok(report)
    }

    pub async fn remove_image(
        &self,
        actor: &User,
        project_id: Uuid,
        image_id: Uuid,
    ) -> Result<(), ProjectServiceError> {
        let project = self.load(project_id).await?;
        self.require_member(&project, actor, "only project members can remove images")
            .await?;

        let image = ProjectImage::find_by_id(&self.pool, image_id)
            .await?
            .filter(|image| image.project_id == project_id)
            .ok_or_else(|| ProjectServiceError::NotFound("image".to_string()))?;

        ProjectImage::delete(&self.pool, image.id).await?;
        if let Err(e) = self.images.remove(&image.filename).await {
            warn!(project_id = %project_id, filename = %image.filename, error = %e, "Failed to remove image file");
        }
        Ok(())
    }

    pub async fn user_overview(&self, username: &str) -> Result<UserOverview, ProjectServiceError> {
        let user = User::find_by_username(&self.pool, username)
            .await?
            .ok_or_else(|| ProjectServiceError::NotFound("user".to_string()))?;
        let owned_projects = Project::find_owned_by(&self.pool, user.id).await?;
        let collaborating_on = Project::find_collaborating(&self.pool, user.id).await?;

        Ok(UserOverview {
            profile: user.into(),
            owned_projects,
            collaborating_on,
        })
    }
}

pub(super) fn validate_title(title: &str) -> Result<String, ProjectServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ProjectServiceError::Validation("title is required".to_string()));
    }
    if title.chars().count() > TITLE_MAX_LEN {
        return Err(ProjectServiceError::Validation(format!(
            "title must be at most {TITLE_MAX_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

fn validate_description(description: &str) -> Result<(), ProjectServiceError> {
    if description.chars().count() > DESCRIPTION_MAX_LEN {
        return Err(ProjectServiceError::Validation(format!(
            "description must be at most {DESCRIPTION_MAX_LEN} characters"
        )));
    }
    Ok(())
}
