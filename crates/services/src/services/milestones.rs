//! Milestones under a project; any project member may manage them.

use db::models::{
    milestone::{CreateMilestone, Milestone, UpdateMilestone},
    user::User,
};
use uuid::Uuid;

use super::projects::{ProjectService, ProjectServiceError, validate_title};

impl ProjectService {
    pub async fn milestones(&self, project_id: Uuid) -> Result<Vec<Milestone>, ProjectServiceError> {
        self.load(project_id).await?;
        Ok(Milestone::find_by_project_id(&self.pool, project_id).await?)
    }

    pub async fn create_milestone(
        &self,
        actor: &User,
        project_id: Uuid,
        mut data: CreateMilestone,
    ) -> Result<Milestone, ProjectServiceError> {
        let project = self.load(project_id).await?;
        self.require_member(&project, actor, "only project members can add milestones")
            .await?;

        data.title = validate_title(&data.title)?;
        data.description = clean_description(data.description);
        Ok(Milestone::create(&self.pool, project_id, &data, Uuid::new_v4()).await?)
    }

    pub async fn update_milestone(
        &self,
        actor: &User,
        project_id: Uuid,
        milestone_id: Uuid,
        changes: UpdateMilestone,
    ) -> Result<Milestone, ProjectServiceError> {
        let project = self.load(project_id).await?;
        self.require_member(&project, actor, "only project members can edit milestones")
            .await?;
        let milestone = self.load_milestone(project_id, milestone_id).await?;

        let title = match changes.title.as_deref() {
            Some(title) => validate_title(title)?,
            None => milestone.title,
        };
        let description = match changes.description {
            Some(description) => clean_description(Some(description)),
            None => milestone.description,
        };
        let due_date = if changes.clear_due_date.unwrap_or(false) {
            None
        } else {
            changes.due_date.or(milestone.due_date)
        };
        let completed = changes.completed.unwrap_or(milestone.completed);
        let position = changes.position.unwrap_or(milestone.position).max(0);

        Ok(Milestone::update(
            &self.pool,
            milestone_id,
            &title,
            description.as_deref(),
            due_date,
            completed,
            position,
        )
        .await?)
    }

    pub async fn delete_milestone(
        &self,
        actor: &User,
        project_id: Uuid,
        milestone_id: Uuid,
    ) -> Result<(), ProjectServiceError> {
        let project = self.load(project_id).await?;
        self.require_member(&project, actor, "only project members can delete milestones")
            .await?;
        self.load_milestone(project_id, milestone_id).await?;
        Milestone::delete(&self.pool, milestone_id).await?;
        Ok(())
    }

    async fn load_milestone(
        &self,
        project_id: Uuid,
        milestone_id: Uuid,
    ) -> Result<Milestone, ProjectServiceError> {
        Milestone::find_by_id(&self.pool, milestone_id)
            .await?
            .filter(|m| m.project_id == project_id)
            .ok_or_else(|| ProjectServiceError::NotFound("milestone".to_string()))
    }
}

fn clean_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}
