//! Adding and removing users on a project (the project_members join table).

use db::models::{
    project_member::ProjectMember,
    user::{User, UserProfile},
};
use tracing::info;
use uuid::Uuid;

use super::{
    mailer::NotificationService,
    projects::{ProjectService, ProjectServiceError},
};

impl ProjectService {
    pub async fn collaborators(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<UserProfile>, ProjectServiceError> {
        self.load(project_id).await?;
        Ok(ProjectMember::find_collaborators(&self.pool, project_id).await?)
    }

    /// Owner adds `username` to the project and the new collaborator is emailed
    pub async fn add_collaborator(
        &self,
        actor: &User,
        project_id: Uuid,
        username: &str,
    ) -> Result<UserProfile, ProjectServiceError> {
        let project = self.load(project_id).await?;
        Self::require_owner(&project, actor, "only the owner can add collaborators")?;

        let collaborator = User::find_by_username(&self.pool, username.trim())
            .await?
            .ok_or_else(|| ProjectServiceError::NotFound("user".to_string()))?;
        if collaborator.id == project.owner_id {
            return Err(ProjectServiceError::Validation(
                "the owner is already part of the project".to_string(),
            ));
        }

        ProjectMember::add(&self.pool, project_id, collaborator.id)
            .await
            .map_err(|e| match e.as_database_error() {
                Some(db) if db.is_unique_violation() => ProjectServiceError::Conflict(format!(
                    "{} is already a collaborator",
                    collaborator.username
                )),
                _ => ProjectServiceError::Database(e),
            })?;

        info!(
            project_id = %project_id,
            collaborator = %collaborator.username,
            added_by = %actor.username,
            "Collaborator added"
        );
        self.notifications.dispatch(NotificationService::collaborator_email(
            &project,
            &collaborator,
            actor,
        ));

        Ok(collaborator.into())
    }

    /// The owner may remove anyone; a collaborator may remove themself
    pub async fn remove_collaborator(
        &self,
        actor: &User,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), ProjectServiceError> {
        let project = self.load(project_id).await?;
        if actor.id != project.owner_id && actor.id != user_id {
            return Err(ProjectServiceError::Forbidden(
                "only the owner can remove other collaborators",
            ));
        }

        let removed = ProjectMember::remove(&self.pool, project_id, user_id).await?;
        if removed == 0 {
            return Err(ProjectServiceError::NotFound("collaborator".to_string()));
        }
        info!(project_id = %project_id, user_id = %user_id, "Collaborator removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use db::models::project::CreateProject;

    use super::*;
    use crate::services::projects::test_support::*;

    fn new_project(title: &str) -> CreateProject {
        CreateProject {
            title: title.to_string(),
            description: None,
            category: None,
            deadline: None,
        }
    }

    #[tokio::test]
    async fn test_add_collaborator_rules() {
        let fx = fixture().await;
        let ada = user(&fx.db, "ada").await;
        let bob = user(&fx.db, "bob").await;
        user(&fx.db, "cy").await;
        let project = fx.service.create(&ada, new_project("Team")).await.unwrap();

        assert!(matches!(
            fx.service.add_collaborator(&bob, project.id, "cy").await,
            Err(ProjectServiceError::Forbidden(_))
        ));
        assert!(matches!(
            fx.service.add_collaborator(&ada, project.id, "ghost").await,
            Err(ProjectServiceError::NotFound(_))
        ));
        assert!(matches!(
            fx.service.add_collaborator(&ada, project.id, "ada").await,
            Err(ProjectServiceError::Validation(_))
        ));

        let added = fx.service.add_collaborator(&ada, project.id, "bob").await.unwrap();
        assert_eq!(added.id, bob.id);
        assert!(matches!(
            fx.service.add_collaborator(&ada, project.id, "bob").await,
            Err(ProjectServiceError::Conflict(_))
        ));

        // a collaborator still cannot add others
        assert!(matches!(
            fx.service.add_collaborator(&bob, project.id, "cy").await,
            Err(ProjectServiceError::Forbidden(_))
        ));

        let names: Vec<String> = fx
            .service
            .collaborators(project.id)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["bob"]);
    }

    #[tokio::test]
    async fn test_collaborator_is_emailed() {
        let fx = fixture().await;
        let ada = user(&fx.db, "ada").await;
        user(&fx.db, "bob").await;
        let project = fx.service.create(&ada, new_project("Team")).await.unwrap();

        fx.service.add_collaborator(&ada, project.id, "bob").await.unwrap();

        // delivery happens on a spawned task
        for _ in 0..50 {
            if !fx.mailer.sent().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let sent = fx.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "bob@example.com");
    }

    #[tokio::test]
    async fn test_remove_collaborator_permissions() {
        let fx = fixture().await;
        let ada = user(&fx.db, "ada").await;
        let bob = user(&fx.db, "bob").await;
        let cy = user(&fx.db, "cy").await;
        let project = fx.service.create(&ada, new_project("Team")).await.unwrap();
        fx.service.add_collaborator(&ada, project.id, "bob").await.unwrap();
        fx.service.add_collaborator(&ada, project.id, "cy").await.unwrap();

        assert!(matches!(
            fx.service.remove_collaborator(&bob, project.id, cy.id).await,
            Err(ProjectServiceError::Forbidden(_))
        ));

        fx.service.remove_collaborator(&bob, project.id, bob.id).await.unwrap();
        fx.service.remove_collaborator(&ada, project.id, cy.id).await.unwrap();
        assert!(fx.service.collaborators(project.id).await.unwrap().is_empty());

        assert!(matches!(
            fx.service.remove_collaborator(&ada, project.id, cy.id).await,
            Err(ProjectServiceError::NotFound(_))
        ));
    }
}
