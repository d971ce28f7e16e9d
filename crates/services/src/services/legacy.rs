//! Moving data between the database and the old `login.txt` / `projects.txt` files.

use std::{io::ErrorKind, path::Path};

use db::{
    legacy::{
        LegacyProject, LegacyUser, PROJECTS_FILE, USERS_FILE, parse_projects, parse_users,
    },
    models::{
        project::{CreateProject, Project},
        project_image::ProjectImage,
        user::{CreateUser, User},
    },
};
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::auth::{AuthError, hash_password, validate_username};

#[derive(Debug, Error)]
pub enum LegacyError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct ImportReport {
    pub users_imported: usize,
    pub projects_imported: usize,
    pub images_linked: usize,
    /// Human readable reasons for every record or line that was left out
    pub skipped: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct ExportReport {
    pub users: usize,
    pub projects: usize,
}

async fn read_optional(path: &Path) -> Result<String, LegacyError> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "Legacy file not found, nothing to import");
            Ok(String::new())
        }
        Err(e) => Err(e.into()),
    }
}

/// Import users then projects from `dir`. Existing usernames are left alone and
/// projects whose owner cannot be resolved are skipped.
pub async fn import_legacy(pool: &SqlitePool, dir: &Path) -> Result<ImportReport, LegacyError> {
    let mut report = ImportReport::default();

    let users = parse_users(&read_optional(&dir.join(USERS_FILE)).await?);
    for (line, err) in users.rejected {
        report.skipped.push(format!("{USERS_FILE}:{line}: {err}"));
    }
    for legacy in users.records {
        import_user(pool, legacy, &mut report).await?;
    }

    let projects = parse_projects(&read_optional(&dir.join(PROJECTS_FILE)).await?);
    for (line, err) in projects.rejected {
        report.skipped.push(format!("{PROJECTS_FILE}:{line}: {err}"));
    }
    for legacy in projects.records {
        import_project(pool, legacy, &mut report).await?;
    }

    for reason in &report.skipped {
        warn!("Skipped during legacy import: {}", reason);
    }
    info!(
        users = report.users_imported,
        projects = report.projects_imported,
        images = report.images_linked,
        skipped = report.skipped.len(),
        "Legacy import finished"
    );
    Ok(report)
}

async fn import_user(
    pool: &SqlitePool,
    legacy: LegacyUser,
    report: &mut ImportReport,
) -> Result<(), LegacyError> {
    if let Err(e) = validate_username(&legacy.username) {
        report.skipped.push(format!("user '{}': {e}", legacy.username));
        return Ok(());
    }
    if User::username_exists(pool, &legacy.username).await? {
        report
            .skipped
            .push(format!("user '{}': already exists", legacy.username));
        return Ok(());
    }

    // a blank password column (e.g. from an export) leaves the account without a password
    let password_hash = match legacy.password.as_str() {
        "" => None,
        password => Some(hash_password(password)?),
    };
    let full_name = if legacy.full_name.is_empty() {
        legacy.username.clone()
    } else {
        legacy.full_name
    };

    let data = CreateUser {
        username: legacy.username,
        full_name,
        location: legacy.location,
        email: None,
        password_hash,
        oauth_provider: None,
        oauth_subject: None,
    };
    User::create(pool, &data, Uuid::new_v4()).await?;
    report.users_imported += 1;
    Ok(())
}

async fn import_project(
    pool: &SqlitePool,
    legacy: LegacyProject,
    report: &mut ImportReport,
) -> Result<(), LegacyError> {
    let Some(owner) = User::find_by_username(pool, &legacy.owner).await? else {
        report.skipped.push(format!(
            "project '{}': unknown owner '{}'",
            legacy.title, legacy.owner
        ));
        return Ok(());
    };

    let data = CreateProject {
        title: legacy.title,
        description: Some(legacy.description),
        category: None,
        deadline: None,
    };
    let project = Project::create(pool, &data, owner.id, Uuid::new_v4()).await?;
    for filename in &legacy.images {
        ProjectImage::create(pool, project.id, filename).await?;
        report.images_linked += 1;
    }
    report.projects_imported += 1;
    Ok(())
}

/// Write every user and project to `dir` in the flat-file layout
pub async fn export_legacy(pool: &SqlitePool, dir: &Path) -> Result<ExportReport, LegacyError> {
    tokio::fs::create_dir_all(dir).await?;

    let users = User::find_all(pool).await?;
    let users_out: String = users
        .iter()
        .map(|user| {
            LegacyUser {
                username: user.username.clone(),
                password: String::new(),
                full_name: user.full_name.clone(),
                location: user.location.clone(),
            }
            .to_line()
        })
        .collect();
    tokio::fs::write(dir.join(USERS_FILE), users_out).await?;

    let projects = Project::find_all_summaries(pool).await?;
    let projects_out: String = projects
        .iter()
        .map(|summary| {
            LegacyProject {
                title: summary.title.clone(),
                description: summary.description.clone(),
                owner: summary.owner.clone(),
                images: summary.images.clone(),
            }
            .to_line()
        })
        .collect();
    tokio::fs::write(dir.join(PROJECTS_FILE), projects_out).await?;

    let report = ExportReport {
        users: users.len(),
        projects: projects.len(),
    };
    info!(users = report.users, projects = report.projects, dir = %dir.display(), "Legacy export finished");
    Ok(report)
}
