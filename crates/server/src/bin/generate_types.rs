//! Writes the TypeScript declarations for the API types to `shared/types.ts`.

use std::{env, fs, path::PathBuf};

use db::models::{
    milestone::{CreateMilestone, Milestone, UpdateMilestone},
    pagination::Page,
    project::{
        CreateProject, Project, ProjectCategory, ProjectDetails, ProjectSummary, UpdateProject,
    },
    project_image::ProjectImage,
    user::UserProfile,
};
use server::routes::{
    auth::SessionInfo, collaborators::AddCollaborator, health::HealthStatus,
};
use services::services::{
    auth::{LoginRequest, RegisterUser},
    projects::{BrowseQuery, UploadReport, UserOverview},
};
use ts_rs::TS;
use utils::response::ApiResponse;

fn generate_types_content() -> String {
    let decls = [
        ApiResponse::<()>::decl(),
        Page::<()>::decl(),
        HealthStatus::decl(),
        UserProfile::decl(),
        RegisterUser::decl(),
        LoginRequest::decl(),
        SessionInfo::decl(),
        UserOverview::decl(),
        ProjectCategory::decl(),
        Project::decl(),
        ProjectSummary::decl(),
        ProjectDetails::decl(),
        CreateProject::decl(),
        UpdateProject::decl(),
        BrowseQuery::decl(),
        ProjectImage::decl(),
        UploadReport::decl(),
        AddCollaborator::decl(),
        Milestone::decl(),
        CreateMilestone::decl(),
        UpdateMilestone::decl(),
    ];

    let body = decls
        .iter()
        .map(|decl| format!("export {decl}"))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("// This file was generated by `generate-types`. Do not edit by hand.\n\n{body}\n")
}

fn main() -> std::io::Result<()> {
    let out = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("shared/types.ts"));
    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&out, generate_types_content())?;
    println!("Wrote {}", out.display());
    Ok(())
}
