use sqlx::SqlitePool;
use uuid::Uuid;

use super::{
    project::{CreateProject, Project},
    user::{CreateUser, User},
};

pub(crate) async fn insert_user(pool: &SqlitePool, username: &str) -> User {
    let data = CreateUser {
        username: username.to_string(),
        full_name: format!("{username} Example"),
        location: "Remote".to_string(),
        email: Some(format!("{username}@example.com")),
        password_hash: None,
        oauth_provider: None,
        oauth_subject: None,
    };
    User::create(pool, &data, Uuid::new_v4()).await.unwrap()
}

pub(crate) async fn insert_project(pool: &SqlitePool, owner: &User, title: &str) -> Project {
    let data = CreateProject {
        title: title.to_string(),
        description: Some(format!("About {title}")),
        category: None,
        deadline: None,
    };
    Project::create(pool, &data, owner.id, Uuid::new_v4())
        .await
        .unwrap()
}
