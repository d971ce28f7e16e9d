//! Random demo data for local development and load testing.

use chrono::{Duration, Utc};
use db::models::{
    project::{CreateProject, Project, ProjectCategory},
    user::{CreateUser, User},
};
use rand::Rng;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

pub const SEED_USERNAME: &str = "seed_bot";
const TITLE_LEN: usize = 15;
const DESCRIPTION_LEN: usize = 50;
const SEED_CATEGORIES: [ProjectCategory; 3] = [
    ProjectCategory::Hackathon,
    ProjectCategory::GameJam,
    ProjectCategory::Event,
];

/// Lowercase ASCII letters
pub fn random_string(rng: &mut impl Rng, len: usize) -> String {
    (0..len)
        .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
        .collect()
}

pub fn random_project(rng: &mut impl Rng) -> CreateProject {
    let category = SEED_CATEGORIES[rng.gen_range(0..SEED_CATEGORIES.len())];
    let deadline = rng
        .gen_bool(0.5)
        .then(|| Utc::now() + Duration::days(rng.gen_range(1..=60)));

    CreateProject {
        title: random_string(rng, TITLE_LEN),
        description: Some(random_string(rng, DESCRIPTION_LEN)),
        category: Some(category),
        deadline,
    }
}

async fn seed_owner(pool: &SqlitePool) -> Result<User, sqlx::Error> {
    if let Some(user) = User::find_by_username(pool, SEED_USERNAME).await? {
        return Ok(user);
    }
    let data = CreateUser {
        username: SEED_USERNAME.to_string(),
        full_name: "Seed Bot".to_string(),
        location: String::new(),
        email: None,
        password_hash: None,
        oauth_provider: None,
        oauth_subject: None,
    };
    User::create(pool, &data, Uuid::new_v4()).await
}

/// Insert `count` random projects owned by the seed user
pub async fn seed_projects(pool: &SqlitePool, count: usize) -> Result<Vec<Project>, sqlx::Error> {
    let owner = seed_owner(pool).await?;
    let mut created = Vec::with_capacity(count);
    for _ in 0..count {
        let data = random_project(&mut rand::thread_rng());
        created.push(Project::create(pool, &data, owner.id, Uuid::new_v4()).await?);
    }
    info!(count = created.len(), owner = %owner.username, "Generated seed projects");
    Ok(created)
}
