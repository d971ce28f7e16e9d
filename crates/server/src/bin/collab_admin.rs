//! Maintenance commands: legacy flat-file import/export and seed data.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use db::DBService;
use services::services::{legacy, seed};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "collab-admin", version, about = "Collab Board maintenance commands")]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://collab.db")]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import login.txt and projects.txt from a directory
    ImportLegacy {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Write the database out as login.txt and projects.txt
    ExportLegacy {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Insert random projects owned by the seed user
    Seed {
        #[arg(long, default_value_t = 50)]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let db = DBService::new(&cli.database_url).await?;

    match cli.command {
        Command::ImportLegacy { dir } => {
            let report = legacy::import_legacy(&db.pool, &dir).await?;
            println!(
                "Imported {} users and {} projects ({} images), skipped {}",
                report.users_imported,
                report.projects_imported,
                report.images_linked,
                report.skipped.len()
            );
            for reason in &report.skipped {
                println!("  skipped {reason}");
            }
        }
        Command::ExportLegacy { dir } => {
            let report = legacy::export_legacy(&db.pool, &dir).await?;
            println!(
                "Exported {} users and {} projects to {}",
                report.users,
                report.projects,
                dir.display()
            );
        }
        Command::Seed { count } => {
            let projects = seed::seed_projects(&db.pool, count).await?;
            println!("Generated and added {} projects to the database.", projects.len());
        }
    }
    Ok(())
}
