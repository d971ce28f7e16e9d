use std::{sync::Arc, time::Duration};

use db::DBService;
use services::services::{
    auth::AuthService,
    mailer::{HttpMailer, LogMailer, Mailer, NotificationService},
    oauth::OAuthClient,
    projects::ProjectService,
    rate_limit::RateLimiter,
    uploads::ImageStore,
};
use tracing::info;

use crate::config::Config;

const RATE_LIMIT_SWEEP_EVERY: Duration = Duration::from_secs(120);

/// Shared handles every handler works with
#[derive(Clone)]
pub struct AppState {
    pub db: DBService,
    pub auth: AuthService,
    pub projects: ProjectService,
    pub notifications: NotificationService,
    pub oauth: Option<Arc<OAuthClient>>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let db = DBService::new(&config.database_url).await?;

        let mailer: Arc<dyn Mailer> = match &config.mail {
            Some(mail) => {
                info!(api_url = %mail.api_url, "Sending email through mail API");
                Arc::new(HttpMailer::new(
                    mail.api_url.clone(),
                    mail.api_key.clone(),
                    mail.from.clone(),
                )?)
            }
            None => {
                info!("No mail API configured, emails will be logged");
                Arc::new(LogMailer)
            }
        };

        let oauth = match &config.oauth {
            Some(oauth) => {
                info!(provider = %oauth.provider, "OAuth login enabled");
                Some(Arc::new(OAuthClient::new(oauth.clone())?))
            }
            None => None,
        };

        let state = Self::from_parts(db, config, mailer, oauth);
        state.projects.images().ensure_dir().await?;
        state
            .rate_limiter
            .clone()
            .spawn_sweeper(RATE_LIMIT_SWEEP_EVERY);
        Ok(state)
    }

    /// Wire the services around an already opened database
    pub fn from_parts(
        db: DBService,
        config: &Config,
        mailer: Arc<dyn Mailer>,
        oauth: Option<Arc<OAuthClient>>,
    ) -> Self {
        let notifications = NotificationService::new(mailer);
        let auth = AuthService::new(
            db.pool.clone(),
            config.session_secret.as_bytes(),
            chrono::Duration::hours(config.session_ttl_hours),
        );
        let projects = ProjectService::new(
            db.pool.clone(),
            ImageStore::new(config.upload_dir.clone()),
            notifications.clone(),
        );

        Self {
            db,
            auth,
            projects,
            notifications,
            oauth,
            rate_limiter: Arc::new(RateLimiter::per_minute(config.rate_limit_per_minute)),
        }
    }
}
