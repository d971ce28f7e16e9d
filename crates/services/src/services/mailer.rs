//! Outgoing email: a small trait with a log-only sink, an in-memory sink and an
//! HTTP mail API client.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use db::models::{project::Project, user::User};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Error)]
pub enum MailerError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
}

impl MailerError {
    /// Returns true if the error is transient and should be retried.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => (500..=599).contains(status),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailerError>;
}

/// Writes emails to the log instead of delivering them
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), MailerError> {
        info!(to = %email.to, subject = %email.subject, "Email (not delivered): {}", email.text);
        Ok(())
    }
}

/// Keeps every email in memory; used for dry runs and tests
#[derive(Debug, Default, Clone)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<Email>>>,
}

impl MemoryMailer {
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &Email) -> Result<(), MailerError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct MailApiRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Delivers mail through a JSON HTTP API (`POST {from,to,subject,text}` with a bearer key)
#[derive(Debug, Clone)]
pub struct HttpMailer {
    http: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

    pub fn new(api_url: String, api_key: String, from: String) -> Result<Self, MailerError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("collab-board/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MailerError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_url,
            api_key,
            from,
        })
    }

    async fn send_request(&self, email: &Email) -> Result<(), MailerError> {
        let request = MailApiRequest {
            from: &self.from,
            to: &email.to,
            subject: &email.subject,
            text: &email.text,
        };

        let res = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => Ok(()),
            StatusCode::TOO_MANY_REQUESTS => Err(MailerError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(MailerError::Http { status, body })
            }
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> Result<(), MailerError> {
        (|| async { self.send_request(email).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(500))
                    .with_max_delay(Duration::from_secs(10))
                    .with_max_times(3)
                    .with_jitter(),
            )
            .when(|e: &MailerError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    "Mail API call failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await
    }
}

fn map_reqwest_error(e: reqwest::Error) -> MailerError {
    if e.is_timeout() {
        MailerError::Timeout
    } else {
        MailerError::Transport(e.to_string())
    }
}

/// Builds the site's notification emails and hands them to a [`Mailer`]
#[derive(Clone)]
pub struct NotificationService {
    mailer: Arc<dyn Mailer>,
}

impl NotificationService {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    pub fn welcome_email(user: &User) -> Option<Email> {
        let to = user.email.clone()?;
        Some(Email {
            to,
            subject: "Welcome to Collab Board".to_string(),
            text: format!(
                "Hi {},\n\nYour account '{}' is ready. Post a project or browse what others are building.",
                user.full_name, user.username
            ),
        })
    }

    pub fn collaborator_email(project: &Project, collaborator: &User, added_by: &User) -> Option<Email> {
        let to = collaborator.email.clone()?;
        Some(Email {
            to,
            subject: format!("You were added to \"{}\"", project.title),
            text: format!(
                "Hi {},\n\n{} added you as a collaborator on \"{}\".",
                collaborator.full_name, added_by.username, project.title
            ),
        })
    }

    /// Send now and report failures to the caller
    pub async fn deliver(&self, email: &Email) -> Result<(), MailerError> {
        self.mailer.send(email).await
    }

    /// Send in the background; failures are logged
    pub fn dispatch(&self, email: Option<Email>) {
        let Some(email) = email else {
            return;
        };
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send(&email).await {
                warn!(to = %email.to, subject = %email.subject, error = %e, "Failed to send email");
            }
        });
    }
}
