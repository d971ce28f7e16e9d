//! Authorization-code OAuth login against a configurable provider.

use std::time::Duration;

use db::models::user::{CreateUser, User};
use rand::{Rng, distributions::Alphanumeric};
use reqwest::{Client, header::ACCEPT};
use serde::Deserialize;
use serde_json::Value;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

const STATE_LEN: usize = 32;
const USERNAME_BASE_MAX: usize = 26;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("unexpected provider response: {0}")]
    Serde(String),
    #[error("provider did not return a subject id")]
    MissingSubject,
    #[error("oauth state mismatch")]
    StateMismatch,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub provider: String,
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub redirect_url: String,
    pub scopes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// What we keep from the provider's userinfo document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthIdentity {
    pub subject: String,
    pub email: Option<String>,
    pub login: Option<String>,
    pub name: Option<String>,
}

impl OAuthIdentity {
    /// Accepts both OIDC-style (`sub`, `preferred_username`) and GitHub-style
    /// (numeric `id`, `login`) documents.
    pub fn from_userinfo(info: &Value) -> Result<Self, OAuthError> {
        let subject = match (info.get("sub"), info.get("id")) {
            (Some(Value::String(sub)), _) if !sub.is_empty() => sub.clone(),
            (_, Some(Value::Number(id))) => id.to_string(),
            (_, Some(Value::String(id))) if !id.is_empty() => id.clone(),
            _ => return Err(OAuthError::MissingSubject),
        };
        let text = |key: &str| {
            info.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Ok(Self {
            subject,
            email: text("email"),
            login: text("login").or_else(|| text("preferred_username")),
            name: text("name"),
        })
    }

    /// Username to try first, before collision suffixes
    pub fn username_base(&self) -> String {
        let candidates = [
            self.login.clone(),
            self.email
                .as_deref()
                .and_then(|e| e.split('@').next())
                .map(str::to_string),
            self.name.clone(),
        ];
        candidates
            .into_iter()
            .flatten()
            .map(|c| sanitize_username(&c))
            .find(|c| c.len() >= 3)
            .unwrap_or_else(|| "user".to_string())
    }
}

fn sanitize_username(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(USERNAME_BASE_MAX)
        .collect()
}

#[derive(Debug, Clone)]
pub struct OAuthClient {
    config: OAuthConfig,
    http: Client,
}

impl OAuthClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

    pub fn new(config: OAuthConfig) -> Result<Self, OAuthError> {
        // fail fast on a bad configuration rather than at the first login
        Url::parse(&config.auth_url)?;
        Url::parse(&config.token_url)?;
        Url::parse(&config.userinfo_url)?;

        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("collab-board/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { config, http })
    }

    pub fn provider(&self) -> &str {
        &self.config.provider
    }

    pub fn authorize_url(&self, state: &str) -> Result<Url, OAuthError> {
        let mut url = Url::parse(&self.config.auth_url)?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_url)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", state);
        Ok(url)
    }

    /// Trade an authorization code for an access token
    pub async fn exchange_code(&self, code: &str) -> Result<String, OAuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_url.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        let res = self
            .http
            .post(&self.config.token_url)
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await?;
        let body = read_success(res).await?;
        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| OAuthError::Serde(e.to_string()))?;
        Ok(token.access_token)
    }

    pub async fn fetch_identity(&self, access_token: &str) -> Result<OAuthIdentity, OAuthError> {
        let res = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let body = read_success(res).await?;
        let info: Value =
            serde_json::from_str(&body).map_err(|e| OAuthError::Serde(e.to_string()))?;
        OAuthIdentity::from_userinfo(&info)
    }
}

async fn read_success(res: reqwest::Response) -> Result<String, OAuthError> {
    let status = res.status();
    let body = res.text().await?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(OAuthError::Http {
            status: status.as_u16(),
            body,
        })
    }
}

/// Random value for the `state` parameter
pub fn generate_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LEN)
        .map(char::from)
        .collect()
}

/// Constant-time comparison of the returned state with the one we issued
pub fn state_matches(expected: &str, returned: &str) -> bool {
    expected.len() == returned.len()
        && expected
            .bytes()
            .zip(returned.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Find the account linked to this identity, creating one on first login
pub async fn find_or_create_user(
    pool: &SqlitePool,
    provider: &str,
    identity: &OAuthIdentity,
) -> Result<User, OAuthError> {
    if let Some(user) = User::find_by_oauth_identity(pool, provider, &identity.subject).await? {
        if user.email.is_none() && identity.email.is_some() {
            User::update_email(pool, user.id, identity.email.as_deref()).await?;
            return Ok(User::find_by_id(pool, user.id).await?.unwrap_or(user));
        }
        debug!(user_id = %user.id, provider, "OAuth login for linked account");
        return Ok(user);
    }

    let base = identity.username_base();
    let mut username = base.clone();
    let mut suffix = 1u32;
    while User::username_exists(pool, &username).await? {
        suffix += 1;
        username = format!("{base}{suffix}");
    }

    let data = CreateUser {
        full_name: identity
            .name
            .clone()
            .unwrap_or_else(|| username.clone()),
        username,
        location: String::new(),
        email: identity.email.clone(),
        password_hash: None,
        oauth_provider: Some(provider.to_string()),
        oauth_subject: Some(identity.subject.clone()),
    };
    let user = User::create(pool, &data, Uuid::new_v4()).await?;
    info!(user_id = %user.id, username = %user.username, provider, "Created account from OAuth login");
    Ok(user)
}
