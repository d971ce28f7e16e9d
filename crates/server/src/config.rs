use std::{env, fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr};

use rand::{Rng, distributions::Alphanumeric};
use services::services::oauth::OAuthConfig;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key} value {value:?}: {message}")]
    Invalid {
        key: &'static str,
        value: String,
        message: String,
    },
}

/// Session lifetimes are capped at a year
const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub session_secret: String,
    pub session_ttl_hours: i64,
    pub rate_limit_per_minute: u32,
    pub oauth: Option<OAuthConfig>,
    pub mail: Option<MailConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: try_load("HOST", "127.0.0.1")?,
            port: try_load("PORT", "5000")?,
            database_url: try_load("DATABASE_URL", "sqlite://collab.db")?,
            upload_dir: try_load("UPLOAD_DIR", "static/uploads")?,
            max_upload_bytes: try_load("MAX_UPLOAD_BYTES", "5242880")?,
            session_secret: session_secret(),
            session_ttl_hours: session_ttl_hours(try_load("SESSION_TTL_HOURS", "168")?)?,
            rate_limit_per_minute: try_load("RATE_LIMIT_PER_MINUTE", "30")?,
            oauth: oauth_config(),
            mail: mail_config(),
        })
    }

    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        let address = format!("{}:{}", self.host, self.port);
        address.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            key: "HOST",
            value: address.clone(),
            message: e.to_string(),
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        message: e.to_string(),
        value,
    })
}

fn session_ttl_hours(hours: i64) -> Result<i64, ConfigError> {
    if (1..=MAX_SESSION_TTL_HOURS).contains(&hours) {
        Ok(hours)
    } else {
        Err(ConfigError::Invalid {
            key: "SESSION_TTL_HOURS",
            value: hours.to_string(),
            message: format!("must be between 1 and {MAX_SESSION_TTL_HOURS}"),
        })
    }
}

fn session_secret() -> String {
    var("SESSION_SECRET").unwrap_or_else(|| {
        warn!("SESSION_SECRET not set, sessions will not survive a restart");
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(64)
            .map(char::from)
            .collect()
    })
}

/// OAuth is enabled only when every endpoint and credential is present
fn oauth_config() -> Option<OAuthConfig> {
    let client_id = var("OAUTH_CLIENT_ID")?;
    let (Some(client_secret), Some(auth_url), Some(token_url), Some(userinfo_url), Some(redirect_url)) = (
        var("OAUTH_CLIENT_SECRET"),
        var("OAUTH_AUTH_URL"),
        var("OAUTH_TOKEN_URL"),
        var("OAUTH_USERINFO_URL"),
        var("OAUTH_REDIRECT_URL"),
    ) else {
        warn!("OAUTH_CLIENT_ID is set but the OAuth configuration is incomplete, OAuth login disabled");
        return None;
    };

    let scopes = var("OAUTH_SCOPES")
        .unwrap_or_else(|| "openid email profile".to_string())
        .split_whitespace()
        .map(str::to_string)
        .collect();

    Some(OAuthConfig {
        provider: var("OAUTH_PROVIDER").unwrap_or_else(|| "oauth".to_string()),
        client_id,
        client_secret,
        auth_url,
        token_url,
        userinfo_url,
        redirect_url,
        scopes,
    })
}

fn mail_config() -> Option<MailConfig> {
    let api_url = var("MAIL_API_URL")?;
    let Some(api_key) = var("MAIL_API_KEY") else {
        warn!("MAIL_API_URL is set without MAIL_API_KEY, emails will only be logged");
        return None;
    };
    Some(MailConfig {
        api_url,
        api_key,
        from: var("MAIL_FROM").unwrap_or_else(|| "Collab Board <noreply@localhost>".to_string()),
    })
}

#[cfg(test)]
impl Config {
    /// In-memory friendly defaults for router tests
    pub fn for_tests(upload_dir: PathBuf) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            upload_dir,
            max_upload_bytes: 1024 * 1024,
            session_secret: "test-secret".to_string(),
            session_ttl_hours: 1,
            rate_limit_per_minute: 1000,
            oauth: None,
            mail: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address() {
        let config = Config::for_tests(PathBuf::from("uploads"));
        assert_eq!(config.bind_address().unwrap().to_string(), "127.0.0.1:0");

        let bad = Config {
            host: "not a host".to_string(),
            ..config
        };
        assert!(bad.bind_address().is_err());
    }

    #[test]
    fn test_session_ttl_is_bounded() {
        assert_eq!(session_ttl_hours(1).unwrap(), 1);
        assert_eq!(session_ttl_hours(168).unwrap(), 168);
        assert_eq!(session_ttl_hours(MAX_SESSION_TTL_HOURS).unwrap(), 8760);

        for hours in [0, -5, MAX_SESSION_TTL_HOURS + 1, i64::MAX] {
            assert!(matches!(
                session_ttl_hours(hours),
                Err(ConfigError::Invalid { key: "SESSION_TTL_HOURS", .. })
            ));
        }
    }
}
