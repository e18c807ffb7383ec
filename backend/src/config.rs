use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// Server configuration.
///
/// Values come from environment variables (`DATABASE_URL`, `PORT`, ...),
/// optionally layered over a `mailai.toml` in the working directory.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: usize,

    /// Shared secret used to verify identity-provider JWTs locally
    pub auth_jwt_secret: Option<String>,
    /// Identity provider base URL, used when no JWT secret is configured
    pub auth_url: Option<String>,
    pub auth_api_key: Option<String>,

    #[serde(default = "default_imap_timeout_secs")]
    pub imap_connect_timeout_secs: u64,
    #[serde(default = "default_imap_timeout_secs")]
    pub imap_auth_timeout_secs: u64,
    #[serde(default)]
    pub imap_accept_invalid_certs: bool,

    #[serde(default = "default_llm_base_url")]
    pub llm_base_url: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    pub llm_api_key: Option<String>,

    /// Comma-separated list of allowed origins
    pub cors_allowed_origins: Option<String>,
}

fn default_port() -> u16 {
    3000
}

fn default_db_max_connections() -> usize {
    10
}

fn default_imap_timeout_secs() -> u64 {
    10
}

fn default_llm_base_url() -> String {
    "https://api.deepseek.com".to_string()
}

fn default_llm_model() -> String {
    "deepseek-chat".to_string()
}

/// How bearer tokens are checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    LocalJwt { secret: String },
    Remote { base_url: String, api_key: String },
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("mailai").required(false))
            .add_source(config::Environment::default().try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        Self::from_settings(settings)
    }

    pub fn from_settings(settings: config::Config) -> Result<Self> {
        settings
            .try_deserialize()
            .context("Invalid configuration (is DATABASE_URL set?)")
    }

    pub fn auth_mode(&self) -> Result<AuthMode> {
        if let Some(secret) = self.auth_jwt_secret.clone().filter(|s| !s.is_empty()) {
            return Ok(AuthMode::LocalJwt { secret });
        }

        match (&self.auth_url, &self.auth_api_key) {
            (Some(base_url), Some(api_key)) => Ok(AuthMode::Remote {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key: api_key.clone(),
            }),
            _ => anyhow::bail!("Either AUTH_JWT_SECRET or AUTH_URL and AUTH_API_KEY must be set"),
        }
    }

    pub fn imap_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.imap_connect_timeout_secs)
    }

    pub fn imap_auth_timeout(&self) -> Duration {
        Duration::from_secs(self.imap_auth_timeout_secs)
    }
}
