use anyhow::{Context, Result};
use std::fmt;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    // FileMuncher API
    pub api_base_url: String,

    // OAuth client credentials
    pub oauth_token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub oauth_scope: Option<String>,

    // Timeouts
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub token_timeout: Duration,
    pub download_timeout: Duration,

    // HTTP client
    pub max_redirects: usize,

    // Logging
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    /// Build a configuration with default timeouts
    pub fn new(
        api_base_url: impl Into<String>,
        oauth_token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            oauth_token_url: oauth_token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            oauth_scope: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            token_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(900),
            max_redirects: 10,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }

    /// Load configuration from the environment (and `.env` if present)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{} is required", key))
        };
        let secs = |key: &str, default: u64| -> Duration {
            Duration::from_secs(
                lookup(key)
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or(default),
            )
        };

        let mut config = Config::new(
            required("FILEMUNCHER_API_URL")?,
            required("FILEMUNCHER_OAUTH_TOKEN_URL")?,
            required("FILEMUNCHER_CLIENT_ID")?,
            required("FILEMUNCHER_CLIENT_SECRET")?,
        );

        config.oauth_scope = lookup("FILEMUNCHER_OAUTH_SCOPE").filter(|s| !s.trim().is_empty());
        config.connect_timeout = secs("FILEMUNCHER_CONNECT_TIMEOUT", 10);
        config.request_timeout = secs("FILEMUNCHER_REQUEST_TIMEOUT", 60);
        config.token_timeout = secs("FILEMUNCHER_TOKEN_TIMEOUT", 30);
        config.download_timeout = secs("FILEMUNCHER_DOWNLOAD_TIMEOUT", 900);
        config.max_redirects = lookup("FILEMUNCHER_MAX_REDIRECTS")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(10);
        config.log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        config.log_format = parse_log_format(&lookup("LOG_FORMAT").unwrap_or_default());

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        validate_url("FILEMUNCHER_API_URL", &self.api_base_url)?;
        validate_url("FILEMUNCHER_OAUTH_TOKEN_URL", &self.oauth_token_url)?;

        if self.client_id.trim().is_empty() {
            anyhow::bail!("FILEMUNCHER_CLIENT_ID cannot be empty");
        }
        if self.client_secret.is_empty() {
            anyhow::bail!("FILEMUNCHER_CLIENT_SECRET cannot be empty");
        }

        for (name, value) in [
            ("FILEMUNCHER_CONNECT_TIMEOUT", self.connect_timeout),
            ("FILEMUNCHER_REQUEST_TIMEOUT", self.request_timeout),
            ("FILEMUNCHER_TOKEN_TIMEOUT", self.token_timeout),
            ("FILEMUNCHER_DOWNLOAD_TIMEOUT", self.download_timeout),
        ] {
            if value.is_zero() {
                anyhow::bail!("{} must be greater than zero", name);
            }
        }

        Ok(())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_base_url", &self.api_base_url)
            .field("oauth_token_url", &self.oauth_token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("oauth_scope", &self.oauth_scope)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("token_timeout", &self.token_timeout)
            .field("download_timeout", &self.download_timeout)
            .field("max_redirects", &self.max_redirects)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .finish()
    }
}

fn validate_url(name: &str, value: &str) -> Result<()> {
    let url = reqwest::Url::parse(value).with_context(|| format!("{} is not a valid URL: {}", name, value))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("{} must use http or https: {}", name, value);
    }
    Ok(())
}

/// Parse log format from string
fn parse_log_format(s: &str) -> LogFormat {
    match s.to_lowercase().as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    }
}
