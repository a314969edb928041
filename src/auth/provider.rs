// OAuth2 client-credentials token acquisition

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Duration;
use reqwest::Client;

use super::types::{ClientCredentialsResponse, TokenGrant};
use crate::error::{FileMuncherError, Result};

/// Source of fresh backend tokens.
///
/// Implementations return `FileMuncherError::Authentication` on failure.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch_token(&self) -> Result<TokenGrant>;
}

/// Fetches tokens with the OAuth2 client-credentials grant
pub struct ClientCredentialsProvider {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: Option<String>,
}

impl ClientCredentialsProvider {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scope: Option<String>,
        timeout: StdDuration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FileMuncherError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope,
        })
    }

    fn form(&self) -> Vec<(&'static str, &str)> {
        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        if let Some(scope) = self.scope.as_deref() {
            form.push(("scope", scope));
        }
        form
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsProvider {
    async fn fetch_token(&self) -> Result<TokenGrant> {
        tracing::debug!(
            url = %self.token_url,
            client_id = %self.client_id,
            "Requesting backend token via client credentials"
        );

        let response = self
            .client
            .post(&self.token_url)
            .form(&self.form())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(url = %self.token_url, error = %e, "Token endpoint unreachable");
                FileMuncherError::Authentication(format!(
                    "token endpoint \"{}\" unreachable: {}",
                    self.token_url, e
                ))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            FileMuncherError::Authentication(format!(
                "failed to read token response from \"{}\": {}",
                self.token_url, e
            ))
        })?;

        if !status.is_success() {
            tracing::error!(
                url = %self.token_url,
                status = status.as_u16(),
                body = %body,
                "Token request rejected"
            );

            // OAuth errors carry error/error_description
            let detail = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|json| {
                    let code = json.get("error")?.as_str()?.to_string();
                    let desc = json
                        .get("error_description")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default();
                    Some(format!("{} {}", code, desc).trim_end().to_string())
                })
                .unwrap_or(body);

            return Err(FileMuncherError::Authentication(format!(
                "token endpoint returned {}: {}",
                status, detail
            )));
        }

        let data: ClientCredentialsResponse = serde_json::from_str(&body).map_err(|e| {
            FileMuncherError::Authentication(format!("failed to parse token response: {}", e))
        })?;

        if data.access_token.is_empty() {
            return Err(FileMuncherError::Authentication(
                "token response does not contain access_token".to_string(),
            ));
        }

        let expires_in = data.expires_in.ok_or_else(|| {
            FileMuncherError::Authentication("token response does not contain expires_in".to_string())
        })?;

        let expires_in = Duration::try_seconds(expires_in).ok_or_else(|| {
            FileMuncherError::Authentication(format!(
                "token response expires_in out of range: {}",
                expires_in
            ))
        })?;

        Ok(TokenGrant::new(data.access_token, expires_in))
    }
}
