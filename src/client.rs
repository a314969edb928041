// FileMuncher client facade
// Wires configuration, token manager and transport, and exposes the endpoint calls

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::auth::{ClientCredentialsProvider, TokenManager};
use crate::config::Config;
use crate::error::{FileMuncherError, HttpError, Result};
use crate::http_client::FileMuncherHttpClient;
use crate::models::{
    CreateWorkspaceRequest, FileManifest, VideoUploadRequest, VideoUploadSession,
    WorkspaceAccessToken,
};

/// High-level client for the FileMuncher backend API
pub struct FileMuncherClient {
    base_url: Url,
    http: Arc<FileMuncherHttpClient>,
}

impl FileMuncherClient {
    /// Build a client using OAuth2 client credentials from the configuration
    pub fn new(config: &Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| FileMuncherError::Config(format!("{:#}", e)))?;

        let provider = ClientCredentialsProvider::new(
            config.oauth_token_url.clone(),
            config.client_id.clone(),
            config.client_secret.clone(),
            config.oauth_scope.clone(),
            config.token_timeout,
        )?;
        let token_manager = Arc::new(TokenManager::new(Arc::new(provider)));

        let http = Arc::new(
            FileMuncherHttpClient::new(
                token_manager,
                config.connect_timeout,
                config.request_timeout,
                config.download_timeout,
                config.max_redirects,
            )?
            .with_api_base(&config.api_base_url)?,
        );

        Self::with_transport(&config.api_base_url, http)
    }

    /// Build a client around an existing transport
    pub fn with_transport(api_base_url: &str, http: Arc<FileMuncherHttpClient>) -> Result<Self> {
        let base_url = Url::parse(api_base_url).map_err(|e| {
            FileMuncherError::Config(format!("invalid API URL \"{}\": {}", api_base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(FileMuncherError::Config(format!(
                "API URL cannot be used as a base: {}",
                api_base_url
            )));
        }

        Ok(Self { base_url, http })
    }

    /// Underlying authenticated transport
    pub fn http(&self) -> &Arc<FileMuncherHttpClient> {
        &self.http
    }

    /// Create a workspace and return its frontend access token
    pub async fn create_workspace(
        &self,
        request: &CreateWorkspaceRequest,
    ) -> Result<WorkspaceAccessToken> {
        let url = self.endpoint(&["workspaces"])?;
        let body = encode(&url, request)?;

        let json = self.http.post(&url, Some(&body)).await?;
        let token: WorkspaceAccessToken = decode(&url, json)?;
        tracing::info!(workspace_id = %token.workspace_id, "Workspace created");
        Ok(token)
    }

    /// Delete a workspace
    pub async fn delete_workspace(&self, workspace_id: &str) -> Result<Value> {
        let url = self.endpoint(&["workspaces", workspace_id])?;
        self.http.delete(&url).await
    }

    /// Authorize a video upload into a workspace
    pub async fn request_video_upload(
        &self,
        workspace_id: &str,
        request: &VideoUploadRequest,
    ) -> Result<VideoUploadSession> {
        let url = self.endpoint(&["workspaces", workspace_id, "uploads", "video"])?;
        let body = encode(&url, request)?;

        let json = self.http.post(&url, Some(&body)).await?;
        decode(&url, json)
    }

    /// Fetch the manifest of processed files
    pub async fn get_file_manifest(
        &self,
        workspace_id: &str,
        manifest_id: &str,
    ) -> Result<FileManifest> {
        let url = self.endpoint(&["workspaces", workspace_id, "manifests", manifest_id])?;
        let json = self.http.get(&url).await?;
        decode(&url, json)
    }

    /// Download every file listed in a manifest into `directory`.
    ///
    /// Files are stored under their base name; returns the written paths in
    /// manifest order. Stops at the first failure.
    pub async fn download_manifest_files(
        &self,
        manifest: &FileManifest,
        directory: impl AsRef<Path>,
    ) -> Result<Vec<PathBuf>> {
        let directory = directory.as_ref();
        let mut written = Vec::with_capacity(manifest.files.len());

        for file in &manifest.files {
            let name = Path::new(&file.name)
                .file_name()
                .ok_or_else(|| FileMuncherError::DownloadFailed {
                    url: file.url.clone(),
                    message: format!("manifest file has no usable name: \"{}\"", file.name),
                })?;
            let destination = directory.join(name);

            self.http.download_file(&file.url, &destination).await?;
            written.push(destination);
        }

        Ok(written)
    }

    /// Join path segments onto the API base URL, percent-encoding each one
    fn endpoint(&self, segments: &[&str]) -> Result<String> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FileMuncherError::Config("API URL cannot be used as a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url.to_string())
    }
}

/// Serialize a request model into a JSON body
fn encode<T: Serialize>(endpoint: &str, request: &T) -> Result<String> {
    serde_json::to_string(request).map_err(|e| FileMuncherError::Encode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

/// Convert a parsed JSON response into a typed model
fn decode<T: DeserializeOwned>(endpoint: &str, json: Value) -> Result<T> {
    serde_json::from_value::<T>(json.clone()).map_err(|e| {
        HttpError::Parse {
            endpoint: endpoint.to_string(),
            status: 200,
            body: json.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{TokenGrant, TokenProvider};
    use async_trait::async_trait;
    use std::time::Duration;

    struct StaticProvider;

    #[async_trait]
    impl TokenProvider for StaticProvider {
        async fn fetch_token(&self) -> Result<TokenGrant> {
            Ok(TokenGrant::new("tok", chrono::Duration::hours(1)))
        }
    }

    fn client(base: &str) -> FileMuncherClient {
        let manager = Arc::new(TokenManager::new(Arc::new(StaticProvider)));
        let http = Arc::new(
            FileMuncherHttpClient::new(
                manager,
                Duration::from_secs(5),
                Duration::from_secs(5),
                Duration::from_secs(5),
                10,
            )
            .unwrap(),
        );
        FileMuncherClient::with_transport(base, http).unwrap()
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let c = client("https://api.filemuncher.test/v1/");
        assert_eq!(
            c.endpoint(&["workspaces", "ws-1", "manifests", "m 2"]).unwrap(),
            "https://api.filemuncher.test/v1/workspaces/ws-1/manifests/m%202"
        );

        let c = client("https://api.filemuncher.test/v1");
        assert_eq!(
            c.endpoint(&["workspaces"]).unwrap(),
            "https://api.filemuncher.test/v1/workspaces"
        );
    }

    #[test]
    fn test_endpoint_encodes_slashes_in_ids() {
        let c = client("https://api.filemuncher.test");
        assert_eq!(
            c.endpoint(&["workspaces", "../admin"]).unwrap(),
            "https://api.filemuncher.test/workspaces/..%2Fadmin"
        );
    }

    #[test]
    fn test_rejects_non_base_url() {
        let manager = Arc::new(TokenManager::new(Arc::new(StaticProvider)));
        let http = Arc::new(
            FileMuncherHttpClient::new(
                manager,
                Duration::from_secs(5),
                Duration::from_secs(5),
                Duration::from_secs(5),
                10,
            )
            .unwrap(),
        );
        assert!(FileMuncherClient::with_transport("mailto:ops@example.com", http).is_err());
    }

    #[test]
    fn test_decode_shape_mismatch_is_parse_error() {
        let err = decode::<FileManifest>("https://api/x", serde_json::json!({"files": []}))
            .unwrap_err();
        match err {
            FileMuncherError::Http(e) => {
                assert!(e.is_parse_error());
                assert_eq!(e.status(), Some(200));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_encode_failure_is_not_a_config_error() {
        // JSON object keys must be strings
        let mut body = std::collections::BTreeMap::new();
        body.insert((1, 2), "x");

        let err = encode("https://api/workspaces", &body).unwrap_err();
        match err {
            FileMuncherError::Encode { endpoint, message } => {
                assert_eq!(endpoint, "https://api/workspaces");
                assert!(message.contains("key must be a string"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_new_validates_config() {
        let config = Config::new("not a url", "https://auth/token", "id", "secret");
        let err = FileMuncherClient::new(&config).err().unwrap();
        assert!(matches!(err, FileMuncherError::Config(_)));
    }
}
