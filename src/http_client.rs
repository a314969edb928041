use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{redirect, Client, Method, RequestBuilder, StatusCode, Url};
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::auth::TokenManager;
use crate::error::{FileMuncherError, HttpError, Result, TransportErrorKind};

/// Authenticated transport for the FileMuncher API
pub struct FileMuncherHttpClient {
    /// Client for JSON calls (redirects are not followed)
    api: Client,

    /// Client for file downloads (follows redirects)
    download: Client,

    /// Token manager
    token_manager: Arc<TokenManager>,

    /// Downloads from this origin carry the bearer token, all others go out bare
    api_base: Option<Url>,
}

impl FileMuncherHttpClient {
    /// Create a new HTTP client.
    ///
    /// Idle connections are not kept, so every call opens a fresh connection.
    pub fn new(
        token_manager: Arc<TokenManager>,
        connect_timeout: Duration,
        request_timeout: Duration,
        download_timeout: Duration,
        max_redirects: usize,
    ) -> Result<Self> {
        let api = Client::builder()
            .pool_max_idle_per_host(0)
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| FileMuncherError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let download = Client::builder()
            .pool_max_idle_per_host(0)
            .connect_timeout(connect_timeout)
            .timeout(download_timeout)
            .redirect(redirect::Policy::limited(max_redirects))
            .build()
            .map_err(|e| {
                FileMuncherError::Config(format!("Failed to create download client: {}", e))
            })?;

        Ok(Self {
            api,
            download,
            token_manager,
            api_base: None,
        })
    }

    /// Send the bearer token on downloads served from the API's own origin
    pub fn with_api_base(mut self, api_base_url: &str) -> Result<Self> {
        let url = Url::parse(api_base_url).map_err(|e| {
            FileMuncherError::Config(format!("invalid API URL \"{}\": {}", api_base_url, e))
        })?;
        self.api_base = Some(url);
        Ok(self)
    }

    /// The token manager this transport authenticates with
    pub fn token_manager(&self) -> &Arc<TokenManager> {
        &self.token_manager
    }

    /// POST a pre-serialized JSON body and parse the JSON response
    pub async fn post(&self, endpoint: &str, body: Option<&str>) -> Result<Value> {
        let body = body.unwrap_or_default().to_string();
        let builder = self
            .authorized(Method::POST, endpoint)
            .await?
            .header(CONTENT_LENGTH, body.len())
            .body(body);

        self.execute_json(Method::POST, endpoint, builder).await
    }

    /// GET and parse the JSON response
    pub async fn get(&self, endpoint: &str) -> Result<Value> {
        let builder = self.authorized(Method::GET, endpoint).await?;
        self.execute_json(Method::GET, endpoint, builder).await
    }

    /// DELETE and parse the JSON response
    pub async fn delete(&self, endpoint: &str) -> Result<Value> {
        let builder = self.authorized(Method::DELETE, endpoint).await?;
        self.execute_json(Method::DELETE, endpoint, builder).await
    }

    /// `Authorization` value for the current token, marked sensitive
    async fn bearer_header(&self) -> Result<HeaderValue> {
        let token = self.token_manager.get_backend_token().await?;

        let mut auth = HeaderValue::from_str(&token.authorization_value()).map_err(|_| {
            FileMuncherError::Authentication(
                "access token contains characters not allowed in a header".to_string(),
            )
        })?;
        auth.set_sensitive(true);
        Ok(auth)
    }

    /// Build a request carrying the current bearer token
    async fn authorized(&self, method: Method, endpoint: &str) -> Result<RequestBuilder> {
        let auth = self.bearer_header().await?;

        Ok(self
            .api
            .request(method, endpoint)
            .header(AUTHORIZATION, auth)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json"))
    }

    /// Send the request, require status 200 and parse the body as JSON
    async fn execute_json(
        &self,
        method: Method,
        endpoint: &str,
        builder: RequestBuilder,
    ) -> Result<Value> {
        tracing::debug!(method = %method, url = %endpoint, "Sending HTTP request");

        let response = builder.send().await.map_err(|e| {
            let error = HttpError::transport(endpoint, None, &e);
            tracing::error!(
                error_kind = %TransportErrorKind::from_reqwest(&e),
                error = %e,
                method = %method,
                url = %endpoint,
                "HTTP request failed"
            );
            error
        })?;

        let status = response.status();
        tracing::debug!(status = %status, url = %endpoint, "Received HTTP response");

        let body = response
            .text()
            .await
            .map_err(|e| HttpError::transport(endpoint, Some(status.as_u16()), &e))?;

        if status != StatusCode::OK {
            tracing::error!(
                status = status.as_u16(),
                method = %method,
                url = %endpoint,
                response_body = %body,
                "HTTP request failed with error response"
            );
            return Err(HttpError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            }
            .into());
        }

        match serde_json::from_str::<Value>(&body) {
            Ok(json) => Ok(json),
            Err(e) => {
                tracing::error!(
                    method = %method,
                    url = %endpoint,
                    error = %e,
                    "Response body is not valid JSON"
                );
                Err(HttpError::Parse {
                    endpoint: endpoint.to_string(),
                    status: status.as_u16(),
                    body,
                    message: e.to_string(),
                }
                .into())
            }
        }
    }

    /// Download `url` to `destination`, creating the parent directory if needed.
    ///
    /// The body is streamed to a sibling `.part` file which is renamed into place
    /// once the transfer completes; on failure the partial file is removed.
    /// Creating the `.part` file is the writability check, so an unwritable
    /// destination fails before any request is sent.
    pub async fn download_file(&self, url: &str, destination: impl AsRef<Path>) -> Result<()> {
        let destination = destination.as_ref();
        prepare_destination(url, destination).await?;

        let part_path = part_path(destination);
        let mut file = tokio::fs::File::create(&part_path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::PermissionDenied => {
                    FileMuncherError::DestinationNotWriteable(parent_dir(destination))
                }
                _ => download_failed(url, format!("failed to create {}: {}", part_path.display(), e)),
            })?;

        let mut result = self.download_into(url, &mut file).await;
        drop(file);

        if result.is_ok() {
            if let Err(e) = tokio::fs::rename(&part_path, destination).await {
                result = Err(download_failed(
                    url,
                    format!("failed to move download into {}: {}", destination.display(), e),
                ));
            }
        }

        match result {
            Ok(bytes) => {
                tracing::info!(
                    url = %url,
                    path = %destination.display(),
                    bytes = bytes,
                    "Download complete"
                );
                Ok(())
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&part_path).await {
                    tracing::warn!(
                        path = %part_path.display(),
                        error = %cleanup,
                        "Failed to remove partial download"
                    );
                }
                Err(e)
            }
        }
    }

    /// Download `url` into an already open writer
    pub async fn download_to_writer<W>(&self, url: &str, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        self.download_into(url, writer).await
    }

    async fn download_into<W>(&self, url: &str, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut request = self.download.get(url);
        if self.is_api_origin(url) {
            // reqwest drops Authorization when a redirect leaves the origin host
            request = request.header(AUTHORIZATION, self.bearer_header().await?);
        }
        tracing::debug!(url = %url, "Starting download");

        let response = request
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error_kind = %TransportErrorKind::from_reqwest(&e),
                    error = %e,
                    url = %url,
                    "Download request failed"
                );
                download_failed(url, e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(status = status.as_u16(), url = %url, "Download rejected");
            return Err(download_failed(url, format!("HTTP status {}", status)));
        }

        write_stream(url, response.bytes_stream(), writer).await
    }

    fn is_api_origin(&self, url: &str) -> bool {
        match (&self.api_base, Url::parse(url)) {
            (Some(base), Ok(target)) => base.origin() == target.origin(),
            _ => false,
        }
    }
}

/// Copy a byte stream into the writer, returning the number of bytes written
async fn write_stream<S, W>(url: &str, stream: S, writer: &mut W) -> Result<u64>
where
    S: Stream<Item = reqwest::Result<Bytes>>,
    W: AsyncWrite + Unpin,
{
    futures::pin_mut!(stream);
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| download_failed(url, e.to_string()))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| download_failed(url, format!("write failed: {}", e)))?;
        written += chunk.len() as u64;
    }
    writer
        .flush()
        .await
        .map_err(|e| download_failed(url, format!("flush failed: {}", e)))?;

    Ok(written)
}

/// Create the parent directory (mode 0775) if missing and check it is a directory
async fn prepare_destination(url: &str, destination: &Path) -> Result<()> {
    let dir = parent_dir(destination);

    if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
        tracing::debug!(path = %dir.display(), "Creating download directory");
        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o775);
        builder.create(&dir).await.map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => FileMuncherError::DestinationNotWriteable(dir.clone()),
            _ => download_failed(url, format!("failed to create {}: {}", dir.display(), e)),
        })?;
    }

    let metadata = tokio::fs::metadata(&dir)
        .await
        .map_err(|_| FileMuncherError::DestinationNotWriteable(dir.clone()))?;
    if !metadata.is_dir() {
        tracing::warn!(path = %dir.display(), "Download destination is not a directory");
        return Err(FileMuncherError::DestinationNotWriteable(dir));
    }

    Ok(())
}

fn parent_dir(destination: &Path) -> PathBuf {
    match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    destination.with_file_name(name)
}

fn download_failed(url: &str, message: String) -> FileMuncherError {
    FileMuncherError::DownloadFailed {
        url: url.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir(Path::new("/srv/out/a.mp4")), PathBuf::from("/srv/out"));
        assert_eq!(parent_dir(Path::new("a.mp4")), PathBuf::from("."));
    }

    #[test]
    fn test_part_path() {
        assert_eq!(
            part_path(Path::new("/srv/out/a.mp4")),
            PathBuf::from("/srv/out/a.mp4.part")
        );
    }

    #[tokio::test]
    async fn test_write_stream_counts_bytes() {
        let chunks: Vec<reqwest::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"hello ")),
            Ok(Bytes::from_static(b"world")),
        ];
        let mut out: Vec<u8> = Vec::new();

        let written = write_stream("https://cdn/x", futures::stream::iter(chunks), &mut out)
            .await
            .unwrap();

        assert_eq!(written, 11);
        assert_eq!(out, b"hello world");
    }

    #[tokio::test]
    async fn test_prepare_destination_creates_nested_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("a/b/c/file.bin");

        prepare_destination("https://cdn/x", &dest).await.unwrap();
        assert!(tmp.path().join("a/b/c").is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(tmp.path().join("a/b/c"))
                .unwrap()
                .permissions()
                .mode();
            // umask may clear bits, never add them
            assert_eq!(mode & 0o777 & !0o775, 0);
        }
    }

    fn transport() -> FileMuncherHttpClient {
        use crate::auth::{TokenGrant, TokenProvider};

        struct StaticProvider;

        #[async_trait::async_trait]
        impl TokenProvider for StaticProvider {
            async fn fetch_token(&self) -> Result<TokenGrant> {
                Ok(TokenGrant::new("tok", chrono::Duration::hours(1)))
            }
        }

        let manager = Arc::new(TokenManager::new(Arc::new(StaticProvider)));
        let timeout = Duration::from_secs(5);
        FileMuncherHttpClient::new(manager, timeout, timeout, timeout, 10).unwrap()
    }

    #[test]
    fn test_is_api_origin() {
        let http = transport()
            .with_api_base("https://api.filemuncher.test/v1/")
            .unwrap();

        assert!(http.is_api_origin("https://api.filemuncher.test/files/a.mp4"));
        assert!(!http.is_api_origin("https://cdn.filemuncher.test/files/a.mp4"));
        assert!(!http.is_api_origin("http://api.filemuncher.test/files/a.mp4"));
        assert!(!http.is_api_origin("https://api.filemuncher.test:8443/files/a.mp4"));
        assert!(!http.is_api_origin("not a url"));

        // Without an API base nothing is trusted
        assert!(!transport().is_api_origin("https://api.filemuncher.test/files/a.mp4"));
    }

    #[tokio::test]
    async fn test_prepare_destination_rejects_file_as_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("plain");
        std::fs::write(&file, b"x").unwrap();

        let err = prepare_destination("https://cdn/x", &file.join("child.bin"))
            .await
            .unwrap_err();
        assert!(matches!(err, FileMuncherError::DestinationNotWriteable(_)));
    }
}
