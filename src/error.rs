// Error handling module
// Defines the client error types and transport failure classification

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Maximum number of response body characters rendered in error messages.
/// The full body stays available through [`HttpError::body`].
const BODY_SNIPPET_CHARS: usize = 512;

/// Errors returned by the FileMuncher client
#[derive(Error, Debug)]
pub enum FileMuncherError {
    /// Token acquisition against the OAuth provider failed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authenticated API call failed
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Download destination directory exists but cannot be written
    #[error("Destination is not writeable: {}", .0.display())]
    DestinationNotWriteable(PathBuf),

    /// Streaming download failed
    #[error("Download of \"{url}\" failed: {message}")]
    DownloadFailed { url: String, message: String },

    /// Request model could not be serialized to JSON
    #[error("Failed to encode request body for \"{endpoint}\": {message}")]
    Encode { endpoint: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failure of an authenticated JSON call
#[derive(Error, Debug)]
pub enum HttpError {
    /// Connection, DNS, timeout or body read failure
    #[error("call to URL \"{endpoint}\" failed ({kind}): {message}")]
    Transport {
        endpoint: String,
        status: Option<u16>,
        kind: TransportErrorKind,
        message: String,
    },

    /// Response arrived with a status other than 200
    #[error(
        "call to URL \"{endpoint}\" failed with status {status}, response \"{}\"",
        snippet(.body)
    )]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Status 200 but the body is not valid JSON
    #[error(
        "call to URL \"{endpoint}\" returned invalid JSON: {message}, response \"{}\"",
        snippet(.body)
    )]
    Parse {
        endpoint: String,
        status: u16,
        body: String,
        message: String,
    },
}

impl HttpError {
    /// URL of the failed call
    pub fn endpoint(&self) -> &str {
        match self {
            HttpError::Transport { endpoint, .. }
            | HttpError::Status { endpoint, .. }
            | HttpError::Parse { endpoint, .. } => endpoint,
        }
    }

    /// HTTP status, if a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Transport { status, .. } => *status,
            HttpError::Status { status, .. } | HttpError::Parse { status, .. } => Some(*status),
        }
    }

    /// Raw response body, if one was read
    pub fn body(&self) -> Option<&str> {
        match self {
            HttpError::Transport { .. } => None,
            HttpError::Status { body, .. } | HttpError::Parse { body, .. } => Some(body),
        }
    }

    /// True for the invalid-JSON variant
    pub fn is_parse_error(&self) -> bool {
        matches!(self, HttpError::Parse { .. })
    }

    /// Build a transport error from a reqwest failure
    pub(crate) fn transport(endpoint: &str, status: Option<u16>, err: &reqwest::Error) -> Self {
        HttpError::Transport {
            endpoint: endpoint.to_string(),
            status,
            kind: TransportErrorKind::from_reqwest(err),
            message: err.to_string(),
        }
    }
}

/// Coarse category of a reqwest failure, used in errors and log fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Redirect,
    Request,
    Body,
    Decode,
    Other,
}

impl TransportErrorKind {
    /// Categorize the error for better debugging
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_redirect() {
            TransportErrorKind::Redirect
        } else if err.is_request() {
            TransportErrorKind::Request
        } else if err.is_body() {
            TransportErrorKind::Body
        } else if err.is_decode() {
            TransportErrorKind::Decode
        } else {
            TransportErrorKind::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connect => "connection_failed",
            TransportErrorKind::Redirect => "redirect_error",
            TransportErrorKind::Request => "request_error",
            TransportErrorKind::Body => "body_error",
            TransportErrorKind::Decode => "decode_error",
            TransportErrorKind::Other => "unknown",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Truncate a body for display, on a char boundary
fn snippet(body: &str) -> String {
    match body.char_indices().nth(BODY_SNIPPET_CHARS) {
        Some((idx, _)) => format!("{}... ({} bytes total)", &body[..idx], body.len()),
        None => body.to_string(),
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, FileMuncherError>;
