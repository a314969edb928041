// FileMuncher backend client
//
// OAuth2 client-credentials token management plus an authenticated HTTP
// transport for the FileMuncher file-processing API.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http_client;
pub mod logging;
pub mod models;

pub use auth::{
    BearerToken, ClientCredentialsProvider, Clock, SystemClock, TokenGrant, TokenManager,
    TokenProvider,
};
pub use client::FileMuncherClient;
pub use config::Config;
pub use error::{FileMuncherError, HttpError, Result, TransportErrorKind};
pub use http_client::FileMuncherHttpClient;
