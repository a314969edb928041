// Authentication module
// Acquires and caches the backend bearer token

mod clock;
mod manager;
mod provider;
mod types;

pub use clock::{Clock, SystemClock};
pub use manager::TokenManager;
pub use provider::{ClientCredentialsProvider, TokenProvider};
pub use types::{BearerToken, TokenGrant};
