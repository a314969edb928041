// Authentication types

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Backend bearer token issued by the OAuth provider.
///
/// Immutable once issued. A refresh produces a new value instead of mutating
/// the cached one. The token string is only reachable from inside the crate and
/// `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl BearerToken {
    pub(crate) fn new(access_token: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token,
            expires_at,
        }
    }

    /// Absolute expiration time
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Expiry is exact: a token is expired from `expires_at` onward
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub(crate) fn secret(&self) -> &str {
        &self.access_token
    }

    /// Value for the `Authorization` header
    pub(crate) fn authorization_value(&self) -> String {
        format!("Bearer {}", self.secret())
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token as handed out by a provider: the secret plus its time-to-live.
/// The manager turns it into a [`BearerToken`] with an absolute expiry.
#[derive(Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: Duration,
}

impl TokenGrant {
    pub fn new(access_token: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            access_token: access_token.into(),
            expires_in,
        }
    }
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// OAuth2 client-credentials token response
#[derive(Deserialize)]
pub struct ClientCredentialsResponse {
    pub access_token: String,
    pub expires_in: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_is_exact() {
        let now = Utc::now();
        let token = BearerToken::new("abc".to_string(), now + Duration::seconds(10));

        assert!(!token.is_expired_at(now));
        assert!(!token.is_expired_at(now + Duration::seconds(9)));
        assert!(token.is_expired_at(now + Duration::seconds(10)));
        assert!(token.is_expired_at(now + Duration::seconds(11)));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let token = BearerToken::new("super-secret-value".to_string(), Utc::now());
        let printed = format!("{:?}", token);
        assert!(!printed.contains("super-secret-value"));
        assert!(printed.contains("<redacted>"));

        let grant = TokenGrant::new("super-secret-value", Duration::seconds(60));
        assert!(!format!("{:?}", grant).contains("super-secret-value"));
    }

    #[test]
    fn test_authorization_value() {
        let token = BearerToken::new("tok-123".to_string(), Utc::now());
        assert_eq!(token.authorization_value(), "Bearer tok-123");
        assert_eq!(token.secret(), "tok-123");
    }

    #[test]
    fn test_parse_client_credentials_response() {
        let data: ClientCredentialsResponse = serde_json::from_str(
            r#"{"access_token":"eyJ.abc","token_type":"Bearer","expires_in":3600,"scope":"api"}"#,
        )
        .unwrap();
        assert_eq!(data.access_token, "eyJ.abc");
        assert_eq!(data.expires_in, Some(3600));
    }
}
