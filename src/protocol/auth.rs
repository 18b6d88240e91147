//! Token endpoint types of the Spotify Accounts service.
//!
//! Both grants are posted url-encoded to `api/token`:
//!
//! ```text
//! grant_type=authorization_code&code=...&redirect_uri=...&client_id=...&client_secret=...
//! grant_type=refresh_token&refresh_token=...&client_id=...&client_secret=...
//! ```
//!
//! # Example Responses
//!
//! ```json
//! {
//!     "access_token": "secret_token",
//!     "token_type": "Bearer",
//!     "scope": "user-read-playback-state",
//!     "expires_in": 3600,
//!     "refresh_token": "secret_refresh_token"
//! }
//! ```
//!
//! ```json
//! {
//!     "error": "invalid_grant",
//!     "error_description": "Invalid refresh token"
//! }
//! ```

use std::{sync::LazyLock, time::Duration};

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use veil::Redact;

/// Form body of a token request.
#[derive(Clone, PartialEq, Eq, Serialize, Redact)]
#[serde(tag = "grant_type", rename_all = "snake_case")]
pub enum Grant<'a> {
    AuthorizationCode {
        #[redact]
        code: &'a str,
        redirect_uri: &'a str,
        client_id: &'a str,
        #[redact]
        client_secret: &'a str,
    },
    RefreshToken {
        #[redact]
        refresh_token: &'a str,
        client_id: &'a str,
        #[redact]
        client_secret: &'a str,
    },
}

/// Successful token response.
#[serde_as]
#[derive(Clone, PartialEq, Eq, Deserialize, Redact)]
pub struct Token {
    #[redact]
    pub access_token: String,

    #[serde(default = "Token::default_token_type")]
    pub token_type: String,

    #[serde(default)]
    pub scope: Option<String>,

    #[serde_as(as = "DurationSeconds<u64>")]
    pub expires_in: Duration,

    /// Absent when Spotify does not rotate the refresh token.
    #[redact]
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl Token {
    fn default_token_type() -> String {
        "Bearer".to_owned()
    }
}

/// OAuth error body.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    pub error: String,

    #[serde(default)]
    pub error_description: Option<String>,
}

/// Any body the token endpoint returns.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Error(ErrorBody),
    Token(Token),
}

/// Matches error descriptions that mean the refresh token itself is dead.
static INVALID_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)invalid.*token|token.*invalid").expect("invalid token pattern")
});

impl ErrorBody {
    #[must_use]
    pub fn description(&self) -> &str {
        self.error_description.as_deref().unwrap_or("Unknown error")
    }

    /// Whether the error says the refresh token is invalid, after which
    /// retrying is pointless.
    #[must_use]
    pub fn is_invalid_token(&self) -> bool {
        self.error_description
            .as_deref()
            .is_some_and(|description| INVALID_TOKEN.is_match(description))
    }
}
