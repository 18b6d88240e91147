//! Client configuration.
//!
//! [`Credentials`] identify this application to Spotify and are read from a
//! TOML secrets file:
//!
//! ```toml
//! client_id = "..."
//! client_secret = "..."
//! redirect_uri = "http://127.0.0.1:8000/spotify/redirect"
//! ```
//!
//! [`Config`] adds the endpoints, the requested scope, the `User-Agent` and
//! the retry budgets on top.

use std::{fs, io, path::Path};

use serde::Deserialize;
use url::Url;
use veil::Redact;

use crate::{error::Result, retry::Retries};

/// Application credentials registered with Spotify.
#[derive(Clone, Hash, PartialEq, Eq, Deserialize, Redact)]
pub struct Credentials {
    pub client_id: String,

    #[redact]
    pub client_secret: String,

    /// Must exactly match a redirect URI registered for the application.
    pub redirect_uri: Url,
}

impl Credentials {
    /// Secrets files are tiny; anything bigger is not one.
    const MAX_FILE_SIZE: u64 = 4096;

    /// Loads credentials from a TOML secrets file.
    ///
    /// # Errors
    ///
    /// Will return `Err` if:
    /// - the file cannot be read or is too large
    /// - the contents are not valid TOML
    /// - a key is missing or the redirect URI is not a URL
    pub fn from_file<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();

        let attributes = fs::metadata(path)?;
        if attributes.len() > Self::MAX_FILE_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} is too large", path.display()),
            )
            .into());
        }

        let contents = fs::read_to_string(path)?;
        contents.parse()
    }
}

impl std::str::FromStr for Credentials {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        let credentials: Self = toml::from_str(s)?;
        if credentials.client_id.is_empty() || credentials.client_secret.is_empty() {
            return Err(crate::error::Error::config(
                "client_id and client_secret must not be empty",
            ));
        }

        Ok(credentials)
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Config {
    pub app_name: String,
    pub app_version: String,

    pub credentials: Credentials,

    /// Space-separated OAuth scopes requested during authorization.
    pub scope: String,

    /// Base of the authorization server, serving `authorize` and `api/token`.
    pub accounts_url: Url,

    /// Base of the playback endpoints, e.g. `player/devices`.
    pub api_url: Url,

    pub user_agent: String,

    pub retries: Retries,
}

impl Config {
    /// Scopes needed to read and control playback.
    pub const DEFAULT_SCOPE: &'static str = "user-read-playback-state \
        user-modify-playback-state user-read-currently-playing";

    pub const ACCOUNTS_URL: &'static str = "https://accounts.spotify.com/";

    pub const API_URL: &'static str = "https://api.spotify.com/v1/me/";

    /// Configuration against the production Spotify endpoints.
    ///
    /// # Panics
    ///
    /// Panics if the built-in endpoint URLs are invalid.
    #[must_use]
    pub fn with_credentials(credentials: Credentials) -> Self {
        let app_name = env!("CARGO_PKG_NAME").to_owned();
        let app_version = env!("CARGO_PKG_VERSION").to_owned();

        let os_name = match std::env::consts::OS {
            "macos" => "osx",
            other => other,
        };
        let os_version = sysinfo::System::os_version().unwrap_or_else(|| String::from("0"));

        // Keep the `User-Agent` parseable: no separators inside the fields.
        let illegal_chars = |chr: char| chr == '/' || chr == ';';
        let os_version = os_version.replace(illegal_chars, "-");

        let user_agent = format!("{app_name}/{app_version} (Rust; {os_name}/{os_version})");
        trace!("user agent: {user_agent}");

        Self {
            app_name,
            app_version,
            credentials,
            scope: Self::DEFAULT_SCOPE.to_owned(),
            accounts_url: Url::parse(Self::ACCOUNTS_URL).expect("invalid accounts url"),
            api_url: Url::parse(Self::API_URL).expect("invalid api url"),
            user_agent,
            retries: Retries::default(),
        }
    }

    /// Points the client at other endpoints, e.g. a mock server.
    ///
    /// Both URLs get a trailing slash so that relative endpoints resolve
    /// below them.
    #[must_use]
    pub fn with_endpoints(mut self, accounts_url: Url, api_url: Url) -> Self {
        self.accounts_url = with_trailing_slash(accounts_url);
        self.api_url = with_trailing_slash(api_url);
        self
    }

    #[must_use]
    pub fn with_retries(mut self, retries: Retries) -> Self {
        self.retries = retries;
        self
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRETS: &str = r#"
        client_id = "id"
        client_secret = "very-secret"
        redirect_uri = "http://127.0.0.1:8000/spotify/redirect"
    "#;

    #[test]
    fn parses_secrets() {
        let credentials: Credentials = SECRETS.parse().unwrap();
        assert_eq!(credentials.client_id, "id");
        assert_eq!(credentials.client_secret, "very-secret");
        assert_eq!(credentials.redirect_uri.path(), "/spotify/redirect");
        assert!(!format!("{credentials:?}").contains("very-secret"));
    }

    #[test]
    fn rejects_missing_keys() {
        assert!("client_id = \"id\"".parse::<Credentials>().is_err());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.toml");
        fs::write(&path, SECRETS).unwrap();

        let credentials = Credentials::from_file(&path).unwrap();
        assert_eq!(credentials.client_id, "id");
    }

    #[test]
    fn endpoints_get_trailing_slash() {
        let config = Config::with_credentials(SECRETS.parse().unwrap()).with_endpoints(
            Url::parse("http://127.0.0.1:9000").unwrap(),
            Url::parse("http://127.0.0.1:9000/v1/me").unwrap(),
        );
        assert_eq!(config.accounts_url.as_str(), "http://127.0.0.1:9000/");
        assert_eq!(
            config.api_url.join("player/devices").unwrap().as_str(),
            "http://127.0.0.1:9000/v1/me/player/devices"
        );
    }

    #[test]
    fn default_endpoints() {
        let config = Config::with_credentials(SECRETS.parse().unwrap());
        assert_eq!(config.accounts_url.host_str(), Some("accounts.spotify.com"));
        assert!(config.user_agent.starts_with("spotremote/"));
        assert!(config.scope.contains("user-modify-playback-state"));
    }
}
