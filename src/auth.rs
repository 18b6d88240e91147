//! Authorization against the Spotify Accounts service.
//!
//! [`Authenticator`] builds the authorization URL, exchanges authorization
//! codes for tokens and keeps tokens fresh:
//!
//! * Refreshes are attempted up to three times with 1s and 2s pauses.
//! * A `400 Bad Request`, or an error body describing an invalid token,
//!   means the refresh token is dead: the stored record is deleted at once
//!   so the session reads as unauthenticated from then on.
//! * Network failures and other statuses are retried. When the budget runs
//!   out the record is left alone, since the token may well still be good.

use std::{sync::Arc, time::Duration};

use reqwest::StatusCode;
use url::Url;

use crate::{
    config::{Config, Credentials},
    error::{Error, ErrorKind, Result},
    http::Client as HttpClient,
    protocol::{
        self,
        auth::{Grant, Reply, Token},
    },
    retry::RetryPolicy,
    tokens::{TokenRecord, TokenStore},
};

pub struct Authenticator {
    http_client: Arc<HttpClient>,
    tokens: TokenStore,
    credentials: Credentials,
    scope: String,
    accounts_url: Url,
    policy: RetryPolicy,
}

/// Authentication state of a session, for display to the user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TokenStatus {
    /// A token record exists and could be used or refreshed.
    pub authenticated: bool,

    /// The stored access token has not expired yet.
    pub has_valid_token: bool,

    /// Remaining lifetime of the access token.
    pub expires_in: Duration,
}

impl Authenticator {
    /// Path of the interactive authorization page.
    const AUTHORIZE_PATH: &'static str = "authorize";

    /// Path of the token endpoint.
    const TOKEN_PATH: &'static str = "api/token";

    #[must_use]
    pub fn new(config: &Config, http_client: Arc<HttpClient>, tokens: TokenStore) -> Self {
        Self {
            http_client,
            tokens,
            credentials: config.credentials.clone(),
            scope: config.scope.clone(),
            accounts_url: config.accounts_url.clone(),
            policy: config.retries.refresh,
        }
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// URL to send the user to for granting access.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the accounts URL cannot be joined.
    pub fn auth_url(&self) -> Result<Url> {
        let mut url = self.accounts_url.join(Self::AUTHORIZE_PATH)?;
        url.query_pairs_mut()
            .append_pair("scope", &self.scope)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", self.credentials.redirect_uri.as_str())
            .append_pair("client_id", &self.credentials.client_id);

        debug!("generated auth url with scopes: {}", self.scope);
        Ok(url)
    }

    /// Exchanges an authorization code for tokens and stores them for
    /// `session_id`.
    ///
    /// This is a single attempt: the code is single-use, so failures are
    /// reported immediately.
    ///
    /// # Errors
    ///
    /// Will return `Err` if:
    /// - the request fails or times out
    /// - Spotify rejects the code
    /// - the response lacks an access or refresh token
    pub async fn exchange_code(&self, session_id: &str, code: &str) -> Result<TokenRecord> {
        info!("exchanging auth code for token");

        let grant = Grant::AuthorizationCode {
            code,
            redirect_uri: self.credentials.redirect_uri.as_str(),
            client_id: &self.credentials.client_id,
            client_secret: &self.credentials.client_secret,
        };
        let (status, body) = self.post_grant(&grant).await?;

        if !status.is_success() {
            error!("token exchange failed with {status}");
            return Err(Error::authentication(format!(
                "token exchange failed with {status}: {body}"
            )));
        }

        match protocol::json::<Reply>(&body, Self::TOKEN_PATH)? {
            Reply::Error(e) => {
                error!("token exchange error: {}", e.description());
                Err(Error::authentication(format!(
                    "token exchange error: {}",
                    e.description()
                )))
            }
            Reply::Token(Token {
                access_token,
                token_type,
                expires_in,
                refresh_token: Some(refresh_token),
                ..
            }) if !access_token.is_empty() && !refresh_token.is_empty() => {
                info!("storing Spotify tokens for session {session_id}");
                self.tokens.upsert(
                    session_id,
                    &access_token,
                    &token_type,
                    expires_in,
                    &refresh_token,
                )
            }
            Reply::Token(_) => {
                error!("missing access or refresh token in token response");
                Err(Error::authentication(
                    "missing access or refresh token in token response",
                ))
            }
        }
    }

    /// Exchanges the stored refresh token of `session_id` for a new access
    /// token.
    ///
    /// # Errors
    ///
    /// Will return `Err` if:
    /// - no tokens are stored for the session
    /// - the refresh token is invalid, in which case the record is deleted
    /// - every attempt failed, in which case the record is kept
    pub async fn refresh(&self, session_id: &str) -> Result<TokenRecord> {
        let Some(record) = self.tokens.get(session_id)? else {
            error!("no tokens found for session {session_id}");
            return Err(Error::authentication(format!(
                "no tokens found for session {session_id}"
            )));
        };

        let result = self
            .policy
            .run(|_| self.try_refresh(&record), Self::is_transient)
            .await;

        if let Err(ref e) = result {
            error!("failed to refresh token for session {session_id}: {e}");
        }

        result
    }

    /// Failures worth another refresh attempt.
    fn is_transient(e: &Error) -> bool {
        matches!(
            e.kind,
            ErrorKind::Connection | ErrorKind::Api | ErrorKind::Parse | ErrorKind::Request
        )
    }

    async fn try_refresh(&self, record: &TokenRecord) -> Result<TokenRecord> {
        let grant = Grant::RefreshToken {
            refresh_token: &record.refresh_token,
            client_id: &self.credentials.client_id,
            client_secret: &self.credentials.client_secret,
        };

        let (status, body) = match self.post_grant(&grant).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("connection error when refreshing token: {e}");
                return Err(e);
            }
        };

        if status == StatusCode::BAD_REQUEST {
            error!("token refresh failed with 400 Bad Request: invalid refresh token");
            self.tokens.delete(&record.session_id)?;
            return Err(Error::authentication("refresh token is invalid"));
        }

        if !status.is_success() {
            warn!("token refresh failed with {status}");
            return Err(Error::api(status, body));
        }

        match protocol::json::<Reply>(&body, Self::TOKEN_PATH)? {
            Reply::Error(e) => {
                error!("Spotify API error: {}", e.description());
                if e.is_invalid_token() {
                    self.tokens.delete(&record.session_id)?;
                    return Err(Error::authentication(e.description().to_owned()));
                }
                Err(Error::request(e.description().to_owned()))
            }
            Reply::Token(token) => {
                // Spotify only sometimes rotates the refresh token.
                let refresh_token = token
                    .refresh_token
                    .as_deref()
                    .unwrap_or(&record.refresh_token);

                let refreshed = self.tokens.upsert(
                    &record.session_id,
                    &token.access_token,
                    &token.token_type,
                    token.expires_in,
                    refresh_token,
                )?;
                debug!("refreshed {refreshed}");

                Ok(refreshed)
            }
        }
    }

    async fn post_grant(&self, grant: &Grant<'_>) -> Result<(StatusCode, String)> {
        let url = self.accounts_url.join(Self::TOKEN_PATH)?;
        let request = self.http_client.form(url, grant)?;

        let response = self.http_client.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;

        Ok((status, body))
    }

    /// Whether `session_id` holds usable credentials, refreshing an expired
    /// access token first.
    ///
    /// A session whose refresh fails is reported as unauthenticated, even
    /// when the record survives a transient failure.
    pub async fn is_valid(&self, session_id: &str) -> bool {
        let record = match self.tokens.get(session_id) {
            Ok(Some(record)) => record,
            Ok(None) => return false,
            Err(e) => {
                error!("failed to look up tokens for session {session_id}: {e}");
                return false;
            }
        };

        if !record.is_expired() {
            return true;
        }

        info!("token expired for session {session_id}, refreshing");
        match self.refresh(session_id).await {
            Ok(_) => true,
            Err(e) => {
                warn!(
                    "reporting session {session_id} as unauthenticated after failed refresh: {e}"
                );
                false
            }
        }
    }

    /// Authentication state including the remaining token lifetime.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the token store cannot be read.
    pub async fn status(&self, session_id: &str) -> Result<TokenStatus> {
        if !self.is_valid(session_id).await {
            return Ok(TokenStatus::default());
        }

        Ok(self
            .tokens
            .get(session_id)?
            .map_or_else(TokenStatus::default, |record| TokenStatus {
                authenticated: true,
                has_valid_token: !record.is_expired(),
                expires_in: record.time_to_live(),
            }))
    }
}
