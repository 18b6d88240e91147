//! Authenticated requests against the Spotify Web API.
//!
//! [`Api::execute`] is the only place that talks to the playback endpoints.
//! For every call it:
//!
//! 1. makes sure the session is authenticated, refreshing an expired token
//! 2. sends the request with the session's bearer token
//! 3. retries network failures with 1s and 2s pauses
//! 4. on `401 Unauthorized`, refreshes the token once more and repeats the
//!    request after a short pause
//!
//! Any other non-success status is returned as an `Api` error carrying the
//! status, without retrying.

use std::{fmt::Debug, sync::Arc};

use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use url::Url;

use crate::{
    auth::Authenticator,
    config::Config,
    error::{ApiResult, Error},
    http::Client as HttpClient,
    protocol,
    retry::Retries,
};

pub struct Api {
    http_client: Arc<HttpClient>,
    auth: Arc<Authenticator>,
    api_url: Url,
    retries: Retries,
}

impl Api {
    #[must_use]
    pub fn new(config: &Config, http_client: Arc<HttpClient>, auth: Arc<Authenticator>) -> Self {
        Self {
            http_client,
            auth,
            api_url: config.api_url.clone(),
            retries: config.retries,
        }
    }

    /// Issues `method` on `endpoint` for `session_id`, with an optional JSON
    /// body.
    ///
    /// Returns the decoded JSON body, or `Value::Null` when the response has
    /// no body.
    ///
    /// # Errors
    ///
    /// * `Authentication` - the session has no usable tokens
    /// * `Connection` - every attempt failed at the network level
    /// * `Api` - Spotify answered with a non-success status
    /// * `Parse` - the response body is not JSON
    /// * `Request` - the attempt budget ran out otherwise
    pub async fn execute<B>(
        &self,
        session_id: &str,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> ApiResult<Value>
    where
        B: Serialize + ?Sized,
    {
        if !self.auth.is_valid(session_id).await {
            error!("session {session_id} is not authenticated with Spotify");
            return Err(Error::authentication(
                "User not authenticated with Spotify",
            ));
        }

        let mut tokens = self
            .auth
            .tokens()
            .get(session_id)?
            .ok_or_else(|| Error::authentication("No Spotify tokens found"))?;

        let url = self.api_url.join(endpoint)?;
        let policy = self.retries.request;

        for attempt in 0..policy.max_attempts {
            let request = self.http_client.request(
                method.clone(),
                url.clone(),
                &tokens.authorization(),
                body,
            )?;

            let response = match self.http_client.execute(request).await {
                Ok(response) => response,
                Err(e) if e.is_connection() => {
                    error!("connection error on {method} to {endpoint}: {e}");
                    if policy.backoff(attempt).await {
                        continue;
                    }
                    return Err(Error::connection(format!(
                        "Failed to connect to Spotify API: {}",
                        e.message()
                    )));
                }
                Err(e) => return Err(e),
            };

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED && policy.has_next(attempt) {
                warn!("{method} to {endpoint} was unauthorized, refreshing token");
                if let Ok(refreshed) = self.auth.refresh(session_id).await {
                    tokens = refreshed;
                    tokio::time::sleep(self.retries.reauthenticate_pause).await;
                    continue;
                }
            }

            if !status.is_success() {
                let message = Self::error_message(response).await;
                error!("request error on {method} to {endpoint}: {status}: {message}");
                return Err(Error::api(status, message));
            }

            let text = response.text().await?;
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }

            return protocol::json::<Value>(&text, endpoint).map_err(|e| {
                error!("JSON decode error for {endpoint}: {e}");
                Error::parse("Invalid response from Spotify API")
            });
        }

        Err(Error::request("All request attempts failed"))
    }

    /// Decoded GET of `endpoint`, or `None` when Spotify sent no content.
    ///
    /// # Errors
    ///
    /// As [`Api::execute`], plus `Parse` when the body does not match `T`.
    pub async fn get<T>(&self, session_id: &str, endpoint: &str) -> ApiResult<Option<T>>
    where
        T: DeserializeOwned + Debug,
    {
        match self
            .execute::<()>(session_id, Method::GET, endpoint, None)
            .await?
        {
            Value::Null => Ok(None),
            value => serde_json::from_value(value).map(Some).map_err(|e| {
                error!("unexpected response for {endpoint}: {e}");
                Error::parse("Invalid response from Spotify API")
            }),
        }
    }

    pub async fn put<B>(
        &self,
        session_id: &str,
        endpoint: &str,
        body: Option<&B>,
    ) -> ApiResult<Value>
    where
        B: Serialize + ?Sized,
    {
        self.execute(session_id, Method::PUT, endpoint, body).await
    }

    pub async fn post<B>(
        &self,
        session_id: &str,
        endpoint: &str,
        body: Option<&B>,
    ) -> ApiResult<Value>
    where
        B: Serialize + ?Sized,
    {
        self.execute(session_id, Method::POST, endpoint, body).await
    }

    /// Message of a Web API error body, falling back to the raw body and
    /// then to the status reason.
    async fn error_message(response: reqwest::Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if let Ok(error) = serde_json::from_str::<protocol::ErrorResponse>(&body) {
            return error.error.message;
        }

        if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_owned()
        } else {
            body
        }
    }
}
