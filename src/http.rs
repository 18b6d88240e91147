//! HTTP client with rate limiting and fixed timeouts for the Spotify APIs.
//!
//! This module provides a wrapper around `reqwest::Client` that adds:
//! * A self-imposed request rate limit
//! * A 10-second timeout on every outbound call
//! * A consistent `User-Agent`
//!
//! There is no overall deadline across retries: a caller that retries three
//! times may wait up to three timeouts plus its backoff delays.
//!
//! # Example
//!
//! ```rust
//! use spotremote::http::Client;
//!
//! let client = Client::new(&config)?;
//! let request = client.request::<()>(Method::GET, url, "Bearer token", None)?;
//! let response = client.execute(request).await?;
//! ```

use std::{future::Future, num::NonZeroU32, time::Duration};

use futures_util::{FutureExt, TryFutureExt};
use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::{
    self,
    header::{HeaderValue, ACCEPT, AUTHORIZATION},
    Method, Url,
};
use serde::Serialize;

use crate::{config::Config, error::Result};

/// HTTP client with built-in rate limiting.
pub struct Client {
    /// Unlimited request client for special cases.
    ///
    /// Direct access to underlying client without rate limiting.
    pub unlimited: reqwest::Client,

    /// Rate limiter so that one process never floods the Web API.
    rate_limiter: DefaultDirectRateLimiter,
}

impl Client {
    /// Rolling window of the self-imposed rate limit.
    const RATE_LIMIT_INTERVAL: Duration = Duration::from_secs(30);

    /// Calls allowed per window. Bursts up to this number are allowed,
    /// further requests are delayed.
    const RATE_LIMIT_CALLS_PER_INTERVAL: u8 = 90;

    /// Duration to keep idle connections alive.
    const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Network I/O timeout of every outbound call.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    ///
    /// # Panics
    ///
    /// Panics if rate limit parameters are zero.
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .tcp_keepalive(Self::KEEPALIVE_TIMEOUT)
            .timeout(Self::REQUEST_TIMEOUT)
            .default_headers(headers)
            .user_agent(&config.user_agent);

        let replenish_interval =
            Self::RATE_LIMIT_INTERVAL / u32::from(Self::RATE_LIMIT_CALLS_PER_INTERVAL);
        let quota = Quota::with_period(replenish_interval)
            .expect("quota time interval is zero")
            .allow_burst(
                NonZeroU32::new(Self::RATE_LIMIT_CALLS_PER_INTERVAL.into())
                    .expect("calls per interval is zero"),
            );

        Ok(Self {
            unlimited: http_client.build()?,
            rate_limiter: governor::RateLimiter::direct(quota),
        })
    }

    /// Builds a request with an `Authorization` header and optional JSON
    /// body.
    ///
    /// # Errors
    ///
    /// Returns error if the authorization value is not a valid header or
    /// the body cannot be serialized.
    pub fn request<B>(
        &self,
        method: Method,
        url: Url,
        authorization: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Request>
    where
        B: Serialize + ?Sized,
    {
        let mut authorization = HeaderValue::from_str(authorization)?;
        authorization.set_sensitive(true);

        let bodiless = method == Method::GET;
        let mut builder = self
            .unlimited
            .request(method, url)
            .header(AUTHORIZATION, authorization);

        // Spotify wants a `Content-Length` on bodiless PUT and POST.
        builder = match body {
            Some(body) => builder.json(body),
            None if bodiless => builder,
            None => builder.body(""),
        };

        builder.build().map_err(Into::into)
    }

    /// Builds a url-encoded form POST, as the token endpoint expects.
    pub fn form<F>(&self, url: Url, form: &F) -> Result<reqwest::Request>
    where
        F: Serialize + ?Sized,
    {
        self.unlimited
            .post(url)
            .form(form)
            .build()
            .map_err(Into::into)
    }

    /// Executes a request with rate limiting.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// * The connection fails or times out
    /// * The response cannot be received
    pub fn execute(
        &self,
        request: reqwest::Request,
    ) -> impl Future<Output = Result<reqwest::Response>> + '_ {
        trace!("{} {}", request.method(), request.url());

        // No need to await with jitter because the level of concurrency is low.
        let throttle = self.rate_limiter.until_ready();
        throttle.then(|()| self.unlimited.execute(request).map_err(Into::into))
    }
}
