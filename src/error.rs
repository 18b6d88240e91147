//! Error handling for spotremote.
//!
//! Every fallible operation returns an [`Error`]: a category ([`ErrorKind`])
//! plus the underlying cause. Low-level failures are converted into these
//! categories at the component boundary, so callers never see a raw
//! `reqwest` or `serde_json` error.
//!
//! # Error Categories
//!
//! * `Authentication` - no, expired or revoked credentials
//! * `Connection` - network failures and timeouts
//! * `Api` - non-success status from the playback API (see [`ApiStatus`])
//! * `Parse` - malformed response bodies
//! * `Device` - no usable playback device
//! * `Permission` - the account may not perform the control action
//! * `VoteRecording` - a caller failed to persist a skip vote
//! * `Request` - every attempt of a request failed
//!
//! # Example
//!
//! ```rust
//! use spotremote::error::{ApiStatus, Error, ErrorKind};
//!
//! fn describe(e: &Error) -> &'static str {
//!     match e.kind {
//!         ErrorKind::Api => match e.downcast::<ApiStatus>() {
//!             Some(status) if status.status.as_u16() == 403 => "premium required",
//!             _ => "api error",
//!         },
//!         ErrorKind::Device => "open Spotify on a device",
//!         _ => "something else",
//!     }
//! }
//! ```

use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type combining error kind and details.
#[derive(Debug)]
pub struct Error {
    /// Classification of the error
    pub kind: ErrorKind,

    /// Details of the underlying error
    pub error: Box<dyn std::error::Error + Send + Sync>,
}

impl Error {
    /// Attempts to downcast the underlying error to a concrete type.
    ///
    /// Used by the playback commands to recover the [`ApiStatus`] of a
    /// failed request.
    #[must_use]
    pub fn downcast<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.error.downcast_ref::<E>()
    }

    /// HTTP status of a failed API request, if that is what this error is.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.downcast::<ApiStatus>().map(|api| api.status)
    }

    /// Human-readable message without the kind prefix.
    #[must_use]
    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

/// Standard result type for spotremote operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result of a single playback API call: a decoded payload or a typed
/// failure.
pub type ApiResult<T> = Result<T>;

/// Error categories.
#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Copy, Debug, Eq, Error, Hash, Ord, PartialEq, PartialOrd)]
pub enum ErrorKind {
    /// No, expired or invalid tokens, or an unrecoverable refresh failure.
    #[error("authentication error")]
    Authentication,

    /// Connection refused, reset or timed out.
    #[error("connection error")]
    Connection,

    /// The playback API answered with a non-success status.
    #[error("API error")]
    Api,

    /// A response body could not be decoded.
    #[error("parse error")]
    Parse,

    /// No active or available playback device.
    #[error("device error")]
    Device,

    /// The account or caller lacks rights for the control action.
    #[error("permission denied")]
    Permission,

    /// Persisting a skip vote failed.
    #[error("vote recording error")]
    VoteRecording,

    /// Every attempt of a request failed.
    #[error("request failed")]
    Request,

    /// Configuration or persistence could not be used.
    #[error("configuration error")]
    Config,

    /// Should not happen during normal operation.
    #[error("internal error")]
    Internal,
}

/// Status and message of a non-success playback API response.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("Spotify API error: {status}: {message}")]
pub struct ApiStatus {
    pub status: StatusCode,
    pub message: String,
}

impl Error {
    pub fn new<E>(kind: ErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self {
            kind,
            error: error.into(),
        }
    }

    pub fn authentication<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Authentication, error)
    }

    pub fn connection<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Connection, error)
    }

    /// Creates an API error that keeps the status code for later matching.
    pub fn api(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Api,
            ApiStatus {
                status,
                message: message.into(),
            },
        )
    }

    pub fn parse<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Parse, error)
    }

    pub fn device<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Device, error)
    }

    pub fn permission<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Permission, error)
    }

    pub fn vote_recording<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::VoteRecording, error)
    }

    pub fn request<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Request, error)
    }

    pub fn config<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Config, error)
    }

    pub fn internal<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Internal, error)
    }

    /// Whether this error is a network-level failure worth retrying.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        self.kind == ErrorKind::Connection
    }
}

/// Returns the underlying error source.
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

/// Format: "{kind}: {details}"
impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}: ", self.kind)?;
        self.error.fmt(fmt)
    }
}

/// Converts IO errors from persistence and file loading.
///
/// Network-flavoured IO errors map to `Connection`, malformed data to
/// `Parse`, everything else to `Config`.
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind::{
            BrokenPipe, ConnectionAborted, ConnectionRefused, ConnectionReset, InvalidData,
            NotConnected, TimedOut, UnexpectedEof,
        };
        match err.kind() {
            ConnectionRefused | ConnectionReset | ConnectionAborted | NotConnected
            | BrokenPipe | TimedOut => Self::connection(err),
            InvalidData | UnexpectedEof => Self::parse(err),
            _ => Self::config(err),
        }
    }
}

/// Converts HTTP client errors into appropriate error kinds.
///
/// * Connect, timeout, request and body errors -> `Connection`
/// * Decode errors -> `Parse`
/// * Status errors -> `Api`
/// * Builder errors -> `Internal`
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::parse(err);
        }

        if let Some(status) = err.status() {
            return Self::api(status, err.to_string());
        }

        if err.is_builder() {
            return Self::internal(err);
        }

        if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() {
            return Self::connection(err);
        }

        Self::request(err)
    }
}

/// Converts JSON errors to `Parse`.
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::parse(err)
    }
}

/// Converts secrets file errors to `Config`.
impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::config(err)
    }
}

/// Converts invalid header errors to `Internal`.
impl From<http::header::InvalidHeaderValue> for Error {
    fn from(e: http::header::InvalidHeaderValue) -> Self {
        Self::internal(e.to_string())
    }
}

/// Converts URL parsing errors to `Config`.
impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Self::config(e.to_string())
    }
}

/// Converts mutex poisoning errors to `Internal`.
impl<T> From<std::sync::PoisonError<std::sync::MutexGuard<'_, T>>> for Error {
    fn from(e: std::sync::PoisonError<std::sync::MutexGuard<'_, T>>) -> Self {
        Self::internal(e.to_string())
    }
}
