//! Wire types for the Spotify Accounts service and the Web API.
//!
//! # Submodules
//!
//! * [`auth`] - token endpoint requests and responses
//! * [`player`] - devices, playback state and playback transfer
//!
//! Both are plain `serde` types. Fields Spotify may omit are optional or
//! defaulted so that a sparse response still decodes.

pub mod auth;
pub mod player;

use crate::error::Result;
use serde::Deserialize;
use std::fmt::Debug;

/// Error body of the Web API:
///
/// ```json
/// {"error": {"status": 403, "message": "Player command failed: Premium required", "reason": "PREMIUM_REQUIRED"}}
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub status: Option<u16>,
    pub message: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Parses and logs JSON responses from Spotify.
///
/// # Arguments
///
/// * `body` - Response body text to parse
/// * `origin` - Description of API endpoint for logging
///
/// # Errors
///
/// Returns a `Parse` error if the body is not JSON or does not match `T`.
///
/// # Logging
///
/// * Success: Logs parsed structure at TRACE level
/// * Parse Error: Logs raw JSON at TRACE level if valid JSON
/// * Invalid JSON: Logs error and raw text at ERROR level
pub fn json<T>(body: &str, origin: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Debug,
{
    match serde_json::from_str(body) {
        Ok(result) => {
            trace!("{}: {result:#?}", origin);
            Ok(result)
        }
        Err(e) => {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
                trace!("{}: {json:#?}", origin);
            } else {
                error!("{}: failed parsing response ({e:?})", origin);
                trace!("{body}");
            }
            Err(e.into())
        }
    }
}
