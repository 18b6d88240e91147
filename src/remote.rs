//! Playback remote for one Spotify account per session.
//!
//! [`Remote`] is the narrow interface a host application calls into. It owns
//! the whole stack:
//!
//! ```text
//! Remote ── DeviceActivator ──┐
//!    │                        ├── Api ── Authenticator ── TokenStore ── Persistence
//!    └────────────────────────┘
//! ```
//!
//! Control commands first make sure a device is active, then send the
//! command, and finally turn well-known API failures into errors with a
//! message that tells the user what to do.
//!
//! # Example
//!
//! ```rust
//! use spotremote::{config::Config, remote::Remote, store::MemoryStore};
//!
//! let remote = Remote::new(&config, MemoryStore::default())?;
//! println!("open {}", remote.auth_url()?);
//!
//! remote.exchange_code_for_token(&session_id, &code).await?;
//! remote.pause(&session_id).await?;
//! ```

use std::{fmt, sync::Arc};

use reqwest::{Method, StatusCode};
use serde_json::Value;
use url::Url;

use crate::{
    api::Api,
    auth::{Authenticator, TokenStatus},
    config::Config,
    devices::{ActiveDevice, DeviceActivator},
    error::{ApiResult, Error, Result},
    http::Client as HttpClient,
    protocol::player::{self, Device, Playback},
    store::Persistence,
    tokens::{TokenRecord, TokenStore},
};

pub struct Remote {
    auth: Arc<Authenticator>,
    api: Arc<Api>,
    devices: DeviceActivator,
}

/// Playback control commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    Play,
    Pause,
    Skip,
}

impl Command {
    #[must_use]
    pub fn method(self) -> Method {
        match self {
            Self::Play | Self::Pause => Method::PUT,
            Self::Skip => Method::POST,
        }
    }

    #[must_use]
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Play => player::PLAY,
            Self::Pause => player::PAUSE,
            Self::Skip => player::NEXT,
        }
    }

    /// Message for a `403 Forbidden` answer to this command.
    fn forbidden(self) -> &'static str {
        match self {
            Self::Play => {
                "Cannot control playback: No active device found or premium required. \
                 Please start Spotify on a device first."
            }
            Self::Pause | Self::Skip => {
                "Cannot control playback: No active device found or premium required."
            }
        }
    }

    /// Turns API failures with a known meaning into errors for the user.
    ///
    /// * `403` - `Permission`: no active device or no premium subscription
    /// * `404` - `Device`: no active player
    /// * `401` - `Authentication`: the account needs to be reconnected
    ///
    /// Other errors pass through unchanged.
    #[must_use]
    pub fn translate(self, e: Error) -> Error {
        match e.status() {
            Some(StatusCode::FORBIDDEN) => Error::permission(self.forbidden()),
            Some(StatusCode::NOT_FOUND) => Error::device(Remote::NO_ACTIVE_PLAYER),
            Some(StatusCode::UNAUTHORIZED) => Error::authentication(Remote::RECONNECT),
            _ => e,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Play => write!(f, "play"),
            Self::Pause => write!(f, "pause"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

impl Remote {
    pub const NO_ACTIVE_PLAYER: &'static str =
        "No active Spotify device found. Please open Spotify on your device.";

    pub const RECONNECT: &'static str =
        "Authentication error. Please reconnect your Spotify account.";

    /// Creates a remote storing tokens in `persistence`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the HTTP client cannot be built.
    pub fn new<P>(config: &Config, persistence: P) -> Result<Self>
    where
        P: Persistence + 'static,
    {
        let http_client = Arc::new(HttpClient::new(config)?);
        let tokens = TokenStore::new(persistence);

        let auth = Arc::new(Authenticator::new(config, Arc::clone(&http_client), tokens));
        let api = Arc::new(Api::new(config, http_client, Arc::clone(&auth)));
        let devices = DeviceActivator::new(config, Arc::clone(&api));

        Ok(Self { auth, api, devices })
    }

    /// Low-level access to the request executor.
    #[must_use]
    pub fn api(&self) -> &Api {
        &self.api
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenStore {
        self.auth.tokens()
    }

    /// URL of the Spotify consent page.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the accounts URL is unusable.
    pub fn auth_url(&self) -> Result<Url> {
        self.auth.auth_url()
    }

    /// Completes the authorization redirect for `session_id`.
    ///
    /// # Errors
    ///
    /// Returns an `Authentication` error when Spotify rejects the code.
    pub async fn exchange_code_for_token(
        &self,
        session_id: &str,
        code: &str,
    ) -> Result<TokenRecord> {
        self.auth.exchange_code(session_id, code).await
    }

    /// Whether the session has usable tokens, refreshing them if expired.
    pub async fn is_authenticated(&self, session_id: &str) -> bool {
        self.auth.is_valid(session_id).await
    }

    pub async fn token_status(&self, session_id: &str) -> Result<TokenStatus> {
        self.auth.status(session_id).await
    }

    /// Forgets the tokens of `session_id`.
    pub fn logout(&self, session_id: &str) -> Result<()> {
        info!("logging out session {session_id}");
        self.tokens().delete(session_id)
    }

    /// What is playing right now, or `None` if nothing is.
    ///
    /// Does not require an active device.
    pub async fn get_current_playback(&self, session_id: &str) -> ApiResult<Option<Playback>> {
        self.api.get(session_id, player::CURRENTLY_PLAYING).await
    }

    pub async fn list_devices(&self, session_id: &str) -> Result<Vec<Device>> {
        self.devices.list_devices(session_id).await
    }

    pub async fn ensure_active_device(&self, session_id: &str) -> Result<ActiveDevice> {
        self.devices.ensure_active_device(session_id).await
    }

    /// Starts or resumes playback.
    pub async fn play(&self, session_id: &str) -> Result<()> {
        self.control(session_id, Command::Play).await.map(|_| ())
    }

    pub async fn pause(&self, session_id: &str) -> Result<()> {
        self.control(session_id, Command::Pause).await.map(|_| ())
    }

    /// Skips to the next track and returns whatever Spotify answered.
    pub async fn skip(&self, session_id: &str) -> Result<Value> {
        self.control(session_id, Command::Skip).await
    }

    /// Sends `command` after making sure a device will receive it.
    ///
    /// # Errors
    ///
    /// * `Device` - no device could be found or activated; nothing was sent
    /// * `Permission`, `Device` or `Authentication` - see [`Command::translate`]
    /// * any other error of [`Api::execute`]
    pub async fn control(&self, session_id: &str, command: Command) -> Result<Value> {
        let device = match self.devices.ensure_active_device(session_id).await {
            Ok(device) => device,
            Err(e) => {
                error!("cannot {command}: {e}");
                return Err(e);
            }
        };

        info!("attempting to {command} on device: {}", device.name());

        self.api
            .execute::<()>(session_id, command.method(), command.endpoint(), None)
            .await
            .map_err(|e| {
                let e = command.translate(e);
                error!("error on {command} for session {session_id}: {e}");
                e
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn forbidden_is_permission() {
        let e = Command::Play.translate(Error::api(StatusCode::FORBIDDEN, "Premium required"));
        assert_eq!(e.kind, ErrorKind::Permission);
        assert!(e.message().ends_with("Please start Spotify on a device first."));

        let e = Command::Pause.translate(Error::api(StatusCode::FORBIDDEN, "Premium required"));
        assert_eq!(
            e.message(),
            "Cannot control playback: No active device found or premium required."
        );
    }

    #[test]
    fn not_found_is_device() {
        let e = Command::Skip.translate(Error::api(StatusCode::NOT_FOUND, "Player not found"));
        assert_eq!(e.kind, ErrorKind::Device);
        assert_eq!(e.message(), Remote::NO_ACTIVE_PLAYER);
    }

    #[test]
    fn unauthorized_is_authentication() {
        let e = Command::Pause.translate(Error::api(StatusCode::UNAUTHORIZED, "expired"));
        assert_eq!(e.kind, ErrorKind::Authentication);
        assert_eq!(e.message(), Remote::RECONNECT);
    }

    #[test]
    fn other_errors_pass_through() {
        let e = Command::Play.translate(Error::api(StatusCode::BAD_GATEWAY, "upstream"));
        assert_eq!(e.kind, ErrorKind::Api);
        assert_eq!(e.status(), Some(StatusCode::BAD_GATEWAY));

        let e = Command::Play.translate(Error::connection("reset"));
        assert_eq!(e.kind, ErrorKind::Connection);
    }

    #[test]
    fn commands_map_to_endpoints() {
        assert_eq!(Command::Play.method(), Method::PUT);
        assert_eq!(Command::Pause.endpoint(), "player/pause");
        assert_eq!(Command::Skip.method(), Method::POST);
        assert_eq!(Command::Skip.endpoint(), "player/next");
    }
}
