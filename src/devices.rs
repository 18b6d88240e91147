//! Playback device discovery and activation.
//!
//! Control commands only work while some device is active. Before sending
//! one, [`DeviceActivator::ensure_active_device`] looks for an active device
//! and, failing that, transfers playback to the first listed device:
//!
//! ```text
//! round 1..=2:
//!     fetch devices   -- failure: pause 1s, next round
//!     any active?     -- done
//!     any listed?     -- transfer to the first one, 2 attempts 1s apart
//!     pause 2s
//! ```
//!
//! Only one candidate is ever tried per round. There is no preference for
//! the last used device or any device type.

use std::{fmt, sync::Arc};

use crate::{
    api::Api,
    config::Config,
    error::{Error, Result},
    protocol::player::{self, Device, Devices, Transfer},
    retry::Retries,
};

pub struct DeviceActivator {
    api: Arc<Api>,
    retries: Retries,
}

/// A device ready to receive playback commands.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ActiveDevice {
    pub device: Device,

    /// `true` if playback was transferred, `false` if the device already
    /// was active.
    pub activated: bool,
}

impl ActiveDevice {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.device.name
    }

    #[must_use]
    pub fn message(&self) -> String {
        if self.activated {
            format!("Activated Spotify on {}", self.name())
        } else {
            "Active device found".to_owned()
        }
    }
}

impl fmt::Display for ActiveDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.device)
    }
}

impl DeviceActivator {
    pub const NO_DEVICES: &'static str =
        "No Spotify devices found. Please open Spotify on any device and try again.";

    pub const ACTIVATION_FAILED: &'static str =
        "Failed to activate Spotify device. Please manually start playback on your device.";

    pub const FETCH_FAILED: &'static str = "Failed to retrieve Spotify devices";

    #[must_use]
    pub fn new(config: &Config, api: Arc<Api>) -> Self {
        Self {
            api,
            retries: config.retries,
        }
    }

    /// Devices currently known to Spotify, in the order Spotify lists them.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the device list could not be fetched.
    pub async fn list_devices(&self, session_id: &str) -> Result<Vec<Device>> {
        match self.api.get::<Devices>(session_id, player::DEVICES).await {
            Ok(devices) => Ok(devices.unwrap_or_default().devices),
            Err(e) => {
                error!("error getting devices for session {session_id}: {e}");
                Err(e)
            }
        }
    }

    /// Finds an active device, activating the first listed one if needed.
    ///
    /// # Errors
    ///
    /// Returns a `Device` error with a message for the user if:
    /// - the device list could not be fetched in any round
    /// - no device is listed
    /// - no device could be activated
    pub async fn ensure_active_device(&self, session_id: &str) -> Result<ActiveDevice> {
        let policy = self.retries.activation;
        let mut devices = Vec::new();

        for round in 0..policy.max_attempts {
            devices = match self.list_devices(session_id).await {
                Ok(devices) => devices,
                Err(_) if policy.has_next(round) => {
                    warn!(
                        "failed to get devices, retrying (attempt {}/{})",
                        round + 1,
                        policy.max_attempts
                    );
                    tokio::time::sleep(self.retries.device_fetch_pause).await;
                    continue;
                }
                Err(_) => return Err(Error::device(Self::FETCH_FAILED)),
            };

            if let Some(device) = devices.iter().find(|device| device.is_active) {
                info!("found active Spotify device: {}", device.name);
                return Ok(ActiveDevice {
                    device: device.clone(),
                    activated: false,
                });
            }

            if let Some(candidate) = devices.first() {
                info!(
                    "no active device found, attempting to activate {}",
                    candidate.name
                );
                if self.transfer(session_id, candidate).await.is_ok() {
                    info!("successfully activated device: {}", candidate.name);
                    return Ok(ActiveDevice {
                        device: candidate.clone(),
                        activated: true,
                    });
                }
            }

            if policy.has_next(round) {
                warn!(
                    "no active Spotify devices found, retrying (attempt {}/{})",
                    round + 1,
                    policy.max_attempts
                );
                policy.backoff(round).await;
            }
        }

        if devices.is_empty() {
            Err(Error::device(Self::NO_DEVICES))
        } else {
            Err(Error::device(Self::ACTIVATION_FAILED))
        }
    }

    /// Moves playback to `device` without starting it.
    async fn transfer(&self, session_id: &str, device: &Device) -> Result<()> {
        let Some(id) = device.id.as_deref() else {
            warn!("device {} has no id and cannot be activated", device.name);
            return Err(Error::device(format!("{} has no device id", device.name)));
        };

        let body = Transfer {
            device_ids: [id],
            play: false,
        };

        let policy = self.retries.transfer;
        policy
            .run(
                |attempt| {
                    let body = &body;
                    async move {
                        let result = self.api.put(session_id, player::TRANSFER, Some(body)).await;
                        if let Err(ref e) = result {
                            warn!(
                                "failed to activate device (attempt {}/{}): {e}",
                                attempt + 1,
                                policy.max_attempts
                            );
                        }
                        result
                    }
                },
                |_| true,
            )
            .await
            .map(|_| ())
    }
}
