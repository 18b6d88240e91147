//! Player endpoint types of the Spotify Web API.
//!
//! Endpoints are relative to `https://api.spotify.com/v1/me/`:
//!
//! | Request                     | Body / Response          |
//! |-----------------------------|--------------------------|
//! | `GET player/currently-playing` | [`Playback`], or 204   |
//! | `GET player/devices`        | [`Devices`]              |
//! | `PUT player`                | [`Transfer`]             |
//! | `PUT player/play`           | empty                    |
//! | `PUT player/pause`          | empty                    |
//! | `POST player/next`          | empty                    |

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};

pub const CURRENTLY_PLAYING: &str = "player/currently-playing";
pub const DEVICES: &str = "player/devices";
pub const TRANSFER: &str = "player";
pub const PLAY: &str = "player/play";
pub const PAUSE: &str = "player/pause";
pub const NEXT: &str = "player/next";

/// A playback target as reported by `player/devices`.
///
/// Fetched fresh whenever needed and never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Device {
    /// Missing for some restricted devices.
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default = "Device::unknown_name")]
    pub name: String,

    /// For example `Computer` or `Smartphone`.
    #[serde(default, rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub is_active: bool,

    /// Restricted devices do not accept Web API commands.
    #[serde(default)]
    pub is_restricted: bool,

    #[serde(default)]
    pub volume_percent: Option<u8>,
}

impl Device {
    fn unknown_name() -> String {
        "Unknown".to_owned()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.kind.is_empty() {
            write!(f, " ({})", self.kind)?;
        }
        if self.is_active {
            write!(f, " [active]")?;
        }
        Ok(())
    }
}

/// Response of `player/devices`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Devices {
    #[serde(default)]
    pub devices: Vec<Device>,
}

/// Body of a playback transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Transfer<'a> {
    pub device_ids: [&'a str; 1],

    /// Whether playback should start on the new device right away.
    pub play: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Artist {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct Album {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub images: Vec<Image>,
}

/// The currently playing track or episode.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub id: Option<String>,

    pub name: String,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "duration_ms")]
    pub duration: Duration,

    /// Empty for podcast episodes.
    #[serde(default)]
    pub artists: Vec<Artist>,

    #[serde(default)]
    pub album: Album,
}

impl Track {
    /// Artist names joined by `, `.
    #[must_use]
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|artist| artist.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Largest album cover, which Spotify lists first.
    #[must_use]
    pub fn cover_url(&self) -> Option<&str> {
        self.album.images.first().map(|image| image.url.as_str())
    }
}

/// Snapshot of `player/currently-playing`.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Playback {
    #[serde(default)]
    pub is_playing: bool,

    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(rename = "progress_ms")]
    pub progress: Option<Duration>,

    /// `None` during ads or while switching tracks.
    #[serde(default)]
    pub item: Option<Track>,

    #[serde(default)]
    pub device: Option<Device>,
}

impl fmt::Display for Playback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_playing { "playing" } else { "paused" };
        match &self.item {
            Some(track) => {
                write!(f, "{state}: {} - {}", track.artist_names(), track.name)?;
                if let Some(progress) = self.progress {
                    write!(
                        f,
                        " [{}/{}]",
                        minutes_seconds(progress),
                        minutes_seconds(track.duration)
                    )?;
                }
                Ok(())
            }
            None => write!(f, "{state}: nothing"),
        }
    }
}

fn minutes_seconds(duration: Duration) -> String {
    let seconds = duration.as_secs();
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURRENTLY_PLAYING_BODY: &str = r#"{
        "timestamp": 1700000000000,
        "progress_ms": 61000,
        "is_playing": true,
        "currently_playing_type": "track",
        "item": {
            "id": "4uLU6hMCjMI75M1A2tKUQC",
            "name": "Never Gonna Give You Up",
            "duration_ms": 213000,
            "artists": [{"id": "0gxyHStUsqpMadRV0Di1Qt", "name": "Rick Astley"}],
            "album": {
                "name": "Whenever You Need Somebody",
                "images": [
                    {"url": "https://i.scdn.co/image/large", "width": 640, "height": 640},
                    {"url": "https://i.scdn.co/image/small", "width": 64, "height": 64}
                ]
            }
        },
        "device": {"id": "d1", "name": "Kitchen", "type": "Speaker", "is_active": true, "volume_percent": 40}
    }"#;

    #[test]
    fn decodes_playback() {
        let playback: Playback = serde_json::from_str(CURRENTLY_PLAYING_BODY).unwrap();
        let track = playback.item.as_ref().unwrap();

        assert!(playback.is_playing);
        assert_eq!(playback.progress, Some(Duration::from_secs(61)));
        assert_eq!(track.duration, Duration::from_secs(213));
        assert_eq!(track.artist_names(), "Rick Astley");
        assert_eq!(track.cover_url(), Some("https://i.scdn.co/image/large"));
        assert_eq!(playback.device.unwrap().name, "Kitchen");
    }

    #[test]
    fn displays_playback() {
        let playback: Playback = serde_json::from_str(CURRENTLY_PLAYING_BODY).unwrap();
        assert_eq!(
            playback.to_string(),
            "playing: Rick Astley - Never Gonna Give You Up [1:01/3:33]"
        );
    }

    #[test]
    fn joins_artists() {
        let track: Track = serde_json::from_str(
            r#"{"name":"Under Pressure","duration_ms":248000,"artists":[{"name":"Queen"},{"name":"David Bowie"}]}"#,
        )
        .unwrap();
        assert_eq!(track.artist_names(), "Queen, David Bowie");
        assert_eq!(track.cover_url(), None);
    }

    #[test]
    fn decodes_sparse_devices() {
        let devices: Devices = serde_json::from_str(
            r#"{"devices":[{"id":null,"name":"TV","type":"TV","is_restricted":true},{"id":"p1","name":"Phone","type":"Smartphone","is_active":false}]}"#,
        )
        .unwrap();

        assert_eq!(devices.devices.len(), 2);
        assert_eq!(devices.devices[0].id, None);
        assert!(devices.devices[0].is_restricted);
        assert!(!devices.devices[1].is_active);
        assert_eq!(devices.devices[1].to_string(), "Phone (Smartphone)");
    }

    #[test]
    fn empty_device_list() {
        let devices: Devices = serde_json::from_str("{}").unwrap();
        assert!(devices.devices.is_empty());
    }

    #[test]
    fn encodes_transfer() {
        let body = serde_json::to_value(Transfer {
            device_ids: ["d1"],
            play: false,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"device_ids": ["d1"], "play": false}));
    }
}
