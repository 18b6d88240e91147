//! OAuth credentials per session.
//!
//! [`TokenStore`] is the only component that creates, changes or deletes a
//! [`TokenRecord`]. Everything else reads tokens through it.
//!
//! # Concurrency
//!
//! There is no in-process lock around refreshes. Two requests for the same
//! session that both find an expired token will both refresh it, and the
//! last write wins. Spotify keeps accepting the previous access token until
//! the new one is stored, so the race is harmless.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, SystemTime},
};

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, TimestampSeconds};
use veil::Redact;

use crate::{
    error::{Error, Result},
    store::Persistence,
};

/// Stored OAuth credentials of one session.
#[serde_as]
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Redact)]
pub struct TokenRecord {
    /// Opaque key from the caller's session layer.
    pub session_id: String,

    #[redact]
    pub access_token: String,

    #[redact]
    pub refresh_token: String,

    /// Usually `Bearer`.
    pub token_type: String,

    #[serde_as(as = "TimestampSeconds<i64>")]
    pub expires_at: SystemTime,
}

impl TokenRecord {
    #[must_use]
    pub fn time_to_live(&self) -> Duration {
        self.expires_at
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }

    /// Value for the `Authorization` header.
    #[must_use]
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Display for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} token for session {} (expires in {}s)",
            self.token_type,
            self.session_id,
            self.time_to_live().as_secs()
        )
    }
}

/// Keyed access to [`TokenRecord`]s on top of a [`Persistence`] backend.
#[derive(Clone)]
pub struct TokenStore {
    persistence: Arc<dyn Persistence>,
}

impl TokenStore {
    pub fn new<P>(persistence: P) -> Self
    where
        P: Persistence + 'static,
    {
        Self {
            persistence: Arc::new(persistence),
        }
    }

    pub fn get(&self, session_id: &str) -> Result<Option<TokenRecord>> {
        self.persistence.find_token(session_id)
    }

    /// Creates or overwrites the record of `session_id`, expiring
    /// `expires_in` from now.
    ///
    /// # Errors
    ///
    /// Returns a `Parse` error without storing anything if `expires_in` is
    /// too large to represent as a point in time.
    pub fn upsert(
        &self,
        session_id: &str,
        access_token: &str,
        token_type: &str,
        expires_in: Duration,
        refresh_token: &str,
    ) -> Result<TokenRecord> {
        let Some(expires_at) = SystemTime::now().checked_add(expires_in) else {
            error!("token lifetime of {}s is out of range", expires_in.as_secs());
            return Err(Error::parse("token lifetime out of range"));
        };

        let record = TokenRecord {
            session_id: session_id.to_owned(),
            access_token: access_token.to_owned(),
            refresh_token: refresh_token.to_owned(),
            token_type: token_type.to_owned(),
            expires_at,
        };

        self.persistence.save_token(&record)?;
        debug!("stored {record}");

        Ok(record)
    }

    pub fn delete(&self, session_id: &str) -> Result<()> {
        warn!("clearing Spotify tokens for session {session_id}");
        self.persistence.delete_token(session_id)
    }
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}
