//! Persistence backends for [`TokenRecord`]s.
//!
//! The [`Persistence`] trait is the seam to whatever durable store the host
//! application uses. Each call reads or writes a single record and must be
//! atomic for that key; nothing more is assumed.
//!
//! Two backends ship with the crate:
//! * [`MemoryStore`] for tests and short-lived processes
//! * [`FileStore`] keeping all sessions in one JSON file

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::{error::Result, tokens::TokenRecord};

/// Durable storage of tokens keyed by session identifier.
pub trait Persistence: Send + Sync {
    fn find_token(&self, session_id: &str) -> Result<Option<TokenRecord>>;
    fn save_token(&self, record: &TokenRecord) -> Result<()>;
    fn delete_token(&self, session_id: &str) -> Result<()>;
}

/// In-memory token storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, TokenRecord>>,
}

impl Persistence for MemoryStore {
    fn find_token(&self, session_id: &str) -> Result<Option<TokenRecord>> {
        Ok(self.records.lock()?.get(session_id).cloned())
    }

    fn save_token(&self, record: &TokenRecord) -> Result<()> {
        self.records
            .lock()?
            .insert(record.session_id.clone(), record.clone());
        Ok(())
    }

    fn delete_token(&self, session_id: &str) -> Result<()> {
        self.records.lock()?.remove(session_id);
        Ok(())
    }
}

/// Token storage in a JSON file, one entry per session.
///
/// Writes go to a sibling temporary file that is renamed over the original,
/// so readers never observe a half-written file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,

    /// Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileStore {
    /// Files larger than this are refused rather than read into memory.
    const MAX_FILE_SIZE: u64 = 1024 * 1024;

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, TokenRecord>> {
        let size = match fs::metadata(&self.path) {
            Ok(attributes) => attributes.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };

        if size > Self::MAX_FILE_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} is too large", self.path.display()),
            )
            .into());
        }

        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&contents).map_err(Into::into)
    }

    fn persist(&self, records: &BTreeMap<String, TokenRecord>) -> Result<()> {
        let contents = serde_json::to_string_pretty(records)?;

        let mut temporary = self.path.clone().into_os_string();
        temporary.push(".tmp");
        let temporary = PathBuf::from(temporary);

        fs::write(&temporary, contents)?;
        fs::rename(&temporary, &self.path)?;

        Ok(())
    }
}

impl Persistence for FileStore {
    fn find_token(&self, session_id: &str) -> Result<Option<TokenRecord>> {
        let _guard = self.lock.lock()?;
        Ok(self.load()?.remove(session_id))
    }

    fn save_token(&self, record: &TokenRecord) -> Result<()> {
        let _guard = self.lock.lock()?;
        let mut records = self.load()?;
        records.insert(record.session_id.clone(), record.clone());
        self.persist(&records)
    }

    fn delete_token(&self, session_id: &str) -> Result<()> {
        let _guard = self.lock.lock()?;
        let mut records = self.load()?;
        if records.remove(session_id).is_some() {
            self.persist(&records)?;
        }
        Ok(())
    }
}
