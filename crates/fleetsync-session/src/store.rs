//! File-backed session storage.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, instrument};

use fleetsync_core::error::StorageError;
use fleetsync_core::traits::SessionStore;
use fleetsync_core::{Result, Session};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Fixed key the session is stored under.
pub const SESSION_KEY: &str = "fleetsync-session";

/// Stores the session as `<dir>/<key>.json`.
///
/// Writes go through a temp file and a rename so a crash never leaves a
/// half-written session, and are serialized across processes with an
/// exclusive lock on `<key>.lock`.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
    key: String,
}

impl FileSessionStore {
    /// A store under `dir` using [`SESSION_KEY`].
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self::with_key(dir, SESSION_KEY)
    }

    pub fn with_key(dir: impl AsRef<Path>, key: impl Into<String>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            key: key.into(),
        }
    }

    /// Path of the stored session file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.key))
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(format!("{}.lock", self.key))
    }

    fn lock(&self) -> Result<fs::File> {
        fs::create_dir_all(&self.dir).map_err(StorageError::from)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())
            .map_err(StorageError::from)?;
        file.lock_exclusive().map_err(StorageError::from)?;
        Ok(file)
    }
}

impl SessionStore for FileSessionStore {
    #[instrument(skip(self), fields(path = %self.path().display()))]
    fn load(&self) -> Result<Option<Session>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path).map_err(StorageError::from)?;
        let session = serde_json::from_str(&json).map_err(|e| StorageError::Corrupt {
            message: e.to_string(),
        })?;
        debug!("Loaded stored session");
        Ok(Some(session))
    }

    #[instrument(skip(self, session), fields(path = %self.path().display()))]
    fn save(&self, session: &Session) -> Result<()> {
        let _lock = self.lock()?;
        let json = serde_json::to_string_pretty(session).map_err(|e| StorageError::Io {
            message: e.to_string(),
        })?;

        let path = self.path();
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &json).map_err(StorageError::from)?;

        #[cfg(unix)]
        {
            let mut perms = fs::metadata(&temp_path)
                .map_err(StorageError::from)?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&temp_path, perms).map_err(StorageError::from)?;
        }

        fs::rename(&temp_path, &path).map_err(StorageError::from)?;
        debug!("Stored session");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let _lock = self.lock()?;
        let path = self.path();
        if path.exists() {
            fs::remove_file(&path).map_err(StorageError::from)?;
            debug!(path = %path.display(), "Removed stored session");
        }
        Ok(())
    }
}
