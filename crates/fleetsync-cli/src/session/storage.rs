//! Where the CLI keeps its state between runs.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use fleetsync_core::ApiUrl;
use fleetsync_session::FileSessionStore;

/// Settings remembered from the last login.
#[derive(Debug, Serialize, Deserialize)]
struct StoredProfile {
    api: String,
}

/// The platform data directory for fleetsync.
pub fn data_dir() -> Result<PathBuf> {
    let dirs =
        ProjectDirs::from("", "", "fleetsync").context("Could not determine data directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

fn profile_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("profile.json"))
}

/// The session store the manager persists into.
pub fn session_store() -> Result<FileSessionStore> {
    Ok(FileSessionStore::new(data_dir()?))
}

/// Remember the API URL for later commands.
pub fn save_api(api: &ApiUrl) -> Result<()> {
    let path = profile_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create data directory")?;
    }

    let stored = StoredProfile {
        api: api.to_string(),
    };
    let json = serde_json::to_string_pretty(&stored)?;
    fs::write(&path, json).context("Failed to write profile")?;
    Ok(())
}

/// The API URL saved at login, if any.
pub fn load_api() -> Result<Option<ApiUrl>> {
    let path = profile_path()?;
    if !path.exists() {
        return Ok(None);
    }

    let json = fs::read_to_string(&path).context("Failed to read profile")?;
    let stored: StoredProfile = serde_json::from_str(&json).context("Invalid profile file")?;
    let api = ApiUrl::new(&stored.api).context("Invalid API URL in profile")?;
    Ok(Some(api))
}
