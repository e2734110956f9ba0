//! Credential bundle persistence
//!
//! Stores the exported session bundle as a JSON file, following the XDG
//! Base Directory Specification for the default location. The on-disk
//! shape is the bare cookie-record array other tooling reads and writes.

use crate::{Result, types::CredentialBundle};
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, error, warn};

/// File-backed credential bundle storage
#[derive(Debug)]
pub struct AppStateFile {
    /// Path to the bundle file
    path: PathBuf,
}

impl AppStateFile {
    /// Create a store over the given path
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the stored bundle, if one exists
    ///
    /// A missing or unreadable file yields `None`; malformed JSON is an
    /// error, since silently discarding stored credentials would force a
    /// fresh password login.
    pub async fn load(&self) -> Result<Option<CredentialBundle>> {
        if !self.path.exists() {
            debug!("app state file does not exist: {:?}", self.path);
            return Ok(None);
        }

        match fs::read_to_string(&self.path).await {
            Ok(content) => {
                debug!("loading app state from: {:?}", self.path);
                Ok(Some(CredentialBundle::from_json(&content)?))
            }
            Err(e) => {
                warn!("failed to read app state file {:?}: {}", self.path, e);
                Ok(None)
            }
        }
    }

    /// Persist the bundle, creating parent directories as needed
    pub async fn save(&self, bundle: &CredentialBundle) -> Result<()> {
        let content = bundle.to_json()?;

        if let Some(parent) = self.path.parent()
            && let Err(e) = fs::create_dir_all(parent).await
        {
            error!("failed to create app state directory {:?}: {}", parent, e);
            return Err(e.into());
        }

        match fs::write(&self.path, content).await {
            Ok(_) => {
                debug!("app state saved to: {:?}", self.path);
                Ok(())
            }
            Err(e) => {
                error!("failed to write app state file {:?}: {}", self.path, e);
                Err(e.into())
            }
        }
    }
}

/// Default app state path following the XDG Base Directory Specification
pub fn get_appstate_path() -> Result<PathBuf> {
    let state_dir = if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        PathBuf::from(xdg_state).join("redfox")
    } else if let Some(home_dir) = dirs::home_dir() {
        home_dir.join(".local").join("state").join("redfox")
    } else {
        // Fallback to current directory if home is not available
        warn!("could not determine home directory, using current directory for app state");
        std::env::current_dir()?.join(".redfox")
    };

    Ok(state_dir.join("appstate.json"))
}
