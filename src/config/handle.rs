use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;

use crate::Result;

use super::Settings;

/// Process-wide configuration snapshot.
///
/// Requests take an `Arc<Settings>` once and keep using it; a reload
/// replaces the whole snapshot, so a reader never observes a half-applied
/// change.
pub struct ConfigHandle {
    path: Option<PathBuf>,
    current: ArcSwap<Settings>,
}

impl ConfigHandle {
    pub fn new(settings: Settings) -> Self {
        Self {
            path: None,
            current: ArcSwap::from_pointee(settings),
        }
    }

    /// Load the initial snapshot from `path` and remember it for reloads.
    ///
    /// # Errors
    ///
    /// Propagates any configuration error from [`Settings::from_env_and_file`].
    pub fn init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let settings = Settings::from_env_and_file(&path)?;
        Ok(Self {
            path: Some(path),
            current: ArcSwap::from_pointee(settings),
        })
    }

    pub fn load(&self) -> Arc<Settings> {
        self.current.load_full()
    }

    pub fn replace(&self, settings: Settings) {
        self.current.store(Arc::new(settings));
    }

    /// Re-read the configuration file. On failure the previous snapshot
    /// stays active.
    ///
    /// # Errors
    ///
    /// Returns the validation error of the new configuration.
    pub fn reload(&self) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let settings = Settings::from_env_and_file(path)?;
        info!(
            path = %path.display(),
            alert_configs = settings.alert_configs.len(),
            "configuration reloaded"
        );
        self.replace(settings);
        Ok(())
    }
}
