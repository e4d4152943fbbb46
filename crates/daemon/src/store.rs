//! File-backed configuration store
//!
//! Re-reads the TOML file on every listing so a SIGHUP-triggered
//! reconcile picks up edits without restarting the daemon.

use std::path::PathBuf;

use async_trait::async_trait;

use logwell_config::{Config, SyslogSourceConfig};
use logwell_fleet::ConfigStore;

/// `ConfigStore` backed by the daemon's TOML config file
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    /// Create a store reading from `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn list_active_sources(&self) -> anyhow::Result<Vec<SyslogSourceConfig>> {
        let config = Config::from_path(&self.path)?;
        Ok(config.active_sources())
    }
}
