//! Configuration store collaborator
//!
//! Source records live outside this core (a database, a config file);
//! the fleet only ever asks for the current list of active sources.

use async_trait::async_trait;
use parking_lot::Mutex;

use logwell_config::SyslogSourceConfig;

/// Read access to syslog source configuration
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// List every source that should have a running listener
    async fn list_active_sources(&self) -> anyhow::Result<Vec<SyslogSourceConfig>>;
}

/// In-memory store for tests and embedded use
#[derive(Debug, Default)]
pub struct StaticConfigStore {
    sources: Mutex<Vec<SyslogSourceConfig>>,
}

impl StaticConfigStore {
    /// Create a store with an initial source list
    pub fn new(sources: Vec<SyslogSourceConfig>) -> Self {
        Self {
            sources: Mutex::new(sources),
        }
    }

    /// Replace the source list
    pub fn set(&self, sources: Vec<SyslogSourceConfig>) {
        *self.sources.lock() = sources;
    }
}

#[async_trait]
impl ConfigStore for StaticConfigStore {
    async fn list_active_sources(&self) -> anyhow::Result<Vec<SyslogSourceConfig>> {
        Ok(self
            .sources
            .lock()
            .iter()
            .filter(|s| s.is_active())
            .cloned()
            .collect())
    }
}
