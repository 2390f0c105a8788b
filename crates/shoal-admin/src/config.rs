use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_MONITOR_INTERVAL_SECS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Key nodes by their advertised hostname instead of their IP address
    /// when matching operator-supplied host strings.
    pub use_hostnames: bool,
    /// How often the admin monitor re-evaluates draining nodes.
    pub monitor_interval_secs: i64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            use_hostnames: false,
            monitor_interval_secs: DEFAULT_MONITOR_INTERVAL_SECS,
        }
    }
}

impl AdminConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match ext.to_lowercase().as_str() {
            "toml" => {
                let config: AdminConfig = toml::from_str(&contents)?;
                Ok(config)
            }
            "json" => {
                let config: AdminConfig = serde_json::from_str(&contents)?;
                Ok(config)
            }
            _ => anyhow::bail!("Unsupported config file extension: {}", ext),
        }
    }

    /// Replaces a non-positive monitor interval with the default.
    pub fn sanitize(&mut self) {
        if self.monitor_interval_secs <= 0 {
            warn!(
                "monitor_interval_secs must be greater than zero, defaulting to {}",
                DEFAULT_MONITOR_INTERVAL_SECS
            );
            self.monitor_interval_secs = DEFAULT_MONITOR_INTERVAL_SECS;
        }
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs.max(0) as u64)
    }
}
