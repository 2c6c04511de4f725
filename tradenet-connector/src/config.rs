use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::types::PauseSignal;

/// The top-level configuration for the connector library.
///
/// Typically deserialized from a TOML file (with `TRADENET__`-prefixed
/// environment overrides) and shared by every component of a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ConnectorConfig {
    pub node: NodeConfig,
    pub channels: ChannelConfig,
    pub wait: WaitConfig,
}

/// Connection settings for the data node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct NodeConfig {
    /// Data-node gRPC endpoints, tried in order by the dialer.
    pub addresses: Vec<String>,
    /// Fixed delay between resubscribe attempts after a generic transport
    /// failure. Not-ready failures redial instead and are not delayed.
    pub retry_delay_secs: u64,
    /// Per-request deadline for the synchronous read APIs.
    pub call_timeout_secs: u64,
}

/// Capacities of the advisory channels. Both are deliberately tiny: pause
/// signals and waiter errors are lossy by design.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ChannelConfig {
    pub pause_buffer: usize,
}

/// Ceilings for the condition waiters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct WaitConfig {
    /// Hard upper bound on a stake-linking wait, applied on top of whatever
    /// cancellation the caller brings.
    pub stake_linking_timeout_secs: u64,
}

impl ConnectorConfig {
    /// Loads the configuration from a TOML file, then applies
    /// `TRADENET__`-prefixed environment variable overrides.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let cfg = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("TRADENET").separator("__"))
            .build()
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        cfg.try_deserialize().context("invalid connector config")
    }

    /// A fresh pause-signal channel sized per the config.
    pub fn pause_channel(&self) -> (mpsc::Sender<PauseSignal>, mpsc::Receiver<PauseSignal>) {
        mpsc::channel(self.channels.pause_buffer.max(1))
    }
}

impl NodeConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl WaitConfig {
    pub fn stake_linking_timeout(&self) -> Duration {
        Duration::from_secs(self.stake_linking_timeout_secs)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            addresses: vec!["localhost:3007".to_string()],
            retry_delay_secs: 3,
            call_timeout_secs: 10,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self { pause_buffer: 1 }
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            stake_linking_timeout_secs: 450,
        }
    }
}
