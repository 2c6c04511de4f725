use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tradenet_connector::types::AssetId;

/// Settings for the treasury service and its bridge provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TreasuryConfig {
    /// Name of the treasury wallet, carried through logs and references.
    pub wallet_name: String,
    /// Minimum spacing between faucet mints of the same request.
    pub faucet_rate_limit_ms: u64,
    /// Deadline for individual bridge calls.
    pub call_timeout_secs: u64,
    /// Buffer of the top-up request channel.
    pub request_buffer: usize,
    /// Foreign-chain keys owning the bridged token supply, per asset.
    pub owner_keys: HashMap<AssetId, OwnerKey>,
}

/// A foreign-chain key pair controlling bridged tokens for one asset. The
/// address is carried alongside the key so no key derivation happens here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OwnerKey {
    pub address: String,
    pub private_key: String,
}

impl TreasuryConfig {
    pub fn faucet_rate_limit(&self) -> Duration {
        Duration::from_millis(self.faucet_rate_limit_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for TreasuryConfig {
    fn default() -> Self {
        Self {
            wallet_name: "whale".to_string(),
            faucet_rate_limit_ms: 500,
            call_timeout_secs: 100,
            request_buffer: 1,
            owner_keys: HashMap::new(),
        }
    }
}
