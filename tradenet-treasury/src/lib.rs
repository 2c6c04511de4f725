//! # Tradenet Treasury
//!
//! The deep-pocketed funding side of a bot deployment: a treasury service
//! (the "whale") that answers top-up requests from bot accounts, minting
//! builtin assets through the network faucet, transferring from its own
//! general account, or pulling bridged assets across the token bridge.
//!
//! External money movers (wallet, faucet, bridge) are consumed through the
//! traits in [`clients`]; the waiting logic comes from `tradenet-connector`.

pub mod clients;
pub mod config;
pub mod provider;
pub mod service;

pub use clients::{AccountOps, BridgeClient, FaucetClient, StreamOps, TransferCommand, WalletClient};
pub use config::{OwnerKey, TreasuryConfig};
pub use provider::{BridgeProvider, BridgeProviderHandle};
pub use service::{Treasury, TreasuryHandle};
