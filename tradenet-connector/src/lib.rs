//! # Tradenet Connector
//!
//! Operational client libraries for a tradenet data node. The centrepiece is a
//! reconnecting event-bus subscription engine ([`events::BusEventProcessor`])
//! and the account plumbing built on top of it: a live balance cache, blocking
//! waits for top-up and stake-linking outcomes, and a balance/stake assurance
//! service ([`account`]).
//!
//! The network transport itself (gRPC data node, wallet, faucet) is consumed
//! through the collaborator traits defined here; this crate owns the retry,
//! classification and waiting logic only.

pub mod account;
pub mod config;
pub mod errors;
pub mod events;
pub mod num;
pub mod types;

pub use account::{
    AccountBalance, AccountService, AccountStream, Balance, BalanceStore, CoinProvider, DataNode,
};
pub use config::ConnectorConfig;
pub use errors::{StreamError, WaitError};
pub use events::{
    BatchVerdict, BusEvent, BusEventProcessor, BusEventType, BusStreamer, EventStream,
    Subscription, SubscriptionFilter,
};
pub use num::Amount;
pub use types::{Asset, AssetClass, AssetId, PartyId, PauseSignal, TopUpRequest};
