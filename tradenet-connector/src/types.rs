use tokio::sync::oneshot;

use crate::num::Amount;

/// Public key of a network party, hex encoded.
pub type PartyId = String;

/// Asset identifier as assigned by the network.
pub type AssetId = String;

/// Advisory broadcast telling dependent consumers that a subscription is
/// mid-reconnect (`paused == true`) or live again (`paused == false`).
///
/// Delivery is best-effort over a bounded channel: a signal is dropped when
/// nobody is ready to receive it, and independent loops may interleave their
/// signals. Listeners must treat this as a level, not an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PauseSignal {
    /// Name of the processing loop emitting the signal.
    pub source: String,
    pub paused: bool,
}

/// A request for a coin provider to fund a party, answered on `response`.
#[derive(Debug)]
pub struct TopUpRequest {
    pub receiver_name: String,
    pub receiver_party: PartyId,
    pub asset: Asset,
    pub amount: Amount,
    /// Caller tag carried through logs.
    pub from: String,
    pub response: oneshot::Sender<anyhow::Result<()>>,
}

/// Asset metadata as served by the data node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub id: AssetId,
    pub symbol: String,
    /// Decimal places of the asset itself (markets may quote with fewer).
    pub decimals: u64,
    pub class: AssetClass,
}

/// How an asset is issued, which decides how a treasury can source it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetClass {
    /// Minted by the network's own faucet, in capped increments.
    Builtin { max_faucet_amount_mint: String },
    /// Backed by a token bridge contract on a foreign chain.
    Bridged { contract_address: String },
}

impl Asset {
    /// The faucet mint cap, when this is a builtin asset.
    pub fn max_faucet_amount_mint(&self) -> Option<&str> {
        match &self.class {
            AssetClass::Builtin {
                max_faucet_amount_mint,
            } => Some(max_faucet_amount_mint),
            AssetClass::Bridged { .. } => None,
        }
    }
}
