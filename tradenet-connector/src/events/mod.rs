//! The event-bus data model and the subscription processor.
//!
//! The data node pushes batches of [`BusEvent`]s over a long-lived stream
//! scoped by a [`SubscriptionFilter`]. The wire schema is owned by the
//! transport; this module only defines the decoded shape the rest of the
//! crate classifies.

mod processor;

pub use processor::{
    BatchVerdict, BusEventProcessor, BusStreamer, EventStream, Subscription,
};

use std::fmt;

use crate::types::{AssetId, PartyId};

/// Event classes a subscription can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusEventType {
    Account,
    Deposit,
    Transfer,
    StakeLinking,
}

/// Criteria sent once per stream to scope which events it delivers.
/// Immutable for the life of a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub types: Vec<BusEventType>,
    pub party: Option<PartyId>,
    pub asset: Option<AssetId>,
}

impl SubscriptionFilter {
    pub fn for_types(types: impl IntoIterator<Item = BusEventType>) -> Self {
        Self {
            types: types.into_iter().collect(),
            party: None,
            asset: None,
        }
    }

    pub fn with_party(mut self, party: impl Into<PartyId>) -> Self {
        self.party = Some(party.into());
        self
    }

    pub fn with_asset(mut self, asset: impl Into<AssetId>) -> Self {
        self.asset = Some(asset.into());
        self
    }
}

/// A single decoded event-bus event.
#[derive(Debug, Clone)]
pub enum BusEvent {
    Account(AccountUpdate),
    Deposit(Deposit),
    Transfer(Transfer),
    StakeLinking(StakeLinking),
    /// An event class this library does not model.
    Unknown,
}

/// Balance change of one account of one party.
#[derive(Debug, Clone)]
pub struct AccountUpdate {
    pub owner: PartyId,
    pub asset: AssetId,
    pub kind: AccountKind,
    /// Base-10 balance; empty when the node has no information yet.
    pub balance: String,
}

/// Ledger account categories. Categories this library does not track arrive
/// as `Other` and are ignored by the balance store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccountKind {
    General,
    Margin,
    Bond,
    Other(String),
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountKind::General => f.write_str("GENERAL"),
            AccountKind::Margin => f.write_str("MARGIN"),
            AccountKind::Bond => f.write_str("BOND"),
            AccountKind::Other(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Deposit {
    pub id: String,
    pub party: PartyId,
    pub asset: AssetId,
    pub amount: String,
    pub status: DepositStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositStatus {
    Unspecified,
    Open,
    Finalized,
    Rejected,
    Cancelled,
}

impl fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DepositStatus::Unspecified => "STATUS_UNSPECIFIED",
            DepositStatus::Open => "STATUS_OPEN",
            DepositStatus::Finalized => "STATUS_FINALIZED",
            DepositStatus::Rejected => "STATUS_REJECTED",
            DepositStatus::Cancelled => "STATUS_CANCELLED",
        })
    }
}

#[derive(Debug, Clone)]
pub struct Transfer {
    pub id: String,
    pub from: PartyId,
    pub to: PartyId,
    pub asset: AssetId,
    pub amount: String,
    pub status: TransferStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Unspecified,
    Pending,
    Done,
    Rejected,
    Stopped,
    Cancelled,
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransferStatus::Unspecified => "STATUS_UNSPECIFIED",
            TransferStatus::Pending => "STATUS_PENDING",
            TransferStatus::Done => "STATUS_DONE",
            TransferStatus::Rejected => "STATUS_REJECTED",
            TransferStatus::Stopped => "STATUS_STOPPED",
            TransferStatus::Cancelled => "STATUS_CANCELLED",
        })
    }
}

#[derive(Debug, Clone)]
pub struct StakeLinking {
    pub id: String,
    pub party: PartyId,
    pub status: StakeLinkingStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakeLinkingStatus {
    Unspecified,
    Pending,
    Accepted,
    Rejected,
}

impl fmt::Display for StakeLinkingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StakeLinkingStatus::Unspecified => "STATUS_UNSPECIFIED",
            StakeLinkingStatus::Pending => "STATUS_PENDING",
            StakeLinkingStatus::Accepted => "STATUS_ACCEPTED",
            StakeLinkingStatus::Rejected => "STATUS_REJECTED",
        })
    }
}
