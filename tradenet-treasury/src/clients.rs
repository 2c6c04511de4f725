//! Collaborator contracts for the treasury, plus the trait views it takes on
//! the connector's account machinery so every dependency can be mocked.

use std::time::Duration;

use async_trait::async_trait;
use tradenet_connector::account::{AccountService, AccountStream, Balance, DataNode};
use tradenet_connector::errors::WaitError;
use tradenet_connector::num::Amount;
use tradenet_connector::types::{Asset, AssetId, PartyId};

use crate::config::OwnerKey;

/// A one-off transfer between general accounts, submitted via the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCommand {
    pub to: PartyId,
    pub asset: AssetId,
    pub amount: Amount,
    pub reference: String,
}

/// Wallet surface the treasury needs: its own identity and transfer
/// submission. Key management stays inside the wallet.
#[async_trait]
pub trait WalletClient: Send + Sync {
    fn public_key(&self) -> &str;

    async fn submit_transfer(&self, command: TransferCommand) -> anyhow::Result<()>;
}

/// The network faucet for builtin assets.
#[async_trait]
pub trait FaucetClient: Send + Sync {
    /// Requests a mint; `Ok(false)` means the faucet refused without error.
    async fn mint(&self, amount: &str, asset: &str, party: &str) -> anyhow::Result<bool>;
}

/// The token bridge for bridged assets. Both calls return the amount the
/// bridge actually credited, which may fall short of the request.
#[async_trait]
pub trait BridgeClient: Send + Sync {
    async fn deposit(
        &self,
        owner: &OwnerKey,
        token_address: &str,
        receiver_party: &str,
        amount: Amount,
    ) -> anyhow::Result<Amount>;

    async fn stake(
        &self,
        owner: &OwnerKey,
        token_address: &str,
        receiver_party: &str,
        amount: Amount,
    ) -> anyhow::Result<Amount>;
}

/// The slice of the account service the treasury drives.
#[async_trait]
pub trait AccountOps: Send + Sync {
    async fn ensure_balance(
        &self,
        asset_id: &str,
        balance_of: for<'a> fn(&'a Balance) -> Amount,
        target: Amount,
        market_decimals: u64,
        scale: u64,
        from: &str,
    ) -> anyhow::Result<()>;

    async fn stake(
        &self,
        receiver_name: &str,
        receiver_party: &str,
        asset_id: &str,
        amount: Amount,
        from: &str,
    ) -> anyhow::Result<()>;
}

/// The slice of the account streamer the treasury drives.
#[async_trait]
pub trait StreamOps: Send + Sync {
    async fn asset_by_id(&self, id: &str) -> anyhow::Result<Asset>;

    async fn wait_for_top_up(
        &self,
        party: &str,
        asset_id: &str,
        amount: Amount,
        timeout: Option<Duration>,
    ) -> Result<(), WaitError>;

    async fn wait_for_stake_linking(&self, party: &str) -> Result<(), WaitError>;
}

#[async_trait]
impl<N: DataNode + 'static> AccountOps for AccountService<N> {
    async fn ensure_balance(
        &self,
        asset_id: &str,
        balance_of: for<'a> fn(&'a Balance) -> Amount,
        target: Amount,
        market_decimals: u64,
        scale: u64,
        from: &str,
    ) -> anyhow::Result<()> {
        AccountService::ensure_balance(self, asset_id, balance_of, target, market_decimals, scale, from)
            .await
    }

    async fn stake(
        &self,
        receiver_name: &str,
        receiver_party: &str,
        asset_id: &str,
        amount: Amount,
        from: &str,
    ) -> anyhow::Result<()> {
        AccountService::stake(self, receiver_name, receiver_party, asset_id, amount, from).await
    }
}

#[async_trait]
impl<N: DataNode + 'static> StreamOps for AccountStream<N> {
    async fn asset_by_id(&self, id: &str) -> anyhow::Result<Asset> {
        AccountStream::asset_by_id(self, id).await
    }

    async fn wait_for_top_up(
        &self,
        party: &str,
        asset_id: &str,
        amount: Amount,
        timeout: Option<Duration>,
    ) -> Result<(), WaitError> {
        AccountStream::wait_for_top_up(self, party, asset_id, amount, timeout).await
    }

    async fn wait_for_stake_linking(&self, party: &str) -> Result<(), WaitError> {
        AccountStream::wait_for_stake_linking(self, party).await
    }
}
