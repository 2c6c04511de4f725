use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::account::store::{Balance, BalanceStore};
use crate::account::stream::{AccountStream, DataNode};
use crate::num::{self, Amount};
use crate::types::{AssetId, PartyId, TopUpRequest};

/// A source of funds: drains [`TopUpRequest`]s and can stake on behalf of a
/// party. Implemented by the treasury.
#[async_trait]
pub trait CoinProvider: Send + Sync {
    /// Channel the provider drains for top-up requests.
    fn top_up_requests(&self) -> mpsc::Sender<TopUpRequest>;

    async fn stake(
        &self,
        receiver_name: &str,
        receiver_party: &str,
        asset_id: &str,
        amount: Amount,
        from: &str,
    ) -> anyhow::Result<()>;
}

/// Per-bot account façade: answers "do I have enough?" and tops up or stakes
/// through the [`CoinProvider`] when the answer is no.
pub struct AccountService<N> {
    name: String,
    party: PartyId,
    stream: Arc<AccountStream<N>>,
    provider: Arc<dyn CoinProvider>,
    stores: Mutex<HashMap<AssetId, Arc<BalanceStore>>>,
}

impl<N: DataNode + 'static> AccountService<N> {
    pub fn new(
        name: impl Into<String>,
        party: impl Into<PartyId>,
        stream: Arc<AccountStream<N>>,
        provider: Arc<dyn CoinProvider>,
    ) -> Self {
        Self {
            name: name.into(),
            party: party.into(),
            stream,
            provider,
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// Ensures the balance selected by `balance_of` covers `target`,
    /// requesting a top-up of `target * scale` otherwise.
    ///
    /// `market_decimals` is the market's decimal places; when the asset
    /// carries more, the target is scaled up by the difference. Pass 0 when
    /// the amount is already in asset units.
    pub async fn ensure_balance(
        &self,
        asset_id: &str,
        balance_of: fn(&Balance) -> Amount,
        target: Amount,
        market_decimals: u64,
        scale: u64,
        from: &str,
    ) -> anyhow::Result<()> {
        let store = self.store(asset_id).await?;
        // plain orders and liquidity provision draw on the general account
        // only; a liquidity increase draws on bond + general
        let balance = balance_of(&store.balance());

        let asset = self
            .stream
            .asset_by_id(asset_id)
            .await
            .context("failed to get asset by id")?;

        let mut target = target;
        if market_decimals > 0 && asset.decimals > market_decimals {
            target = target.saturating_mul(num::pow10(asset.decimals - market_decimals));
        }

        if balance >= target {
            return Ok(());
        }

        let ask = if scale > 1 {
            target.saturating_mul(Amount::from(scale))
        } else {
            target
        };

        tracing::debug!(
            name = %self.name,
            party = %self.party,
            asset = %asset_id,
            %balance,
            %target,
            %ask,
            from,
            "account balance below target, depositing",
        );

        self.top_up(asset, ask, from).await.context("failed to top up")
    }

    async fn top_up(
        &self,
        asset: crate::types::Asset,
        amount: Amount,
        from: &str,
    ) -> anyhow::Result<()> {
        let (response, outcome) = oneshot::channel();
        self.provider
            .top_up_requests()
            .send(TopUpRequest {
                receiver_name: self.name.clone(),
                receiver_party: self.party.clone(),
                asset,
                amount,
                from: from.to_string(),
                response,
            })
            .await
            .map_err(|_| anyhow!("coin provider is not accepting top-up requests"))?;

        outcome
            .await
            .map_err(|_| anyhow!("coin provider dropped the top-up request"))?
            .context("failed to deposit")
    }

    /// Ensures the receiver's stake covers `target`, delegating to the coin
    /// provider when it does not.
    pub async fn ensure_stake(
        &self,
        receiver_name: &str,
        receiver_party: &str,
        asset_id: &str,
        target: Amount,
        from: &str,
    ) -> anyhow::Result<()> {
        if receiver_party.is_empty() {
            bail!("receiver party is empty");
        }

        let stake = self.stream.get_stake(receiver_party).await?;
        if stake > target {
            return Ok(());
        }

        tracing::debug!(
            name = %self.name,
            receiver_name,
            receiver_party,
            party = %self.party,
            %stake,
            %target,
            from,
            "stake below target, staking",
        );

        self.provider
            .stake(receiver_name, receiver_party, asset_id, target, from)
            .await
            .context("failed to stake")
    }

    pub async fn stake(
        &self,
        receiver_name: &str,
        receiver_party: &str,
        asset_id: &str,
        amount: Amount,
        from: &str,
    ) -> anyhow::Result<()> {
        self.provider
            .stake(receiver_name, receiver_party, asset_id, amount, from)
            .await
    }

    /// The current balance snapshot, zero when the store cannot be read.
    pub async fn balance(&self, asset_id: &str) -> Balance {
        match self.store(asset_id).await {
            Ok(store) => store.balance(),
            Err(err) => {
                tracing::error!(name = %self.name, %err, "failed to get balance store");
                Balance::default()
            }
        }
    }

    async fn store(&self, asset_id: &str) -> anyhow::Result<Arc<BalanceStore>> {
        if let Some(store) = self
            .stores
            .lock()
            .expect("store lock poisoned")
            .get(asset_id)
        {
            return Ok(Arc::clone(store));
        }

        let store = self
            .stream
            .get_balances(asset_id, &self.party)
            .await
            .with_context(|| format!("failed to initialise balances for '{asset_id}'"))?;
        self.stores
            .lock()
            .expect("store lock poisoned")
            .insert(asset_id.to_string(), Arc::clone(&store));
        Ok(store)
    }
}
