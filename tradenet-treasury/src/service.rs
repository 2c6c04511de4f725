//! # Treasury Service
//!
//! The whale: a funded wallet that keeps bot accounts solvent. [`Treasury`]
//! drains a channel of [`TopUpRequest`]s, dispenses funds (faucet mint for
//! builtin assets, general-account transfer otherwise) and answers each
//! request only once the top-up has been observed on the event bus.
//! [`TreasuryHandle`] is the clonable API handed to bots; it implements
//! [`CoinProvider`] so an `AccountService` can be pointed straight at it.

use std::sync::Arc;

use anyhow::{bail, Context};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time;
use tradenet_connector::account::{self, CoinProvider};
use tradenet_connector::num::{self, Amount};
use tradenet_connector::types::{Asset, AssetClass, TopUpRequest};

use crate::clients::{AccountOps, FaucetClient, StreamOps, TransferCommand, WalletClient};
use crate::config::TreasuryConfig;

/// Multiplier applied to a requested amount before dispensing, so one
/// request keeps the receiver funded for a while.
const TOP_UP_HEADROOM: u64 = 30;
/// Scale passed when topping up the treasury's own account.
const ENSURE_SCALE: u64 = 100;

/// The background half of the treasury; consumed by [`Treasury::run`].
pub struct Treasury {
    wallet: Arc<dyn WalletClient>,
    faucet: Arc<dyn FaucetClient>,
    account: Arc<dyn AccountOps>,
    stream: Arc<dyn StreamOps>,
    config: TreasuryConfig,
    requests: mpsc::Receiver<TopUpRequest>,
}

/// Clonable handle for requesting funds from a running [`Treasury`].
#[derive(Clone)]
pub struct TreasuryHandle {
    requests: mpsc::Sender<TopUpRequest>,
    account: Arc<dyn AccountOps>,
    stream: Arc<dyn StreamOps>,
}

impl Treasury {
    pub fn new(
        wallet: Arc<dyn WalletClient>,
        faucet: Arc<dyn FaucetClient>,
        account: Arc<dyn AccountOps>,
        stream: Arc<dyn StreamOps>,
        config: TreasuryConfig,
    ) -> (Self, TreasuryHandle) {
        let (request_tx, request_rx) = mpsc::channel(config.request_buffer.max(1));
        let handle = TreasuryHandle {
            requests: request_tx,
            account: Arc::clone(&account),
            stream: Arc::clone(&stream),
        };
        let runner = Self {
            wallet,
            faucet,
            account,
            stream,
            config,
            requests: request_rx,
        };
        (runner, handle)
    }

    /// Serves top-up requests until every handle is dropped. Spawn this as a
    /// background task.
    pub async fn run(mut self) {
        tracing::info!(wallet = %self.config.wallet_name, "treasury is accepting top-up requests");
        while let Some(request) = self.requests.recv().await {
            let TopUpRequest {
                receiver_name,
                receiver_party,
                asset,
                amount,
                from,
                response,
            } = request;
            let outcome = self
                .handle_top_up(&receiver_name, &receiver_party, &asset, amount, &from)
                .await;
            if response.send(outcome).is_err() {
                tracing::warn!(
                    receiver_name = %receiver_name,
                    "top-up requester went away before the outcome was ready",
                );
            }
        }
        tracing::info!("treasury request channel closed, shutting down");
    }

    async fn handle_top_up(
        &self,
        receiver_name: &str,
        receiver_party: &str,
        asset: &Asset,
        amount: Amount,
        from: &str,
    ) -> anyhow::Result<()> {
        tracing::debug!(receiver_name, "top up...");

        if asset.id.is_empty() {
            bail!("asset id is empty for bot '{receiver_name}'");
        }
        if receiver_party == self.wallet.public_key() {
            bail!("whale and bot address cannot be the same");
        }

        self.dispense(receiver_name, receiver_party, asset, amount, from)
            .await
            .context("failed to top up")?;

        tracing::debug!(
            receiver_name,
            receiver_party,
            asset = %asset.id,
            amount = %amount,
            from,
            "top-up sent, waiting for it to land",
        );

        self.stream
            .wait_for_top_up(receiver_party, &asset.id, amount, None)
            .await
            .context("failed to wait for top-up to finalise")?;

        tracing::debug!(receiver_name, from, "top-up complete");
        Ok(())
    }

    async fn dispense(
        &self,
        receiver_name: &str,
        receiver_party: &str,
        asset: &Asset,
        amount: Amount,
        from: &str,
    ) -> anyhow::Result<()> {
        let ensure_amount = amount.saturating_mul(Amount::from(TOP_UP_HEADROOM));

        if let AssetClass::Builtin {
            max_faucet_amount_mint,
        } = &asset.class
        {
            return self
                .dispense_builtin(&asset.id, receiver_party, ensure_amount, max_faucet_amount_mint)
                .await
                .context("failed to deposit builtin asset");
        }

        // market decimals 0: the amount was already corrected upstream
        self.account
            .ensure_balance(
                &asset.id,
                account::general,
                ensure_amount,
                0,
                ENSURE_SCALE,
                &format!("{from}>{}", self.config.wallet_name),
            )
            .await
            .context("failed to ensure enough funds")?;

        self.wallet
            .submit_transfer(TransferCommand {
                to: receiver_party.to_string(),
                asset: asset.id.clone(),
                amount,
                reference: format!("Bot '{receiver_name}' Top-Up"),
            })
            .await
            .with_context(|| format!("failed to top-up bot '{receiver_name}'"))
    }

    /// Mints a builtin asset through the faucet, spreading the request over
    /// several capped mints when it exceeds the per-mint maximum.
    async fn dispense_builtin(
        &self,
        asset_id: &str,
        party: &str,
        amount: Amount,
        max_faucet_mint: &str,
    ) -> anyhow::Result<()> {
        let max_faucet =
            num::parse_amount(max_faucet_mint).context("failed to parse max faucet amount")?;
        if max_faucet.is_zero() {
            bail!("asset '{asset_id}' has a zero faucet mint cap");
        }

        if max_faucet > amount {
            self.mint_once(asset_id, party, &max_faucet.to_string())
                .await?;
            return Ok(());
        }

        let times = (amount / max_faucet).saturating_to::<u64>() + 1;
        let mut total_minted = Amount::ZERO;

        for _ in 0..times {
            self.mint_once(asset_id, party, &max_faucet.to_string())
                .await?;
            total_minted += max_faucet;

            time::sleep(self.config.faucet_rate_limit()).await;
            tracing::info!(
                asset = %asset_id,
                party = %party,
                minted = %total_minted,
                requested = %amount,
                "minted builtin asset",
            );
        }

        Ok(())
    }

    async fn mint_once(&self, asset_id: &str, party: &str, amount: &str) -> anyhow::Result<()> {
        if !self
            .faucet
            .mint(amount, asset_id, party)
            .await
            .context("failed to mint")?
        {
            bail!("faucet mint was not accepted");
        }
        Ok(())
    }
}

impl TreasuryHandle {
    /// Stakes on behalf of a receiver and blocks until the stake link is
    /// accepted on the event bus.
    pub async fn stake(
        &self,
        receiver_name: &str,
        receiver_party: &str,
        asset_id: &str,
        amount: Amount,
        from: &str,
    ) -> anyhow::Result<()> {
        tracing::debug!(receiver_party, "staking...");

        self.account
            .stake(receiver_name, receiver_party, asset_id, amount, from)
            .await
            .context("failed to stake")?;

        tracing::debug!(
            receiver_name,
            receiver_party,
            amount = %amount,
            from,
            "waiting for stake linking",
        );

        self.stream
            .wait_for_stake_linking(receiver_party)
            .await
            .context("failed to finalise stake")?;
        Ok(())
    }
}

#[async_trait]
impl CoinProvider for TreasuryHandle {
    fn top_up_requests(&self) -> mpsc::Sender<TopUpRequest> {
        self.requests.clone()
    }

    async fn stake(
        &self,
        receiver_name: &str,
        receiver_party: &str,
        asset_id: &str,
        amount: Amount,
        from: &str,
    ) -> anyhow::Result<()> {
        TreasuryHandle::stake(self, receiver_name, receiver_party, asset_id, amount, from).await
    }
}
