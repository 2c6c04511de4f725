//! # Bridge Provider
//!
//! The treasury's own coin provider for bridged assets: when the whale's
//! general account runs dry, funds are pulled across the token bridge from a
//! foreign-chain owner key configured per asset. Runs the same
//! request-channel pattern as the treasury itself, so the whale's
//! `AccountService` can be pointed at a [`BridgeProviderHandle`].

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tradenet_connector::account::CoinProvider;
use tradenet_connector::num::Amount;
use tradenet_connector::types::{Asset, AssetClass, AssetId, TopUpRequest};

use crate::clients::{BridgeClient, StreamOps};
use crate::config::OwnerKey;

struct BridgeState {
    bridge: Arc<dyn BridgeClient>,
    stream: Arc<dyn StreamOps>,
    owner_keys: HashMap<AssetId, OwnerKey>,
}

/// The background half of the provider; consumed by [`BridgeProvider::run`].
pub struct BridgeProvider {
    state: Arc<BridgeState>,
    requests: mpsc::Receiver<TopUpRequest>,
}

/// Clonable handle implementing [`CoinProvider`] over the bridge.
#[derive(Clone)]
pub struct BridgeProviderHandle {
    state: Arc<BridgeState>,
    requests: mpsc::Sender<TopUpRequest>,
}

impl BridgeProvider {
    pub fn new(
        bridge: Arc<dyn BridgeClient>,
        stream: Arc<dyn StreamOps>,
        owner_keys: HashMap<AssetId, OwnerKey>,
        request_buffer: usize,
    ) -> (Self, BridgeProviderHandle) {
        let state = Arc::new(BridgeState {
            bridge,
            stream,
            owner_keys,
        });
        let (request_tx, request_rx) = mpsc::channel(request_buffer.max(1));
        let handle = BridgeProviderHandle {
            state: Arc::clone(&state),
            requests: request_tx,
        };
        (
            Self {
                state,
                requests: request_rx,
            },
            handle,
        )
    }

    /// Serves bridge-deposit requests until every handle is dropped.
    pub async fn run(mut self) {
        tracing::info!("bridge provider is accepting top-up requests");
        while let Some(request) = self.requests.recv().await {
            let TopUpRequest {
                receiver_name,
                receiver_party,
                asset,
                amount,
                response,
                ..
            } = request;
            let outcome = self
                .state
                .handle_top_up(&receiver_name, &receiver_party, &asset, amount)
                .await;
            if response.send(outcome).is_err() {
                tracing::warn!(
                    receiver_name = %receiver_name,
                    "bridge top-up requester went away before the outcome was ready",
                );
            }
        }
        tracing::info!("bridge provider request channel closed, shutting down");
    }
}

impl BridgeState {
    async fn handle_top_up(
        &self,
        receiver_name: &str,
        receiver_party: &str,
        asset: &Asset,
        amount: Amount,
    ) -> anyhow::Result<()> {
        self.deposit(receiver_name, receiver_party, asset, amount)
            .await?;

        self.stream
            .wait_for_top_up(receiver_party, &asset.id, amount, None)
            .await
            .context("failed to finalise bridge deposit")?;
        Ok(())
    }

    async fn deposit(
        &self,
        receiver_name: &str,
        receiver_party: &str,
        asset: &Asset,
        amount: Amount,
    ) -> anyhow::Result<()> {
        let owner = self.owner_key(&asset.id)?;
        let AssetClass::Bridged { contract_address } = &asset.class else {
            bail!("asset '{}' is not a bridged asset", asset.id);
        };

        let added = self
            .bridge
            .deposit(owner, contract_address, receiver_party, amount)
            .await
            .with_context(|| {
                format!(
                    "failed to deposit {} {} to '{}', name '{}'",
                    amount, asset.symbol, receiver_party, receiver_name,
                )
            })?;

        if added < amount {
            bail!("bridge credited less than the requested amount");
        }
        Ok(())
    }

    async fn stake(
        &self,
        receiver_party: &str,
        asset: &Asset,
        amount: Amount,
    ) -> anyhow::Result<()> {
        let owner = self.owner_key(&asset.id)?;
        let AssetClass::Bridged { contract_address } = &asset.class else {
            bail!("asset '{}' is not a bridged asset", asset.id);
        };

        let added = self
            .bridge
            .stake(owner, contract_address, receiver_party, amount)
            .await
            .with_context(|| format!("failed to stake for '{receiver_party}'"))?;

        if added < amount {
            bail!("bridge staked less than the requested amount");
        }
        Ok(())
    }

    fn owner_key(&self, asset_id: &str) -> anyhow::Result<&OwnerKey> {
        self.owner_keys
            .get(asset_id)
            .with_context(|| format!("owner key not configured for asset '{asset_id}'"))
    }
}

#[async_trait]
impl CoinProvider for BridgeProviderHandle {
    fn top_up_requests(&self) -> mpsc::Sender<TopUpRequest> {
        self.requests.clone()
    }

    async fn stake(
        &self,
        _receiver_name: &str,
        receiver_party: &str,
        asset_id: &str,
        amount: Amount,
        _from: &str,
    ) -> anyhow::Result<()> {
        let asset = self.state.stream.asset_by_id(asset_id).await?;
        self.state.stake(receiver_party, &asset, amount).await
    }
}
