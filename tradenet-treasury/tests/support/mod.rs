//! Mock money movers shared by the treasury integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tradenet_connector::account::Balance;
use tradenet_connector::errors::WaitError;
use tradenet_connector::num::Amount;
use tradenet_connector::types::{Asset, AssetClass};
use tradenet_treasury::{
    AccountOps, BridgeClient, FaucetClient, OwnerKey, StreamOps, TransferCommand, WalletClient,
};

pub const WHALE_KEY: &str = "whale-pub-key";

pub fn amt(value: u64) -> Amount {
    Amount::from(value)
}

pub fn builtin_asset(id: &str, max_faucet: &str) -> Asset {
    Asset {
        id: id.to_string(),
        symbol: "BLT".to_string(),
        decimals: 0,
        class: AssetClass::Builtin {
            max_faucet_amount_mint: max_faucet.to_string(),
        },
    }
}

pub fn bridged_asset(id: &str) -> Asset {
    Asset {
        id: id.to_string(),
        symbol: "TKN".to_string(),
        decimals: 0,
        class: AssetClass::Bridged {
            contract_address: "0xdeadbeef".to_string(),
        },
    }
}

#[derive(Default)]
pub struct MockWallet {
    pub transfers: Mutex<Vec<TransferCommand>>,
}

#[async_trait]
impl WalletClient for MockWallet {
    fn public_key(&self) -> &str {
        WHALE_KEY
    }

    async fn submit_transfer(&self, command: TransferCommand) -> anyhow::Result<()> {
        self.transfers.lock().unwrap().push(command);
        Ok(())
    }
}

pub struct MockFaucet {
    pub mints: Mutex<Vec<(String, String, String)>>,
    pub accept: bool,
}

impl Default for MockFaucet {
    fn default() -> Self {
        Self {
            mints: Mutex::new(Vec::new()),
            accept: true,
        }
    }
}

#[async_trait]
impl FaucetClient for MockFaucet {
    async fn mint(&self, amount: &str, asset: &str, party: &str) -> anyhow::Result<bool> {
        self.mints.lock().unwrap().push((
            amount.to_string(),
            asset.to_string(),
            party.to_string(),
        ));
        Ok(self.accept)
    }
}

#[derive(Default)]
pub struct MockAccount {
    /// (asset, target, scale) per ensure_balance call.
    pub ensures: Mutex<Vec<(String, Amount, u64)>>,
    /// (receiver_party, asset, amount) per stake call.
    pub stakes: Mutex<Vec<(String, String, Amount)>>,
}

#[async_trait]
impl AccountOps for MockAccount {
    async fn ensure_balance(
        &self,
        asset_id: &str,
        _balance_of: for<'a> fn(&'a Balance) -> Amount,
        target: Amount,
        _market_decimals: u64,
        scale: u64,
        _from: &str,
    ) -> anyhow::Result<()> {
        self.ensures
            .lock()
            .unwrap()
            .push((asset_id.to_string(), target, scale));
        Ok(())
    }

    async fn stake(
        &self,
        _receiver_name: &str,
        receiver_party: &str,
        asset_id: &str,
        amount: Amount,
        _from: &str,
    ) -> anyhow::Result<()> {
        self.stakes.lock().unwrap().push((
            receiver_party.to_string(),
            asset_id.to_string(),
            amount,
        ));
        Ok(())
    }
}

pub struct MockStream {
    pub assets: Mutex<HashMap<String, Asset>>,
    /// (party, asset, amount) per wait_for_top_up call.
    pub top_up_waits: Mutex<Vec<(String, String, Amount)>>,
    pub stake_waits: Mutex<Vec<String>>,
    pub top_up_outcome: Mutex<Result<(), WaitError>>,
}

impl Default for MockStream {
    fn default() -> Self {
        Self {
            assets: Mutex::new(HashMap::new()),
            top_up_waits: Mutex::new(Vec::new()),
            stake_waits: Mutex::new(Vec::new()),
            top_up_outcome: Mutex::new(Ok(())),
        }
    }
}

impl MockStream {
    pub fn insert_asset(&self, asset: Asset) {
        self.assets.lock().unwrap().insert(asset.id.clone(), asset);
    }
}

#[async_trait]
impl StreamOps for MockStream {
    async fn asset_by_id(&self, id: &str) -> anyhow::Result<Asset> {
        self.assets
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown asset '{id}'"))
    }

    async fn wait_for_top_up(
        &self,
        party: &str,
        asset_id: &str,
        amount: Amount,
        _timeout: Option<Duration>,
    ) -> Result<(), WaitError> {
        self.top_up_waits.lock().unwrap().push((
            party.to_string(),
            asset_id.to_string(),
            amount,
        ));
        self.top_up_outcome.lock().unwrap().clone()
    }

    async fn wait_for_stake_linking(&self, party: &str) -> Result<(), WaitError> {
        self.stake_waits.lock().unwrap().push(party.to_string());
        Ok(())
    }
}

pub struct MockBridge {
    /// (token_address, receiver, amount) per deposit.
    pub deposits: Mutex<Vec<(String, String, Amount)>>,
    pub stakes: Mutex<Vec<(String, String, Amount)>>,
    /// Amount the bridge pretends to credit; `None` echoes the request.
    pub credited: Option<Amount>,
}

impl Default for MockBridge {
    fn default() -> Self {
        Self {
            deposits: Mutex::new(Vec::new()),
            stakes: Mutex::new(Vec::new()),
            credited: None,
        }
    }
}

#[async_trait]
impl BridgeClient for MockBridge {
    async fn deposit(
        &self,
        _owner: &OwnerKey,
        token_address: &str,
        receiver_party: &str,
        amount: Amount,
    ) -> anyhow::Result<Amount> {
        self.deposits.lock().unwrap().push((
            token_address.to_string(),
            receiver_party.to_string(),
            amount,
        ));
        Ok(self.credited.unwrap_or(amount))
    }

    async fn stake(
        &self,
        _owner: &OwnerKey,
        token_address: &str,
        receiver_party: &str,
        amount: Amount,
    ) -> anyhow::Result<Amount> {
        self.stakes.lock().unwrap().push((
            token_address.to_string(),
            receiver_party.to_string(),
            amount,
        ));
        Ok(self.credited.unwrap_or(amount))
    }
}

pub fn owner_key() -> OwnerKey {
    OwnerKey {
        address: "0xowner".to_string(),
        private_key: "0xsecret".to_string(),
    }
}
