//! Scripted mock collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tradenet_connector::account::{AccountBalance, AccountStream, DataNode};
use tradenet_connector::config::ConnectorConfig;
use tradenet_connector::errors::StreamError;
use tradenet_connector::events::{
    AccountKind, AccountUpdate, BusEvent, BusStreamer, Deposit, DepositStatus, EventStream,
    StakeLinking, StakeLinkingStatus, SubscriptionFilter, Transfer, TransferStatus,
};
use tradenet_connector::num::Amount;
use tradenet_connector::types::{Asset, TopUpRequest};
use tradenet_connector::CoinProvider;

/// One scripted action of a mock stream, played back in order. When a script
/// runs out the stream blocks forever, like an idle subscription.
pub enum Step {
    /// Deliver a batch of events.
    Batch(Vec<BusEvent>),
    /// Sleep before the next step.
    Wait(Duration),
    /// Fail the receive with the given error.
    Fail(StreamError),
}

pub struct ScriptedStream {
    steps: VecDeque<Step>,
}

#[async_trait]
impl EventStream for ScriptedStream {
    async fn subscribe(&mut self, _filter: &SubscriptionFilter) -> Result<(), StreamError> {
        Ok(())
    }

    async fn recv(&mut self) -> Result<Vec<BusEvent>, StreamError> {
        loop {
            match self.steps.pop_front() {
                Some(Step::Batch(events)) => return Ok(events),
                Some(Step::Wait(delay)) => tokio::time::sleep(delay).await,
                Some(Step::Fail(err)) => return Err(err),
                None => std::future::pending::<()>().await,
            }
        }
    }
}

/// A data node whose streams and read responses are scripted by the test.
pub struct MockNode {
    /// Outcomes of successive `observe_event_bus` calls. An empty queue
    /// yields an idle stream that never produces anything.
    streams: Mutex<VecDeque<Result<Vec<Step>, StreamError>>>,
    /// Calls made to `must_dial_connection`.
    pub dials: AtomicUsize,
    /// Dial attempts that actually established the connection.
    pub dial_executions: AtomicUsize,
    /// Calls made to `observe_event_bus`.
    pub observes: AtomicUsize,
    connected: tokio::sync::Mutex<bool>,
    accounts: Mutex<Vec<AccountBalance>>,
    stake: Mutex<String>,
    assets: Mutex<HashMap<String, Asset>>,
}

impl MockNode {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            streams: Mutex::new(VecDeque::new()),
            dials: AtomicUsize::new(0),
            dial_executions: AtomicUsize::new(0),
            observes: AtomicUsize::new(0),
            connected: tokio::sync::Mutex::new(true),
            accounts: Mutex::new(Vec::new()),
            stake: Mutex::new("0".to_string()),
            assets: Mutex::new(HashMap::new()),
        })
    }

    pub fn push_stream(&self, steps: Vec<Step>) {
        self.streams.lock().unwrap().push_back(Ok(steps));
    }

    pub fn push_observe_error(&self, err: StreamError) {
        self.streams.lock().unwrap().push_back(Err(err));
    }

    pub async fn set_connected(&self, connected: bool) {
        *self.connected.lock().await = connected;
    }

    pub fn set_accounts(&self, accounts: Vec<AccountBalance>) {
        *self.accounts.lock().unwrap() = accounts;
    }

    pub fn set_stake(&self, stake: &str) {
        *self.stake.lock().unwrap() = stake.to_string();
    }

    pub fn insert_asset(&self, asset: Asset) {
        self.assets.lock().unwrap().insert(asset.id.clone(), asset);
    }

    pub fn observe_count(&self) -> usize {
        self.observes.load(Ordering::SeqCst)
    }

    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BusStreamer for MockNode {
    type Stream = ScriptedStream;

    async fn must_dial_connection(&self) {
        self.dials.fetch_add(1, Ordering::SeqCst);
        let mut connected = self.connected.lock().await;
        if !*connected {
            // pretend the dial takes a moment; concurrent callers queue on
            // the lock and find the connection already up
            tokio::time::sleep(Duration::from_millis(10)).await;
            *connected = true;
            self.dial_executions.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn observe_event_bus(&self) -> Result<ScriptedStream, StreamError> {
        self.observes.fetch_add(1, Ordering::SeqCst);
        match self.streams.lock().unwrap().pop_front() {
            Some(Ok(steps)) => Ok(ScriptedStream {
                steps: steps.into(),
            }),
            Some(Err(err)) => Err(err),
            None => Ok(ScriptedStream {
                steps: VecDeque::new(),
            }),
        }
    }
}

#[async_trait]
impl DataNode for MockNode {
    async fn party_accounts(
        &self,
        _party: &str,
        _asset: &str,
    ) -> anyhow::Result<Vec<AccountBalance>> {
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn party_stake(&self, _party: &str) -> anyhow::Result<String> {
        Ok(self.stake.lock().unwrap().clone())
    }

    async fn asset_by_id(&self, id: &str) -> anyhow::Result<Asset> {
        self.assets
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown asset '{id}'"))
    }
}

/// A coin provider that records stake calls and forwards top-up requests to
/// the test's own channel.
pub struct RecordingProvider {
    top_ups: mpsc::Sender<TopUpRequest>,
    pub stakes: Mutex<Vec<(String, String, Amount)>>,
}

impl RecordingProvider {
    pub fn new(top_ups: mpsc::Sender<TopUpRequest>) -> Arc<Self> {
        Arc::new(Self {
            top_ups,
            stakes: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CoinProvider for RecordingProvider {
    fn top_up_requests(&self) -> mpsc::Sender<TopUpRequest> {
        self.top_ups.clone()
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

pub fn account_stream(node: &Arc<MockNode>) -> AccountStream<MockNode> {
    AccountStream::new("test", Arc::clone(node), &ConnectorConfig::default(), None)
}

pub fn amt(value: u64) -> Amount {
    Amount::from(value)
}

pub fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

pub fn general_balance(party: &str, asset: &str, balance: &str) -> BusEvent {
    account_balance(party, asset, AccountKind::General, balance)
}

pub fn account_balance(party: &str, asset: &str, kind: AccountKind, balance: &str) -> BusEvent {
    BusEvent::Account(AccountUpdate {
        owner: party.to_string(),
        asset: asset.to_string(),
        kind,
        balance: balance.to_string(),
    })
}

pub fn deposit(id: &str, party: &str, asset: &str, amount: &str, status: DepositStatus) -> BusEvent {
    BusEvent::Deposit(Deposit {
        id: id.to_string(),
        party: party.to_string(),
        asset: asset.to_string(),
        amount: amount.to_string(),
        status,
    })
}

pub fn transfer(
    id: &str,
    from: &str,
    to: &str,
    asset: &str,
    amount: &str,
    status: TransferStatus,
    reason: Option<&str>,
) -> BusEvent {
    BusEvent::Transfer(Transfer {
        id: id.to_string(),
        from: from.to_string(),
        to: to.to_string(),
        asset: asset.to_string(),
        amount: amount.to_string(),
        status,
        reason: reason.map(str::to_string),
    })
}

pub fn stake_link(id: &str, party: &str, status: StakeLinkingStatus) -> BusEvent {
    BusEvent::StakeLinking(StakeLinking {
        id: id.to_string(),
        party: party.to_string(),
        status,
    })
}
