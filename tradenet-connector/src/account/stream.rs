//! # Account Streamer
//!
//! [`AccountStream`] owns one session's view of the chain: a lazily seeded,
//! event-driven balance cache per (party, asset), plus the blocking waits for
//! top-up and stake-linking outcomes. All state is owned by the instance and
//! injected where needed; there are no process-wide maps. Each bot or wallet
//! session gets its own stream.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::account::store::{self, BalanceStore};
use crate::config::{ConnectorConfig, WaitConfig};
use crate::errors::WaitError;
use crate::events::{
    AccountKind, BatchVerdict, BusEvent, BusEventProcessor, BusEventType, BusStreamer,
    DepositStatus, StakeLinkingStatus, Subscription, SubscriptionFilter, TransferStatus,
};
use crate::num::{self, Amount};
use crate::types::{Asset, AssetId, PartyId, PauseSignal};

/// Data-node surface this module needs: the event bus plus the synchronous
/// read APIs used for cold-start seeding. Read errors are propagated, not
/// retried; retry is the processor's responsibility.
#[async_trait]
pub trait DataNode: BusStreamer {
    /// Full account listing for one party in one asset.
    async fn party_accounts(&self, party: &str, asset: &str)
        -> anyhow::Result<Vec<AccountBalance>>;

    /// The party's current stake, as a base-10 amount.
    async fn party_stake(&self, party: &str) -> anyhow::Result<String>;

    async fn asset_by_id(&self, id: &str) -> anyhow::Result<Asset>;
}

/// One row of a full account listing, used to seed a balance store.
#[derive(Debug, Clone)]
pub struct AccountBalance {
    pub kind: AccountKind,
    pub balance: String,
}

type StoreKey = (PartyId, AssetId);

type TopUpOutcome = Result<(), WaitError>;

/// The record of one outstanding top-up wait. At most one exists per key;
/// later callers update the target in place and subscribe to `done`.
struct PendingTopUp {
    target: Amount,
    done: watch::Sender<Option<TopUpOutcome>>,
}

enum TopUpRole {
    Owner,
    Follower(watch::Receiver<Option<TopUpOutcome>>),
}

pub struct AccountStream<N> {
    inner: Arc<Inner<N>>,
}

impl<N> Clone for AccountStream<N> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<N> {
    name: String,
    node: Arc<N>,
    processor: BusEventProcessor<N>,
    wait: WaitConfig,
    stores: Mutex<HashMap<StoreKey, Arc<BalanceStore>>>,
    pending_top_ups: Mutex<HashMap<StoreKey, PendingTopUp>>,
    /// Parties with a live account-event subscription.
    account_subs: Mutex<HashSet<PartyId>>,
    tasks: Mutex<Vec<Subscription>>,
    root: CancellationToken,
}

impl<N: DataNode + 'static> AccountStream<N> {
    pub fn new(
        name: impl Into<String>,
        node: Arc<N>,
        config: &ConnectorConfig,
        pause_tx: Option<mpsc::Sender<PauseSignal>>,
    ) -> Self {
        let mut processor =
            BusEventProcessor::new(Arc::clone(&node)).with_retry_delay(config.node.retry_delay());
        if let Some(pause_tx) = pause_tx {
            processor = processor.with_pause_channel(pause_tx);
        }
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                node,
                processor,
                wait: config.wait.clone(),
                stores: Mutex::new(HashMap::new()),
                pending_top_ups: Mutex::new(HashMap::new()),
                account_subs: Mutex::new(HashSet::new()),
                tasks: Mutex::new(Vec::new()),
                root: CancellationToken::new(),
            }),
        }
    }

    /// The live balance store for `(party, asset)`.
    ///
    /// An existing store is returned without I/O. Otherwise one is seeded
    /// from a synchronous full account listing and a background subscription
    /// is started (once per party) to keep every store of that party current
    /// for the stream's lifetime. Callers needing a stable value must copy
    /// the snapshot immediately.
    pub async fn get_balances(
        &self,
        asset: &str,
        party: &str,
    ) -> anyhow::Result<Arc<BalanceStore>> {
        let key = (party.to_string(), asset.to_string());
        if let Some(existing) = self.inner.lookup_store(&key) {
            return Ok(existing);
        }

        let accounts = self.inner.node.party_accounts(party, asset).await?;
        let store = self.inner.store_entry(&key);
        for account in accounts {
            if let Err(err) = store.set(&account.kind, &account.balance) {
                tracing::error!(
                    name = %self.inner.name,
                    kind = %account.kind,
                    %err,
                    "failed to seed account balance",
                );
            }
        }

        self.subscribe_to_account_events(party);

        Ok(store)
    }

    /// The party's current stake.
    pub async fn get_stake(&self, party: &str) -> anyhow::Result<Amount> {
        let stake = self.inner.node.party_stake(party).await?;
        Ok(num::parse_amount(&stake)?)
    }

    pub async fn asset_by_id(&self, id: &str) -> anyhow::Result<Asset> {
        self.inner.node.asset_by_id(id).await
    }

    /// Blocks until a deposit or transfer of at least `expect_amount` lands
    /// on the party's general account for `asset`, or fails.
    ///
    /// Waits for the same (party, asset) coalesce: the first caller opens the
    /// single underlying subscription, later callers update the target to
    /// their own amount and block on the shared resolution. Every coalesced
    /// caller observes the same outcome, including a timeout.
    ///
    /// `timeout` of `None` waits until cancelled by dropping the future.
    pub async fn wait_for_top_up(
        &self,
        party: &str,
        asset: &str,
        expect_amount: Amount,
        timeout: Option<Duration>,
    ) -> Result<(), WaitError> {
        let key = (party.to_string(), asset.to_string());
        match self.inner.claim_pending(&key, expect_amount) {
            TopUpRole::Follower(mut done) => wait_resolution(&mut done, timeout).await,
            TopUpRole::Owner => {
                // If this future is dropped mid-wait the guard still resolves
                // the entry, so coalesced followers are not left hanging.
                let pending = PendingGuard {
                    inner: &*self.inner,
                    key: &key,
                    outcome: None,
                };

                let token = self.inner.root.child_token();
                let _stop = token.clone().drop_guard();
                let filter = SubscriptionFilter::for_types([
                    BusEventType::Deposit,
                    BusEventType::Transfer,
                    BusEventType::Account,
                ]);
                let mut sub = self.inner.processor.process_events(
                    token.clone(),
                    format!("top-up/{}", self.inner.name),
                    filter,
                    top_up_handler(Arc::clone(&self.inner), key.clone(), expect_amount),
                );

                let outcome = match timeout {
                    Some(limit) => match time::timeout(limit, sub.recv_err()).await {
                        Ok(Some(err)) => Err(err),
                        Ok(None) => Ok(()),
                        Err(_) => Err(WaitError::TopUpTimedOut),
                    },
                    None => match sub.recv_err().await {
                        Some(err) => Err(err),
                        None => Ok(()),
                    },
                };
                token.cancel();
                sub.join().await;

                pending.finish(outcome.clone());

                if outcome.is_ok() {
                    // Out-of-band refresh so the cached store reflects the
                    // post-top-up listing.
                    if let Err(err) = self.get_balances(asset, party).await {
                        tracing::error!(
                            name = %self.inner.name,
                            %err,
                            "failed to refresh balance after top-up",
                        );
                    }
                }
                outcome
            }
        }
    }

    /// Blocks until the party's stake-linking request is accepted, rejected,
    /// or the configured ceiling (450s by default) expires. Callers may layer
    /// their own, shorter cancellation on top.
    pub async fn wait_for_stake_linking(&self, party: &str) -> Result<(), WaitError> {
        let filter = SubscriptionFilter::for_types([BusEventType::StakeLinking]);
        let token = self.inner.root.child_token();
        let _stop = token.clone().drop_guard();

        let name = self.inner.name.clone();
        let party_owned = party.to_string();
        let handler = move |events: Vec<BusEvent>| {
            for event in events {
                let BusEvent::StakeLinking(link) = event else {
                    continue;
                };
                if link.party != party_owned {
                    continue;
                }
                match link.status {
                    StakeLinkingStatus::Accepted => {
                        tracing::info!(
                            name = %name,
                            party = %link.party,
                            stake_id = %link.id,
                            "stake linking accepted",
                        );
                        return BatchVerdict::Done;
                    }
                    StakeLinkingStatus::Pending => continue,
                    status => {
                        return BatchVerdict::Fail(WaitError::StakeLinkingFailed {
                            status: status.to_string(),
                        })
                    }
                }
            }
            BatchVerdict::Continue
        };

        let mut sub = self.inner.processor.process_events(
            token.clone(),
            format!("stake-linking/{}", self.inner.name),
            filter,
            handler,
        );
        let outcome = match time::timeout(self.inner.wait.stake_linking_timeout(), sub.recv_err())
            .await
        {
            Ok(Some(err)) => Err(err),
            Ok(None) => Ok(()),
            Err(_) => Err(WaitError::StakeLinkingTimedOut),
        };
        token.cancel();
        sub.join().await;
        outcome
    }

    /// Cancels every background subscription and waits for the loops to
    /// finish.
    pub async fn shutdown(&self) {
        self.inner.root.cancel();
        let tasks: Vec<Subscription> = {
            let mut tasks = self.inner.tasks.lock().expect("task lock poisoned");
            tasks.drain(..).collect()
        };
        for sub in tasks {
            sub.join().await;
        }
    }

    /// Starts the account-event subscription that keeps the party's balance
    /// stores current. A no-op when one is already running for the party.
    fn subscribe_to_account_events(&self, party: &str) {
        {
            let mut subs = self
                .inner
                .account_subs
                .lock()
                .expect("account subs lock poisoned");
            if subs.contains(party) {
                return;
            }
            subs.insert(party.to_string());
        }

        let filter =
            SubscriptionFilter::for_types([BusEventType::Account]).with_party(party);
        let inner = Arc::clone(&self.inner);
        let party_owned = party.to_string();
        let handler = move |events: Vec<BusEvent>| {
            for event in events {
                let BusEvent::Account(update) = event else {
                    continue;
                };
                if update.owner != party_owned {
                    continue;
                }
                let store = inner.store_entry(&(party_owned.clone(), update.asset.clone()));
                if let Err(err) = store.set(&update.kind, &update.balance) {
                    tracing::error!(
                        name = %inner.name,
                        kind = %update.kind,
                        %err,
                        "failed to set account balance",
                    );
                }
            }
            BatchVerdict::Continue
        };

        let sub = self.inner.processor.process_events(
            self.inner.root.child_token(),
            format!("account-data/{}", self.inner.name),
            filter,
            handler,
        );
        self.inner
            .tasks
            .lock()
            .expect("task lock poisoned")
            .push(sub);
    }
}

impl<N> Inner<N> {
    fn lookup_store(&self, key: &StoreKey) -> Option<Arc<BalanceStore>> {
        self.stores
            .lock()
            .expect("store lock poisoned")
            .get(key)
            .cloned()
    }

    /// The store for `key`, created empty when absent.
    fn store_entry(&self, key: &StoreKey) -> Arc<BalanceStore> {
        let mut stores = self.stores.lock().expect("store lock poisoned");
        Arc::clone(stores.entry(key.clone()).or_default())
    }

    /// Registers this caller against the pending-top-up map: the first caller
    /// for a key becomes the owner, everyone else adopts follower role after
    /// moving the target to their own amount.
    fn claim_pending(&self, key: &StoreKey, target: Amount) -> TopUpRole {
        let mut pending = self
            .pending_top_ups
            .lock()
            .expect("pending top-up lock poisoned");
        if let Some(entry) = pending.get_mut(key) {
            entry.target = target;
            return TopUpRole::Follower(entry.done.subscribe());
        }
        let (done, _) = watch::channel(None);
        pending.insert(key.clone(), PendingTopUp { target, done });
        TopUpRole::Owner
    }

    /// The current target for a pending wait; callers may have moved it since
    /// the subscription opened.
    fn current_target(&self, key: &StoreKey, fallback: Amount) -> Amount {
        self.pending_top_ups
            .lock()
            .expect("pending top-up lock poisoned")
            .get(key)
            .map(|entry| entry.target)
            .unwrap_or(fallback)
    }

    /// Removes the pending entry and fans the outcome out to every follower.
    /// Removal and broadcast happen under the same lock so no late caller can
    /// join a resolved wait.
    fn resolve_pending(&self, key: &StoreKey, outcome: TopUpOutcome) {
        let mut pending = self
            .pending_top_ups
            .lock()
            .expect("pending top-up lock poisoned");
        if let Some(entry) = pending.remove(key) {
            let _ = entry.done.send(Some(outcome));
        }
    }
}

/// Resolves the pending entry even when the owning future is dropped
/// mid-wait.
struct PendingGuard<'a, N> {
    inner: &'a Inner<N>,
    key: &'a StoreKey,
    outcome: Option<TopUpOutcome>,
}

impl<N> PendingGuard<'_, N> {
    fn finish(mut self, outcome: TopUpOutcome) {
        self.outcome = Some(outcome);
    }
}

impl<N> Drop for PendingGuard<'_, N> {
    fn drop(&mut self) {
        let outcome = self
            .outcome
            .take()
            .unwrap_or(Err(WaitError::TopUpTimedOut));
        self.inner.resolve_pending(self.key, outcome);
    }
}

async fn wait_resolution(
    done: &mut watch::Receiver<Option<TopUpOutcome>>,
    timeout: Option<Duration>,
) -> TopUpOutcome {
    let resolved = async {
        loop {
            if let Some(outcome) = done.borrow_and_update().clone() {
                return outcome;
            }
            if done.changed().await.is_err() {
                // The owner vanished without resolving.
                return Err(WaitError::TopUpTimedOut);
            }
        }
    };
    match timeout {
        Some(limit) => time::timeout(limit, resolved)
            .await
            .unwrap_or(Err(WaitError::TopUpTimedOut)),
        None => resolved.await,
    }
}

/// Classifier for a top-up wait. Deposits and transfers can fail the wait
/// outright; general-account events carry the observed balance that resolves
/// it.
fn top_up_handler<N: Send + Sync + 'static>(
    inner: Arc<Inner<N>>,
    key: StoreKey,
    expect_amount: Amount,
) -> impl FnMut(Vec<BusEvent>) -> BatchVerdict + Send + 'static {
    move |events: Vec<BusEvent>| {
        let (party, asset) = (&key.0, &key.1);
        for event in events {
            let balance = match event {
                BusEvent::Deposit(deposit) => {
                    if deposit.party != *party || deposit.asset != *asset {
                        continue;
                    }
                    if !matches!(
                        deposit.status,
                        DepositStatus::Open | DepositStatus::Finalized
                    ) {
                        tracing::error!(
                            name = %inner.name,
                            id = %deposit.id,
                            status = %deposit.status,
                            party = %deposit.party,
                            asset = %deposit.asset,
                            amount = %deposit.amount,
                            "deposit failed",
                        );
                        return BatchVerdict::Fail(WaitError::TransferFailed {
                            id: deposit.id,
                            status: deposit.status.to_string(),
                            reason: String::new(),
                        });
                    }
                    continue;
                }
                BusEvent::Transfer(transfer) => {
                    if transfer.to != *party || transfer.asset != *asset {
                        continue;
                    }
                    if !matches!(
                        transfer.status,
                        TransferStatus::Pending | TransferStatus::Done
                    ) {
                        let reason = transfer.reason.clone().unwrap_or_default();
                        let from_general = inner
                            .lookup_store(&(transfer.from.clone(), asset.clone()))
                            .map(|store| store::general(&store.balance()).to_string());
                        tracing::error!(
                            name = %inner.name,
                            id = %transfer.id,
                            status = %transfer.status,
                            reason = %reason,
                            party = %transfer.to,
                            from = %transfer.from,
                            from_general = ?from_general,
                            asset = %transfer.asset,
                            amount = %transfer.amount,
                            "transfer failed",
                        );
                        return BatchVerdict::Fail(WaitError::TransferFailed {
                            id: transfer.id,
                            status: transfer.status.to_string(),
                            reason,
                        });
                    }
                    continue;
                }
                BusEvent::Account(update) => {
                    if update.owner != *party || update.asset != *asset {
                        continue;
                    }
                    // only the general account carries the deposited funds
                    if update.kind != AccountKind::General {
                        continue;
                    }
                    update.balance
                }
                _ => continue,
            };

            // an empty or zero balance is no information yet
            if balance.is_empty() || balance == "0" {
                continue;
            }

            let got = match num::parse_amount(&balance) {
                Ok(amount) => amount,
                Err(err) => return BatchVerdict::Report(err.into()),
            };

            let target = inner.current_target(&key, expect_amount);
            if got >= target {
                tracing::info!(
                    name = %inner.name,
                    party = %party,
                    balance = %got,
                    "top-up finalised",
                );
                return BatchVerdict::Done;
            }
            if !got.is_zero() {
                // e.g. a faucet topping up in increments: keep waiting
                tracing::info!(
                    name = %inner.name,
                    party = %party,
                    got = %got,
                    target = %target,
                    "received funds, but balance is below target",
                );
            }
        }
        BatchVerdict::Continue
    }
}
