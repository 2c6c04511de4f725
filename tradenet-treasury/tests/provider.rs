//! Bridge provider behaviour: owner-key lookup, shortfall checks, and the
//! deposit-then-wait flow.

mod support;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::oneshot;
use tradenet_connector::account::CoinProvider;
use tradenet_connector::types::TopUpRequest;
use tradenet_treasury::BridgeProvider;

use support::{amt, bridged_asset, owner_key, MockBridge, MockStream};

fn spawn_provider(
    bridge: Arc<MockBridge>,
    stream: Arc<MockStream>,
    with_owner_key: bool,
) -> tradenet_treasury::BridgeProviderHandle {
    let mut owner_keys = HashMap::new();
    if with_owner_key {
        owner_keys.insert("asset-1".to_string(), owner_key());
    }
    let (provider, handle) = BridgeProvider::new(bridge as _, stream as _, owner_keys, 1);
    tokio::spawn(provider.run());
    handle
}

async fn request_top_up(
    handle: &tradenet_treasury::BridgeProviderHandle,
    asset: tradenet_connector::types::Asset,
    amount: tradenet_connector::num::Amount,
) -> anyhow::Result<()> {
    let (response, outcome) = oneshot::channel();
    handle
        .top_up_requests()
        .send(TopUpRequest {
            receiver_name: "whale".to_string(),
            receiver_party: "whale-party".to_string(),
            asset,
            amount,
            from: "test".to_string(),
            response,
        })
        .await
        .unwrap();
    outcome.await.unwrap()
}

#[tokio::test(start_paused = true)]
async fn deposits_then_waits_for_the_funds_to_land() {
    let bridge = Arc::new(MockBridge::default());
    let stream = Arc::new(MockStream::default());
    let handle = spawn_provider(Arc::clone(&bridge), Arc::clone(&stream), true);

    request_top_up(&handle, bridged_asset("asset-1"), amt(100))
        .await
        .unwrap();

    assert_eq!(
        *bridge.deposits.lock().unwrap(),
        vec![("0xdeadbeef".to_string(), "whale-party".to_string(), amt(100))],
    );
    assert_eq!(
        *stream.top_up_waits.lock().unwrap(),
        vec![("whale-party".to_string(), "asset-1".to_string(), amt(100))],
    );
}

#[tokio::test(start_paused = true)]
async fn a_shortfall_from_the_bridge_is_an_error() {
    let bridge = Arc::new(MockBridge {
        credited: Some(amt(10)),
        ..MockBridge::default()
    });
    let stream = Arc::new(MockStream::default());
    let handle = spawn_provider(Arc::clone(&bridge), Arc::clone(&stream), true);

    let err = request_top_up(&handle, bridged_asset("asset-1"), amt(100))
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("credited less"));
    // no point waiting for funds that were never sent
    assert!(stream.top_up_waits.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn a_missing_owner_key_is_an_error() {
    let bridge = Arc::new(MockBridge::default());
    let stream = Arc::new(MockStream::default());
    let handle = spawn_provider(Arc::clone(&bridge), Arc::clone(&stream), false);

    let err = request_top_up(&handle, bridged_asset("asset-1"), amt(100))
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("owner key not configured"));
}

#[tokio::test(start_paused = true)]
async fn stake_goes_through_the_bridge_with_a_shortfall_check() {
    let bridge = Arc::new(MockBridge::default());
    let stream = Arc::new(MockStream::default());
    stream.insert_asset(bridged_asset("asset-1"));
    let handle = spawn_provider(Arc::clone(&bridge), Arc::clone(&stream), true);

    handle
        .stake("whale", "receiver-party", "asset-1", amt(40), "test")
        .await
        .unwrap();

    assert_eq!(
        *bridge.stakes.lock().unwrap(),
        vec![(
            "0xdeadbeef".to_string(),
            "receiver-party".to_string(),
            amt(40),
        )],
    );
}
