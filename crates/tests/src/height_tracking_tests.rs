//! Height poller driving cache invalidation end to end.
//!
//! Most tests step the poller with `poll_once` so transitions are deterministic;
//! the scheduled test is `#[serial]` since it depends on wall-clock ticks.

use crate::mock_infrastructure::{
    abci_query_request, abci_query_result, accelerator_for, rpc_post, wait_until, TendermintMock,
};
use accelerator_core::{
    cache::CacheKey,
    chain::{Height, HeightTransition},
    proxy::X_CACHE_STATUS,
    types::CacheEntry,
    upstream::PollOutcome,
};
use axum::Router;
use serde_json::json;
use serial_test::serial;
use std::time::Duration;
use tower::ServiceExt;

async fn query_is_hit(router: &Router) -> bool {
    let body = abci_query_request(&json!(1), "/store/bank/key", "0a01");
    let response = router.clone().oneshot(rpc_post(body)).await.unwrap();
    response.headers().get(&X_CACHE_STATUS).is_some()
}

fn entry() -> CacheEntry {
    CacheEntry::from_slice(br#"{"jsonrpc":"2.0","id":1,"result":{}}"#).unwrap()
}

#[tokio::test]
async fn test_cache_inert_until_height_known() {
    let node = TendermintMock::new().await;
    let accelerator = accelerator_for(&node.url());
    let cache = accelerator.cache();

    let key = CacheKey::from("x");
    assert!(cache.get(&key).is_none());
    assert!(!cache.set(key.clone(), entry()));
    assert!(cache.get(&key).is_none());
    assert_eq!(cache.height(), Height::Unknown);
}

#[tokio::test]
async fn test_height_sequence_controls_entries() {
    let mut node = TendermintMock::new().await;
    let accelerator = accelerator_for(&node.url());
    let poller = accelerator.poller();
    let cache = accelerator.cache();
    let key = CacheKey::from("p1");

    let at_100 = node.mock_blockchain("100").await;
    assert_eq!(poller.poll_once().await, PollOutcome::Applied(HeightTransition::Established));
    assert!(cache.set(key.clone(), entry()));
    assert!(cache.get(&key).is_some());

    assert_eq!(poller.poll_once().await, PollOutcome::Applied(HeightTransition::Unchanged));
    assert!(cache.get(&key).is_some());

    at_100.remove_async().await;
    let _at_101 = node.mock_blockchain("101").await;
    assert_eq!(poller.poll_once().await, PollOutcome::Applied(HeightTransition::Advanced));
    assert!(cache.get(&key).is_none());
    assert_eq!(cache.height(), Height::known(101));

    let stats = cache.stats();
    assert_eq!(stats.inserts, 1);
    assert_eq!(stats.clears, 1);
}

#[tokio::test]
async fn test_lower_height_is_ignored() {
    let mut node = TendermintMock::new().await;
    let accelerator = accelerator_for(&node.url());
    let cache = accelerator.cache();

    let at_100 = node.mock_blockchain("100").await;
    accelerator.poller().poll_once().await;
    assert!(cache.set(CacheKey::from("p1"), entry()));

    at_100.remove_async().await;
    let _at_99 = node.mock_blockchain("99").await;
    assert_eq!(
        accelerator.poller().poll_once().await,
        PollOutcome::Applied(HeightTransition::Unchanged)
    );
    assert_eq!(cache.height(), Height::known(100));
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_failed_fetch_makes_height_unknown() {
    let mut node = TendermintMock::new().await;
    let accelerator = accelerator_for(&node.url());
    let cache = accelerator.cache();

    let at_100 = node.mock_blockchain("100").await;
    accelerator.poller().poll_once().await;
    assert!(cache.set(CacheKey::from("p1"), entry()));

    at_100.remove_async().await;
    let _broken = node.raw("GET", "/blockchain", 500, "boom").create_async().await;
    assert_eq!(
        accelerator.poller().poll_once().await,
        PollOutcome::Applied(HeightTransition::Lost)
    );
    assert_eq!(cache.height(), Height::Unknown);
    assert!(cache.is_empty());
    assert!(!cache.set(CacheKey::from("p1"), entry()));
}

#[tokio::test]
async fn test_malformed_height_makes_height_unknown() {
    let mut node = TendermintMock::new().await;
    let accelerator = accelerator_for(&node.url());

    let at_100 = node.mock_blockchain("100").await;
    accelerator.poller().poll_once().await;

    at_100.remove_async().await;
    let _bad = node.mock_blockchain("12a").await;
    accelerator.poller().poll_once().await;
    assert_eq!(accelerator.cache().height(), Height::Unknown);
}

#[tokio::test]
async fn test_router_hits_follow_height() {
    let mut node = TendermintMock::new().await;
    let _upstream = node.abci_query(&abci_query_result("AAE=", "100")).create_async().await;
    let accelerator = accelerator_for(&node.url());
    let router = accelerator.router();

    let at_100 = node.mock_blockchain("100").await;
    accelerator.poller().poll_once().await;

    assert!(!query_is_hit(&router).await);
    assert!(query_is_hit(&router).await);

    at_100.remove_async().await;
    let _at_101 = node.mock_blockchain("101").await;
    accelerator.poller().poll_once().await;

    assert!(!query_is_hit(&router).await);
    assert!(query_is_hit(&router).await);
}

#[tokio::test]
#[serial]
async fn test_scheduled_poller_tracks_upstream() {
    let mut node = TendermintMock::new().await;
    let accelerator = accelerator_for(&node.url());
    let poller = accelerator.poller();
    let cache = accelerator.cache().clone();

    let at_100 = node.mock_blockchain("100").await;
    poller.start(Duration::from_millis(20));
    assert!(poller.is_running());

    assert!(wait_until(Duration::from_secs(2), || cache.height() == Height::known(100)).await);
    assert!(cache.set(CacheKey::from("p1"), entry()));

    at_100.remove_async().await;
    let _at_105 = node.mock_blockchain("105").await;
    assert!(wait_until(Duration::from_secs(2), || cache.height() == Height::known(105)).await);
    assert!(cache.is_empty());

    poller.stop();
    assert!(!poller.is_running());
}
