//! End-to-end request flow through the router.
//!
//! Each test builds an accelerator against a mock Tendermint node and drives the
//! axum router in-process.

use crate::mock_infrastructure::{
    abci_query_request, abci_query_result, accelerator_for, closed_port_url, router_at_height,
    rpc_post, test_config, TendermintMock,
};
use accelerator_core::{chain::Height, proxy::X_CACHE_STATUS};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use mockito::Matcher;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.expect("router is infallible")
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_abci_query_served_from_cache_at_same_height() {
    let mut node = TendermintMock::new().await;
    let upstream = node
        .abci_query(&abci_query_result("AAE=", "100"))
        .expect(1)
        .create_async()
        .await;

    let (accelerator, router) = router_at_height(&node.url(), 100);
    let body = abci_query_request(&json!(1), "/store/bank/key", "0a01");

    let first = send(&router, rpc_post(body.clone())).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert!(first.headers().get(&X_CACHE_STATUS).is_none());
    let first = body_json(first).await;

    let second = send(&router, rpc_post(body)).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.headers().get(&X_CACHE_STATUS).unwrap(), "HIT");
    assert_eq!(second.headers().get("content-type").unwrap(), "application/json");
    let second = body_json(second).await;

    assert_eq!(first["result"], second["result"]);
    assert_eq!(accelerator.cache().len(), 1);
    upstream.assert_async().await;
}

#[tokio::test]
async fn test_cache_hit_echoes_caller_id() {
    let mut node = TendermintMock::new().await;
    let _upstream = node.abci_query(&abci_query_result("AAE=", "100")).create_async().await;
    let (_accelerator, router) = router_at_height(&node.url(), 100);

    let warm = abci_query_request(&json!(1), "/store/bank/key", "0a01");
    let _ = send(&router, rpc_post(warm)).await;

    for id in [json!("client-7"), json!(42), Value::Null] {
        let request = abci_query_request(&id, "/store/bank/key", "0a01");
        let response = send(&router, rpc_post(request)).await;
        assert_eq!(response.headers().get(&X_CACHE_STATUS).unwrap(), "HIT");
        let response = body_json(response).await;
        assert_eq!(response["id"], id);
        assert_eq!(response["jsonrpc"], "2.0");
    }
}

#[tokio::test]
async fn test_param_field_order_shares_entry() {
    let mut node = TendermintMock::new().await;
    let upstream = node
        .abci_query(&abci_query_result("AAE=", "100"))
        .expect(1)
        .create_async()
        .await;
    let (_accelerator, router) = router_at_height(&node.url(), 100);

    let a = r#"{"jsonrpc":"2.0","id":1,"method":"abci_query","params":{"path":"/p","data":"01"}}"#;
    let b = r#"{"jsonrpc":"2.0","id":2,"method":"abci_query","params":{"data":"01","path":"/p"}}"#;

    let _ = send(&router, rpc_post(a)).await;
    let response = send(&router, rpc_post(b)).await;
    assert_eq!(response.headers().get(&X_CACHE_STATUS).unwrap(), "HIT");
    upstream.assert_async().await;
}

#[tokio::test]
async fn test_different_params_are_separate_entries() {
    let mut node = TendermintMock::new().await;
    let upstream = node
        .abci_query(&abci_query_result("AAE=", "100"))
        .expect(2)
        .create_async()
        .await;
    let (accelerator, router) = router_at_height(&node.url(), 100);

    let _ = send(&router, rpc_post(abci_query_request(&json!(1), "/p", "01"))).await;
    let _ = send(&router, rpc_post(abci_query_request(&json!(1), "/p", "02"))).await;

    assert_eq!(accelerator.cache().len(), 2);
    upstream.assert_async().await;
}

#[tokio::test]
async fn test_unknown_height_always_reaches_upstream() {
    let mut node = TendermintMock::new().await;
    let upstream = node
        .abci_query(&abci_query_result("AAE=", "100"))
        .expect(3)
        .create_async()
        .await;

    let accelerator = accelerator_for(&node.url());
    let router = accelerator.router();
    let body = abci_query_request(&json!(1), "/store/bank/key", "0a01");

    for _ in 0..3 {
        let response = send(&router, rpc_post(body.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(&X_CACHE_STATUS).is_none());
    }

    assert!(accelerator.cache().is_empty());
    upstream.assert_async().await;
}

#[tokio::test]
async fn test_malformed_success_forwarded_unmodified_and_not_cached() {
    let mut node = TendermintMock::new().await;
    let raw = r#"{"unexpected":"shape"}"#;
    let upstream = node.raw("POST", "/", 200, raw).expect(2).create_async().await;
    let (accelerator, router) = router_at_height(&node.url(), 100);
    let body = abci_query_request(&json!(1), "/store/bank/key", "0a01");

    for _ in 0..2 {
        let response = send(&router, rpc_post(body.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(&X_CACHE_STATUS).is_none());
        assert_eq!(body_text(response).await, raw);
    }

    assert!(accelerator.cache().is_empty());
    upstream.assert_async().await;
}

#[tokio::test]
async fn test_upstream_error_status_passes_through() {
    let mut node = TendermintMock::new().await;
    let upstream = node
        .server_mut()
        .mock("POST", "/")
        .with_status(429)
        .with_header("retry-after", "3")
        .with_body("slow down")
        .expect(2)
        .create_async()
        .await;
    let (accelerator, router) = router_at_height(&node.url(), 100);
    let body = abci_query_request(&json!(1), "/store/bank/key", "0a01");

    for _ in 0..2 {
        let response = send(&router, rpc_post(body.clone())).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("retry-after").unwrap(), "3");
        assert_eq!(body_text(response).await, "slow down");
    }

    assert!(accelerator.cache().is_empty());
    upstream.assert_async().await;
}

#[tokio::test]
async fn test_other_methods_are_never_cached() {
    let mut node = TendermintMock::new().await;
    let upstream = node
        .method("block", &json!({"block": {"header": {"height": "100"}}}))
        .expect(2)
        .create_async()
        .await;
    let (accelerator, router) = router_at_height(&node.url(), 100);
    let body = r#"{"jsonrpc":"2.0","id":1,"method":"block","params":{"height":"100"}}"#;

    for _ in 0..2 {
        let response = send(&router, rpc_post(body)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["result"]["block"]["header"]["height"], "100");
    }

    assert!(accelerator.cache().is_empty());
    upstream.assert_async().await;
}

#[tokio::test]
async fn test_pretty_printed_abci_query_is_passthrough() {
    let mut node = TendermintMock::new().await;
    let upstream = node
        .abci_query(&abci_query_result("AAE=", "100"))
        .expect(2)
        .create_async()
        .await;
    let (accelerator, router) = router_at_height(&node.url(), 100);
    let body = "{\"jsonrpc\": \"2.0\", \"id\": 1, \"method\": \"abci_query\", \"params\": {}}";

    for _ in 0..2 {
        let response = send(&router, rpc_post(body)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert!(accelerator.cache().is_empty());
    upstream.assert_async().await;
}

#[tokio::test]
async fn test_abci_query_missing_id_is_passthrough() {
    let mut node = TendermintMock::new().await;
    let upstream = node
        .abci_query(&abci_query_result("AAE=", "100"))
        .expect(2)
        .create_async()
        .await;
    let (accelerator, router) = router_at_height(&node.url(), 100);
    let body = r#"{"jsonrpc":"2.0","method":"abci_query","params":{"path":"/p"}}"#;

    for _ in 0..2 {
        let _ = send(&router, rpc_post(body)).await;
    }

    assert!(accelerator.cache().is_empty());
    upstream.assert_async().await;
}

#[tokio::test]
async fn test_get_request_forwarded_with_path_and_query() {
    let mut node = TendermintMock::new().await;
    let upstream = node
        .server_mut()
        .mock("GET", "/abci_info")
        .match_query(Matcher::UrlEncoded("height".into(), "5".into()))
        .with_status(200)
        .with_header("x-upstream", "tendermint")
        .with_body(r#"{"result":{}}"#)
        .create_async()
        .await;
    let (_accelerator, router) = router_at_height(&node.url(), 100);

    let request = Request::builder().uri("/abci_info?height=5").body(Body::empty()).unwrap();
    let response = send(&router, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-upstream").unwrap(), "tendermint");
    assert_eq!(body_text(response).await, r#"{"result":{}}"#);
    upstream.assert_async().await;
}

#[tokio::test]
async fn test_host_header_rewritten_for_upstream() {
    let mut node = TendermintMock::new().await;
    let host = node.host_with_port();
    let upstream = node
        .server_mut()
        .mock("POST", "/")
        .match_header("host", host.as_str())
        .match_header("x-custom", "kept")
        .with_status(200)
        .with_body(r#"{"jsonrpc":"2.0","id":1,"result":{}}"#)
        .create_async()
        .await;
    let (_accelerator, router) = router_at_height(&node.url(), 100);

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("host", "accelerator.example:5384")
        .header("x-custom", "kept")
        .body(Body::from(r#"{"jsonrpc":"2.0","id":1,"method":"status"}"#))
        .unwrap();
    let response = send(&router, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    upstream.assert_async().await;
}

#[tokio::test]
async fn test_upstream_down_returns_bad_gateway() {
    let (_accelerator, router) = router_at_height(&closed_port_url(), 100);
    let body = abci_query_request(&json!(1), "/store/bank/key", "0a01");
    let response = send(&router, rpc_post(body)).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_cache_disabled_forwards_every_request() {
    let mut node = TendermintMock::new().await;
    let upstream = node
        .abci_query(&abci_query_result("AAE=", "100"))
        .expect(2)
        .create_async()
        .await;

    let mut config = test_config(&node.url());
    config.cache.enabled = false;
    let accelerator = server::Accelerator::new(config).unwrap();
    accelerator.cache().observe_height(Height::known(100u64));
    let router = accelerator.router();

    let body = abci_query_request(&json!(1), "/store/bank/key", "0a01");
    for _ in 0..2 {
        let response = send(&router, rpc_post(body.clone())).await;
        assert!(response.headers().get(&X_CACHE_STATUS).is_none());
    }

    assert!(accelerator.cache().is_empty());
    upstream.assert_async().await;
}

#[tokio::test]
async fn test_concurrent_identical_queries_all_succeed() {
    let mut node = TendermintMock::new().await;
    let _upstream = node.abci_query(&abci_query_result("AAE=", "100")).create_async().await;
    let (accelerator, router) = router_at_height(&node.url(), 100);
    let body = abci_query_request(&json!(1), "/store/bank/key", "0a01");

    let requests = (0..16).map(|_| send(&router, rpc_post(body.clone())));
    let responses = futures::future::join_all(requests).await;

    for response in responses {
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["result"]["response"]["value"], "AAE=");
    }
    assert_eq!(accelerator.cache().len(), 1);
}
