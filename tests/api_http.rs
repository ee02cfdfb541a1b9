// tests/api_http.rs
//
// HTTP-level tests for the public Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /aggregate (401 without/with bad token, RunReport with a good one)
// - POST /internal/sync (401 gate before any work, SweepSummary shape)

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use market_minds::aggregate::adapters::rss::RssAdapter;
use market_minds::aggregate::{AdapterRegistry, Aggregator, FetchContext, Source};
use market_minds::api::{self, AppState};
use market_minds::store::{ContentStore, MemoryStore, SharedStore};
use market_minds::summarize::MockSummarizer;

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

const RSS_TWO_ITEMS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example Research</title>
    <item>
      <title>Rates outlook</title>
      <guid isPermaLink="false">post-1</guid>
      <link>https://example.com/posts/rates</link>
      <description>Quick take.</description>
    </item>
    <item>
      <title>Earnings primer</title>
      <guid isPermaLink="false">post-2</guid>
      <link>https://example.com/posts/earnings</link>
      <description>Margins.</description>
    </item>
  </channel>
</rss>"#;

async fn test_router() -> Router {
    let store: SharedStore = Arc::new(MemoryStore::new());
    store
        .save_source(&Source {
            id: "src-u1".into(),
            owner_id: "u1".into(),
            source_name: "Jane Quant".into(),
            selected_platforms: vec!["rss".into()],
            platform_identifiers: HashMap::from([(
                "rss".to_string(),
                "https://example.com/feed".to_string(),
            )]),
        })
        .await
        .unwrap();

    let registry = AdapterRegistry::new().register(Arc::new(RssAdapter::from_fixture(RSS_TWO_ITEMS)));
    let ctx = FetchContext::new(store, Arc::new(MockSummarizer::default()));
    let aggregator = Arc::new(Aggregator::new(registry, ctx));

    let state = AppState::new(
        aggregator,
        vec!["cron-secret".to_string()],
        HashMap::from([("tok-1".to_string(), "u1".to_string())]),
        None,
    );
    api::router(state)
}

fn post(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("build request")
}

async fn json_body(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    serde_json::from_slice(&bytes).expect("parse json")
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let app = test_router().await;

    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    assert_eq!(String::from_utf8(bytes).expect("utf8").trim(), "OK");
}

#[tokio::test]
async fn aggregate_rejects_missing_and_unknown_tokens() {
    let app = test_router().await;
    let resp = app.oneshot(post("/aggregate", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let app = test_router().await;
    let resp = app
        .oneshot(post("/aggregate", Some("who-dis")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let v = json_body(resp).await;
    assert_eq!(v["success"], serde_json::json!(false));
}

#[tokio::test]
async fn aggregate_returns_run_report_for_known_token() {
    let app = test_router().await;
    let resp = app.oneshot(post("/aggregate", Some("tok-1"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let v = json_body(resp).await;
    assert_eq!(v["success"], serde_json::json!(true));
    assert_eq!(v["processedCount"], serde_json::json!(2));
    let results = v["results"].as_array().expect("results array");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["platform"], serde_json::json!("rss"));
    assert_eq!(results[0]["processedItems"], serde_json::json!(2));
}

#[tokio::test]
async fn sync_trigger_is_gated_by_the_scheduler_secret() {
    let app = test_router().await;
    let resp = app.oneshot(post("/internal/sync", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let app = test_router().await;
    let resp = app
        .oneshot(post("/internal/sync", Some("wrong")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let app = test_router().await;
    let resp = app
        .oneshot(post("/internal/sync", Some("cron-secret")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let v = json_body(resp).await;
    assert_eq!(v["totalUsers"], serde_json::json!(1));
    assert_eq!(v["successfulUsers"], serde_json::json!(1));
    assert_eq!(v["failedUsers"], serde_json::json!(0));
    assert_eq!(v["totalItemsProcessed"], serde_json::json!(2));
    assert!(v["durationSeconds"].is_number());
    assert!(v["userResults"].is_array());
}
