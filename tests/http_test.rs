use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use serverstats::config::StatsConfig;
use serverstats::http::{build_router, HttpServerState};
use serverstats::infra::EventBus;
use serverstats::repository::{MemoryAggregationStore, MemorySettingsStore};
use serverstats::StatsService;
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    aggregation: Arc<MemoryAggregationStore>,
    settings: Arc<MemorySettingsStore>,
    service: Arc<StatsService>,
}

fn test_app() -> TestApp {
    let aggregation = Arc::new(MemoryAggregationStore::new());
    aggregation.seed_history(42, 40);
    let settings = Arc::new(MemorySettingsStore::new());
    let service = Arc::new(StatsService::new(
        &StatsConfig::default(),
        aggregation.clone(),
        settings.clone(),
        Arc::new(EventBus::new()),
    ));
    let router = build_router(HttpServerState {
        stats_service: service.clone(),
    });

    TestApp {
        router,
        aggregation,
        settings,
        service,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).to_string())
        })
    };
    (status, body)
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(router, request).await
}

async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}

fn series_len(body: &Value, field: &str) -> usize {
    body[field].as_array().map(Vec::len).unwrap_or_default()
}

#[tokio::test]
async fn test_month_request_returns_thirty_days() {
    let app = test_app();

    let (status, body) = get(&app.router, "/api/cp/42/stats/charts?days=30").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["days"], 30);
    assert_eq!(series_len(&body, "member_chart_data"), 30);
    assert_eq!(series_len(&body, "message_chart_data"), 30);
}

#[tokio::test]
async fn test_large_request_uses_year_bucket() {
    let app = test_app();

    let (status, body) = get(&app.router, "/api/cp/42/stats/charts?days=1000").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["days"], 365);
    assert_eq!(series_len(&body, "member_chart_data"), 40);
}

#[tokio::test]
async fn test_days_defaults_and_small_requests() {
    let app = test_app();

    let (_, body) = get(&app.router, "/api/cp/42/stats/charts").await;
    assert_eq!(body["days"], 7);
    assert_eq!(series_len(&body, "member_chart_data"), 7);

    let (_, body) = get(&app.router, "/api/cp/42/stats/charts?days=abc").await;
    assert_eq!(body["days"], 7);

    // 其它天数落入全部历史
    let (_, body) = get(&app.router, "/api/cp/42/stats/charts?days=90").await;
    assert_eq!(body["days"], -1);
    assert_eq!(series_len(&body, "member_chart_data"), 40);
}

#[tokio::test]
async fn test_short_request_returns_cached_days() {
    let app = test_app();

    let (status, body) = get(&app.router, "/api/cp/42/stats/charts?days=3").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["days"], 3);
    assert_eq!(series_len(&body, "member_chart_data"), 3);
    assert_eq!(series_len(&body, "message_chart_data"), 3);
}

#[tokio::test]
async fn test_private_community_hidden_from_public() {
    let app = test_app();

    let (status, body) = get(&app.router, "/api/public/42/stats/charts?days=30").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(series_len(&body, "member_chart_data"), 0);
    assert_eq!(series_len(&body, "message_chart_data"), 0);

    let (status, body) = get(&app.router, "/api/public/42/stats/daily").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_null());
    assert_eq!(app.aggregation.member_calls(), 0);
}

#[tokio::test]
async fn test_settings_update_makes_public_and_invalidates() {
    let app = test_app();

    get(&app.router, "/api/cp/42/stats/charts?days=30").await;
    assert_eq!(app.service.chart_cache().len(), 1);

    let (status, body) = post_json(
        &app.router,
        "/api/cp/42/stats/settings",
        json!({ "public": true, "ignore_channels": [9, 3, 9] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["public"], true);
    assert_eq!(body["ignore_channels"], json!([3, 9]));
    assert!(app.service.chart_cache().is_empty());

    let (_, body) = get(&app.router, "/api/cp/42/stats/settings").await;
    assert_eq!(body["public"], true);

    let (_, body) = get(&app.router, "/api/public/42/stats/charts?days=30").await;
    assert_eq!(series_len(&body, "member_chart_data"), 30);
    assert_eq!(app.aggregation.member_calls(), 2);

    let (_, body) = get(&app.router, "/api/public/42/stats/daily").await;
    assert_eq!(body["total_members_now"], 140);
}

#[tokio::test]
async fn test_invalid_community_id_is_bad_request() {
    let app = test_app();

    let (status, body) = get(&app.router, "/api/cp/not-a-number/stats/charts").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "Validation");

    let (status, _) = get(&app.router, "/api/public/-3/stats/daily").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_settings_failure_is_server_error() {
    let app = test_app();
    app.settings.set_failing(true);

    let (status, body) = get(&app.router, "/api/public/42/stats/charts?days=7").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "Database");
}

#[tokio::test]
async fn test_aggregation_failure_degrades_to_empty() {
    let app = test_app();
    app.aggregation.set_unavailable(true);

    let (status, body) = get(&app.router, "/api/cp/42/stats/charts?days=30").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["days"], 0);
    assert_eq!(series_len(&body, "member_chart_data"), 0);

    // 概览接口直接返回错误
    let (status, _) = get(&app.router, "/api/cp/42/stats/daily").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_health_and_metrics() {
    let app = test_app();

    let (status, body) = get(&app.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    // 测试进程中没有安装 Recorder
    let (status, _) = get(&app.router, "/metrics").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
