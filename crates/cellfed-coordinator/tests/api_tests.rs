//! Integration tests for the coordinator API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use cellfed_coordinator::router::build_router;
use cellfed_coordinator::{AggregationSettings, AppState, Coordinator, StalePolicy};
use cellfed_model::{ParameterBlob, decode_wire, encode_wire};
use serde_json::{Value, json};
use tower::ServiceExt;

fn scalar(value: f32) -> ParameterBlob {
    let mut blob = ParameterBlob::new();
    blob.insert("w", vec![value]);
    blob
}

fn make_test_state(quorum: usize, stale_policy: StalePolicy) -> Arc<AppState> {
    let coordinator = Coordinator::new(
        scalar(0.5),
        AggregationSettings {
            quorum,
            stale_policy,
        },
    )
    .unwrap();
    Arc::new(AppState::new(Arc::new(coordinator)))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_update(body: &Value) -> Request<Body> {
    Request::post("/api/updates")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn update(worker: &str, value: f32, samples: u64) -> Value {
    json!({
        "worker_id": worker,
        "parameters": encode_wire(&scalar(value)).unwrap(),
        "sample_count": samples,
    })
}

#[tokio::test]
async fn test_health() {
    let app = build_router(make_test_state(2, StalePolicy::Accept));
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_json(response.into_body()).await, json!({ "ok": true }));
}

#[tokio::test]
async fn test_get_global_returns_initial_model() {
    let app = build_router(make_test_state(2, StalePolicy::Accept));
    let response = app
        .oneshot(Request::get("/api/global").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["round"], 0);
    let params: ParameterBlob = decode_wire(json["parameters"].as_str().unwrap()).unwrap();
    assert_eq!(params, scalar(0.5));
}

#[tokio::test]
async fn test_submit_until_quorum() {
    let state = make_test_state(2, StalePolicy::Accept);

    let response = build_router(Arc::clone(&state))
        .oneshot(post_update(&update("client_1", 2.0, 30)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_to_json(response.into_body()).await,
        json!({ "status": "WAITING", "round": 0 })
    );

    let response = build_router(Arc::clone(&state))
        .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = body_to_json(response.into_body()).await;
    assert_eq!(status["pending"], 1);
    assert_eq!(status["quorum"], 2);
    assert_eq!(status["pending_workers"], json!(["client_1"]));

    let response = build_router(Arc::clone(&state))
        .oneshot(post_update(&update("client_2", 10.0, 70)))
        .await
        .unwrap();
    assert_eq!(
        body_to_json(response.into_body()).await,
        json!({ "status": "AGGREGATED", "round": 1 })
    );

    let response = build_router(state)
        .oneshot(Request::get("/api/global").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["round"], 1);
    let params: ParameterBlob = decode_wire(json["parameters"].as_str().unwrap()).unwrap();
    assert!((f64::from(params.get("w").unwrap()[0]) - 7.6).abs() < 1e-5);
}

#[tokio::test]
async fn test_zero_samples_is_bad_request() {
    let app = build_router(make_test_state(1, StalePolicy::Accept));
    let response = app
        .oneshot(post_update(&update("client_1", 1.0, 0)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 400);
    assert!(json["error"].as_str().unwrap().contains("zero samples"));
}

#[tokio::test]
async fn test_undecodable_parameters_is_bad_request() {
    let app = build_router(make_test_state(1, StalePolicy::Accept));
    let body = json!({
        "worker_id": "client_1",
        "parameters": "not base64!",
        "sample_count": 10,
    });
    let response = app.oneshot(post_update(&body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_incompatible_shape_is_bad_request() {
    let mut params = ParameterBlob::new();
    params.insert("other", vec![1.0]);
    let body = json!({
        "worker_id": "client_1",
        "parameters": encode_wire(&params).unwrap(),
        "sample_count": 10,
    });
    let app = build_router(make_test_state(1, StalePolicy::Accept));
    let response = app.oneshot(post_update(&body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stale_round_is_reported_under_reject_policy() {
    let state = make_test_state(1, StalePolicy::Reject);
    build_router(Arc::clone(&state))
        .oneshot(post_update(&update("client_1", 1.0, 5)))
        .await
        .unwrap();

    let mut late = update("client_2", 3.0, 5);
    late["round"] = json!(0);
    let response = build_router(state).oneshot(post_update(&late)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_to_json(response.into_body()).await,
        json!({ "status": "STALE", "round": 1 })
    );
}

#[tokio::test]
async fn test_malformed_body_is_json_bad_request() {
    let app = build_router(make_test_state(2, StalePolicy::Accept));
    for body in [
        json!({ "worker_id": "a", "parameters": "e30=" }),
        json!({ "worker_id": "a", "parameters": "e30=", "sample_count": -5 }),
    ] {
        let response = app.clone().oneshot(post_update(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_to_json(response.into_body()).await;
        assert_eq!(json["status"], 400);
        assert!(json["error"].as_str().unwrap().starts_with("malformed request body"));
    }

    let response = app
        .oneshot(
            Request::post("/api/updates")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_overflowing_sample_count_is_bad_request() {
    let app = build_router(make_test_state(3, StalePolicy::Accept));
    let huge = 9_223_372_036_854_775_808_u64;

    let response = app
        .clone()
        .oneshot(post_update(&update("a", 1.0, huge)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post_update(&update("b", 1.0, huge)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 400);

    let response = app
        .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["pending"], 1);
    assert_eq!(json["round"], 0);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = build_router(make_test_state(1, StalePolicy::Accept));
    let response = app
        .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
