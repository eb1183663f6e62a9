//! Integration tests for the query router.
//!
//! Each test starts real downstream services on ephemeral localhost ports and
//! drives the router through `tower::ServiceExt::oneshot`.
//!
//! The ArangoDB test needs a running server and is ignored by default.
//! Run with: cargo test --test integration -- --ignored

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{to_bytes, Body, Bytes};
use axum::extract::State;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;

use query_router::api::{create_router, AppState};
use query_router::config::Config;
use query_router::mapping::{ArangoMappingStore, MappingRecord, MappingStore, MemoryMappingStore};

/// Requests seen by a fake downstream.
#[derive(Clone, Default)]
struct Recorded {
    bodies: Arc<Mutex<Vec<Bytes>>>,
}

impl Recorded {
    fn bodies(&self) -> Vec<Bytes> {
        self.bodies.lock().unwrap().clone()
    }
}

/// How a fake downstream answers.
#[derive(Clone)]
enum Behavior {
    /// Echo the request body with the given status.
    Echo(StatusCode),
    /// Answer with a fixed status and body.
    Fixed(StatusCode, &'static str),
    /// Sleep, then echo.
    Slow(Duration),
}

async fn downstream_handler(
    State((recorded, behavior)): State<(Recorded, Behavior)>,
    body: Bytes,
) -> Response {
    recorded.bodies.lock().unwrap().push(body.clone());

    match behavior {
        Behavior::Echo(status) => (status, [(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Behavior::Fixed(status, text) => (status, text).into_response(),
        Behavior::Slow(delay) => {
            tokio::time::sleep(delay).await;
            ([(header::CONTENT_TYPE, "application/json")], body).into_response()
        }
    }
}

/// Start a fake downstream serving `POST /query`; returns its base URL.
async fn spawn_downstream(behavior: Behavior) -> (String, Recorded) {
    let recorded = Recorded::default();
    let app = Router::new()
        .route("/query", post(downstream_handler))
        .with_state((recorded.clone(), behavior));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), recorded)
}

/// A localhost address nothing listens on.
async fn closed_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

fn router(records: Vec<MappingRecord>, config: Config) -> Router {
    let store = MemoryMappingStore::new(true);
    for record in records {
        store.insert(&config.maps_collection, record).unwrap();
    }
    create_router(AppState::from_config(Arc::new(store), &config).unwrap())
}

fn request(method: Method, uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

async fn body_bytes(response: Response) -> Bytes {
    to_bytes(response.into_body(), usize::MAX).await.unwrap()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn query_is_forwarded_to_resolved_backend_and_relayed() {
    let (svc_a, recorded) = spawn_downstream(Behavior::Echo(StatusCode::OK)).await;
    let app = router(vec![MappingRecord::new("EQT-100", svc_a)], Config::default());

    let inbound = r#"{"EQUIPMENTNO":"EQT-100","foo":1}"#;
    let response = app
        .oneshot(request(Method::POST, "/query", inbound))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(body_bytes(response).await, Bytes::from_static(inbound.as_bytes()));
    assert_eq!(recorded.bodies(), vec![Bytes::from_static(inbound.as_bytes())]);
}

#[tokio::test]
async fn body_is_forwarded_byte_for_byte() {
    let (svc, recorded) = spawn_downstream(Behavior::Echo(StatusCode::OK)).await;
    let app = router(vec![MappingRecord::new("EQT-1", svc)], Config::default());

    // Field order, whitespace and number formatting must survive.
    let inbound = "{ \"z\": 1.50,\n  \"EQUIPMENTNO\": \"EQT-1\", \"a\": [3, 2, 1], \"n\": 1e3 }";
    let response = app
        .oneshot(request(Method::POST, "/query", inbound))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(recorded.bodies()[0], Bytes::from_static(inbound.as_bytes()));
    assert_eq!(body_bytes(response).await, Bytes::from_static(inbound.as_bytes()));
}

#[tokio::test]
async fn unknown_target_is_rejected_without_outbound_call() {
    let (svc, recorded) = spawn_downstream(Behavior::Echo(StatusCode::OK)).await;
    let app = router(vec![MappingRecord::new("EQT-100", svc)], Config::default());

    let response = app
        .oneshot(request(Method::POST, "/query", r#"{"EQUIPMENTNO":"EQT-999"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await,
        json!({"error": "target_not_resolvable", "message": "invalid EQUIPMENTNO"})
    );
    assert!(recorded.bodies().is_empty());
}

#[tokio::test]
async fn unreachable_downstream_is_bad_gateway() {
    let addr = closed_address().await;
    let app = router(
        vec![MappingRecord::new("EQT-1", format!("http://{}", addr))],
        Config::default(),
    );

    let response = app
        .oneshot(request(Method::POST, "/query", r#"{"EQUIPMENTNO":"EQT-1"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        body_json(response).await,
        json!({"error": "downstream_failure", "message": "downstream service unreachable"})
    );
}

#[tokio::test]
async fn slow_downstream_times_out() {
    let (svc, _) = spawn_downstream(Behavior::Slow(Duration::from_secs(5))).await;
    let config = Config {
        forward_timeout_ms: 200,
        ..Config::default()
    };
    let app = router(vec![MappingRecord::new("EQT-1", svc)], config);

    let started = std::time::Instant::now();
    let response = app
        .oneshot(request(Method::POST, "/query", r#"{"EQUIPMENTNO":"EQT-1"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn downstream_error_status_is_bad_gateway() {
    let (svc, _) = spawn_downstream(Behavior::Fixed(
        StatusCode::INTERNAL_SERVER_ERROR,
        r#"{"detail":"boom"}"#,
    ))
    .await;
    let app = router(vec![MappingRecord::new("EQT-1", svc)], Config::default());

    let response = app
        .oneshot(request(Method::POST, "/query", r#"{"EQUIPMENTNO":"EQT-1"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        body_json(response).await["message"],
        "downstream service returned HTTP 500"
    );
}

#[tokio::test]
async fn non_json_downstream_body_is_bad_gateway() {
    let (svc, _) = spawn_downstream(Behavior::Fixed(StatusCode::OK, "<html>oops</html>")).await;
    let app = router(vec![MappingRecord::new("EQT-1", svc)], Config::default());

    let response = app
        .oneshot(request(Method::POST, "/query", r#"{"EQUIPMENTNO":"EQT-1"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn downstream_success_status_is_mirrored() {
    let (svc, _) = spawn_downstream(Behavior::Echo(StatusCode::CREATED)).await;
    let app = router(vec![MappingRecord::new("EQT-1", svc)], Config::default());

    let response = app
        .oneshot(request(Method::POST, "/query", r#"{"EQUIPMENTNO":"EQT-1"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn legacy_redirect_field_spelling_resolves() {
    let (svc, recorded) = spawn_downstream(Behavior::Echo(StatusCode::OK)).await;
    let seed = json!([{ "target": "VCP-002", "redirdectUrl": svc }]).to_string();
    let store = MemoryMappingStore::from_seed_str(&seed, "maps", true).unwrap();
    let app = create_router(AppState::from_config(Arc::new(store), &Config::default()).unwrap());

    let response = app
        .oneshot(request(Method::POST, "/query", r#"{"EQUIPMENTNO":"VCP-002"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(recorded.bodies().len(), 1);
}

#[tokio::test]
async fn get_query_uses_the_same_identifier_rules() {
    let (svc, recorded) = spawn_downstream(Behavior::Echo(StatusCode::OK)).await;
    let records = vec![MappingRecord::new("EQT-7", svc)];

    // Identifier in the body, body forwarded as is.
    let inbound = r#"{"EQUIPMENTNO":"EQT-7","window":"1h"}"#;
    let response = router(records.clone(), Config::default())
        .oneshot(request(Method::GET, "/query", inbound))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, Bytes::from_static(inbound.as_bytes()));

    // Identifier in the query string, no body.
    let response = router(records, Config::default())
        .oneshot(request(Method::GET, "/query?EQUIPMENTNO=EQT-7", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"EQUIPMENTNO": "EQT-7"}));

    assert_eq!(recorded.bodies().len(), 2);
}

#[tokio::test]
async fn get_query_default_target_is_opt_in() {
    let (svc, recorded) = spawn_downstream(Behavior::Echo(StatusCode::OK)).await;
    let records = vec![MappingRecord::new("VCP-002", svc)];

    // Without a configured default, an identifier-less GET is rejected.
    let response = router(records.clone(), Config::default())
        .oneshot(request(Method::GET, "/query", r#"{"window":"1h"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(recorded.bodies().is_empty());

    // With one, the body is forwarded to the default target's backend.
    let config = Config {
        get_query_default_target: Some("VCP-002".to_string()),
        ..Config::default()
    };
    let response = router(records, config)
        .oneshot(request(Method::GET, "/query", r#"{"window":"1h"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(recorded.bodies(), vec![Bytes::from_static(br#"{"window":"1h"}"#)]);
}

#[tokio::test]
async fn concurrent_queries_route_independently() {
    let (svc_a, recorded_a) = spawn_downstream(Behavior::Echo(StatusCode::OK)).await;
    let (svc_b, recorded_b) = spawn_downstream(Behavior::Echo(StatusCode::OK)).await;
    let app = router(
        vec![
            MappingRecord::new("EQT-A", svc_a),
            MappingRecord::new("EQT-B", svc_b),
        ],
        Config::default(),
    );

    let mut handles = Vec::new();
    for i in 0..20 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            let target = if i % 2 == 0 { "EQT-A" } else { "EQT-B" };
            let body = json!({ "EQUIPMENTNO": target, "seq": i }).to_string();
            let response = app
                .oneshot(request(Method::POST, "/query", body.clone()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_bytes(response).await, Bytes::from(body));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(recorded_a.bodies().len(), 10);
    assert_eq!(recorded_b.bodies().len(), 10);
}

/// Resolve against a real ArangoDB holding a `maps` collection.
#[tokio::test]
#[ignore = "requires a running ArangoDB with ARANGO_URL and ARANGO_TEST_TARGET set"]
async fn test_arango_lookup() {
    let (url, target) = match (
        std::env::var("ARANGO_URL").ok(),
        std::env::var("ARANGO_TEST_TARGET").ok(),
    ) {
        (Some(url), Some(target)) => (url, target),
        _ => {
            println!("Skipping: ARANGO_URL or ARANGO_TEST_TARGET not set");
            return;
        }
    };

    let config = Config {
        arango_url: url,
        arango_database: std::env::var("ARANGO_DATABASE").unwrap_or_else(|_| "_system".to_string()),
        arango_username: std::env::var("ARANGO_USERNAME").ok(),
        arango_password: std::env::var("ARANGO_PASSWORD").ok(),
        ..Config::default()
    };

    let store = ArangoMappingStore::new(&config).unwrap();
    store.ping().await.expect("ArangoDB not reachable");

    let records = store
        .find_by_target(&config.maps_collection, &target)
        .await
        .unwrap();
    assert!(!records.is_empty(), "no mapping for {}", target);
    println!("{} -> {:?}", target, records[0].usable_redirect_url());
}
