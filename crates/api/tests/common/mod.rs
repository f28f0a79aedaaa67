#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tollsync_core::matching::ExternalCandidate;
use tollsync_pipeline::{MemoryStore, PipelineConfig, StaticCandidates};
use tower::ServiceExt;

use tollsync_api::config::ServerConfig;
use tollsync_api::router::build_app_router;
use tollsync_api::state::AppState;

pub const HEADER: &str = "date,time,entry_point,exit_point,amount,vehicle_id,card_id,external_ref\n";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        db_max_connections: 1,
        pipeline: PipelineConfig::default(),
    }
}

/// The production router over an in-memory store.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

pub fn build_test_app() -> TestApp {
    build_test_app_with(Vec::new())
}

pub fn build_test_app_with(candidates: Vec<ExternalCandidate>) -> TestApp {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(
        config.clone(),
        store.clone(),
        Arc::new(StaticCandidates::new(candidates)),
    )
    .unwrap();
    TestApp {
        router: build_app_router(state, &config),
        store,
    }
}

impl TestApp {
    pub async fn get(&self, uri: &str) -> Response {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response {
        self.send(Method::POST, uri, Some(body)).await
    }

    pub async fn put_json(&self, uri: &str, body: serde_json::Value) -> Response {
        self.send(Method::PUT, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> Response {
        self.send(Method::DELETE, uri, None).await
    }

    async fn send(&self, method: Method, uri: &str, body: Option<serde_json::Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn row(n: u32) -> String {
    format!("2024-03-01,08:{:02}:00,Tokyo IC,Yokohama IC,{},V-{n},C-{n},REF-{n}\n", n % 60, 1000 + n)
}

pub fn csv(rows: &[String]) -> String {
    let mut out = HEADER.to_string();
    for r in rows {
        out.push_str(r);
    }
    out
}

pub fn import_body(content: &str) -> serde_json::Value {
    serde_json::json!({
        "account_type": "corporate",
        "account_id": "acct-1",
        "file_name": "usage.csv",
        "content": content,
        "created_by": "tester",
    })
}

pub fn record_body(vehicle: &str, amount: i64) -> serde_json::Value {
    serde_json::json!({
        "date": "2024-03-01",
        "time": "08:00:00",
        "entry_point": "Tokyo IC",
        "exit_point": "Yokohama IC",
        "amount": amount,
        "vehicle_id": vehicle,
        "card_id": "C-1",
    })
}

pub fn mapping_body(toll_record_id: i64, confidence: f64, status: &str) -> serde_json::Value {
    serde_json::json!({
        "toll_record_id": toll_record_id,
        "mapping_type": "automatic",
        "mapped_entity_id": 42,
        "mapped_entity_type": "dtako_trip",
        "confidence": confidence,
        "status": status,
    })
}
