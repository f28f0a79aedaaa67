//! Toll record endpoints.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, NaiveDate};
use common::{body_json, build_test_app, build_test_app_with, record_body};
use serde_json::json;
use tollsync_core::matching::ExternalCandidate;

#[tokio::test]
async fn create_get_update_delete() {
    let app = build_test_app();

    let response = app.post_json("/api/v1/records", record_body("V-1", 1320)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await["data"].clone();
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["hash"].as_str().unwrap().len(), 64);

    let fetched = body_json(app.get(&format!("/api/v1/records/{id}")).await).await;
    assert_eq!(fetched["data"]["vehicle_id"], "V-1");

    let response = app
        .put_json(&format!("/api/v1/records/{id}"), json!({ "amount": 990 }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await["data"].clone();
    assert_eq!(updated["amount"], 990);
    assert_ne!(updated["hash"], created["hash"]);

    let response = app.delete(&format!("/api/v1/records/{id}")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = app.get(&format!("/api/v1/records/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = app.delete(&format!("/api/v1/records/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_record_is_already_exists() {
    let app = build_test_app();
    app.post_json("/api/v1/records", record_body("V-1", 100)).await;

    let response = app.post_json("/api/v1/records", record_body("V-1", 100)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "ALREADY_EXISTS");
}

#[tokio::test]
async fn invalid_id_and_empty_update_are_rejected() {
    let app = build_test_app();
    let response = app.get("/api/v1/records/0").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let created = body_json(app.post_json("/api/v1/records", record_body("V-1", 1)).await).await;
    let id = created["data"]["id"].as_i64().unwrap();
    let response = app.put_json(&format!("/api/v1/records/{id}"), json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_ARGUMENT");
}

#[tokio::test]
async fn list_with_partial_match_and_date_range() {
    let app = build_test_app();
    for vehicle in ["V-100", "V-200", "X-300"] {
        app.post_json("/api/v1/records", record_body(vehicle, 10)).await;
    }

    let listed = body_json(
        app.get("/api/v1/records?vehicle_id=V-&partial_match=true&sort_by=id&sort_order=asc")
            .await,
    )
    .await;
    assert_eq!(listed["total_count"], 2);
    assert_eq!(listed["data"][0]["vehicle_id"], "V-100");

    let response = app
        .get("/api/v1/records?date_from=2024-04-01&date_to=2024-03-01")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn potential_matches_are_scored_and_filtered() {
    let at = NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap();
    let app = build_test_app_with(vec![
        ExternalCandidate {
            entity_id: 7,
            entity_type: "dtako_trip".into(),
            occurred_at: at,
            vehicle_id: None,
            card_id: Some("C-1".into()),
            amount: Some(1320),
        },
        ExternalCandidate {
            entity_id: 8,
            entity_type: "dtako_trip".into(),
            occurred_at: at + Duration::seconds(1200),
            vehicle_id: None,
            card_id: None,
            amount: None,
        },
    ]);
    let created = body_json(app.post_json("/api/v1/records", record_body("V-1", 1320)).await).await;
    let id = created["data"]["id"].as_i64().unwrap();

    let all = body_json(
        app.get(&format!("/api/v1/records/{id}/potential-matches"))
            .await,
    )
    .await;
    assert_eq!(all["data"].as_array().unwrap().len(), 2);
    assert_eq!(all["data"][0]["entity_id"], 7);
    assert_eq!(all["data"][0]["confidence"], 1.0);

    let strong = body_json(
        app.get(&format!("/api/v1/records/{id}/potential-matches?threshold=0.5"))
            .await,
    )
    .await;
    assert_eq!(strong["data"].as_array().unwrap().len(), 1);

    let response = app
        .get(&format!("/api/v1/records/{id}/potential-matches?threshold=1.5"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.get("/api/v1/records/999999/potential-matches").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
