//! Integration tests for the health endpoint.

mod common;

use axum::http::StatusCode;

#[tokio::test]
async fn test_health_returns_200_with_status_ok() {
    let app = common::build_test_app();

    let (status, json) = common::get_json(app.router(), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "narrator");
    assert!(json["version"].is_string());
    assert_eq!(json["sessions"], 0);
}

#[tokio::test]
async fn test_health_counts_open_sessions() {
    let app = common::build_test_app();
    common::post_json(
        app.router(),
        "/api/v1/chats/-100/session",
        &serde_json::json!({ "seats": 5 }),
    )
    .await;

    let (_, json) = common::get_json(app.router(), "/health").await;

    assert_eq!(json["sessions"], 1);
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let app = common::build_test_app();

    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/api/v1/nonexistent")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = tower::ServiceExt::oneshot(app.router(), request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
