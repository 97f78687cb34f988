//! Integration test: Server API endpoints

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serplens::server::{create_router, AppState, ServerConfig};
use tower::ServiceExt;

const BOUNDARY: &str = "serplens-test-boundary";

fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        webhook_url: None,
        max_upload_size: 10 * 1024 * 1024,
    }
}

/// Router with a fresh single-session state. No webhook is configured, so
/// logins succeed after format validation alone.
fn test_app() -> axum::Router {
    let config = test_config();
    let state = Arc::new(AppState::new(config.clone()).unwrap());
    create_router(state, &config)
}

fn sample_csv(n: usize) -> String {
    let mut csv = String::from("Top queries,Clicks,Impressions,CTR,Position\n");
    for i in 1..=n {
        let ctr_pct = i as f64;
        let impressions = 100 * i;
        let clicks = ((ctr_pct / 100.0) * impressions as f64).round() as usize;
        let position = (n + 1 - i) as f64;
        csv.push_str(&format!(
            "query {i},{clicks},{impressions},{ctr_pct}%,{position}\n"
        ));
    }
    csv
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn upload_request(csv: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"export.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         {csv}\r\n\
         --{BOUNDARY}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri("/api/data/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login(app: &axum::Router) {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({"email": "analyst@example.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK, "login should succeed");
}

async fn upload(app: &axum::Router, rows: usize) {
    let response = app
        .clone()
        .oneshot(upload_request(&sample_csv(rows)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK, "upload should succeed");
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/nonexistent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], true);
}

#[tokio::test]
async fn test_wrong_method_returns_405() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/train")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_login_rejects_malformed_email() {
    let app = test_app();
    for email in ["plainaddress", "user@nodot", ""] {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/login",
                serde_json::json!({"email": email}),
            ))
            .await
            .unwrap();
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "{email:?} should be rejected"
        );
    }
}

#[tokio::test]
async fn test_endpoints_require_login() {
    let app = test_app();
    let requests = vec![
        upload_request(&sample_csv(4)),
        Request::builder()
            .uri("/api/data/preview")
            .body(Body::empty())
            .unwrap(),
        json_request(
            "POST",
            "/api/train",
            serde_json::json!({"model": "LinearRegression"}),
        ),
        Request::builder()
            .uri("/api/quadrants")
            .body(Body::empty())
            .unwrap(),
    ];

    for request in requests {
        let uri = request.uri().clone();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "{uri} should demand a login first"
        );
    }
}

#[tokio::test]
async fn test_login_reports_session() {
    let app = test_app();
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({"email": "analyst@example.com"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["email"], "analyst@example.com");
    assert_eq!(body["session"].as_str().unwrap().len(), 8);
}

#[tokio::test]
async fn test_upload_rejects_non_csv_filename() {
    let app = test_app();
    login(&app).await;

    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"export.xlsx\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n\
         not a csv\r\n\
         --{BOUNDARY}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/data/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_rejects_missing_column() {
    let app = test_app();
    login(&app).await;

    // no CTR column
    let csv = "Top queries,Clicks,Impressions,Position\nquery,10,100,3.0\n";
    let response = app.clone().oneshot(upload_request(csv)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(
        body["message"].as_str().unwrap().contains("CTR"),
        "message should name the missing column: {body}"
    );
}

#[tokio::test]
async fn test_preview_before_upload_is_404() {
    let app = test_app();
    login(&app).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/data/preview")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_train_with_invalid_model_kind() {
    let app = test_app();
    login(&app).await;
    upload(&app, 20).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/train",
            serde_json::json!({"model": "Foo"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(
        body["message"].as_str().unwrap().contains("Foo"),
        "message should echo the unknown tag: {body}"
    );
}

#[tokio::test]
async fn test_full_analysis_flow() {
    let app = test_app();
    login(&app).await;
    upload(&app, 20).await;

    // preview defaults to ten rows
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/data/preview")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total_rows"], 20);
    assert_eq!(body["data"].as_array().unwrap().len(), 10);

    // train twice, the split is seeded so the score repeats exactly
    let mut scores = Vec::new();
    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/train",
                serde_json::json!({"model": "LinearRegression"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["model"], "LinearRegression");
        scores.push(body["mse"].as_f64().unwrap());
    }
    assert!(scores[0] >= 0.0);
    assert_eq!(scores[0], scores[1], "seeded split should repeat the score");

    // quadrant report over the scored dataset
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/quadrants")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 20);
    assert_eq!(body["buckets"].as_array().unwrap().len(), 4);
    assert!((body["mean_ctr"].as_f64().unwrap() - 0.105).abs() < 1e-9);
    assert!((body["mean_position"].as_f64().unwrap() - 10.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_quadrants_before_upload_is_404() {
    let app = test_app();
    login(&app).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/quadrants")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_session_endpoint_tracks_progress() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/session")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["authenticated"], false);

    login(&app).await;
    upload(&app, 20).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/session")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["rows"], 20);
}

#[tokio::test]
async fn test_session_reset_clears_dataset() {
    let app = test_app();
    login(&app).await;
    upload(&app, 20).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/session")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // dataset is gone, identity survives
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/data/preview")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/session")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["authenticated"], true);
}

#[tokio::test]
async fn test_fresh_upload_clears_stale_model() {
    let app = test_app();
    login(&app).await;
    upload(&app, 20).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/train",
            serde_json::json!({"model": "LinearRegression"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    upload(&app, 12).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/session")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["rows"], 12);
    assert_eq!(body["model"], serde_json::Value::Null);
}
