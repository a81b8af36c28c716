// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{use_case, FixedSource, ScriptedModel, CONTACT_PAGE, EMAIL_PROGRAM};
use axum::http::StatusCode;
use axum_test::TestServer;
use promptscraper::presentation::routes;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn server_with_replies(replies: &[&str]) -> (TestServer, Arc<ScriptedModel>) {
    let model = ScriptedModel::new(replies.iter().copied());
    let use_case = Arc::new(use_case(FixedSource::page(CONTACT_PAGE), model.clone(), 2));
    let app = routes::routes(use_case, CancellationToken::new());
    (TestServer::new(app).unwrap(), model)
}

#[tokio::test]
async fn test_health_check() {
    let (server, _) = server_with_replies(&[]);

    let response = server.get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response.json::<Value>(),
        json!({"status": "healthy", "service": "promptscraper"})
    );
}

#[tokio::test]
async fn test_root_lists_endpoints() {
    let (server, _) = server_with_replies(&[]);

    let body = server.get("/").await.json::<Value>();

    assert_eq!(body["service"], "promptscraper");
    assert!(body["endpoints"]["POST /scrape"].is_string());
    assert_eq!(server.get("/version").await.text(), env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_scrape_returns_records() {
    let (server, _) = server_with_replies(&[EMAIL_PROGRAM]);

    let response = server
        .post("/scrape")
        .json(&json!({
            "url": "https://example.com/contact",
            "prompt": "extract all email addresses",
            "format": "json"
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.json::<Value>();
    assert_eq!(body["success"], true);
    assert_eq!(
        body["data"],
        json!([{"email": "test@example.com"}, {"email": "contact@example.com"}])
    );
    assert_eq!(body["total_results"], 2);
    assert!(body["execution_time"].is_number());
    assert!(body.get("error").is_none());
    assert!(body.get("columns").is_none());
}

#[tokio::test]
async fn test_scrape_failure_is_unprocessable() {
    let (server, model) = server_with_replies(&["nope", "still nope"]);

    let response = server
        .post("/scrape")
        .json(&json!({"url": "example.com/contact", "prompt": "extract emails"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response.json::<Value>();
    assert_eq!(body["success"], false);
    assert_eq!(body["data"], json!([]));
    assert_eq!(body["total_results"], 0);
    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let (server, model) = server_with_replies(&[EMAIL_PROGRAM]);

    let cases = [
        json!({"url": "ftp://example.com", "prompt": "emails"}),
        json!({"url": "https://example.com", "prompt": "   "}),
        json!({"url": "https://example.com", "prompt": "emails", "format": "xml"}),
        json!({"url": "", "prompt": "emails"}),
        json!({"prompt": "emails"}),
    ];

    for case in cases {
        let response = server.post("/scrape").json(&case).await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST, "{}", case);
        let body = response.json::<Value>();
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());
    }
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_csv_format_reports_columns() {
    let (server, _) = server_with_replies(&[EMAIL_PROGRAM]);

    let body = server
        .post("/scrape")
        .json(&json!({
            "url": "https://example.com/contact",
            "prompt": "extract all email addresses",
            "format": "csv"
        }))
        .await
        .json::<Value>();

    assert_eq!(body["columns"], json!(["email"]));
}

#[tokio::test]
async fn test_csv_download() {
    let (server, _) = server_with_replies(&[EMAIL_PROGRAM]);

    let response = server
        .post("/scrape/csv")
        .json(&json!({
            "url": "https://example.com/contact",
            "prompt": "extract all email addresses"
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let content_type = response.header("content-type");
    assert!(content_type.to_str().unwrap().starts_with("text/csv"));
    let disposition = response.header("content-disposition");
    let disposition = disposition.to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=scraped_data_"));
    assert!(disposition.ends_with(".csv"));
    assert_eq!(
        response.text(),
        "email\ntest@example.com\ncontact@example.com\n"
    );
}

#[tokio::test]
async fn test_csv_download_failure_returns_json() {
    let (server, _) = server_with_replies(&["{}", "{}"]);

    let response = server
        .post("/scrape/csv")
        .json(&json!({"url": "https://example.com", "prompt": "emails"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["success"], false);
}

/// 直接驱动路由，不经过测试服务器
#[tokio::test]
async fn test_router_serves_health_without_server() {
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    let model = ScriptedModel::new(Vec::<String>::new());
    let use_case = Arc::new(use_case(FixedSource::page(CONTACT_PAGE), model, 1));
    let app = routes::routes(use_case, CancellationToken::new());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
