mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn report_lifecycle() {
    let app = TestApp::new();
    let user = app.user("ada", false).await;

    let (status, body) = app
        .post(
            "/reports",
            &user,
            json!({
                "title": "Q1 taxes",
                "report_type": "TAX_REPORT",
                "period_start": "2026-01-01",
                "period_end": "2026-03-31",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["status"], "GENERATING");
    assert_eq!(body["format"], "JSON");
    assert_eq!(body["user"]["username"], "ada");
    assert_eq!(body["is_expired"], false);
    assert!(body["duration"].is_null());
    let id = body["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(
            &format!("/reports/{id}/complete"),
            &user,
            json!({"data": {"rows": 3}}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "COMPLETED");
    assert_eq!(body["data"], json!({"rows": 3}));
    assert!(body["completed_at"].is_string());
    assert!(body["duration"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn failing_a_report_records_the_error() {
    let app = TestApp::new();
    let user = app.user("ada", false).await;
    let (_, body) = app
        .post("/reports", &user, json!({"title": "Monthly", "report_type": "MONTHLY_SUMMARY"}))
        .await;
    let id = body["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(&format!("/reports/{id}/fail"), &user, json!({"error": "source offline"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "FAILED");
    assert_eq!(body["data"]["error"], "source offline");
    assert!(body["completed_at"].is_null());
}

#[tokio::test]
async fn complete_accepts_an_empty_body() {
    let app = TestApp::new();
    let user = app.user("ada", false).await;
    let (_, body) = app
        .post("/reports", &user, json!({"title": "Custom", "report_type": "CUSTOM"}))
        .await;
    let id = body["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(Method::POST, &format!("/reports/{id}/complete"), Some(&user), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "COMPLETED");
    assert_eq!(body["data"], json!({}));
}

#[tokio::test]
async fn period_must_be_ordered() {
    let app = TestApp::new();
    let user = app.user("ada", false).await;
    let (status, body) = app
        .post(
            "/reports",
            &user,
            json!({
                "title": "Backwards",
                "report_type": "PERFORMANCE",
                "period_start": "2026-06-01",
                "period_end": "2026-01-01",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["period_end"].is_array());
}

#[tokio::test]
async fn reports_are_private_to_their_owner() {
    let app = TestApp::new();
    let ada = app.user("ada", false).await;
    let bob = app.user("bob", false).await;
    let admin = app.user("admin", true).await;

    let (_, body) = app
        .post("/reports", &ada, json!({"title": "Mine", "report_type": "CUSTOM"}))
        .await;
    let id = body["id"].as_str().unwrap().to_string();

    let (status, _) = app.get(&format!("/reports/{id}"), &bob).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .post(&format!("/reports/{id}/complete"), &bob, json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = app.get("/reports", &bob).await;
    assert!(list.as_array().unwrap().is_empty());
    let (_, list) = app.get("/reports", &admin).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _) = app.delete(&format!("/reports/{id}"), &ada).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&format!("/reports/{id}"), &ada).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_action_body_leaves_report_untouched() {
    let app = TestApp::new();
    let user = app.user("ada", false).await;
    let (_, body) = app
        .post("/reports", &user, json!({"title": "Custom", "report_type": "CUSTOM"}))
        .await;
    let id = body["id"].as_str().unwrap().to_string();

    for action in ["complete", "fail"] {
        let (status, body) = app
            .send_raw(
                Method::POST,
                &format!("/reports/{id}/{action}"),
                Some(&user),
                Some("{\"data\": ".to_string()),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{action}");
        assert_eq!(body["code"], 400);
    }

    let (_, body) = app.get(&format!("/reports/{id}"), &user).await;
    assert_eq!(body["status"], "GENERATING");
    assert!(body["completed_at"].is_null());
}
