mod common;

use axum::http::StatusCode;
use common::{decimal, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn create_and_reject_duplicate_symbol() {
    let app = TestApp::new();
    let user = app.user("ada", false).await;

    let (status, body) = app
        .post(
            "/assets",
            &user,
            json!({"name": "Apple", "symbol": " aapl ", "asset_type": "STOCK", "current_price": "189.50"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["symbol"], "AAPL");
    assert_eq!(body["currency"], "USD");
    assert_eq!(body["risk_level"], "MEDIUM");
    assert_eq!(body["transaction_count"], 0);
    assert_eq!(decimal(&body["total_volume"]), dec!(0));

    let (status, body) = app
        .post(
            "/assets",
            &user,
            json!({"name": "Apple again", "symbol": "AAPL", "asset_type": "STOCK", "current_price": "1"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["symbol"].is_array());
}

#[tokio::test]
async fn create_reports_every_missing_field() {
    let app = TestApp::new();
    let user = app.user("ada", false).await;

    let (status, body) = app.post("/assets", &user, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    for field in ["name", "symbol", "asset_type", "current_price"] {
        assert!(body["errors"][field].is_array(), "{field} missing from {body}");
    }

    let (status, body) = app
        .post(
            "/assets",
            &user,
            json!({"name": "Bad", "symbol": "BAD", "asset_type": "STOCK", "current_price": "0"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["current_price"].is_array());
}

#[tokio::test]
async fn price_update_tracks_day_range() {
    let app = TestApp::new();
    let user = app.user("ada", false).await;
    let id = app.asset(&user, "MSFT", "STOCK", "100").await;

    let (status, body) = app
        .post(&format!("/assets/{id}/update_price"), &user, json!({"price": "120"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["current_price"]), dec!(120));
    assert_eq!(decimal(&body["day_high"]), dec!(120));
    assert_eq!(decimal(&body["day_low"]), dec!(120));
    assert!(body["price_last_updated"].is_string());

    let (_, body) = app
        .post(&format!("/assets/{id}/update_price"), &user, json!({"price": "90"}))
        .await;
    assert_eq!(decimal(&body["day_high"]), dec!(120));
    assert_eq!(decimal(&body["day_low"]), dec!(90));

    let (_, body) = app
        .post(
            &format!("/assets/{id}/update_price"),
            &user,
            json!({"price": "80", "update_high_low": false}),
        )
        .await;
    assert_eq!(decimal(&body["current_price"]), dec!(80));
    assert_eq!(decimal(&body["day_low"]), dec!(90));

    for bad in [json!({}), json!({"price": "-1"})] {
        let (status, body) = app
            .post(&format!("/assets/{id}/update_price"), &user, bad)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["errors"]["price"].is_array());
    }
}

#[tokio::test]
async fn list_filters_and_orders() {
    let app = TestApp::new();
    let user = app.user("ada", false).await;
    app.asset(&user, "AAA", "STOCK", "10").await;
    app.asset(&user, "BBB", "STOCK", "300").await;
    app.asset(&user, "CCC", "CRYPTO", "50").await;

    let (_, body) = app.get("/assets?asset_type=STOCK&ordering=-current_price", &user).await;
    let symbols: Vec<_> = body.as_array().unwrap().iter().map(|a| a["symbol"].clone()).collect();
    assert_eq!(symbols, [json!("BBB"), json!("AAA")]);

    let (_, body) = app.get("/assets?min_price=20&max_price=100", &user).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["symbol"], "CCC");

    let (_, body) = app.get("/assets?min_price=lots", &user).await;
    assert_eq!(body.as_array().unwrap().len(), 3);

    let (_, body) = app.get("/assets?search=bbb", &user).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = app.get("/assets?asset_type=SPACESHIP", &user).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_category_is_rejected() {
    let app = TestApp::new();
    let user = app.user("ada", false).await;
    let (status, body) = app
        .post(
            "/assets",
            &user,
            json!({
                "name": "Gold",
                "symbol": "GLD",
                "asset_type": "COMMODITY",
                "current_price": "1900",
                "category": uuid::Uuid::new_v4(),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["category"].is_array());
}

#[tokio::test]
async fn statistics_cover_completed_trades_only() {
    let app = TestApp::new();
    let user = app.user("ada", false).await;
    let id = app.asset(&user, "NVDA", "STOCK", "100").await;

    app.trade(&user, &id, "BUY", "10", "100").await;
    app.trade(&user, &id, "SELL", "4", "110").await;
    let (status, _) = app
        .post(
            "/transactions",
            &user,
            json!({"asset": id, "transaction_type": "BUY", "quantity": "1", "price_per_unit": "5000"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.get(&format!("/assets/{id}/statistics"), &user).await;
    assert_eq!(status, StatusCode::OK);
    let stats = &body["statistics"];
    assert_eq!(stats["total_volume"].as_f64(), Some(1440.0));
    assert_eq!(stats["transaction_count"], 2);
    assert_eq!(stats["avg_transaction_size"].as_f64(), Some(720.0));
    assert_eq!(stats["buy_volume"].as_f64(), Some(1000.0));
    assert_eq!(stats["sell_volume"].as_f64(), Some(440.0));
    let ratio = stats["buy_sell_ratio"].as_f64().unwrap();
    assert!((ratio - 1000.0 / 440.0).abs() < 1e-9);
    assert_eq!(body["recent_transactions"].as_array().unwrap().len(), 2);
    assert_eq!(decimal(&body["asset"]["total_volume"]), dec!(1440));

    let (_, detail) = app.get(&format!("/assets/{id}"), &user).await;
    assert_eq!(detail["transaction_count"], 2);
}

#[tokio::test]
async fn statistics_without_sells_have_no_ratio() {
    let app = TestApp::new();
    let user = app.user("ada", false).await;
    let id = app.asset(&user, "IBM", "STOCK", "10").await;
    app.trade(&user, &id, "BUY", "1", "10").await;

    let (_, body) = app.get(&format!("/assets/{id}/statistics"), &user).await;
    assert!(body["statistics"]["buy_sell_ratio"].is_null());
}

#[tokio::test]
async fn deleting_an_asset_removes_it() {
    let app = TestApp::new();
    let user = app.user("ada", false).await;
    let id = app.asset(&user, "TSLA", "STOCK", "250").await;

    let (status, body) = app.delete(&format!("/assets/{id}"), &user).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = app.get(&format!("/assets/{id}"), &user).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
