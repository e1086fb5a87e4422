#![allow(dead_code)]

use asset_tracker_backend::auth::USER_ID_HEADER;
use asset_tracker_backend::models::{NewUser, User};
use asset_tracker_backend::repo::users;
use asset_tracker_backend::{router, DatabasePool};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;

pub struct TestApp {
    pub pool: DatabasePool,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let pool = DatabasePool::in_memory().unwrap();
        TestApp {
            router: router(pool.clone()),
            pool,
        }
    }

    pub async fn user(&self, username: &str, is_staff: bool) -> User {
        let user = NewUser {
            username: username.to_string(),
            first_name: username.to_string(),
            is_staff,
            ..Default::default()
        }
        .into_user(Utc::now());
        let conn = self.pool.0.lock().await;
        users::insert(&conn, &user).unwrap();
        user
    }

    /// Sends a request as `caller` (anonymous when `None`) and decodes the JSON reply.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        caller: Option<&User>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        self.send_raw(method, uri, caller, body.map(|json| json.to_string()))
            .await
    }

    /// Like `send`, but with the body passed through untouched.
    pub async fn send_raw(
        &self,
        method: Method,
        uri: &str,
        caller: Option<&User>,
        body: Option<String>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(user) = caller {
            request = request.header(USER_ID_HEADER, user.id.to_string());
        }
        let request = match body {
            Some(text) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(text))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, caller: &User) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(caller), None).await
    }

    pub async fn post(&self, uri: &str, caller: &User, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(caller), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, caller: &User, body: Value) -> (StatusCode, Value) {
        self.send(Method::PATCH, uri, Some(caller), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, caller: &User) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(caller), None).await
    }

    /// Creates an asset through the API and returns its id.
    pub async fn asset(&self, caller: &User, symbol: &str, asset_type: &str, price: &str) -> String {
        let (status, body) = self
            .post(
                "/assets",
                caller,
                serde_json::json!({
                    "name": format!("{symbol} Holdings"),
                    "symbol": symbol,
                    "asset_type": asset_type,
                    "current_price": price,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    /// Records a completed transaction through the API and returns its body.
    pub async fn trade(&self, caller: &User, asset_id: &str, kind: &str, quantity: &str, price: &str) -> Value {
        let (status, body) = self
            .post(
                "/transactions",
                caller,
                serde_json::json!({
                    "asset": asset_id,
                    "transaction_type": kind,
                    "quantity": quantity,
                    "price_per_unit": price,
                    "status": "COMPLETED",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }
}

pub fn decimal(value: &Value) -> rust_decimal::Decimal {
    value.as_str().unwrap().parse().unwrap()
}
