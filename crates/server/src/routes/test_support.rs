use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use db::DBService;
use local_deployment::LocalDeployment;
use serde_json::Value;
use services::services::config::Config;
use tempfile::TempDir;
use tower::ServiceExt;

use super::api_router;

/// API router over a fresh in-memory database and a throwaway config file.
pub(crate) struct TestApp {
    router: Router,
    _config_dir: TempDir,
}

pub(crate) fn data(body: &Value) -> &Value {
    &body["data"]
}

impl TestApp {
    pub(crate) async fn new() -> Self {
        let config_dir = tempfile::tempdir().unwrap();
        let db = DBService::new_in_memory().await.unwrap();
        let deployment = LocalDeployment::from_parts(db, Config::default(), config_dir.path().join("config.json"));
        Self {
            router: api_router(deployment),
            _config_dir: config_dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, String) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn send_json(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let (status, text) = self.send(request).await;
        let value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        (status, value)
    }

    pub(crate) async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send_json("GET", uri, None).await
    }

    pub(crate) async fn get_text(&self, uri: &str) -> (StatusCode, String) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    pub(crate) async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send_json("POST", uri, Some(body)).await
    }

    pub(crate) async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send_json("PUT", uri, Some(body)).await
    }

    pub(crate) async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send_json("DELETE", uri, None).await
    }

    /// Customer plus one project, returning the project id.
    pub(crate) async fn seed_project(&self, name: &str) -> i64 {
        let (_, customer) = self
            .post(
                "/api/customers",
                serde_json::json!({ "name": "Ada Quinn", "email": "ada@example.test", "address": "9 Pine Ct" }),
            )
            .await;
        let customer_id = data(&customer)["id"].as_i64().unwrap();
        let (status, project) = self
            .post(
                "/api/projects",
                serde_json::json!({ "customer_id": customer_id, "name": name, "budget_cents": 2_000_000 }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{project}");
        data(&project)["id"].as_i64().unwrap()
    }
}
