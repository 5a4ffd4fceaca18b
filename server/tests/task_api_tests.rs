use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use taskboard_server::auth::AuthState;
use taskboard_server::task::web::TaskState;
use taskboard_server::web::api::create_api_router;
use tower::ServiceExt;

mod common;

async fn create_test_app() -> axum::Router {
    let db = Arc::new(common::setup_db().await.expect("Failed to setup database"));
    let auth_state = Arc::new(AuthState {
        db: db.clone(),
        jwt_secret: "test_secret".to_string(),
    });
    let task_state = Arc::new(TaskState { db });
    create_api_router(auth_state, task_state)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let body = match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };
    builder.body(body).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Registers an account through the API and returns its bearer token.
async fn register(app: &axum::Router, email: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"email": email, "password": "secret1"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    body["token"].as_str().expect("Missing token").to_string()
}

#[tokio::test]
async fn rejects_tokenless_requests() {
    let app = create_test_app().await;

    let response = app
        .oneshot(json_request("GET", "/api/tasks", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"], "UNAUTHORIZED");
}

#[tokio::test]
async fn can_login_after_registering() {
    let app = create_test_app().await;
    register(&app, "user@example.com").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "user@example.com", "password": "secret1"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["token"].as_str().is_some());
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let app = create_test_app().await;
    register(&app, "user@example.com").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "user@example.com", "password": "wrong-password"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn register_rejects_short_password() {
    let app = create_test_app().await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"email": "user@example.com", "password": "12345"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn created_task_defaults_to_todo() {
    let app = create_test_app().await;
    let token = register(&app, "user@example.com").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/tasks",
            Some(&token),
            Some(json!({"title": "Write report"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["id"].as_i64().is_some());
    assert_eq!(body["title"], "Write report");
    assert_eq!(body["status"], "Todo");
}

#[tokio::test]
async fn create_rejects_empty_title_before_any_store_call() {
    let app = create_test_app().await;
    let token = register(&app, "user@example.com").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/tasks",
            Some(&token),
            Some(json!({"title": "   "})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["error"], "VALIDATION_ERROR");

    let response = app
        .oneshot(json_request("GET", "/api/tasks", Some(&token), None))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn list_is_scoped_to_the_caller() {
    let app = create_test_app().await;
    let alice = register(&app, "alice@example.com").await;
    let bob = register(&app, "bob@example.com").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/tasks",
            Some(&alice),
            Some(json!({"title": "Alice's task"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request("GET", "/api/tasks", Some(&bob), None))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["count"], 0);

    let response = app
        .oneshot(json_request("GET", "/api/tasks", Some(&alice), None))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["tasks"][0]["title"], "Alice's task");
}

#[tokio::test]
async fn update_acknowledges_and_persists() {
    let app = create_test_app().await;
    let token = register(&app, "user@example.com").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/tasks",
            Some(&token),
            Some(json!({"title": "Write report"})),
        ))
        .await
        .unwrap();
    let created = json_body(response).await;
    let id = created["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/tasks/{}", id),
            Some(&token),
            Some(json!({"status": "Completed"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["message"], "Updated");

    let response = app
        .oneshot(json_request("GET", "/api/tasks", Some(&token), None))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["tasks"][0]["status"], "Completed");
}

#[tokio::test]
async fn update_of_another_users_task_is_not_found() {
    let app = create_test_app().await;
    let alice = register(&app, "alice@example.com").await;
    let bob = register(&app, "bob@example.com").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/tasks",
            Some(&alice),
            Some(json!({"title": "Alice's task"})),
        ))
        .await
        .unwrap();
    let created = json_body(response).await;
    let id = created["id"].as_i64().unwrap();

    let response = app
        .oneshot(json_request(
            "PUT",
            &format!("/api/tasks/{}", id),
            Some(&bob),
            Some(json!({"title": "Hijacked"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error"], "TASK_NOT_FOUND");
}

#[tokio::test]
async fn delete_acknowledges_and_removes() {
    let app = create_test_app().await;
    let token = register(&app, "user@example.com").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/tasks",
            Some(&token),
            Some(json!({"title": "Write report"})),
        ))
        .await
        .unwrap();
    let created = json_body(response).await;
    let id = created["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "DELETE",
            &format!("/api/tasks/{}", id),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["message"], "Deleted");

    let response = app
        .oneshot(json_request("GET", "/api/tasks", Some(&token), None))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn serves_openapi_document() {
    let app = create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["paths"]["/api/tasks"].is_object());
}
