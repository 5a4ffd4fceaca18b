use std::sync::Arc;

use crate::{
    auth::{self, AuthState},
    task::{self, web::TaskState},
};

use axum::{
    Json, Router,
    middleware::{from_fn, from_fn_with_state},
};
use serde::Serialize;
use tower::ServiceBuilder;
use utoipa::{OpenApi, ToSchema};

/// JSON error envelope shared by all API endpoints.
#[derive(Serialize, Debug, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub error: String,
    /// Human-readable explanation
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::api::v1::json_register_handler,
        auth::api::v1::json_login_handler,
        task::api::v1::create_task_handler,
        task::api::v1::get_tasks_handler,
        task::api::v1::update_task_handler,
        task::api::v1::delete_task_handler,
    ),
    components(schemas(
        ErrorResponse,
        auth::api::v1::CredentialsRequest,
        auth::api::v1::TokenResponse,
        task::api::v1::TaskJson,
        task::api::v1::TasksResponse,
        task::api::v1::CreateTaskRequest,
        task::api::v1::UpdateTaskRequest,
        task::api::v1::MessageResponse,
    )),
    tags(
        (name = "Auth", description = "Account registration and sign-in"),
        (name = "Tasks", description = "Task CRUD, scoped to the authenticated user")
    )
)]
struct ApiDoc;

/// Serves the OpenAPI document describing the JSON API.
async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Creates the API routes for JSON API endpoints.
pub fn create_api_router(auth_state: Arc<AuthState>, task_state: Arc<TaskState>) -> Router {
    let login_router = auth::api::v1::create_api_router(auth_state.clone());
    let tasks_router = task::api::v1::create_api_router(task_state);
    let protected_routes = tasks_router.layer(
        ServiceBuilder::new().layer(from_fn(auth::api::v1::require_auth_middleware)),
    );
    let public_routes = login_router;
    let api_routes = public_routes.merge(protected_routes);
    Router::new()
        .nest("/api", api_routes)
        .route("/api-docs/openapi.json", axum::routing::get(openapi_handler))
        .layer(ServiceBuilder::new().layer(from_fn_with_state(
            auth_state,
            auth::api::v1::auth_user_middleware,
        )))
}
