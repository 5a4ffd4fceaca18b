use crate::auth::CurrentUser;
use crate::task::web::TaskState;
use crate::task::{Task, TaskChanges, TaskService, TaskServiceError, TaskStatus};
use crate::web::api::ErrorResponse;
use axum::{
    Router,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// JSON representation of a Task for API responses.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskJson {
    /// Unique identifier for the task
    id: i32,
    /// Task title
    title: String,
    /// Task status: Todo, In Progress, or Completed
    #[schema(value_type = String)]
    status: TaskStatus,
    /// Creation timestamp
    #[schema(value_type = String)]
    created_at: chrono::DateTime<chrono::Utc>,
    /// Last-update timestamp
    #[schema(value_type = String)]
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Task> for TaskJson {
    fn from(task: Task) -> Self {
        Self {
            id: task.id(),
            title: task.title().to_string(),
            status: task.status(),
            created_at: task.created_at(),
            updated_at: task.updated_at(),
        }
    }
}

/// API response for listing the caller's tasks.
#[derive(Debug, Serialize, ToSchema)]
pub struct TasksResponse {
    /// List of tasks, most recently created first
    tasks: Vec<TaskJson>,
    /// Total number of tasks
    count: usize,
}

/// JSON request payload for creating a task.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTaskRequest {
    /// Task title, must not be empty
    title: String,
    /// Initial status; defaults to Todo when omitted
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    status: Option<TaskStatus>,
}

/// JSON request payload for partially updating a task.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTaskRequest {
    /// New title, left unchanged when omitted
    #[serde(default)]
    title: Option<String>,
    /// New status, left unchanged when omitted
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    status: Option<TaskStatus>,
}

/// JSON acknowledgement for update and delete operations.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    /// Human-readable outcome
    message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn validation_error(message: &str) -> ApiError {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse::new("VALIDATION_ERROR", message)),
    )
}

fn service_error(err: TaskServiceError, action: &str) -> ApiError {
    match err {
        TaskServiceError::TaskNotFound(_) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("TASK_NOT_FOUND", "Task not found")),
        ),
        other => {
            tracing::error!("Failed to {} task: {}", action, other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(
                    "INTERNAL_ERROR",
                    &format!("Failed to {} task", action),
                )),
            )
        }
    }
}

/// Handler for POST /api/tasks - Creates a task for the caller.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 200, description = "Created task", body = TaskJson),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn create_task_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<Json<TaskJson>, ApiError> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(validation_error("Task title is required"));
    }

    let service = TaskService::new(&state.db);
    let task = service
        .create_task(current_user.id, title.to_string(), payload.status)
        .await
        .map_err(|err| service_error(err, "create"))?;

    Ok(Json(TaskJson::from(task)))
}

/// Handler for GET /api/tasks - Returns the caller's tasks, most recent first.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/tasks",
    responses(
        (status = 200, description = "Successfully retrieved tasks", body = TasksResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn get_tasks_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<TasksResponse>, ApiError> {
    let service = TaskService::new(&state.db);
    let tasks = service
        .tasks_for_owner(current_user.id)
        .await
        .map_err(|err| service_error(err, "list"))?;

    let json_tasks: Vec<TaskJson> = tasks.into_iter().map(TaskJson::from).collect();
    let count = json_tasks.len();

    Ok(Json(TasksResponse {
        tasks: json_tasks,
        count,
    }))
}

/// Handler for PUT /api/tasks/{id} - Applies a partial update to one of the
/// caller's tasks.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    put,
    path = "/api/tasks/{id}",
    params(("id" = i32, Path, description = "Task id")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Task updated", body = MessageResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Task not found", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn update_task_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let title = match payload.title {
        Some(title) => {
            let trimmed = title.trim();
            if trimmed.is_empty() {
                return Err(validation_error("Task title is required"));
            }
            Some(trimmed.to_string())
        }
        None => None,
    };

    let service = TaskService::new(&state.db);
    let changes = TaskChanges {
        title,
        status: payload.status,
    };
    service
        .update_task(current_user.id, id, changes)
        .await
        .map_err(|err| service_error(err, "update"))?;

    Ok(Json(MessageResponse {
        message: "Updated".to_string(),
    }))
}

/// Handler for DELETE /api/tasks/{id} - Removes one of the caller's tasks.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    params(("id" = i32, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task deleted", body = MessageResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Task not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn delete_task_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<MessageResponse>, ApiError> {
    let service = TaskService::new(&state.db);
    service
        .delete_task(current_user.id, id)
        .await
        .map_err(|err| service_error(err, "delete"))?;

    Ok(Json(MessageResponse {
        message: "Deleted".to_string(),
    }))
}

/// Creates and returns the tasks API router.
pub fn create_api_router(state: Arc<TaskState>) -> Router {
    Router::new()
        .route(
            "/tasks",
            get(get_tasks_handler).post(create_task_handler),
        )
        .route(
            "/tasks/{id}",
            axum::routing::put(update_task_handler).delete(delete_task_handler),
        )
        .with_state(state)
}
