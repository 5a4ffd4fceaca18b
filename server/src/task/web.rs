use askama::Template;
use axum::{
    Form, Router,
    extract::{Extension, Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Html,
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::task::{Task, TaskChanges, TaskService, TaskServiceError, TaskStatus, filter_by_status};

/// Form payload shared by the create and edit modal.
#[derive(Debug, Deserialize)]
pub struct TaskForm {
    title: String,
    status: TaskStatus,
}

/// Query parameters for the table fragment. Absent status means All.
#[derive(Debug, Deserialize)]
pub struct TaskFilterQuery {
    #[serde(default)]
    status: Option<TaskStatus>,
}

/// Custom error type for task handler operations.
#[derive(Debug, thiserror::Error)]
enum TaskError {
    /// Represents an error during template rendering.
    #[error("Template rendering failed")]
    Template(#[from] askama::Error),
    /// Represents a task service error.
    #[error("Task service error")]
    Service(#[from] TaskServiceError),
    /// A form field failed validation before reaching the store.
    #[error("{0}")]
    Validation(String),
}

impl axum::response::IntoResponse for TaskError {
    fn into_response(self) -> axum::response::Response {
        let (status_code, user_facing_error_message) = match &self {
            TaskError::Validation(message) => {
                (StatusCode::UNPROCESSABLE_ENTITY, message.as_str())
            }
            TaskError::Service(TaskServiceError::TaskNotFound(_)) => {
                (StatusCode::NOT_FOUND, "This task no longer exists.")
            }
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred while processing your request. Please try again later.",
            ),
        };

        let error_template = ErrorMessageTemplate::new(user_facing_error_message.to_string());
        let Ok(rendered) = error_template.render() else {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        };

        let mut response = (status_code, Html(rendered)).into_response();
        // Retarget the error fragment at the form's message div
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("hx-retarget"),
            HeaderValue::from_static("#task-form-message"),
        );
        headers.insert(
            HeaderName::from_static("hx-reswap"),
            HeaderValue::from_static("outerHTML"),
        );
        response.headers_mut().extend(headers);
        response
    }
}

#[derive(Template)]
#[template(path = "tasks.html")]
struct TasksTemplate {}

impl TasksTemplate {
    pub fn new() -> Self {
        Self {}
    }
}

#[derive(Template)]
#[template(path = "tasks/task_table.html")]
struct TaskTableTemplate {
    tasks: Vec<Task>,
    total: usize,
}

impl TaskTableTemplate {
    pub fn new(tasks: Vec<Task>, total: usize) -> Self {
        Self { tasks, total }
    }
}

#[derive(Template)]
#[template(path = "tasks/task_form.html")]
struct TaskFormTemplate {
    task: Option<Task>,
}

impl TaskFormTemplate {
    pub fn new(task: Option<Task>) -> Self {
        Self { task }
    }

    fn current_title(&self) -> &str {
        self.task.as_ref().map(Task::title).unwrap_or("")
    }

    fn current_status(&self) -> &'static str {
        self.task
            .as_ref()
            .map(|task| task.status().as_str())
            .unwrap_or("Todo")
    }
}

#[derive(Template)]
#[template(path = "tasks/error_message.html")]
struct ErrorMessageTemplate {
    message: String,
}

impl ErrorMessageTemplate {
    pub fn new(message: String) -> Self {
        Self { message }
    }
}

#[derive(Clone, Debug)]
pub struct TaskState {
    pub db: Arc<sea_orm::DatabaseConnection>,
}

/// Fetches the owner's full collection, applies the in-memory status filter,
/// and renders the table fragment. The footer always shows filtered-of-total.
#[tracing::instrument(skip(task_service))]
async fn render_task_table(
    task_service: &TaskService<'_>,
    owner_id: i32,
    status: Option<TaskStatus>,
) -> Result<String, TaskError> {
    let tasks = task_service.tasks_for_owner(owner_id).await?;
    let total = tasks.len();
    let visible = filter_by_status(tasks, status);
    let table_template = TaskTableTemplate::new(visible, total);
    table_template.render().map_err(TaskError::from)
}

/// Rejects empty or whitespace-only titles before any store call.
fn validated_title(title: &str) -> Result<String, TaskError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(TaskError::Validation("Task title is required".to_string()));
    }
    Ok(trimmed.to_string())
}

/// Handler for the /tasks endpoint that displays the task list page.
#[tracing::instrument]
async fn tasks_page_handler() -> Result<Html<String>, TaskError> {
    let template = TasksTemplate::new();
    template.render().map(Html).map_err(TaskError::from)
}

/// Handler for GET /tasks/table that returns the filtered table fragment.
#[tracing::instrument(skip(state))]
async fn task_table_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<TaskFilterQuery>,
) -> Result<Html<String>, TaskError> {
    let task_service = TaskService::new(&state.db);
    let table_html = render_task_table(&task_service, current_user.id, query.status).await?;
    Ok(Html(table_html))
}

/// Handler for serving the create form. The form is shared with editing and
/// opens in create mode with the status preselected to Todo.
#[tracing::instrument]
async fn new_task_form_handler() -> Result<Html<String>, TaskError> {
    let template = TaskFormTemplate::new(None);
    template.render().map(Html).map_err(TaskError::from)
}

/// Handler for serving the edit form bound to one of the owner's tasks.
#[tracing::instrument(skip(state))]
async fn edit_task_form_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Html<String>, TaskError> {
    let task_service = TaskService::new(&state.db);
    let task = task_service.get_task(current_user.id, id).await?;
    let template = TaskFormTemplate::new(Some(task));
    template.render().map(Html).map_err(TaskError::from)
}

/// Handler for creating a task via POST request. Re-renders the full table on
/// success.
#[tracing::instrument(skip(state))]
async fn create_task_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
    Form(form): Form<TaskForm>,
) -> Result<Html<String>, TaskError> {
    let title = validated_title(&form.title)?;
    let task_service = TaskService::new(&state.db);

    task_service
        .create_task(current_user.id, title, Some(form.status))
        .await?;

    let table_html = render_task_table(&task_service, current_user.id, None).await?;
    Ok(Html(table_html))
}

/// Handler for updating a task via PUT request. Re-renders the full table on
/// success.
#[tracing::instrument(skip(state))]
async fn update_task_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Form(form): Form<TaskForm>,
) -> Result<Html<String>, TaskError> {
    let title = validated_title(&form.title)?;
    let task_service = TaskService::new(&state.db);

    let changes = TaskChanges {
        title: Some(title),
        status: Some(form.status),
    };
    task_service
        .update_task(current_user.id, id, changes)
        .await?;

    let table_html = render_task_table(&task_service, current_user.id, None).await?;
    Ok(Html(table_html))
}

/// Handler for deleting a task via DELETE request. The row's delete button
/// carries the confirmation prompt; this handler only runs after the user
/// confirmed.
#[tracing::instrument(skip(state))]
async fn delete_task_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Html<String>, TaskError> {
    let task_service = TaskService::new(&state.db);
    task_service.delete_task(current_user.id, id).await?;

    let table_html = render_task_table(&task_service, current_user.id, None).await?;
    Ok(Html(table_html))
}

/// Creates and returns the task router with all task-related routes.
pub fn create_task_router(state: Arc<TaskState>) -> Router {
    Router::new()
        .route("/tasks", get(tasks_page_handler).post(create_task_handler))
        .route("/tasks/table", get(task_table_handler))
        .route("/tasks/new", get(new_task_form_handler))
        .route(
            "/tasks/{id}",
            axum::routing::put(update_task_handler).delete(delete_task_handler),
        )
        .route("/tasks/{id}/edit", get(edit_task_form_handler))
        .with_state(state)
}
