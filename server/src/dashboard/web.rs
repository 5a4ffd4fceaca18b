use askama::Template;
use axum::{
    Router,
    extract::{Extension, State},
    http::StatusCode,
    response::Html,
    routing::get,
};
use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::dashboard::TaskStats;
use crate::task::web::TaskState;
use crate::task::{TaskService, TaskServiceError};

/// One bar of the month histogram, with its width precomputed for the template.
pub struct MonthBar {
    pub month: String,
    pub count: usize,
    pub percent: usize,
}

/// Custom error type for dashboard handler operations.
#[derive(Debug, thiserror::Error)]
enum DashboardError {
    /// Represents an error during template rendering.
    #[error("Template rendering failed")]
    Template(#[from] askama::Error),
    /// Represents a task service error.
    #[error("Task service error")]
    Service(#[from] TaskServiceError),
}

impl axum::response::IntoResponse for DashboardError {
    fn into_response(self) -> axum::response::Response {
        let user_facing_error_message =
            "An unexpected error occurred while processing your request. Please try again later.";
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(format!(
                "<h1>Internal Server Error</h1><p>{}</p>",
                user_facing_error_message
            )),
        )
            .into_response()
    }
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    stats: TaskStats,
    bars: Vec<MonthBar>,
}

impl DashboardTemplate {
    pub fn new(stats: TaskStats) -> Self {
        let max = stats.max_month_count();
        let bars = stats
            .by_month
            .iter()
            .map(|bucket| MonthBar {
                month: bucket.month.clone(),
                count: bucket.count,
                percent: if max == 0 { 0 } else { bucket.count * 100 / max },
            })
            .collect();
        Self { stats, bars }
    }
}

/// Handler for GET /dashboard. Every displayed figure derives from the
/// caller's fetched task collection.
#[tracing::instrument(skip(state))]
async fn dashboard_page_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Html<String>, DashboardError> {
    let task_service = TaskService::new(&state.db);
    let tasks = task_service.tasks_for_owner(current_user.id).await?;
    let stats = TaskStats::derive(&tasks);

    let template = DashboardTemplate::new(stats);
    template.render().map(Html).map_err(DashboardError::from)
}

/// Creates and returns the dashboard router.
pub fn create_dashboard_router(state: Arc<TaskState>) -> Router {
    Router::new()
        .route("/dashboard", get(dashboard_page_handler))
        .with_state(state)
}
