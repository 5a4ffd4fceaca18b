use crate::entities::task;
use sea_orm::*;

pub mod api;
pub mod web;

pub use crate::entities::task::TaskStatus;

/// A unit of work owned by one user.
#[derive(Debug, PartialEq, Clone, Eq)]
pub struct Task {
    id: i32,
    title: String,
    status: TaskStatus,
    user_id: i32,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl Task {
    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the id of the owning user.
    pub fn user_id(&self) -> i32 {
        self.user_id
    }

    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.updated_at
    }

    /// Creation date rendered for table display.
    pub fn created_on(&self) -> String {
        self.created_at.format("%Y-%m-%d").to_string()
    }
}

impl From<task::Model> for Task {
    fn from(model: task::Model) -> Self {
        Task {
            id: model.id,
            title: model.title,
            status: model.status,
            user_id: model.user_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// A partial change set for an existing task. `None` fields are left as-is.
#[derive(Debug, Default, Clone)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
}

/// Error type for TaskService operations.
#[derive(Debug, thiserror::Error)]
pub enum TaskServiceError {
    /// Represents a database error.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    /// The task does not exist, or belongs to another user.
    #[error("Task with ID {0} not found")]
    TaskNotFound(i32),
}

pub struct TaskService<'a> {
    db: &'a DatabaseConnection,
}

impl TaskService<'_> {
    pub fn new(db: &DatabaseConnection) -> TaskService {
        TaskService { db }
    }

    /// Creates a new task for the given owner.
    ///
    /// # Arguments
    ///
    /// * `owner_id` - The id of the user the task belongs to.
    /// * `title` - The task title. Emptiness is the caller's responsibility.
    /// * `status` - Initial status; defaults to Todo when omitted.
    ///
    /// # Returns
    ///
    /// A `Result` containing the created `Task` if successful, or an error otherwise.
    #[tracing::instrument(skip(self))]
    pub async fn create_task(
        &self,
        owner_id: i32,
        title: String,
        status: Option<TaskStatus>,
    ) -> Result<Task, TaskServiceError> {
        let now = chrono::Utc::now();
        let active_model = task::ActiveModel {
            title: ActiveValue::Set(title),
            status: ActiveValue::Set(status.unwrap_or(TaskStatus::Todo)),
            user_id: ActiveValue::Set(owner_id),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            ..Default::default()
        };
        let created_model = active_model.insert(self.db).await?;
        Ok(Task::from(created_model))
    }

    /// Retrieves all tasks belonging to the given owner, most recent first.
    ///
    /// # Returns
    ///
    /// A `Result` containing a vector of `Task`; an owner with no tasks gets
    /// an empty vector, not an error.
    #[tracing::instrument(skip(self))]
    pub async fn tasks_for_owner(&self, owner_id: i32) -> Result<Vec<Task>, TaskServiceError> {
        let tasks = task::Entity::find()
            .filter(task::Column::UserId.eq(owner_id))
            .order_by_desc(task::Column::CreatedAt)
            .order_by_desc(task::Column::Id)
            .all(self.db)
            .await?
            .into_iter()
            .map(Task::from)
            .collect();
        Ok(tasks)
    }

    /// Retrieves one of the owner's tasks by id.
    #[tracing::instrument(skip(self))]
    pub async fn get_task(&self, owner_id: i32, id: i32) -> Result<Task, TaskServiceError> {
        let model = self.find_owned(owner_id, id).await?;
        Ok(Task::from(model))
    }

    /// Applies a partial change set to one of the owner's tasks and refreshes
    /// its updated-at timestamp.
    ///
    /// # Returns
    ///
    /// A `Result` containing the updated `Task`, or `TaskNotFound` when the id
    /// does not exist or belongs to another user.
    #[tracing::instrument(skip(self))]
    pub async fn update_task(
        &self,
        owner_id: i32,
        id: i32,
        changes: TaskChanges,
    ) -> Result<Task, TaskServiceError> {
        let task_to_update = self.find_owned(owner_id, id).await?;

        let mut active_model: task::ActiveModel = task_to_update.into();
        if let Some(title) = changes.title {
            active_model.title = ActiveValue::Set(title);
        }
        if let Some(status) = changes.status {
            active_model.status = ActiveValue::Set(status);
        }
        active_model.updated_at = ActiveValue::Set(chrono::Utc::now());
        let updated_model = active_model.update(self.db).await?;

        Ok(Task::from(updated_model))
    }

    /// Deletes one of the owner's tasks by id.
    ///
    /// # Returns
    ///
    /// A `Result` containing the deleted `Task`, or `TaskNotFound` when the id
    /// does not exist or belongs to another user.
    #[tracing::instrument(skip(self))]
    pub async fn delete_task(&self, owner_id: i32, id: i32) -> Result<Task, TaskServiceError> {
        let task_to_delete = self.find_owned(owner_id, id).await?;

        let deleted = Task::from(task_to_delete.clone());
        task_to_delete.delete(self.db).await?;
        Ok(deleted)
    }

    /// Looks up a task by id, scoped to the owner. Rows belonging to other
    /// users are reported as not found.
    async fn find_owned(&self, owner_id: i32, id: i32) -> Result<task::Model, TaskServiceError> {
        task::Entity::find_by_id(id)
            .filter(task::Column::UserId.eq(owner_id))
            .one(self.db)
            .await?
            .ok_or(TaskServiceError::TaskNotFound(id))
    }
}

/// Applies the list view's status filter to an already-fetched collection,
/// preserving the original order. `None` means All.
pub fn filter_by_status(tasks: Vec<Task>, status: Option<TaskStatus>) -> Vec<Task> {
    match status {
        None => tasks,
        Some(wanted) => tasks
            .into_iter()
            .filter(|task| task.status() == wanted)
            .collect(),
    }
}
