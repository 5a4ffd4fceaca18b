use sea_orm::DatabaseConnection;
use taskboard_server::auth::UserService;
use taskboard_server::task::{TaskChanges, TaskService, TaskServiceError, TaskStatus};

mod common;

async fn create_user(db: &DatabaseConnection, email: &str) -> i32 {
    let user_service = UserService::new(db);
    user_service
        .register(email, "secret1")
        .await
        .expect("Failed to register user")
        .id()
}

#[tokio::test]
async fn create_task_defaults_to_todo() {
    let db = common::setup_db().await.expect("Failed to setup database");
    let owner_id = create_user(&db, "user@example.com").await;
    let task_service = TaskService::new(&db);

    let task = task_service
        .create_task(owner_id, "Write report".to_string(), None)
        .await
        .expect("Failed to create task");

    assert!(task.id() > 0);
    assert_eq!(task.title(), "Write report");
    assert_eq!(task.status(), TaskStatus::Todo);
    assert_eq!(task.user_id(), owner_id);
    assert_eq!(task.created_at(), task.updated_at());
}

#[tokio::test]
async fn create_task_honors_explicit_status() {
    let db = common::setup_db().await.expect("Failed to setup database");
    let owner_id = create_user(&db, "user@example.com").await;
    let task_service = TaskService::new(&db);

    let task = task_service
        .create_task(
            owner_id,
            "Review draft".to_string(),
            Some(TaskStatus::InProgress),
        )
        .await
        .expect("Failed to create task");

    assert_eq!(task.status(), TaskStatus::InProgress);
}

#[tokio::test]
async fn list_for_user_with_no_tasks_is_empty() {
    let db = common::setup_db().await.expect("Failed to setup database");
    let owner_id = create_user(&db, "user@example.com").await;
    let task_service = TaskService::new(&db);

    let tasks = task_service
        .tasks_for_owner(owner_id)
        .await
        .expect("Failed to list tasks");

    assert!(tasks.is_empty());
}

#[tokio::test]
async fn list_orders_most_recent_first() {
    let db = common::setup_db().await.expect("Failed to setup database");
    let owner_id = create_user(&db, "user@example.com").await;
    let task_service = TaskService::new(&db);

    let mut created_ids = Vec::new();
    for title in ["first", "second", "third"] {
        let task = task_service
            .create_task(owner_id, title.to_string(), None)
            .await
            .expect("Failed to create task");
        created_ids.push(task.id());
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let tasks = task_service
        .tasks_for_owner(owner_id)
        .await
        .expect("Failed to list tasks");

    let listed_ids: Vec<i32> = tasks.iter().map(|task| task.id()).collect();
    created_ids.reverse();
    assert_eq!(listed_ids, created_ids);
}

#[tokio::test]
async fn update_to_completed_advances_updated_at() {
    let db = common::setup_db().await.expect("Failed to setup database");
    let owner_id = create_user(&db, "user@example.com").await;
    let task_service = TaskService::new(&db);

    let task = task_service
        .create_task(owner_id, "Write report".to_string(), None)
        .await
        .expect("Failed to create task");

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    task_service
        .update_task(
            owner_id,
            task.id(),
            TaskChanges {
                title: None,
                status: Some(TaskStatus::Completed),
            },
        )
        .await
        .expect("Failed to update task");

    let tasks = task_service
        .tasks_for_owner(owner_id)
        .await
        .expect("Failed to list tasks");
    let listed = tasks
        .iter()
        .find(|t| t.id() == task.id())
        .expect("Task missing from list");

    assert_eq!(listed.status(), TaskStatus::Completed);
    assert_eq!(listed.title(), "Write report");
    assert!(listed.updated_at() > task.updated_at());
}

#[tokio::test]
async fn update_title_only_keeps_status() {
    let db = common::setup_db().await.expect("Failed to setup database");
    let owner_id = create_user(&db, "user@example.com").await;
    let task_service = TaskService::new(&db);

    let task = task_service
        .create_task(
            owner_id,
            "Write report".to_string(),
            Some(TaskStatus::InProgress),
        )
        .await
        .expect("Failed to create task");

    let updated = task_service
        .update_task(
            owner_id,
            task.id(),
            TaskChanges {
                title: Some("Write the final report".to_string()),
                status: None,
            },
        )
        .await
        .expect("Failed to update task");

    assert_eq!(updated.title(), "Write the final report");
    assert_eq!(updated.status(), TaskStatus::InProgress);
}

#[tokio::test]
async fn update_reports_missing_task() {
    let db = common::setup_db().await.expect("Failed to setup database");
    let owner_id = create_user(&db, "user@example.com").await;
    let task_service = TaskService::new(&db);

    let result = task_service
        .update_task(
            owner_id,
            999,
            TaskChanges {
                title: None,
                status: Some(TaskStatus::Completed),
            },
        )
        .await;

    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.to_string(), "Task with ID 999 not found");
    }
}

#[tokio::test]
async fn delete_removes_task_from_list() {
    let db = common::setup_db().await.expect("Failed to setup database");
    let owner_id = create_user(&db, "user@example.com").await;
    let task_service = TaskService::new(&db);

    let keep = task_service
        .create_task(owner_id, "Keep me".to_string(), None)
        .await
        .expect("Failed to create task");
    let doomed = task_service
        .create_task(owner_id, "Delete me".to_string(), None)
        .await
        .expect("Failed to create task");

    task_service
        .delete_task(owner_id, doomed.id())
        .await
        .expect("Failed to delete task");

    let tasks = task_service
        .tasks_for_owner(owner_id)
        .await
        .expect("Failed to list tasks");

    assert!(tasks.iter().all(|task| task.id() != doomed.id()));
    assert!(tasks.iter().any(|task| task.id() == keep.id()));
}

#[tokio::test]
async fn update_is_scoped_to_the_owner() {
    let db = common::setup_db().await.expect("Failed to setup database");
    let owner_id = create_user(&db, "owner@example.com").await;
    let intruder_id = create_user(&db, "intruder@example.com").await;
    let task_service = TaskService::new(&db);

    let task = task_service
        .create_task(owner_id, "Private task".to_string(), None)
        .await
        .expect("Failed to create task");

    let result = task_service
        .update_task(
            intruder_id,
            task.id(),
            TaskChanges {
                title: Some("Hijacked".to_string()),
                status: None,
            },
        )
        .await;
    assert!(matches!(result, Err(TaskServiceError::TaskNotFound(_))));

    let untouched = task_service
        .get_task(owner_id, task.id())
        .await
        .expect("Failed to fetch task");
    assert_eq!(untouched.title(), "Private task");
}

#[tokio::test]
async fn delete_is_scoped_to_the_owner() {
    let db = common::setup_db().await.expect("Failed to setup database");
    let owner_id = create_user(&db, "owner@example.com").await;
    let intruder_id = create_user(&db, "intruder@example.com").await;
    let task_service = TaskService::new(&db);

    let task = task_service
        .create_task(owner_id, "Private task".to_string(), None)
        .await
        .expect("Failed to create task");

    let result = task_service.delete_task(intruder_id, task.id()).await;
    assert!(matches!(result, Err(TaskServiceError::TaskNotFound(_))));

    let tasks = task_service
        .tasks_for_owner(owner_id)
        .await
        .expect("Failed to list tasks");
    assert_eq!(tasks.len(), 1);
}
