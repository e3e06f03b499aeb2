use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::task::{CreateTask, Task, UpdateTask};
use serde::{Deserialize, Serialize};
use services::services::events::{TaskEvent, TaskEventKind};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{Deployment, error::ApiError};

#[derive(Debug, Serialize, Deserialize, TS)]
pub struct TaskQuery {
    pub board_id: Uuid,
}

/// GET /api/tasks?board_id= - List tasks on a board
pub async fn get_tasks(
    State(deployment): State<Deployment>,
    Query(query): Query<TaskQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let tasks = Task::find_by_board_id(&deployment.db().pool, query.board_id).await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

/// POST /api/tasks - Create a task
///
/// The GitHub mirror is fired after the local write commits and never
/// affects this response.
pub async fn create_task(
    State(deployment): State<Deployment>,
    Json(payload): Json<CreateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = Task::create(&deployment.db().pool, &payload, Uuid::new_v4()).await?;

    deployment.events().publish(TaskEvent::new(
        task.board_id,
        task.id,
        TaskEventKind::Created,
    ));

    let sync = deployment.issue_sync();
    let task_for_sync = task.clone();
    tokio::spawn(async move {
        sync.task_created(&task_for_sync).await;
    });

    Ok(ResponseJson(ApiResponse::success(task)))
}

/// GET /api/tasks/{id} - Get a task by ID
pub async fn get_task(
    State(deployment): State<Deployment>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = Task::find_by_id(&deployment.db().pool, task_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

/// PUT /api/tasks/{id} - Update a task
pub async fn update_task(
    State(deployment): State<Deployment>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<UpdateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let existing = Task::find_by_id(&deployment.db().pool, task_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let title = payload.title.as_deref().unwrap_or(&existing.title);
    let description = payload
        .description
        .as_deref()
        .or(existing.description.as_deref());
    let status = payload.status.unwrap_or(existing.status);
    let position = payload.position.unwrap_or(existing.position);

    let task = Task::update(
        &deployment.db().pool,
        task_id,
        title,
        description,
        status,
        position,
    )
    .await?;

    deployment.events().publish(TaskEvent::new(
        task.board_id,
        task.id,
        TaskEventKind::Updated,
    ));

    let sync = deployment.issue_sync();
    let previous_status = existing.status;
    let task_for_sync = task.clone();
    tokio::spawn(async move {
        sync.task_updated(&task_for_sync, previous_status).await;
    });

    Ok(ResponseJson(ApiResponse::success(task)))
}

/// DELETE /api/tasks/{id} - Delete a task
///
/// The paired issue is closed, never deleted.
pub async fn delete_task(
    State(deployment): State<Deployment>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let existing = Task::find_by_id(&deployment.db().pool, task_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    Task::delete(&deployment.db().pool, task_id).await?;

    deployment.events().publish(TaskEvent::new(
        existing.board_id,
        existing.id,
        TaskEventKind::Deleted,
    ));

    let sync = deployment.issue_sync();
    tokio::spawn(async move {
        sync.task_deleted(&existing).await;
    });

    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<Deployment> {
    Router::new()
        .route("/tasks", get(get_tasks).post(create_task))
        .route(
            "/tasks/{task_id}",
            get(get_task).put(update_task).delete(delete_task),
        )
}
