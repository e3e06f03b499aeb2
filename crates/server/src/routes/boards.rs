use axum::{
    Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::board::{Board, CreateBoard, UpdateBoard};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use services::services::github::{
    client::{GitHubClient, GitHubRepoInfo},
    project::ProjectResolver,
};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{Deployment, error::ApiError};

/// GET /api/boards - List boards
pub async fn get_boards(
    State(deployment): State<Deployment>,
) -> Result<ResponseJson<ApiResponse<Vec<Board>>>, ApiError> {
    let boards = Board::find_all(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(boards)))
}

/// POST /api/boards - Create a new board
pub async fn create_board(
    State(deployment): State<Deployment>,
    Json(payload): Json<CreateBoard>,
) -> Result<ResponseJson<ApiResponse<Board>>, ApiError> {
    let board = Board::create(&deployment.db().pool, &payload, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(board)))
}

/// GET /api/boards/{id} - Get a board by ID
pub async fn get_board(
    State(deployment): State<Deployment>,
    Path(board_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Board>>, ApiError> {
    let board = Board::find_by_id(&deployment.db().pool, board_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(ResponseJson(ApiResponse::success(board)))
}

/// PUT /api/boards/{id} - Update a board
pub async fn update_board(
    State(deployment): State<Deployment>,
    Path(board_id): Path<Uuid>,
    Json(payload): Json<UpdateBoard>,
) -> Result<ResponseJson<ApiResponse<Board>>, ApiError> {
    let board = Board::find_by_id(&deployment.db().pool, board_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let name = payload.name.unwrap_or(board.name);
    let board = Board::update_name(&deployment.db().pool, board_id, &name).await?;
    Ok(ResponseJson(ApiResponse::success(board)))
}

/// DELETE /api/boards/{id} - Delete a board
pub async fn delete_board(
    State(deployment): State<Deployment>,
    Path(board_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows_affected = Board::delete(&deployment.db().pool, board_id).await?;
    if rows_affected == 0 {
        Err(ApiError::NotFound)
    } else {
        Ok(ResponseJson(ApiResponse::success(())))
    }
}

#[derive(Debug, Serialize, Deserialize, TS)]
pub struct ConfigureGitHubSync {
    /// Access token granted by the authorization flow. Encrypted at rest.
    pub token: String,
    /// Repository full name, `owner/name`.
    pub repo: String,
    /// Optional Projects v2 number for typed status mirroring.
    pub project_number: Option<i64>,
}

/// POST /api/boards/{id}/github - Install a GitHub sync configuration
pub async fn configure_github_sync(
    State(deployment): State<Deployment>,
    Path(board_id): Path<Uuid>,
    Json(payload): Json<ConfigureGitHubSync>,
) -> Result<ResponseJson<ApiResponse<Board>>, ApiError> {
    Board::find_by_id(&deployment.db().pool, board_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let repo = GitHubRepoInfo::parse(&payload.repo)
        .ok_or_else(|| ApiError::BadRequest("repository must be owner/name".to_string()))?;
    if payload.token.trim().is_empty() {
        return Err(ApiError::BadRequest("token must not be empty".to_string()));
    }

    let token = SecretString::from(payload.token);

    // Resolve the project's node id up front so inbound project-item
    // events can be keyed by it. Resolution failure downgrades to
    // issues-only sync rather than rejecting the configuration.
    let project_node_id = match payload.project_number {
        Some(number) => {
            let client = GitHubClient::with_base_url(token.clone(), deployment.github_api_base())?;
            let resolver = ProjectResolver::new(&client);
            match resolver.resolve_project(&repo.owner, number).await {
                Ok(Some(project)) => Some(project.id),
                Ok(None) => {
                    tracing::warn!(
                        board_id = %board_id,
                        project = number,
                        "project not found for {}, storing number only",
                        repo.owner
                    );
                    None
                }
                Err(e) => {
                    tracing::warn!(board_id = %board_id, "project resolution failed: {}", e);
                    None
                }
            }
        }
        None => None,
    };

    let encrypted = deployment.vault().encrypt(&token)?;
    let board = Board::set_github_sync(
        &deployment.db().pool,
        board_id,
        &encrypted,
        &repo.full_name(),
        payload.project_number,
        project_node_id.as_deref(),
    )
    .await?;

    Ok(ResponseJson(ApiResponse::success(board)))
}

/// DELETE /api/boards/{id}/github - Revoke the GitHub sync configuration
pub async fn revoke_github_sync(
    State(deployment): State<Deployment>,
    Path(board_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Board>>, ApiError> {
    Board::find_by_id(&deployment.db().pool, board_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let board = Board::clear_github_sync(&deployment.db().pool, board_id).await?;
    Ok(ResponseJson(ApiResponse::success(board)))
}

pub fn router() -> Router<Deployment> {
    Router::new()
        .route("/boards", get(get_boards).post(create_board))
        .route(
            "/boards/{board_id}",
            get(get_board).put(update_board).delete(delete_board),
        )
        .route(
            "/boards/{board_id}/github",
            post(configure_github_sync).delete(revoke_github_sync),
        )
}
