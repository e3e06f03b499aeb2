//! Task model for managing tasks within boards.
//!
//! A task is a unit of work on a board. Tasks can be paired 1:1 with a
//! GitHub issue via `github_issue_number`; a `NULL` pairing means the task
//! has not been mirrored externally yet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display,
    Default,
)]
#[sqlx(type_name = "task_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    InReview,
    Done,
    Blocked,
}

impl TaskStatus {
    /// Human-readable board column for this status. Also the canonical
    /// option name used when mirroring into a typed project field.
    pub fn column_name(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "Todo",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::InReview => "In Review",
            TaskStatus::Done => "Done",
            TaskStatus::Blocked => "Blocked",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Task {
    pub id: Uuid,
    pub board_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub status_column: String,
    pub position: i64,
    /// Pairing key with the mirrored GitHub issue. Set once after the
    /// issue is created (or on inbound upsert) and rarely changes.
    pub github_issue_number: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, TS)]
pub struct CreateTask {
    pub board_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Serialize, Deserialize, TS)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub position: Option<i64>,
}

impl Task {
    pub async fn create(
        pool: &SqlitePool,
        data: &CreateTask,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        let status = data.status.unwrap_or_default();
        sqlx::query_as::<_, Task>(
            r#"INSERT INTO tasks (id, board_id, title, description, status, status_column,
                                  position, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $7)
               RETURNING *"#,
        )
        .bind(id)
        .bind(data.board_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(status)
        .bind(status.column_name())
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_board_id(
        pool: &SqlitePool,
        board_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks WHERE board_id = $1 ORDER BY position, created_at",
        )
        .bind(board_id)
        .fetch_all(pool)
        .await
    }

    /// Full overwrite of the mutable fields. `status_column` follows the
    /// status.
    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        title: &str,
        description: Option<&str>,
        status: TaskStatus,
        position: i64,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Task>(
            r#"UPDATE tasks
               SET title = $2, description = $3, status = $4, status_column = $5,
                   position = $6, updated_at = $7
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(id)
        .bind(title)
        .bind(description)
        .bind(status)
        .bind(status.column_name())
        .bind(position)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn find_by_github_issue(
        pool: &SqlitePool,
        board_id: Uuid,
        issue_number: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks WHERE board_id = $1 AND github_issue_number = $2",
        )
        .bind(board_id)
        .bind(issue_number)
        .fetch_optional(pool)
        .await
    }

    /// Record (or clear) the pairing with a GitHub issue.
    pub async fn set_github_issue_number(
        pool: &SqlitePool,
        id: Uuid,
        issue_number: Option<i64>,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        sqlx::query("UPDATE tasks SET github_issue_number = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(issue_number)
            .bind(now)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Idempotent create-or-update keyed by `(board_id, github_issue_number)`.
    ///
    /// The external tracker is the source of truth for these fields, so an
    /// existing row is fully overwritten (last writer wins, no merge). Safe
    /// under duplicate webhook deliveries: the partial unique index makes
    /// near-simultaneous upserts collapse onto one row.
    pub async fn upsert_from_github(
        pool: &SqlitePool,
        board_id: Uuid,
        issue_number: i64,
        title: &str,
        description: Option<&str>,
        status: TaskStatus,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Task>(
            r#"INSERT INTO tasks (id, board_id, title, description, status, status_column,
                                  position, github_issue_number, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $8, $8)
               ON CONFLICT(board_id, github_issue_number) WHERE github_issue_number IS NOT NULL
               DO UPDATE SET title = excluded.title,
                             description = excluded.description,
                             status = excluded.status,
                             status_column = excluded.status_column,
                             updated_at = excluded.updated_at
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(board_id)
        .bind(title)
        .bind(description)
        .bind(status)
        .bind(status.column_name())
        .bind(issue_number)
        .bind(now)
        .fetch_one(pool)
        .await
    }
}
