//! Board model and queries, including the GitHub sync configuration.
//!
//! A board owns zero-or-one GitHub sync configuration. When sync is enabled
//! the board carries an encrypted access token and the repository it mirrors
//! to; optionally also a Projects v2 binding for the typed status field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Board {
    pub id: Uuid,
    pub name: String,
    pub github_sync_enabled: bool,
    /// Encrypted GitHub token in `nonce_hex:ciphertext_hex` form. Never
    /// serialized into API responses.
    #[serde(skip_serializing, default)]
    pub github_token_encrypted: Option<String>,
    /// Repository full name, `owner/name`.
    pub github_repo: Option<String>,
    pub github_project_number: Option<i64>,
    /// GraphQL node id of the bound project, resolved when sync is
    /// configured. Inbound project-item events are keyed by this.
    pub github_project_node_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, TS)]
pub struct CreateBoard {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, TS)]
pub struct UpdateBoard {
    pub name: Option<String>,
}

impl Board {
    pub async fn create(
        pool: &SqlitePool,
        data: &CreateBoard,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Board>(
            r#"INSERT INTO boards (id, name, github_sync_enabled, created_at, updated_at)
               VALUES ($1, $2, 0, $3, $3)
               RETURNING *"#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Board>("SELECT * FROM boards WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Board>("SELECT * FROM boards ORDER BY name")
            .fetch_all(pool)
            .await
    }

    pub async fn update_name(
        pool: &SqlitePool,
        id: Uuid,
        name: &str,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Board>(
            r#"UPDATE boards SET name = $2, updated_at = $3 WHERE id = $1 RETURNING *"#,
        )
        .bind(id)
        .bind(name)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM boards WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Install a GitHub sync configuration and enable sync.
    pub async fn set_github_sync(
        pool: &SqlitePool,
        id: Uuid,
        token_encrypted: &str,
        repo: &str,
        project_number: Option<i64>,
        project_node_id: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Board>(
            r#"UPDATE boards
               SET github_sync_enabled = 1,
                   github_token_encrypted = $2,
                   github_repo = $3,
                   github_project_number = $4,
                   github_project_node_id = $5,
                   updated_at = $6
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(id)
        .bind(token_encrypted)
        .bind(repo)
        .bind(project_number)
        .bind(project_node_id)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    /// Revoke the GitHub sync configuration: token cleared, sync disabled.
    pub async fn clear_github_sync(pool: &SqlitePool, id: Uuid) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Board>(
            r#"UPDATE boards
               SET github_sync_enabled = 0,
                   github_token_encrypted = NULL,
                   github_repo = NULL,
                   github_project_number = NULL,
                   github_project_node_id = NULL,
                   updated_at = $2
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(id)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    /// Resolve the sync-enabled board mirroring `full_name` (`owner/name`).
    pub async fn find_by_repo_full_name(
        pool: &SqlitePool,
        full_name: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Board>(
            r#"SELECT * FROM boards
               WHERE github_repo = $1 AND github_sync_enabled = 1
               ORDER BY created_at
               LIMIT 1"#,
        )
        .bind(full_name)
        .fetch_optional(pool)
        .await
    }

    /// Resolve the sync-enabled board bound to a Projects v2 node id.
    pub async fn find_by_project_node_id(
        pool: &SqlitePool,
        node_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Board>(
            r#"SELECT * FROM boards
               WHERE github_project_node_id = $1 AND github_sync_enabled = 1
               ORDER BY created_at
               LIMIT 1"#,
        )
        .bind(node_id)
        .fetch_optional(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_pool;

    async fn create_board(pool: &SqlitePool, name: &str) -> Board {
        Board::create(
            pool,
            &CreateBoard {
                name: name.to_string(),
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let (pool, _temp_dir) = create_test_pool().await;

        let board = create_board(&pool, "Roadmap").await;
        assert_eq!(board.name, "Roadmap");
        assert!(!board.github_sync_enabled);

        let found = Board::find_by_id(&pool, board.id).await.unwrap().unwrap();
        assert_eq!(found.id, board.id);
    }

    #[tokio::test]
    async fn test_set_and_clear_github_sync() {
        let (pool, _temp_dir) = create_test_pool().await;
        let board = create_board(&pool, "Synced").await;

        let board = Board::set_github_sync(
            &pool,
            board.id,
            "aabb:ccdd",
            "acme/widgets",
            Some(7),
            Some("PVT_node"),
        )
        .await
        .unwrap();
        assert!(board.github_sync_enabled);
        assert_eq!(board.github_repo.as_deref(), Some("acme/widgets"));
        assert_eq!(board.github_project_number, Some(7));

        let board = Board::clear_github_sync(&pool, board.id).await.unwrap();
        assert!(!board.github_sync_enabled);
        assert!(board.github_token_encrypted.is_none());
        assert!(board.github_repo.is_none());
        assert!(board.github_project_node_id.is_none());
    }

    #[tokio::test]
    async fn test_find_by_repo_requires_sync_enabled() {
        let (pool, _temp_dir) = create_test_pool().await;
        let board = create_board(&pool, "Synced").await;

        assert!(
            Board::find_by_repo_full_name(&pool, "acme/widgets")
                .await
                .unwrap()
                .is_none()
        );

        Board::set_github_sync(&pool, board.id, "aabb:ccdd", "acme/widgets", None, None)
            .await
            .unwrap();

        let found = Board::find_by_repo_full_name(&pool, "acme/widgets")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, board.id);

        Board::clear_github_sync(&pool, board.id).await.unwrap();
        assert!(
            Board::find_by_repo_full_name(&pool, "acme/widgets")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_find_by_project_node_id() {
        let (pool, _temp_dir) = create_test_pool().await;
        let board = create_board(&pool, "Projected").await;

        Board::set_github_sync(
            &pool,
            board.id,
            "aabb:ccdd",
            "acme/widgets",
            Some(3),
            Some("PVT_kwDOA"),
        )
        .await
        .unwrap();

        let found = Board::find_by_project_node_id(&pool, "PVT_kwDOA")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, board.id);

        assert!(
            Board::find_by_project_node_id(&pool, "PVT_other")
                .await
                .unwrap()
                .is_none()
        );
    }
}
