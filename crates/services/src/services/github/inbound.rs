//! Inbound sync: apply verified webhook deliveries to local tasks.
//!
//! Deliveries are at-least-once, so every path here must absorb
//! duplicates; the upsert keyed by `(board_id, github_issue_number)` does
//! that. Senders must never see an error for an event they recognize and
//! we do not: unknown event types and actions are acknowledged as no-ops
//! so the provider's retry/backoff logic stays quiet.

use db::{
    DBService,
    models::{
        board::Board,
        task::{Task, TaskStatus},
    },
};
use serde::{Deserialize, Serialize};
use sqlx::Error as SqlxError;
use thiserror::Error;
use tracing::{debug, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    client::{GITHUB_API_BASE, GitHubApiError, GitHubClient},
    project::ProjectResolver,
    status::{status_from_labels, status_from_option_name},
};
use crate::services::{
    events::{TaskEvent, TaskEventKind, TaskEventPublisher},
    token_vault::{CryptoError, TokenVault},
};

/// Issue actions that mutate local state. Everything else acknowledges
/// without action.
const ISSUE_ACTIONS: [&str; 7] = [
    "opened",
    "closed",
    "edited",
    "assigned",
    "unassigned",
    "labeled",
    "unlabeled",
];

const PROJECT_ITEM_ACTIONS: [&str; 2] = ["edited", "updated"];

#[derive(Debug, Error)]
pub enum WebhookSyncError {
    #[error("malformed webhook payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error(transparent)]
    Sqlx(#[from] SqlxError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Api(#[from] GitHubApiError),
}

/// What the webhook endpoint reports back to the sender.
#[derive(Debug, Serialize, TS)]
pub struct WebhookOutcome {
    pub received: bool,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WebhookOutcome {
    fn handled(event: &str, action: &str, task_id: Uuid) -> Self {
        Self {
            received: true,
            event: event.to_string(),
            action: Some(action.to_string()),
            task_id: Some(task_id),
            message: None,
        }
    }

    fn ignored(event: &str, action: Option<&str>) -> Self {
        Self {
            received: true,
            event: event.to_string(),
            action: action.map(str::to_string),
            task_id: None,
            message: None,
        }
    }

    fn not_implemented(event: &str) -> Self {
        Self {
            received: true,
            event: event.to_string(),
            action: None,
            task_id: None,
            message: Some("not implemented".to_string()),
        }
    }
}

// --- Webhook payload shapes --------------------------------------------

#[derive(Debug, Deserialize)]
pub struct IssuesEventPayload {
    pub action: String,
    pub issue: WebhookIssue,
    pub repository: WebhookRepository,
}

#[derive(Debug, Deserialize)]
pub struct WebhookRepository {
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub struct WebhookIssue {
    pub number: i64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: String,
    #[serde(default)]
    pub labels: Vec<WebhookLabel>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookLabel {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ProjectItemEventPayload {
    pub action: String,
    pub projects_v2_item: ProjectV2ItemRef,
    /// Present on repository-scoped deliveries, absent on org-scoped ones.
    #[serde(default)]
    pub repository: Option<WebhookRepository>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectV2ItemRef {
    pub node_id: String,
    pub project_node_id: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Service applying verified webhook deliveries to local tasks.
pub struct WebhookSyncService {
    db: DBService,
    vault: TokenVault,
    events: TaskEventPublisher,
    api_base: String,
}

impl WebhookSyncService {
    pub fn new(db: DBService, vault: TokenVault, events: TaskEventPublisher) -> Self {
        Self::with_api_base(db, vault, events, GITHUB_API_BASE)
    }

    pub fn with_api_base(
        db: DBService,
        vault: TokenVault,
        events: TaskEventPublisher,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            db,
            vault,
            events,
            api_base: api_base.into(),
        }
    }

    /// Process one verified delivery. The body is the raw request body;
    /// `event` is the sender's event-type header value.
    pub async fn process(
        &self,
        event: &str,
        body: &[u8],
    ) -> Result<WebhookOutcome, WebhookSyncError> {
        match event {
            "issues" => {
                let payload: IssuesEventPayload = serde_json::from_slice(body)?;
                self.process_issue_event(payload).await
            }
            "projects_v2_item" => {
                let payload: ProjectItemEventPayload = serde_json::from_slice(body)?;
                self.process_project_item_event(payload).await
            }
            // Recognized but carries nothing we mirror.
            "issue_comment" => Ok(WebhookOutcome::ignored(event, None)),
            other => {
                debug!(event = other, "unhandled webhook event type");
                Ok(WebhookOutcome::not_implemented(other))
            }
        }
    }

    async fn process_issue_event(
        &self,
        payload: IssuesEventPayload,
    ) -> Result<WebhookOutcome, WebhookSyncError> {
        const EVENT: &str = "issues";
        let action = payload.action.as_str();

        if !ISSUE_ACTIONS.contains(&action) {
            debug!(action, "ignoring issue action");
            return Ok(WebhookOutcome::ignored(EVENT, Some(action)));
        }

        let Some(board) =
            Board::find_by_repo_full_name(&self.db.pool, &payload.repository.full_name).await?
        else {
            debug!(
                repository = %payload.repository.full_name,
                "no sync-enabled board for repository"
            );
            return Ok(WebhookOutcome::ignored(EVENT, Some(action)));
        };

        let labels: Vec<String> = payload.issue.labels.into_iter().map(|l| l.name).collect();
        let status = status_from_labels(&labels, payload.issue.state == "closed");

        let task = self
            .upsert_task(
                &board,
                payload.issue.number,
                &payload.issue.title,
                payload.issue.body.as_deref(),
                status,
            )
            .await?;

        info!(
            board_id = %board.id,
            issue = payload.issue.number,
            task_id = %task.id,
            action,
            status = %status,
            "applied issue webhook"
        );
        Ok(WebhookOutcome::handled(EVENT, action, task.id))
    }

    async fn process_project_item_event(
        &self,
        payload: ProjectItemEventPayload,
    ) -> Result<WebhookOutcome, WebhookSyncError> {
        const EVENT: &str = "projects_v2_item";
        let action = payload.action.as_str();

        if !PROJECT_ITEM_ACTIONS.contains(&action) {
            debug!(action, "ignoring project item action");
            return Ok(WebhookOutcome::ignored(EVENT, Some(action)));
        }

        // Draft items and pull requests are not mirrored.
        if payload
            .projects_v2_item
            .content_type
            .as_deref()
            .is_some_and(|t| t != "Issue")
        {
            return Ok(WebhookOutcome::ignored(EVENT, Some(action)));
        }

        // Project-keyed resolution first, repository fallback second.
        let item = &payload.projects_v2_item;
        let mut board =
            Board::find_by_project_node_id(&self.db.pool, &item.project_node_id).await?;
        if board.is_none() {
            if let Some(repository) = &payload.repository {
                board = Board::find_by_repo_full_name(&self.db.pool, &repository.full_name).await?;
            }
        }
        let Some(board) = board else {
            debug!(
                project_node_id = %item.project_node_id,
                "no sync-enabled board for project item"
            );
            return Ok(WebhookOutcome::ignored(EVENT, Some(action)));
        };

        let Some(encrypted) = &board.github_token_encrypted else {
            warn!(board_id = %board.id, "sync enabled but no stored token, skipping");
            return Ok(WebhookOutcome::ignored(EVENT, Some(action)));
        };

        // The delivery only carries node ids; fetch the item's Status
        // option and issue content fresh.
        let token = self.vault.decrypt(encrypted)?;
        let client = GitHubClient::with_base_url(token, self.api_base.clone())?;
        let resolver = ProjectResolver::new(&client);

        let Some(view) = resolver.item_view(&item.node_id).await? else {
            debug!(item_node_id = %item.node_id, "project item no longer exists");
            return Ok(WebhookOutcome::ignored(EVENT, Some(action)));
        };
        let Some(issue) = view.issue else {
            return Ok(WebhookOutcome::ignored(EVENT, Some(action)));
        };

        let status = view
            .status_option
            .as_deref()
            .and_then(status_from_option_name)
            .unwrap_or_else(|| status_from_labels(&issue.labels, issue.closed));

        let task = self
            .upsert_task(
                &board,
                issue.number,
                &issue.title,
                issue.body.as_deref(),
                status,
            )
            .await?;

        info!(
            board_id = %board.id,
            issue = issue.number,
            task_id = %task.id,
            action,
            status = %status,
            "applied project item webhook"
        );
        Ok(WebhookOutcome::handled(EVENT, action, task.id))
    }

    async fn upsert_task(
        &self,
        board: &Board,
        issue_number: i64,
        title: &str,
        description: Option<&str>,
        status: TaskStatus,
    ) -> Result<Task, WebhookSyncError> {
        let existing =
            Task::find_by_github_issue(&self.db.pool, board.id, issue_number).await?;
        let task = Task::upsert_from_github(
            &self.db.pool,
            board.id,
            issue_number,
            title,
            description,
            status,
        )
        .await?;

        let kind = if existing.is_some() {
            TaskEventKind::Updated
        } else {
            TaskEventKind::Created
        };
        self.events.publish(TaskEvent::new(board.id, task.id, kind));
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_payload_deserializes() {
        let payload: IssuesEventPayload = serde_json::from_str(
            r#"{
                "action": "labeled",
                "issue": {
                    "number": 5,
                    "title": "Fix bug",
                    "body": "details",
                    "state": "open",
                    "labels": [{"name": "in-progress"}, {"name": "bug"}]
                },
                "repository": {"full_name": "acme/widgets"},
                "sender": {"login": "octocat"}
            }"#,
        )
        .unwrap();

        assert_eq!(payload.action, "labeled");
        assert_eq!(payload.issue.number, 5);
        assert_eq!(payload.issue.labels.len(), 2);
        assert_eq!(payload.repository.full_name, "acme/widgets");
    }

    #[test]
    fn test_project_item_payload_without_repository() {
        let payload: ProjectItemEventPayload = serde_json::from_str(
            r#"{
                "action": "edited",
                "projects_v2_item": {
                    "id": 99,
                    "node_id": "PVTI_item",
                    "project_node_id": "PVT_project",
                    "content_node_id": "I_issue",
                    "content_type": "Issue"
                },
                "organization": {"login": "acme"}
            }"#,
        )
        .unwrap();

        assert_eq!(payload.action, "edited");
        assert!(payload.repository.is_none());
        assert_eq!(payload.projects_v2_item.node_id, "PVTI_item");
        assert_eq!(
            payload.projects_v2_item.content_type.as_deref(),
            Some("Issue")
        );
    }

    #[test]
    fn test_outcome_serialization_omits_empty_fields() {
        let outcome = WebhookOutcome::not_implemented("ping");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["received"], true);
        assert_eq!(json["event"], "ping");
        assert_eq!(json["message"], "not implemented");
        assert!(json.get("task_id").is_none());
        assert!(json.get("action").is_none());
    }
}
