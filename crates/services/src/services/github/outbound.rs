//! Outbound sync: push local task mutations to GitHub.
//!
//! Propagation is best-effort and at-most-once. Every public entry point
//! logs and swallows failures so an external-tracker outage can never
//! fail, block, or roll back the local write that triggered it. There is
//! no retry queue; a task whose issue creation failed is repaired lazily
//! on its next update.

use db::{
    DBService,
    models::{
        board::Board,
        task::{Task, TaskStatus},
    },
};
use sqlx::Error as SqlxError;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    client::{
        CreateIssueRequest, GITHUB_API_BASE, GitHubApiError, GitHubClient, GitHubRepoInfo, Issue,
        IssueState, UpdateIssueRequest,
    },
    project::ProjectResolver,
    status::{is_status_label, status_label, status_option_name},
};
use crate::services::token_vault::{CryptoError, TokenVault};

#[derive(Debug, Error)]
pub enum IssueSyncError {
    #[error(transparent)]
    Api(#[from] GitHubApiError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Sqlx(#[from] SqlxError),
}

/// Service that mirrors local task mutations into GitHub issues, and into
/// a typed project Status field when the board is bound to a project.
pub struct IssueSyncService {
    db: DBService,
    vault: TokenVault,
    api_base: String,
}

struct SyncContext {
    board: Board,
    repo: GitHubRepoInfo,
    client: GitHubClient,
}

impl IssueSyncService {
    pub fn new(db: DBService, vault: TokenVault) -> Self {
        Self::with_api_base(db, vault, GITHUB_API_BASE)
    }

    pub fn with_api_base(db: DBService, vault: TokenVault, api_base: impl Into<String>) -> Self {
        Self {
            db,
            vault,
            api_base: api_base.into(),
        }
    }

    pub async fn task_created(&self, task: &Task) {
        if let Err(e) = self.try_task_created(task).await {
            warn!(task_id = %task.id, "GitHub sync failed for created task: {}", e);
        }
    }

    pub async fn task_updated(&self, task: &Task, previous_status: TaskStatus) {
        if let Err(e) = self.try_task_updated(task, previous_status).await {
            warn!(task_id = %task.id, "GitHub sync failed for updated task: {}", e);
        }
    }

    pub async fn task_deleted(&self, task: &Task) {
        if let Err(e) = self.try_task_deleted(task).await {
            warn!(task_id = %task.id, "GitHub sync failed for deleted task: {}", e);
        }
    }

    async fn try_task_created(&self, task: &Task) -> Result<(), IssueSyncError> {
        let Some(ctx) = self.context_for(task.board_id).await? else {
            return Ok(());
        };
        self.create_issue_for_task(&ctx, task).await
    }

    async fn try_task_updated(
        &self,
        task: &Task,
        previous_status: TaskStatus,
    ) -> Result<(), IssueSyncError> {
        let Some(ctx) = self.context_for(task.board_id).await? else {
            return Ok(());
        };

        let Some(number) = task.github_issue_number else {
            // The issue was never created (e.g. the first attempt failed);
            // create it now instead of updating.
            return self.create_issue_for_task(&ctx, task).await;
        };

        debug!(
            task_id = %task.id,
            issue = number,
            from = %previous_status,
            to = %task.status,
            "updating GitHub issue"
        );

        let state = if task.status == TaskStatus::Done {
            IssueState::Closed
        } else {
            IssueState::Open
        };
        let request = UpdateIssueRequest {
            title: Some(&task.title),
            body: task.description.as_deref(),
            state: Some(state),
        };

        let issue = match ctx.client.update_issue(&ctx.repo, number, &request).await {
            Ok(issue) => issue,
            Err(GitHubApiError::Status { status: 404, .. }) => {
                // Issue deleted out-of-band. Clear the pairing; the next
                // update re-creates it.
                warn!(
                    task_id = %task.id,
                    issue = number,
                    "GitHub issue is gone, clearing pairing"
                );
                Task::set_github_issue_number(&self.db.pool, task.id, None).await?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        self.reconcile_labels(&ctx, &issue, task.status).await?;
        self.mirror_project_status(&ctx, &issue, task.status).await;
        Ok(())
    }

    async fn try_task_deleted(&self, task: &Task) -> Result<(), IssueSyncError> {
        let Some(ctx) = self.context_for(task.board_id).await? else {
            return Ok(());
        };
        let Some(number) = task.github_issue_number else {
            return Ok(());
        };

        // Never delete the external issue: the tracker is the system of
        // record for issue history.
        match ctx.client.close_issue(&ctx.repo, number).await {
            Ok(_) => {
                info!(task_id = %task.id, issue = number, "closed GitHub issue for deleted task");
                Ok(())
            }
            Err(GitHubApiError::Status { status: 404, .. }) => {
                debug!(task_id = %task.id, issue = number, "issue already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Build the sync context for a board, or `None` when the board is
    /// missing, has sync disabled, or its configuration is unusable.
    async fn context_for(&self, board_id: Uuid) -> Result<Option<SyncContext>, IssueSyncError> {
        let Some(board) = Board::find_by_id(&self.db.pool, board_id).await? else {
            return Ok(None);
        };
        if !board.github_sync_enabled {
            return Ok(None);
        }
        let (Some(encrypted), Some(repo)) = (&board.github_token_encrypted, &board.github_repo)
        else {
            warn!(board_id = %board.id, "sync enabled but credentials incomplete, skipping");
            return Ok(None);
        };
        let Some(repo) = GitHubRepoInfo::parse(repo) else {
            warn!(board_id = %board.id, repo = %repo, "unparseable repository name, skipping");
            return Ok(None);
        };

        let token = self.vault.decrypt(encrypted)?;
        let client = GitHubClient::with_base_url(token, self.api_base.clone())?;
        Ok(Some(SyncContext {
            board,
            repo,
            client,
        }))
    }

    async fn create_issue_for_task(
        &self,
        ctx: &SyncContext,
        task: &Task,
    ) -> Result<(), IssueSyncError> {
        let label = status_label(task.status);
        let issue = ctx
            .client
            .create_issue(
                &ctx.repo,
                &CreateIssueRequest {
                    title: &task.title,
                    body: task.description.as_deref(),
                    labels: vec![label],
                },
            )
            .await?;

        // Persist the pairing before anything else: if a later step fails
        // the issue must not be re-created on retry.
        Task::set_github_issue_number(&self.db.pool, task.id, Some(issue.number)).await?;
        info!(
            task_id = %task.id,
            issue = issue.number,
            repo = %ctx.repo.full_name(),
            "created GitHub issue for task"
        );

        let issue = if task.status == TaskStatus::Done {
            ctx.client.close_issue(&ctx.repo, issue.number).await?
        } else {
            issue
        };

        self.mirror_project_status(ctx, &issue, task.status).await;
        Ok(())
    }

    /// Make the issue's status labels reflect `status`: drop stale status
    /// labels the issue still carries, then attach the new one (creating
    /// it repo-side first when it does not exist yet). Idempotent: an
    /// issue already carrying exactly the right label is left untouched.
    async fn reconcile_labels(
        &self,
        ctx: &SyncContext,
        issue: &Issue,
        status: TaskStatus,
    ) -> Result<(), IssueSyncError> {
        let new_label = status_label(status);

        for existing in &issue.labels {
            let name = existing.name.as_str();
            if name != new_label && is_status_label(name) {
                ctx.client
                    .remove_label(&ctx.repo, issue.number, name)
                    .await?;
            }
        }

        if !issue.labels.iter().any(|l| l.name == new_label) {
            self.ensure_status_label(ctx, status).await?;
            ctx.client
                .add_labels(&ctx.repo, issue.number, &[new_label])
                .await?;
        }
        Ok(())
    }

    async fn ensure_status_label(
        &self,
        ctx: &SyncContext,
        status: TaskStatus,
    ) -> Result<(), IssueSyncError> {
        let label = status_label(status);
        match ctx
            .client
            .create_label(&ctx.repo, label, label_color(status))
            .await
        {
            Ok(_) => Ok(()),
            // 422: the label already exists.
            Err(GitHubApiError::Status { status: 422, .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Mirror the status into the board's typed project field. Best-effort
    /// on top of best-effort: a failure here never fails the issue update
    /// that preceded it.
    async fn mirror_project_status(&self, ctx: &SyncContext, issue: &Issue, status: TaskStatus) {
        if ctx.board.github_project_number.is_none() {
            return;
        }
        if let Err(e) = self.try_mirror_project_status(ctx, issue, status).await {
            warn!(
                board_id = %ctx.board.id,
                issue = issue.number,
                "project field update failed: {}",
                e
            );
        }
    }

    async fn try_mirror_project_status(
        &self,
        ctx: &SyncContext,
        issue: &Issue,
        status: TaskStatus,
    ) -> Result<(), IssueSyncError> {
        let Some(number) = ctx.board.github_project_number else {
            return Ok(());
        };
        let resolver = ProjectResolver::new(&ctx.client);

        let Some(project) = resolver.resolve_project(&ctx.repo.owner, number).await? else {
            warn!(
                board_id = %ctx.board.id,
                project = number,
                "project not found for owner {}",
                ctx.repo.owner
            );
            return Ok(());
        };

        let item_id = match resolver
            .find_item_for_issue(&project.id, &issue.node_id)
            .await?
        {
            Some(id) => id,
            None => resolver.add_item(&project.id, &issue.node_id).await?,
        };

        // No Status field is not an error: the issue still lives on the
        // project board, just without a typed status.
        let Some(field) = resolver.status_field(&project.id).await? else {
            debug!(board_id = %ctx.board.id, project = number, "project has no Status field");
            return Ok(());
        };

        let wanted = status_option_name(status);
        let Some(option) = field.find_option(wanted) else {
            warn!(
                board_id = %ctx.board.id,
                project = number,
                option = wanted,
                "no matching option in Status field, skipping"
            );
            return Ok(());
        };

        resolver
            .set_status_option(&project.id, &item_id, &field.id, &option.id)
            .await?;
        debug!(
            board_id = %ctx.board.id,
            issue = issue.number,
            option = %option.name,
            "mirrored status into project field"
        );
        Ok(())
    }
}

fn label_color(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => "ededed",
        TaskStatus::InProgress => "1d76db",
        TaskStatus::InReview => "fbca04",
        TaskStatus::Done => "0e8a16",
        TaskStatus::Blocked => "d93f0b",
    }
}
