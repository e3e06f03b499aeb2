//! Typed wrapper over the GitHub REST and GraphQL APIs.
//!
//! Thin by design: every call maps to one HTTP request, non-2xx responses
//! and GraphQL error payloads surface as [`GitHubApiError`], and no
//! retries happen here. Callers own the failure policy.

use std::time::Duration;

use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

pub const GITHUB_API_BASE: &str = "https://api.github.com";

const USER_AGENT: &str = concat!("pinboard/", env!("CARGO_PKG_VERSION"));

/// Bounded so a slow external API cannot hold a local request indefinitely.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Error)]
pub enum GitHubApiError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("GitHub API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("GraphQL error: {0}")]
    GraphQl(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubRepoInfo {
    pub owner: String,
    pub repo_name: String,
}

impl GitHubRepoInfo {
    /// Parse an `owner/name` repository full name.
    pub fn parse(full_name: &str) -> Option<Self> {
        let (owner, repo_name) = full_name.split_once('/')?;
        if owner.is_empty() || repo_name.is_empty() || repo_name.contains('/') {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            repo_name: repo_name.to_string(),
        })
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueLabel {
    pub name: String,
}

/// Transient view of an external issue; never cached beyond one sync call.
#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: i64,
    pub node_id: String,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: IssueState,
    #[serde(default)]
    pub labels: Vec<IssueLabel>,
}

impl Issue {
    pub fn label_names(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.name.clone()).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.state == IssueState::Closed
    }
}

#[derive(Debug, Default, Serialize)]
pub struct CreateIssueRequest<'a> {
    pub title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<&'a str>,
}

#[derive(Debug, Default, Serialize)]
pub struct UpdateIssueRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<IssueState>,
}

#[derive(Debug, Serialize)]
struct AddLabelsRequest<'a> {
    labels: &'a [&'a str],
}

#[derive(Debug, Serialize)]
struct CreateLabelRequest<'a> {
    name: &'a str,
    color: &'a str,
}

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorEntry {
    message: String,
}

#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    token: SecretString,
    api_base: String,
}

impl GitHubClient {
    pub fn new(token: SecretString) -> Result<Self, GitHubApiError> {
        Self::with_base_url(token, GITHUB_API_BASE)
    }

    /// Point the client at a different API origin (tests).
    pub fn with_base_url(
        token: SecretString,
        api_base: impl Into<String>,
    ) -> Result<Self, GitHubApiError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            token,
            api_base: api_base.into(),
        })
    }

    pub async fn create_issue(
        &self,
        repo: &GitHubRepoInfo,
        request: &CreateIssueRequest<'_>,
    ) -> Result<Issue, GitHubApiError> {
        let url = self.repo_url(repo, "issues");
        self.send(self.http.post(url).json(request)).await
    }

    pub async fn update_issue(
        &self,
        repo: &GitHubRepoInfo,
        number: i64,
        request: &UpdateIssueRequest<'_>,
    ) -> Result<Issue, GitHubApiError> {
        let url = self.repo_url(repo, &format!("issues/{number}"));
        self.send(self.http.patch(url).json(request)).await
    }

    /// Close, never delete: the tracker is the system of record for
    /// issue history.
    pub async fn close_issue(
        &self,
        repo: &GitHubRepoInfo,
        number: i64,
    ) -> Result<Issue, GitHubApiError> {
        self.update_issue(
            repo,
            number,
            &UpdateIssueRequest {
                state: Some(IssueState::Closed),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn get_issue(
        &self,
        repo: &GitHubRepoInfo,
        number: i64,
    ) -> Result<Issue, GitHubApiError> {
        let url = self.repo_url(repo, &format!("issues/{number}"));
        self.send(self.http.get(url)).await
    }

    pub async fn list_issues(&self, repo: &GitHubRepoInfo) -> Result<Vec<Issue>, GitHubApiError> {
        let url = self.repo_url(repo, "issues");
        self.send(self.http.get(url).query(&[("state", "all"), ("per_page", "100")]))
            .await
    }

    pub async fn add_labels(
        &self,
        repo: &GitHubRepoInfo,
        number: i64,
        labels: &[&str],
    ) -> Result<Vec<IssueLabel>, GitHubApiError> {
        let url = self.repo_url(repo, &format!("issues/{number}/labels"));
        self.send(self.http.post(url).json(&AddLabelsRequest { labels }))
            .await
    }

    pub async fn remove_label(
        &self,
        repo: &GitHubRepoInfo,
        number: i64,
        label: &str,
    ) -> Result<(), GitHubApiError> {
        let url = self.repo_url(repo, &format!("issues/{number}/labels/{label}"));
        let _: Vec<IssueLabel> = self.send(self.http.delete(url)).await?;
        Ok(())
    }

    pub async fn create_label(
        &self,
        repo: &GitHubRepoInfo,
        name: &str,
        color: &str,
    ) -> Result<IssueLabel, GitHubApiError> {
        let url = self.repo_url(repo, "labels");
        self.send(self.http.post(url).json(&CreateLabelRequest { name, color }))
            .await
    }

    /// Execute a GraphQL query. A non-empty `errors` array is an error
    /// even when partial `data` is present.
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, GitHubApiError> {
        let url = format!("{}/graphql", self.api_base);
        let response: GraphQlResponse<T> = self
            .send(self.http.post(url).json(&GraphQlRequest { query, variables }))
            .await?;

        if !response.errors.is_empty() {
            let messages: Vec<String> =
                response.errors.into_iter().map(|e| e.message).collect();
            return Err(GitHubApiError::GraphQl(messages.join("; ")));
        }
        response
            .data
            .ok_or_else(|| GitHubApiError::GraphQl("response carried no data".to_string()))
    }

    fn repo_url(&self, repo: &GitHubRepoInfo, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, repo.owner, repo.repo_name, path
        )
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, GitHubApiError> {
        let response = request
            .bearer_auth(self.token.expose_secret())
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GitHubApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<T>().await?)
    }
}
