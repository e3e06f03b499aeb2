//! Projects v2 resolution: locate the project, its single-select "Status"
//! field, and the project item mirroring a given issue.
//!
//! The GraphQL response shapes are deliberately modelled as structs with
//! `Option` fields rather than loose JSON values: inline fragments make
//! every nested field optional, and the resolution fallbacks below depend
//! on distinguishing "absent" from "present".

use serde::Deserialize;
use serde_json::json;

use super::client::{GitHubApiError, GitHubClient};

/// Page bound when scanning project items for an issue.
const ITEM_PAGE_SIZE: i64 = 100;

const FIELD_PAGE_SIZE: i64 = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectNode {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectFieldOption {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ProjectStatusField {
    pub id: String,
    pub name: String,
    pub options: Vec<ProjectFieldOption>,
}

impl ProjectStatusField {
    /// Locate the option matching `wanted`: exact match first, then a
    /// case-insensitive scan. `None` means the caller skips the field
    /// update rather than failing the operation.
    pub fn find_option(&self, wanted: &str) -> Option<&ProjectFieldOption> {
        self.options
            .iter()
            .find(|o| o.name == wanted)
            .or_else(|| self.options.iter().find(|o| o.name.eq_ignore_ascii_case(wanted)))
    }
}

/// Snapshot of a project item: its Status option and its issue content.
#[derive(Debug, Clone)]
pub struct ProjectItemView {
    pub status_option: Option<String>,
    pub issue: Option<ProjectItemIssue>,
}

#[derive(Debug, Clone)]
pub struct ProjectItemIssue {
    pub number: i64,
    pub title: String,
    pub body: Option<String>,
    pub closed: bool,
    pub labels: Vec<String>,
    pub repository_full_name: Option<String>,
}

pub struct ProjectResolver<'a> {
    client: &'a GitHubClient,
}

impl<'a> ProjectResolver<'a> {
    pub fn new(client: &'a GitHubClient) -> Self {
        Self { client }
    }

    /// Resolve a project node by owner login and project number. The API
    /// requires knowing whether the owner is a user or an organization,
    /// so try user-scoped first and fall back to organization-scoped.
    pub async fn resolve_project(
        &self,
        owner: &str,
        number: i64,
    ) -> Result<Option<ProjectNode>, GitHubApiError> {
        const USER_QUERY: &str = r#"
            query($login: String!, $number: Int!) {
                user(login: $login) { projectV2(number: $number) { id } }
            }"#;
        const ORG_QUERY: &str = r#"
            query($login: String!, $number: Int!) {
                organization(login: $login) { projectV2(number: $number) { id } }
            }"#;

        let variables = json!({ "login": owner, "number": number });

        // A user lookup against an org login answers with a GraphQL error,
        // not a transport failure; treat that as "not a user" and move on.
        let user_project = match self
            .client
            .graphql::<UserProjectData>(USER_QUERY, variables.clone())
            .await
        {
            Ok(data) => data.user.and_then(|u| u.project_v2),
            Err(GitHubApiError::GraphQl(_)) => None,
            Err(e) => return Err(e),
        };
        if user_project.is_some() {
            return Ok(user_project);
        }

        match self
            .client
            .graphql::<OrgProjectData>(ORG_QUERY, variables)
            .await
        {
            Ok(data) => Ok(data.organization.and_then(|o| o.project_v2)),
            Err(GitHubApiError::GraphQl(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Locate the single-select field named "Status" (exact, then
    /// case-insensitive). `None` when the project has no such field; the
    /// issue can still be added to the project without a field update.
    pub async fn status_field(
        &self,
        project_id: &str,
    ) -> Result<Option<ProjectStatusField>, GitHubApiError> {
        const QUERY: &str = r#"
            query($project: ID!, $first: Int!) {
                node(id: $project) {
                    ... on ProjectV2 {
                        fields(first: $first) {
                            nodes {
                                ... on ProjectV2SingleSelectField {
                                    id name options { id name }
                                }
                            }
                        }
                    }
                }
            }"#;

        let data: FieldsData = self
            .client
            .graphql(QUERY, json!({ "project": project_id, "first": FIELD_PAGE_SIZE }))
            .await?;

        let mut candidates: Vec<ProjectStatusField> = data
            .node
            .and_then(|n| n.fields)
            .map(|f| f.nodes)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|node| match (node.id, node.name, node.options) {
                (Some(id), Some(name), Some(options)) => Some(ProjectStatusField {
                    id,
                    name,
                    options,
                }),
                _ => None,
            })
            .collect();

        let index = candidates
            .iter()
            .position(|f| f.name == "Status")
            .or_else(|| {
                candidates
                    .iter()
                    .position(|f| f.name.eq_ignore_ascii_case("Status"))
            });
        Ok(index.map(|i| candidates.swap_remove(i)))
    }

    /// Find the project item whose content is the given issue, matching
    /// by content node identity over a bounded page.
    pub async fn find_item_for_issue(
        &self,
        project_id: &str,
        issue_node_id: &str,
    ) -> Result<Option<String>, GitHubApiError> {
        const QUERY: &str = r#"
            query($project: ID!, $first: Int!) {
                node(id: $project) {
                    ... on ProjectV2 {
                        items(first: $first) {
                            nodes { id content { ... on Issue { id } } }
                        }
                    }
                }
            }"#;

        let data: ItemsData = self
            .client
            .graphql(QUERY, json!({ "project": project_id, "first": ITEM_PAGE_SIZE }))
            .await?;

        let item = data
            .node
            .and_then(|n| n.items)
            .map(|i| i.nodes)
            .unwrap_or_default()
            .into_iter()
            .find(|item| {
                item.content
                    .as_ref()
                    .and_then(|c| c.id.as_deref())
                    .is_some_and(|id| id == issue_node_id)
            });
        Ok(item.map(|i| i.id))
    }

    /// Add the issue to the project, returning the new item id.
    pub async fn add_item(
        &self,
        project_id: &str,
        issue_node_id: &str,
    ) -> Result<String, GitHubApiError> {
        const MUTATION: &str = r#"
            mutation($project: ID!, $content: ID!) {
                addProjectV2ItemById(input: { projectId: $project, contentId: $content }) {
                    item { id }
                }
            }"#;

        let data: AddItemData = self
            .client
            .graphql(
                MUTATION,
                json!({ "project": project_id, "content": issue_node_id }),
            )
            .await?;

        data.add_project_v2_item_by_id
            .and_then(|p| p.item)
            .map(|i| i.id)
            .ok_or_else(|| GitHubApiError::GraphQl("addProjectV2ItemById returned no item".into()))
    }

    /// Set a single-select field of a project item to the given option.
    pub async fn set_status_option(
        &self,
        project_id: &str,
        item_id: &str,
        field_id: &str,
        option_id: &str,
    ) -> Result<(), GitHubApiError> {
        const MUTATION: &str = r#"
            mutation($project: ID!, $item: ID!, $field: ID!, $option: String!) {
                updateProjectV2ItemFieldValue(input: {
                    projectId: $project, itemId: $item, fieldId: $field,
                    value: { singleSelectOptionId: $option }
                }) {
                    projectV2Item { id }
                }
            }"#;

        let _: UpdateFieldData = self
            .client
            .graphql(
                MUTATION,
                json!({
                    "project": project_id,
                    "item": item_id,
                    "field": field_id,
                    "option": option_id,
                }),
            )
            .await?;
        Ok(())
    }

    /// Fetch a project item's Status option and issue content in one
    /// query. Used by inbound sync for project-item events.
    pub async fn item_view(
        &self,
        item_node_id: &str,
    ) -> Result<Option<ProjectItemView>, GitHubApiError> {
        const QUERY: &str = r#"
            query($item: ID!) {
                node(id: $item) {
                    ... on ProjectV2Item {
                        fieldValueByName(name: "Status") {
                            ... on ProjectV2ItemFieldSingleSelectValue { name }
                        }
                        content {
                            ... on Issue {
                                number title body state
                                labels(first: 50) { nodes { name } }
                                repository { nameWithOwner }
                            }
                        }
                    }
                }
            }"#;

        let data: ItemViewData = self
            .client
            .graphql(QUERY, json!({ "item": item_node_id }))
            .await?;

        Ok(data.node.map(ProjectItemView::from_node))
    }
}

impl ProjectItemView {
    fn from_node(node: ItemViewNode) -> Self {
        let status_option = node.field_value.and_then(|v| v.name);
        let issue = node.content.and_then(|content| {
            match (content.number, content.title, content.state) {
                (Some(number), Some(title), Some(state)) => Some(ProjectItemIssue {
                    number,
                    title,
                    body: content.body,
                    closed: state.eq_ignore_ascii_case("closed"),
                    labels: content
                        .labels
                        .map(|l| l.nodes.into_iter().map(|n| n.name).collect())
                        .unwrap_or_default(),
                    repository_full_name: content.repository.map(|r| r.name_with_owner),
                }),
                _ => None,
            }
        });
        Self {
            status_option,
            issue,
        }
    }
}

// --- GraphQL response shapes -------------------------------------------

#[derive(Debug, Deserialize)]
struct UserProjectData {
    user: Option<OwnerProject>,
}

#[derive(Debug, Deserialize)]
struct OrgProjectData {
    organization: Option<OwnerProject>,
}

#[derive(Debug, Deserialize)]
struct OwnerProject {
    #[serde(rename = "projectV2")]
    project_v2: Option<ProjectNode>,
}

#[derive(Debug, Deserialize)]
struct FieldsData {
    node: Option<FieldsNode>,
}

#[derive(Debug, Deserialize)]
struct FieldsNode {
    #[serde(default)]
    fields: Option<FieldConnection>,
}

#[derive(Debug, Deserialize)]
struct FieldConnection {
    #[serde(default)]
    nodes: Vec<FieldNode>,
}

/// Inline fragments make every field optional: a non-single-select field
/// arrives as an empty object.
#[derive(Debug, Default, Deserialize)]
struct FieldNode {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    options: Option<Vec<ProjectFieldOption>>,
}

#[derive(Debug, Deserialize)]
struct ItemsData {
    node: Option<ItemsNode>,
}

#[derive(Debug, Deserialize)]
struct ItemsNode {
    #[serde(default)]
    items: Option<ItemConnection>,
}

#[derive(Debug, Deserialize)]
struct ItemConnection {
    #[serde(default)]
    nodes: Vec<ItemNode>,
}

#[derive(Debug, Deserialize)]
struct ItemNode {
    id: String,
    #[serde(default)]
    content: Option<ItemContent>,
}

/// Draft items and pull requests deserialize as empty content.
#[derive(Debug, Default, Deserialize)]
struct ItemContent {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddItemData {
    #[serde(rename = "addProjectV2ItemById")]
    add_project_v2_item_by_id: Option<AddItemPayload>,
}

#[derive(Debug, Deserialize)]
struct AddItemPayload {
    item: Option<ProjectItemNode>,
}

#[derive(Debug, Deserialize)]
struct ProjectItemNode {
    id: String,
}

#[derive(Debug, Deserialize)]
struct UpdateFieldData {
    #[serde(rename = "updateProjectV2ItemFieldValue")]
    #[allow(dead_code)]
    update_project_v2_item_field_value: Option<UpdateFieldPayload>,
}

#[derive(Debug, Deserialize)]
struct UpdateFieldPayload {
    #[serde(rename = "projectV2Item")]
    #[allow(dead_code)]
    project_v2_item: Option<ProjectItemNode>,
}

#[derive(Debug, Default, Deserialize)]
struct ItemViewData {
    #[serde(default)]
    node: Option<ItemViewNode>,
}

#[derive(Debug, Default, Deserialize)]
struct ItemViewNode {
    #[serde(rename = "fieldValueByName", default)]
    field_value: Option<FieldValueNode>,
    #[serde(default)]
    content: Option<ItemIssueContent>,
}

/// Non-single-select field values arrive as an empty object.
#[derive(Debug, Default, Deserialize)]
struct FieldValueNode {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ItemIssueContent {
    #[serde(default)]
    number: Option<i64>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    labels: Option<LabelConnection>,
    #[serde(default)]
    repository: Option<RepositoryRef>,
}

#[derive(Debug, Deserialize)]
struct LabelConnection {
    #[serde(default)]
    nodes: Vec<LabelNode>,
}

#[derive(Debug, Deserialize)]
struct LabelNode {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryRef {
    #[serde(rename = "nameWithOwner")]
    name_with_owner: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_with_options(names: &[&str]) -> ProjectStatusField {
        ProjectStatusField {
            id: "F_1".to_string(),
            name: "Status".to_string(),
            options: names
                .iter()
                .enumerate()
                .map(|(i, n)| ProjectFieldOption {
                    id: format!("O_{i}"),
                    name: n.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_find_option_prefers_exact_match() {
        // Two options that collide case-insensitively; exact must win.
        let field = field_with_options(&["in progress", "In Progress"]);
        let option = field.find_option("In Progress").unwrap();
        assert_eq!(option.id, "O_1");
    }

    #[test]
    fn test_find_option_case_insensitive_fallback() {
        let field = field_with_options(&["IN PROGRESS", "Done"]);
        let option = field.find_option("In Progress").unwrap();
        assert_eq!(option.name, "IN PROGRESS");
    }

    #[test]
    fn test_find_option_none_when_absent() {
        let field = field_with_options(&["Todo", "Done"]);
        assert!(field.find_option("Shipped").is_none());
    }

    #[test]
    fn test_field_nodes_tolerate_empty_fragments() {
        let data: FieldsData = serde_json::from_str(
            r#"{"node": {"fields": {"nodes": [
                {},
                {"id": "F_1", "name": "Status", "options": [{"id": "O_1", "name": "Todo"}]}
            ]}}}"#,
        )
        .unwrap();

        let nodes = data.node.unwrap().fields.unwrap().nodes;
        assert_eq!(nodes.len(), 2);
        assert!(nodes[0].id.is_none());
        assert_eq!(nodes[1].name.as_deref(), Some("Status"));
    }

    #[test]
    fn test_item_view_from_full_node() {
        let data: ItemViewData = serde_json::from_str(
            r#"{"node": {
                "fieldValueByName": {"name": "In Progress"},
                "content": {
                    "number": 12, "title": "Fix bug", "body": null, "state": "OPEN",
                    "labels": {"nodes": [{"name": "in-progress"}]},
                    "repository": {"nameWithOwner": "acme/widgets"}
                }
            }}"#,
        )
        .unwrap();

        let view = ProjectItemView::from_node(data.node.unwrap());
        assert_eq!(view.status_option.as_deref(), Some("In Progress"));
        let issue = view.issue.unwrap();
        assert_eq!(issue.number, 12);
        assert!(!issue.closed);
        assert_eq!(issue.labels, vec!["in-progress".to_string()]);
        assert_eq!(issue.repository_full_name.as_deref(), Some("acme/widgets"));
    }

    #[test]
    fn test_item_view_without_issue_content() {
        // Draft items carry no issue fragment.
        let data: ItemViewData =
            serde_json::from_str(r#"{"node": {"fieldValueByName": {}, "content": {}}}"#).unwrap();
        let view = ProjectItemView::from_node(data.node.unwrap());
        assert!(view.status_option.is_none());
        assert!(view.issue.is_none());
    }
}
