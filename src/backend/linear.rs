//! Linear backend.
//!
//! Linear models everything the pipeline needs natively: workflow states
//! for status, an integer priority field (0 none, 1 urgent .. 4 low),
//! labels, and sub-issues via `parentId`. The transport speaks GraphQL;
//! clearing a priority means setting it to 0, clearing an assignee means
//! sending an explicit null `assigneeId`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::{Backend, TransportError};
use crate::config::LinearConfig;
use crate::ops::canonical;
use crate::ops::{
    CreateSubtask, CreateTask, ErrorKind, Operation, OperationResult, Setting, UpdateSubtask,
    UpdateTask,
};
use crate::snapshot::{
    BatchLedger, CommentRecord, NamedRecord, TaskRecord, UserRecord, WorkspaceSnapshot,
};

const LINEAR_URL: &str = "https://api.linear.app/graphql";

/// Payload for `issueCreate`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueInput {
    pub title: String,
    pub description: Option<String>,
    pub state_id: Option<String>,
    pub assignee_id: Option<String>,
    pub priority: Option<u8>,
    pub label_ids: Vec<String>,
    pub due_date: Option<String>,
    pub parent_id: Option<String>,
}

/// Payload for `issueUpdate`. `assignee_id` and `due_date` keep the
/// present-null distinction so an explicit clear reaches the wire as null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssuePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub state_id: Option<String>,
    pub assignee_id: Setting<String>,
    pub priority: Option<u8>,
    pub due_date: Setting<String>,
    pub label_ids: Option<Vec<String>>,
}

impl IssuePatch {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.state_id.is_none()
            && self.assignee_id.is_absent()
            && self.priority.is_none()
            && self.due_date.is_absent()
            && self.label_ids.is_none()
    }
}

#[async_trait]
pub trait LinearApi: Send + Sync {
    async fn fetch_workspace(&self) -> Result<WorkspaceSnapshot, TransportError>;
    async fn create_issue(&self, input: &IssueInput) -> Result<String, TransportError>;
    async fn update_issue(&self, id: &str, patch: &IssuePatch) -> Result<(), TransportError>;
    async fn delete_issue(&self, id: &str) -> Result<(), TransportError>;
    async fn create_comment(&self, issue_id: &str, body: &str) -> Result<(), TransportError>;
    async fn get_comments(&self, issue_id: &str) -> Result<Vec<CommentRecord>, TransportError>;
    async fn delete_comment(&self, id: &str) -> Result<(), TransportError>;
    async fn create_label(&self, name: &str) -> Result<NamedRecord, TransportError>;
    async fn issue_label_ids(&self, issue_id: &str) -> Result<Vec<String>, TransportError>;
}

pub struct LinearBackend {
    api: Arc<dyn LinearApi>,
}

impl LinearBackend {
    pub fn new(api: Arc<dyn LinearApi>) -> Self {
        Self { api }
    }

    pub fn live(config: &LinearConfig) -> Self {
        Self::new(Arc::new(LinearClient::new(
            &config.api_key,
            config.team_id.as_deref(),
        )))
    }

    /// Map a spoken status to a workflow state id: raw name first, then
    /// the canonical bucket.
    fn state_for(&self, status: &str, snapshot: &WorkspaceSnapshot) -> Option<String> {
        snapshot
            .resolve_state(status)
            .or_else(|| snapshot.resolve_state(&canonical::canonical_status(status)))
            .map(|s| s.id.clone())
    }

    async fn ensure_label(
        &self,
        name: &str,
        snapshot: &WorkspaceSnapshot,
        ledger: &mut BatchLedger,
    ) -> Result<String, TransportError> {
        if let Some(id) = ledger.resolve_label_id(snapshot, name) {
            return Ok(id);
        }
        let label = self.api.create_label(name).await?;
        ledger.record_label(name, &label.id);
        Ok(label.id)
    }

    fn resolve_issue_id(
        &self,
        snapshot: &WorkspaceSnapshot,
        ledger: &BatchLedger,
        reference: &str,
    ) -> Option<String> {
        ledger.resolve_task_id(snapshot, reference)
    }

    /// Resolve a sub-issue within its parent's children when the parent is
    /// known, falling back to the global issue scope otherwise.
    fn resolve_subissue_id(
        &self,
        snapshot: &WorkspaceSnapshot,
        ledger: &BatchLedger,
        parent: Option<&str>,
        reference: &str,
    ) -> Option<String> {
        if let Some(id) = ledger.task_id(reference) {
            return Some(id.to_string());
        }
        if let Some(parent_ref) = parent {
            if let Some(parent_task) = snapshot.resolve_task(parent_ref) {
                let names: Vec<&str> =
                    parent_task.subtasks.iter().map(|t| t.name.as_str()).collect();
                if let Some(i) =
                    crate::ops::resolve::resolve(reference, &names, crate::ops::resolve::Scope::Task)
                {
                    return Some(parent_task.subtasks[i].id.clone());
                }
                return None;
            }
        }
        snapshot.resolve_task(reference).map(|t| t.id.clone())
    }

    async fn apply_create(
        &self,
        op: &Operation,
        spec: &CreateTask,
        snapshot: &WorkspaceSnapshot,
        ledger: &mut BatchLedger,
    ) -> OperationResult {
        let mut label_ids = Vec::new();
        for label in &spec.labels {
            match self.ensure_label(label, snapshot, ledger).await {
                Ok(id) => label_ids.push(id),
                Err(e) => warn!(label, error = %e, "failed to create label"),
            }
        }
        let assignee_id = match &spec.assignee {
            Some(assignee) => match snapshot.resolve_user(assignee) {
                Some(user) => Some(user.id.clone()),
                None => {
                    warn!(assignee, "assignee not found; creating unassigned");
                    None
                }
            },
            None => None,
        };
        let input = IssueInput {
            title: spec.title.clone(),
            description: spec.description.clone(),
            state_id: spec
                .status
                .as_deref()
                .and_then(|s| self.state_for(s, snapshot)),
            assignee_id,
            // Unspecified priority defaults to medium.
            priority: Some(spec.priority.unwrap_or(3)),
            label_ids,
            due_date: spec.due_date.clone(),
            parent_id: None,
        };
        match self.api.create_issue(&input).await {
            Ok(id) => {
                ledger.record_task(&spec.title, &id);
                if let Some(comment) = &spec.comment {
                    if let Err(e) = self.api.create_comment(&id, comment).await {
                        warn!(issue = %spec.title, error = %e, "failed to add comment on create");
                    }
                }
                OperationResult::ok(op)
            }
            Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
        }
    }

    async fn apply_update(
        &self,
        op: &Operation,
        spec: &UpdateTask,
        snapshot: &WorkspaceSnapshot,
        ledger: &mut BatchLedger,
    ) -> OperationResult {
        let Some(issue_id) = self.resolve_issue_id(snapshot, ledger, &spec.target) else {
            return OperationResult::not_found(op, "issue", &spec.target);
        };
        let state_id = match spec.status.as_deref() {
            Setting::Value(status) => {
                let state = self.state_for(status, snapshot);
                if state.is_none() {
                    warn!(status, "no workflow state matches; leaving state unchanged");
                }
                state
            }
            // Linear issues always carry a state; null is ignored.
            Setting::Null | Setting::Absent => None,
        };
        let assignee_id = match spec.assignee.as_deref() {
            Setting::Value(assignee) => match snapshot.resolve_user(assignee) {
                Some(user) => Setting::Value(user.id.clone()),
                None => {
                    warn!(assignee, "assignee not found; leaving assignee unchanged");
                    Setting::Absent
                }
            },
            Setting::Null => Setting::Null,
            Setting::Absent => Setting::Absent,
        };
        let priority = match spec.priority {
            Setting::Value(level) => Some(level),
            // Present-null clears the priority; Linear's "none" is 0.
            Setting::Null => Some(0),
            Setting::Absent => None,
        };
        let label_ids = if spec.labels.is_empty() {
            None
        } else {
            let mut current = match self.api.issue_label_ids(&issue_id).await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(issue = %spec.target, error = %e, "failed to read labels; replacing");
                    Vec::new()
                }
            };
            for label in &spec.labels {
                match self.ensure_label(label, snapshot, ledger).await {
                    Ok(id) if !current.contains(&id) => current.push(id),
                    Ok(_) => {}
                    Err(e) => warn!(label, error = %e, "failed to create label"),
                }
            }
            Some(current)
        };
        let patch = IssuePatch {
            title: spec.new_title.clone(),
            description: spec.description.clone(),
            state_id,
            assignee_id,
            priority,
            due_date: spec.due_date.clone(),
            label_ids,
        };
        if patch.is_empty() {
            return OperationResult::ok(op);
        }
        match self.api.update_issue(&issue_id, &patch).await {
            Ok(()) => {
                if let Some(new_name) = &spec.new_title {
                    ledger.record_task(new_name, &issue_id);
                }
                OperationResult::ok(op)
            }
            Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
        }
    }

    async fn apply_one(
        &self,
        op: &Operation,
        snapshot: &WorkspaceSnapshot,
        ledger: &mut BatchLedger,
    ) -> OperationResult {
        match op {
            Operation::Create(spec) => self.apply_create(op, spec, snapshot, ledger).await,
            Operation::Update(spec) => self.apply_update(op, spec, snapshot, ledger).await,
            Operation::Rename { target, new_name } => {
                let Some(issue_id) = self.resolve_issue_id(snapshot, ledger, target) else {
                    return OperationResult::not_found(op, "issue", target);
                };
                let patch = IssuePatch {
                    title: Some(new_name.clone()),
                    ..Default::default()
                };
                match self.api.update_issue(&issue_id, &patch).await {
                    Ok(()) => {
                        ledger.record_task(new_name, &issue_id);
                        OperationResult::ok(op)
                    }
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::Delete { target } => {
                let Some(issue_id) = self.resolve_issue_id(snapshot, ledger, target) else {
                    return OperationResult::not_found(op, "issue", target);
                };
                match self.api.delete_issue(&issue_id).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::Comment { target, text } => {
                let Some(issue_id) = self.resolve_issue_id(snapshot, ledger, target) else {
                    return OperationResult::not_found(op, "issue", target);
                };
                match self.api.create_comment(&issue_id, text).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::DeleteComment { target, text } => {
                let Some(issue_id) = self.resolve_issue_id(snapshot, ledger, target) else {
                    return OperationResult::not_found(op, "issue", target);
                };
                let comments = match self.api.get_comments(&issue_id).await {
                    Ok(comments) => comments,
                    Err(e) => return OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                };
                let needle = text.to_lowercase();
                let Some(comment) = comments
                    .iter()
                    .find(|c| c.text.to_lowercase().contains(&needle))
                else {
                    return OperationResult::not_found(op, "comment", text);
                };
                match self.api.delete_comment(&comment.id).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::Assign { target, assignee } => {
                let Some(issue_id) = self.resolve_issue_id(snapshot, ledger, target) else {
                    return OperationResult::not_found(op, "issue", target);
                };
                let Some(user) = snapshot.resolve_user(assignee) else {
                    return OperationResult::not_found(op, "user", assignee);
                };
                let patch = IssuePatch {
                    assignee_id: Setting::Value(user.id.clone()),
                    ..Default::default()
                };
                match self.api.update_issue(&issue_id, &patch).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::RemoveAssignee { target } => {
                let Some(issue_id) = self.resolve_issue_id(snapshot, ledger, target) else {
                    return OperationResult::not_found(op, "issue", target);
                };
                let patch = IssuePatch {
                    assignee_id: Setting::Null,
                    ..Default::default()
                };
                match self.api.update_issue(&issue_id, &patch).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::RemovePriority { target } => {
                let Some(issue_id) = self.resolve_issue_id(snapshot, ledger, target) else {
                    return OperationResult::not_found(op, "issue", target);
                };
                let patch = IssuePatch {
                    priority: Some(0),
                    ..Default::default()
                };
                match self.api.update_issue(&issue_id, &patch).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::RemoveStatus { .. } => OperationResult::failed(
                op,
                ErrorKind::Unsupported,
                "Linear issues always have a workflow state",
            ),
            Operation::CreateLabel { label, target } => {
                let label_id = match self.ensure_label(label, snapshot, ledger).await {
                    Ok(id) => id,
                    Err(e) => return OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                };
                if let Some(target) = target {
                    if let Some(issue_id) = self.resolve_issue_id(snapshot, ledger, target) {
                        self.attach_label(&issue_id, &label_id).await;
                    } else {
                        warn!(label, target, "label target issue not found");
                    }
                }
                OperationResult::ok(op)
            }
            Operation::AssignLabel { target, label } => {
                let Some(issue_id) = self.resolve_issue_id(snapshot, ledger, target) else {
                    return OperationResult::not_found(op, "issue", target);
                };
                let label_id = match self.ensure_label(label, snapshot, ledger).await {
                    Ok(id) => id,
                    Err(e) => return OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                };
                let mut current = match self.api.issue_label_ids(&issue_id).await {
                    Ok(ids) => ids,
                    Err(e) => return OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                };
                if !current.contains(&label_id) {
                    current.push(label_id);
                    let patch = IssuePatch {
                        label_ids: Some(current),
                        ..Default::default()
                    };
                    if let Err(e) = self.api.update_issue(&issue_id, &patch).await {
                        return OperationResult::failed(op, ErrorKind::Remote, e.to_string());
                    }
                }
                OperationResult::ok(op)
            }
            Operation::RemoveLabel { target, label } => {
                let Some(issue_id) = self.resolve_issue_id(snapshot, ledger, target) else {
                    return OperationResult::not_found(op, "issue", target);
                };
                let Some(label_id) = ledger.resolve_label_id(snapshot, label) else {
                    // Removing an unknown label is trivially done.
                    return OperationResult::ok(op);
                };
                let current = match self.api.issue_label_ids(&issue_id).await {
                    Ok(ids) => ids,
                    Err(e) => return OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                };
                if !current.contains(&label_id) {
                    return OperationResult::ok(op);
                }
                let remaining: Vec<String> =
                    current.into_iter().filter(|id| *id != label_id).collect();
                let patch = IssuePatch {
                    label_ids: Some(remaining),
                    ..Default::default()
                };
                match self.api.update_issue(&issue_id, &patch).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::AddSection { target, section } => {
                // Linear groups by workflow state; a section move is a
                // state change.
                let Some(issue_id) = self.resolve_issue_id(snapshot, ledger, target) else {
                    return OperationResult::not_found(op, "issue", target);
                };
                let Some(state_id) = self.state_for(section, snapshot) else {
                    return OperationResult::not_found(op, "state", section);
                };
                let patch = IssuePatch {
                    state_id: Some(state_id),
                    ..Default::default()
                };
                match self.api.update_issue(&issue_id, &patch).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::RemoveSection { .. } => OperationResult::failed(
                op,
                ErrorKind::Unsupported,
                "Linear issues always belong to a workflow state",
            ),
            Operation::CreateSubtask(spec) => {
                self.apply_create_subtask(op, spec, snapshot, ledger).await
            }
            Operation::UpdateSubtask(spec) => {
                self.apply_update_subtask(op, spec, snapshot, ledger).await
            }
            Operation::DeleteSubtask { parent, target } => {
                let Some(issue_id) =
                    self.resolve_subissue_id(snapshot, ledger, parent.as_deref(), target)
                else {
                    return OperationResult::not_found(op, "sub-issue", target);
                };
                match self.api.delete_issue(&issue_id).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::CreateChecklist { .. }
            | Operation::UpdateChecklist { .. }
            | Operation::DeleteChecklist { .. }
            | Operation::AddChecklistItem { .. }
            | Operation::UpdateChecklistItem { .. }
            | Operation::DeleteChecklistItem { .. } => OperationResult::failed(
                op,
                ErrorKind::Unsupported,
                "Linear has no checklists; use sub-issues instead",
            ),
            Operation::AddReflection(_) | Operation::CreateImprovementTask { .. } => {
                OperationResult::failed(
                    op,
                    ErrorKind::Unsupported,
                    "reflection boards are not supported on Linear",
                )
            }
            Operation::Unknown { intent, .. } => OperationResult::failed(
                op,
                ErrorKind::UnknownIntent,
                format!("unknown intent '{intent}'"),
            ),
            Operation::Malformed { .. } => {
                OperationResult::failed(op, ErrorKind::Invalid, "operation is not an object")
            }
        }
    }

    async fn attach_label(&self, issue_id: &str, label_id: &str) {
        let mut current = match self.api.issue_label_ids(issue_id).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "failed to read labels for attach");
                return;
            }
        };
        if current.iter().any(|id| id == label_id) {
            return;
        }
        current.push(label_id.to_string());
        let patch = IssuePatch {
            label_ids: Some(current),
            ..Default::default()
        };
        if let Err(e) = self.api.update_issue(issue_id, &patch).await {
            warn!(error = %e, "failed to attach label");
        }
    }

    async fn apply_create_subtask(
        &self,
        op: &Operation,
        spec: &CreateSubtask,
        snapshot: &WorkspaceSnapshot,
        ledger: &mut BatchLedger,
    ) -> OperationResult {
        let Some(parent_id) = self.resolve_issue_id(snapshot, ledger, &spec.parent) else {
            return OperationResult::not_found(op, "parent issue", &spec.parent);
        };
        let assignee_id = spec
            .assignee
            .as_deref()
            .and_then(|a| snapshot.resolve_user(a))
            .map(|u| u.id.clone());
        let input = IssueInput {
            title: spec.title.clone(),
            description: spec.description.clone(),
            state_id: spec
                .status
                .as_deref()
                .and_then(|s| self.state_for(s, snapshot)),
            assignee_id,
            priority: None,
            label_ids: Vec::new(),
            due_date: spec.due_date.clone(),
            parent_id: Some(parent_id),
        };
        match self.api.create_issue(&input).await {
            Ok(id) => {
                ledger.record_task(&spec.title, &id);
                OperationResult::ok(op)
            }
            Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
        }
    }

    async fn apply_update_subtask(
        &self,
        op: &Operation,
        spec: &UpdateSubtask,
        snapshot: &WorkspaceSnapshot,
        ledger: &mut BatchLedger,
    ) -> OperationResult {
        let Some(issue_id) =
            self.resolve_subissue_id(snapshot, ledger, spec.parent.as_deref(), &spec.target)
        else {
            return OperationResult::not_found(op, "sub-issue", &spec.target);
        };
        let assignee_id = match spec.assignee.as_deref() {
            Setting::Value(assignee) => match snapshot.resolve_user(assignee) {
                Some(user) => Setting::Value(user.id.clone()),
                None => Setting::Absent,
            },
            Setting::Null => Setting::Null,
            Setting::Absent => Setting::Absent,
        };
        let patch = IssuePatch {
            title: spec.new_title.clone(),
            description: spec.description.clone(),
            state_id: spec
                .status
                .value()
                .and_then(|s| self.state_for(s, snapshot)),
            assignee_id,
            priority: None,
            due_date: spec.due_date.clone(),
            label_ids: None,
        };
        if patch.is_empty() {
            return OperationResult::ok(op);
        }
        match self.api.update_issue(&issue_id, &patch).await {
            Ok(()) => OperationResult::ok(op),
            Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
        }
    }
}

#[async_trait]
impl Backend for LinearBackend {
    fn id(&self) -> &str {
        "linear"
    }

    fn name(&self) -> &str {
        "Linear"
    }

    async fn fetch_snapshot(&self) -> Result<WorkspaceSnapshot, TransportError> {
        self.api.fetch_workspace().await
    }

    async fn apply(
        &self,
        ops: &[Operation],
        snapshot: &WorkspaceSnapshot,
    ) -> Vec<OperationResult> {
        let mut ledger = BatchLedger::default();
        let mut results = Vec::with_capacity(ops.len());
        for op in ops {
            debug!(intent = op.intent(), target = op.target(), "applying operation");
            results.push(self.apply_one(op, snapshot, &mut ledger).await);
        }
        results
    }
}

/// Live GraphQL client, authenticated with a personal API key.
pub struct LinearClient {
    http: reqwest::Client,
    api_key: String,
    team: Option<String>,
}

impl LinearClient {
    pub fn new(api_key: &str, team: Option<&str>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.to_string(),
            team: team.map(String::from),
        }
    }

    async fn graphql(&self, query: &str, variables: Value) -> Result<Value, TransportError> {
        let response = self
            .http
            .post(LINEAR_URL)
            .header("Authorization", &self.api_key)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| TransportError::decode(e.to_string()))?;
        if !status.is_success() {
            return Err(TransportError::api("Linear", status.as_u16(), body.to_string()));
        }
        if let Some(errors) = body.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                let message = errors
                    .iter()
                    .filter_map(|e| e.get("message").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(TransportError::api("Linear", status.as_u16(), message));
            }
        }
        body.get("data")
            .cloned()
            .ok_or_else(|| TransportError::decode("missing data in GraphQL response"))
    }

    /// Pick the configured team by id or name, or the first team.
    async fn team_id(&self) -> Result<String, TransportError> {
        let data = self
            .graphql("query { teams { nodes { id name } } }", json!({}))
            .await?;
        let nodes = data["teams"]["nodes"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        let chosen = match &self.team {
            Some(wanted) => nodes.iter().find(|t| {
                t["id"].as_str() == Some(wanted)
                    || t["name"]
                        .as_str()
                        .is_some_and(|n| n.eq_ignore_ascii_case(wanted))
            }),
            None => nodes.first(),
        };
        chosen
            .and_then(|t| t["id"].as_str())
            .map(String::from)
            .ok_or_else(|| TransportError::decode("no Linear team available"))
    }
}

fn nodes(value: &Value, path: &[&str]) -> Vec<Value> {
    let mut cursor = value;
    for key in path {
        cursor = &cursor[*key];
    }
    cursor["nodes"].as_array().cloned().unwrap_or_default()
}

fn mutation_ok(data: &Value, field: &str) -> Result<(), TransportError> {
    if data[field]["success"].as_bool() == Some(true) {
        Ok(())
    } else {
        Err(TransportError::decode(format!("{field} reported failure")))
    }
}

#[async_trait]
impl LinearApi for LinearClient {
    async fn fetch_workspace(&self) -> Result<WorkspaceSnapshot, TransportError> {
        let team_id = self.team_id().await?;
        let query = r#"
            query Workspace($teamId: String!) {
                team(id: $teamId) {
                    states { nodes { id name } }
                    labels { nodes { id name } }
                    issues(first: 200) {
                        nodes {
                            id title description
                            state { name }
                            labels { nodes { name } }
                            parent { id }
                            children { nodes { id title } }
                        }
                    }
                }
                users { nodes { id name email } }
            }"#;
        let data = self.graphql(query, json!({ "teamId": team_id })).await?;

        let states: Vec<NamedRecord> = nodes(&data, &["team", "states"])
            .iter()
            .filter_map(|s| {
                Some(NamedRecord {
                    id: s["id"].as_str()?.to_string(),
                    name: s["name"].as_str()?.to_string(),
                })
            })
            .collect();
        let labels: Vec<NamedRecord> = nodes(&data, &["team", "labels"])
            .iter()
            .filter_map(|l| {
                Some(NamedRecord {
                    id: l["id"].as_str()?.to_string(),
                    name: l["name"].as_str()?.to_string(),
                })
            })
            .collect();
        let users: Vec<UserRecord> = nodes(&data, &["users"])
            .iter()
            .filter_map(|u| {
                Some(UserRecord {
                    id: u["id"].as_str()?.to_string(),
                    name: u["name"].as_str()?.to_string(),
                    email: u["email"].as_str().map(String::from),
                })
            })
            .collect();
        // Top-level issues only; children are nested as subtasks.
        let tasks: Vec<TaskRecord> = nodes(&data, &["team", "issues"])
            .iter()
            .filter(|issue| issue["parent"].is_null())
            .filter_map(|issue| {
                let subtasks = issue["children"]["nodes"]
                    .as_array()
                    .map(|children| {
                        children
                            .iter()
                            .filter_map(|child| {
                                Some(TaskRecord {
                                    id: child["id"].as_str()?.to_string(),
                                    name: child["title"].as_str()?.to_string(),
                                    ..Default::default()
                                })
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Some(TaskRecord {
                    id: issue["id"].as_str()?.to_string(),
                    name: issue["title"].as_str()?.to_string(),
                    description: issue["description"].as_str().map(String::from),
                    status: issue["state"]["name"].as_str().map(String::from),
                    labels: issue["labels"]["nodes"]
                        .as_array()
                        .map(|ls| {
                            ls.iter()
                                .filter_map(|l| l["name"].as_str().map(String::from))
                                .collect()
                        })
                        .unwrap_or_default(),
                    subtasks,
                    ..Default::default()
                })
            })
            .collect();

        Ok(WorkspaceSnapshot {
            tasks,
            users,
            states,
            labels,
            ..Default::default()
        })
    }

    async fn create_issue(&self, input: &IssueInput) -> Result<String, TransportError> {
        let team_id = self.team_id().await?;
        let mut fields = Map::new();
        fields.insert("teamId".into(), json!(team_id));
        fields.insert("title".into(), json!(input.title));
        if let Some(description) = &input.description {
            fields.insert("description".into(), json!(description));
        }
        if let Some(state_id) = &input.state_id {
            fields.insert("stateId".into(), json!(state_id));
        }
        if let Some(assignee_id) = &input.assignee_id {
            fields.insert("assigneeId".into(), json!(assignee_id));
        }
        if let Some(priority) = input.priority {
            fields.insert("priority".into(), json!(priority));
        }
        if !input.label_ids.is_empty() {
            fields.insert("labelIds".into(), json!(input.label_ids));
        }
        if let Some(due_date) = &input.due_date {
            fields.insert("dueDate".into(), json!(due_date));
        }
        if let Some(parent_id) = &input.parent_id {
            fields.insert("parentId".into(), json!(parent_id));
        }
        let query = r#"
            mutation Create($input: IssueCreateInput!) {
                issueCreate(input: $input) { success issue { id } }
            }"#;
        let data = self.graphql(query, json!({ "input": fields })).await?;
        data["issueCreate"]["issue"]["id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| TransportError::decode("issueCreate returned no id"))
    }

    async fn update_issue(&self, id: &str, patch: &IssuePatch) -> Result<(), TransportError> {
        let mut fields = Map::new();
        if let Some(title) = &patch.title {
            fields.insert("title".into(), json!(title));
        }
        if let Some(description) = &patch.description {
            fields.insert("description".into(), json!(description));
        }
        if let Some(state_id) = &patch.state_id {
            fields.insert("stateId".into(), json!(state_id));
        }
        match &patch.assignee_id {
            Setting::Value(assignee_id) => {
                fields.insert("assigneeId".into(), json!(assignee_id));
            }
            Setting::Null => {
                fields.insert("assigneeId".into(), Value::Null);
            }
            Setting::Absent => {}
        }
        if let Some(priority) = patch.priority {
            fields.insert("priority".into(), json!(priority));
        }
        match &patch.due_date {
            Setting::Value(due) => {
                fields.insert("dueDate".into(), json!(due));
            }
            Setting::Null => {
                fields.insert("dueDate".into(), Value::Null);
            }
            Setting::Absent => {}
        }
        if let Some(label_ids) = &patch.label_ids {
            fields.insert("labelIds".into(), json!(label_ids));
        }
        let query = r#"
            mutation Update($id: String!, $input: IssueUpdateInput!) {
                issueUpdate(id: $id, input: $input) { success }
            }"#;
        let data = self
            .graphql(query, json!({ "id": id, "input": fields }))
            .await?;
        mutation_ok(&data, "issueUpdate")
    }

    async fn delete_issue(&self, id: &str) -> Result<(), TransportError> {
        let query = r#"
            mutation Delete($id: String!) {
                issueDelete(id: $id) { success }
            }"#;
        let data = self.graphql(query, json!({ "id": id })).await?;
        mutation_ok(&data, "issueDelete")
    }

    async fn create_comment(&self, issue_id: &str, body: &str) -> Result<(), TransportError> {
        let query = r#"
            mutation Comment($input: CommentCreateInput!) {
                commentCreate(input: $input) { success }
            }"#;
        let data = self
            .graphql(
                query,
                json!({ "input": { "issueId": issue_id, "body": body } }),
            )
            .await?;
        mutation_ok(&data, "commentCreate")
    }

    async fn get_comments(&self, issue_id: &str) -> Result<Vec<CommentRecord>, TransportError> {
        let query = r#"
            query Comments($id: String!) {
                issue(id: $id) { comments { nodes { id body } } }
            }"#;
        let data = self.graphql(query, json!({ "id": issue_id })).await?;
        Ok(nodes(&data, &["issue", "comments"])
            .iter()
            .filter_map(|c| {
                Some(CommentRecord {
                    id: c["id"].as_str()?.to_string(),
                    text: c["body"].as_str()?.to_string(),
                })
            })
            .collect())
    }

    async fn delete_comment(&self, id: &str) -> Result<(), TransportError> {
        let query = r#"
            mutation DeleteComment($id: String!) {
                commentDelete(id: $id) { success }
            }"#;
        let data = self.graphql(query, json!({ "id": id })).await?;
        mutation_ok(&data, "commentDelete")
    }

    async fn create_label(&self, name: &str) -> Result<NamedRecord, TransportError> {
        let team_id = self.team_id().await?;
        let query = r#"
            mutation CreateLabel($input: IssueLabelCreateInput!) {
                issueLabelCreate(input: $input) { success issueLabel { id name } }
            }"#;
        let data = self
            .graphql(
                query,
                json!({ "input": { "teamId": team_id, "name": name } }),
            )
            .await?;
        let label = &data["issueLabelCreate"]["issueLabel"];
        Ok(NamedRecord {
            id: label["id"]
                .as_str()
                .ok_or_else(|| TransportError::decode("issueLabelCreate returned no id"))?
                .to_string(),
            name: label["name"].as_str().unwrap_or(name).to_string(),
        })
    }

    async fn issue_label_ids(&self, issue_id: &str) -> Result<Vec<String>, TransportError> {
        let query = r#"
            query IssueLabels($id: String!) {
                issue(id: $id) { labels { nodes { id } } }
            }"#;
        let data = self.graphql(query, json!({ "id": issue_id })).await?;
        Ok(nodes(&data, &["issue", "labels"])
            .iter()
            .filter_map(|l| l["id"].as_str().map(String::from))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockApi {
        calls: Mutex<Vec<String>>,
        patches: Mutex<Vec<IssuePatch>>,
        labels_on_issue: Vec<String>,
    }

    impl MockApi {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn patches(&self) -> Vec<IssuePatch> {
            self.patches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LinearApi for MockApi {
        async fn fetch_workspace(&self) -> Result<WorkspaceSnapshot, TransportError> {
            Ok(WorkspaceSnapshot::default())
        }

        async fn create_issue(&self, input: &IssueInput) -> Result<String, TransportError> {
            self.record(format!(
                "create_issue:{}:parent={}:priority={:?}",
                input.title,
                input.parent_id.as_deref().unwrap_or(""),
                input.priority
            ));
            Ok(format!("issue-{}", input.title))
        }

        async fn update_issue(&self, id: &str, patch: &IssuePatch) -> Result<(), TransportError> {
            self.record(format!("update_issue:{id}"));
            self.patches.lock().unwrap().push(patch.clone());
            Ok(())
        }

        async fn delete_issue(&self, id: &str) -> Result<(), TransportError> {
            self.record(format!("delete_issue:{id}"));
            Ok(())
        }

        async fn create_comment(&self, issue_id: &str, body: &str) -> Result<(), TransportError> {
            self.record(format!("create_comment:{issue_id}:{body}"));
            Ok(())
        }

        async fn get_comments(
            &self,
            _issue_id: &str,
        ) -> Result<Vec<CommentRecord>, TransportError> {
            Ok(Vec::new())
        }

        async fn delete_comment(&self, id: &str) -> Result<(), TransportError> {
            self.record(format!("delete_comment:{id}"));
            Ok(())
        }

        async fn create_label(&self, name: &str) -> Result<NamedRecord, TransportError> {
            self.record(format!("create_label:{name}"));
            Ok(NamedRecord {
                id: format!("label-{name}"),
                name: name.to_string(),
            })
        }

        async fn issue_label_ids(&self, _issue_id: &str) -> Result<Vec<String>, TransportError> {
            Ok(self.labels_on_issue.clone())
        }
    }

    fn workspace() -> WorkspaceSnapshot {
        WorkspaceSnapshot {
            tasks: vec![
                TaskRecord {
                    id: "i-1".into(),
                    name: "Fix login bug".into(),
                    subtasks: vec![TaskRecord {
                        id: "i-1-a".into(),
                        name: "Add regression test".into(),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
                TaskRecord {
                    id: "i-2".into(),
                    name: "Write report".into(),
                    ..Default::default()
                },
            ],
            users: vec![UserRecord {
                id: "u-alice".into(),
                name: "Alice Chen".into(),
                email: Some("alice@example.com".into()),
            }],
            states: vec![
                NamedRecord {
                    id: "s-todo".into(),
                    name: "Todo".into(),
                },
                NamedRecord {
                    id: "s-progress".into(),
                    name: "In Progress".into(),
                },
                NamedRecord {
                    id: "s-done".into(),
                    name: "Done".into(),
                },
            ],
            labels: vec![NamedRecord {
                id: "lab-bug".into(),
                name: "bug".into(),
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_defaults_priority_to_medium() {
        let api = Arc::new(MockApi::default());
        let backend = LinearBackend::new(api.clone());
        let ops = vec![Operation::Create(CreateTask {
            title: "New issue".into(),
            ..Default::default()
        })];
        let results = backend.apply(&ops, &workspace()).await;
        assert!(results[0].success);
        assert_eq!(
            api.calls(),
            vec!["create_issue:New issue:parent=:priority=Some(3)".to_string()]
        );
    }

    #[tokio::test]
    async fn explicit_null_priority_clears_to_zero_but_absent_stays_away() {
        let api = Arc::new(MockApi::default());
        let backend = LinearBackend::new(api.clone());
        let ops = vec![
            Operation::Update(UpdateTask {
                target: "Fix login bug".into(),
                priority: Setting::Null,
                ..Default::default()
            }),
            Operation::Update(UpdateTask {
                target: "Fix login bug".into(),
                description: Some("new text".into()),
                ..Default::default()
            }),
        ];
        let results = backend.apply(&ops, &workspace()).await;
        assert!(results.iter().all(|r| r.success));
        let patches = api.patches();
        assert_eq!(patches[0].priority, Some(0));
        assert_eq!(patches[1].priority, None);
        assert_eq!(patches[1].description.as_deref(), Some("new text"));
    }

    #[tokio::test]
    async fn remove_assignee_sends_explicit_null() {
        let api = Arc::new(MockApi::default());
        let backend = LinearBackend::new(api.clone());
        let ops = vec![Operation::RemoveAssignee {
            target: "Write report".into(),
        }];
        let results = backend.apply(&ops, &workspace()).await;
        assert!(results[0].success);
        assert_eq!(api.patches()[0].assignee_id, Setting::Null);
    }

    #[tokio::test]
    async fn status_resolves_through_canonical_bucket() {
        let api = Arc::new(MockApi::default());
        let backend = LinearBackend::new(api.clone());
        let ops = vec![Operation::Update(UpdateTask {
            target: "Fix login bug".into(),
            status: Setting::Value("doing".into()),
            ..Default::default()
        })];
        let results = backend.apply(&ops, &workspace()).await;
        assert!(results[0].success);
        // "doing" misses every state name raw; the canonical bucket
        // "in progress" lands on the In Progress state.
        assert_eq!(api.patches()[0].state_id.as_deref(), Some("s-progress"));
    }

    #[tokio::test]
    async fn subtask_create_attaches_parent_id() {
        let api = Arc::new(MockApi::default());
        let backend = LinearBackend::new(api.clone());
        let ops = vec![Operation::CreateSubtask(CreateSubtask {
            parent: "Fix login bug".into(),
            title: "Add canary".into(),
            ..Default::default()
        })];
        let results = backend.apply(&ops, &workspace()).await;
        assert!(results[0].success);
        assert_eq!(
            api.calls(),
            vec!["create_issue:Add canary:parent=i-1:priority=None".to_string()]
        );
    }

    #[tokio::test]
    async fn subtask_update_resolves_within_parent_scope() {
        let api = Arc::new(MockApi::default());
        let backend = LinearBackend::new(api.clone());
        let ops = vec![Operation::UpdateSubtask(UpdateSubtask {
            parent: Some("Fix login bug".into()),
            target: "regression test".into(),
            new_title: Some("Add full regression suite".into()),
            ..Default::default()
        })];
        let results = backend.apply(&ops, &workspace()).await;
        assert!(results[0].success, "{results:?}");
        assert_eq!(api.calls(), vec!["update_issue:i-1-a".to_string()]);
    }

    #[tokio::test]
    async fn checklist_operations_are_unsupported() {
        let api = Arc::new(MockApi::default());
        let backend = LinearBackend::new(api.clone());
        let ops = vec![Operation::AddChecklistItem {
            target: "Fix login bug".into(),
            checklist: "Prep".into(),
            item: "x".into(),
        }];
        let results = backend.apply(&ops, &workspace()).await;
        assert_eq!(
            results[0].error.as_ref().unwrap().kind,
            ErrorKind::Unsupported
        );
    }

    #[tokio::test]
    async fn assign_label_appends_to_existing_set() {
        let api = Arc::new(MockApi {
            labels_on_issue: vec!["lab-bug".to_string()],
            ..Default::default()
        });
        let backend = LinearBackend::new(api.clone());
        let ops = vec![Operation::AssignLabel {
            target: "Write report".into(),
            label: "urgent-work".into(),
        }];
        let results = backend.apply(&ops, &workspace()).await;
        assert!(results[0].success);
        let patch = &api.patches()[0];
        assert_eq!(
            patch.label_ids.as_deref(),
            Some(&["lab-bug".to_string(), "label-urgent-work".to_string()][..])
        );
    }
}
