//! Asana backend.
//!
//! Asana has no native status or priority; both live in enum custom
//! fields attached to the project, so status and priority writes resolve
//! an option gid and clears send an explicit null for the field. Checklists
//! have no native shape either and are modeled as a subtask holding its
//! items as nested subtasks. Comments are stories.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::{Backend, TransportError};
use crate::config::AsanaConfig;
use crate::ops::canonical;
use crate::ops::resolve::{self, Scope};
use crate::ops::{
    ChecklistSpec, CreateSubtask, CreateTask, ErrorKind, ItemState, Operation, OperationResult,
    Setting, UpdateSubtask, UpdateTask,
};
use crate::snapshot::{
    BatchLedger, CommentRecord, CustomFieldRecord, NamedRecord, TaskRecord, UserRecord,
    WorkspaceSnapshot,
};

const ASANA_BASE: &str = "https://app.asana.com/api/1.0";

#[async_trait]
pub trait AsanaApi: Send + Sync {
    async fn fetch_project(&self) -> Result<WorkspaceSnapshot, TransportError>;
    async fn create_task(
        &self,
        name: &str,
        notes: Option<&str>,
        assignee_id: Option<&str>,
        due_on: Option<&str>,
    ) -> Result<String, TransportError>;
    /// Partial update; callers put explicit nulls in `fields` to clear.
    async fn update_task(
        &self,
        gid: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), TransportError>;
    async fn delete_task(&self, gid: &str) -> Result<(), TransportError>;
    async fn create_section(&self, name: &str) -> Result<NamedRecord, TransportError>;
    async fn add_to_section(&self, task_gid: &str, section_gid: &str)
        -> Result<(), TransportError>;
    async fn add_story(&self, task_gid: &str, text: &str) -> Result<(), TransportError>;
    async fn get_stories(&self, task_gid: &str) -> Result<Vec<CommentRecord>, TransportError>;
    async fn delete_story(&self, gid: &str) -> Result<(), TransportError>;
    async fn create_subtask(
        &self,
        parent_gid: &str,
        name: &str,
        assignee_id: Option<&str>,
        due_on: Option<&str>,
        completed: bool,
    ) -> Result<String, TransportError>;
    async fn get_subtasks(&self, task_gid: &str) -> Result<Vec<TaskRecord>, TransportError>;
    async fn set_completed(&self, gid: &str, completed: bool) -> Result<(), TransportError>;
}

pub struct AsanaBackend {
    api: Arc<dyn AsanaApi>,
}

impl AsanaBackend {
    pub fn new(api: Arc<dyn AsanaApi>) -> Self {
        Self { api }
    }

    pub fn live(config: &AsanaConfig) -> Self {
        Self::new(Arc::new(AsanaClient::new(&config.token, &config.project_id)))
    }

    fn field_named<'a>(
        &self,
        snapshot: &'a WorkspaceSnapshot,
        wanted: &str,
    ) -> Option<&'a CustomFieldRecord> {
        snapshot
            .custom_fields
            .iter()
            .find(|f| canonical::squash(&f.name).contains(wanted))
    }

    /// Resolve an enum option gid for a status value through the canonical
    /// bucket, then raw.
    fn status_option(&self, snapshot: &WorkspaceSnapshot, status: &str) -> Option<(String, String)> {
        let field = self.field_named(snapshot, "status")?;
        let names: Vec<&str> = field.options.iter().map(|o| o.name.as_str()).collect();
        let i = resolve::resolve(&canonical::canonical_status(status), &names, Scope::Section)
            .or_else(|| resolve::resolve(status, &names, Scope::Section))?;
        Some((field.id.clone(), field.options[i].id.clone()))
    }

    fn priority_option(&self, snapshot: &WorkspaceSnapshot, level: u8) -> Option<(String, String)> {
        let field = self.field_named(snapshot, "priority")?;
        let name = canonical::priority_name(level)?;
        let names: Vec<&str> = field.options.iter().map(|o| o.name.as_str()).collect();
        let i = resolve::resolve(name, &names, Scope::Section)?;
        Some((field.id.clone(), field.options[i].id.clone()))
    }

    fn resolve_task_id(
        &self,
        snapshot: &WorkspaceSnapshot,
        ledger: &BatchLedger,
        reference: &str,
    ) -> Option<String> {
        ledger.resolve_task_id(snapshot, reference)
    }

    async fn ensure_section(
        &self,
        name: &str,
        snapshot: &WorkspaceSnapshot,
    ) -> Result<String, TransportError> {
        if let Some(section) = snapshot.resolve_section(name) {
            return Ok(section.id.clone());
        }
        Ok(self.api.create_section(name).await?.id)
    }

    /// Find the subtask standing in for a checklist of this name, scoped to
    /// the given task.
    async fn resolve_checklist(
        &self,
        task_gid: &str,
        name: &str,
    ) -> Result<Option<TaskRecord>, TransportError> {
        let subtasks = self.api.get_subtasks(task_gid).await?;
        let names: Vec<&str> = subtasks.iter().map(|t| t.name.as_str()).collect();
        Ok(resolve::resolve(name, &names, Scope::Checklist).map(|i| subtasks[i].clone()))
    }

    async fn resolve_item(
        &self,
        checklist_gid: &str,
        reference: &str,
    ) -> Result<Option<TaskRecord>, TransportError> {
        let items = self.api.get_subtasks(checklist_gid).await?;
        let names: Vec<&str> = items.iter().map(|t| t.name.as_str()).collect();
        Ok(resolve::resolve(reference, &names, Scope::Item).map(|i| items[i].clone()))
    }

    async fn populate_checklist(
        &self,
        task_gid: &str,
        spec: &ChecklistSpec,
    ) -> Result<(), TransportError> {
        let checklist_gid = self
            .api
            .create_subtask(task_gid, &spec.name, None, None, false)
            .await?;
        for item in &spec.items {
            self.api
                .create_subtask(&checklist_gid, item, None, None, false)
                .await?;
        }
        Ok(())
    }

    async fn apply_create(
        &self,
        op: &Operation,
        spec: &CreateTask,
        snapshot: &WorkspaceSnapshot,
        ledger: &mut BatchLedger,
    ) -> OperationResult {
        let assignee_id = spec.assignee.as_deref().and_then(|a| {
            let user = snapshot.resolve_user(a);
            if user.is_none() {
                warn!(assignee = a, "assignee not found; creating unassigned");
            }
            user.map(|u| u.id.clone())
        });
        let gid = match self
            .api
            .create_task(
                &spec.title,
                spec.description.as_deref(),
                assignee_id.as_deref(),
                spec.due_date.as_deref(),
            )
            .await
        {
            Ok(gid) => gid,
            Err(e) => return OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
        };
        ledger.record_task(&spec.title, &gid);

        let mut custom = Map::new();
        if let Some(status) = &spec.status {
            match self.status_option(snapshot, status) {
                Some((field, option)) => {
                    custom.insert(field, json!(option));
                }
                None => warn!(status, "no status option matches"),
            }
        }
        if let Some(level) = spec.priority {
            match self.priority_option(snapshot, level) {
                Some((field, option)) => {
                    custom.insert(field, json!(option));
                }
                None => warn!(level, "no priority option matches"),
            }
        }
        if !custom.is_empty() {
            let mut fields = Map::new();
            fields.insert("custom_fields".into(), Value::Object(custom));
            if let Err(e) = self.api.update_task(&gid, &fields).await {
                warn!(task = %spec.title, error = %e, "failed to set custom fields on create");
            }
        }
        if let Some(section) = &spec.section {
            match self.ensure_section(section, snapshot).await {
                Ok(section_gid) => {
                    if let Err(e) = self.api.add_to_section(&gid, &section_gid).await {
                        warn!(section, error = %e, "failed to move into section");
                    }
                }
                Err(e) => warn!(section, error = %e, "failed to create section"),
            }
        }
        if let Some(comment) = &spec.comment {
            if let Err(e) = self.api.add_story(&gid, comment).await {
                warn!(task = %spec.title, error = %e, "failed to add comment on create");
            }
        }
        if let Some(checklist) = &spec.checklist {
            if let Err(e) = self.populate_checklist(&gid, checklist).await {
                warn!(task = %spec.title, error = %e, "failed to populate checklist");
            }
        }
        OperationResult::ok(op)
    }

    async fn apply_update(
        &self,
        op: &Operation,
        spec: &UpdateTask,
        snapshot: &WorkspaceSnapshot,
        ledger: &mut BatchLedger,
    ) -> OperationResult {
        let Some(gid) = self.resolve_task_id(snapshot, ledger, &spec.target) else {
            return OperationResult::not_found(op, "task", &spec.target);
        };
        let mut fields = Map::new();
        if let Some(new_title) = &spec.new_title {
            fields.insert("name".into(), json!(new_title));
        }
        if let Some(description) = &spec.description {
            fields.insert("notes".into(), json!(description));
        }
        match spec.assignee.as_deref() {
            Setting::Value(assignee) => match snapshot.resolve_user(assignee) {
                Some(user) => {
                    fields.insert("assignee".into(), json!(user.id));
                }
                None => warn!(assignee, "assignee not found; leaving unchanged"),
            },
            Setting::Null => {
                fields.insert("assignee".into(), Value::Null);
            }
            Setting::Absent => {}
        }
        match spec.due_date.as_deref() {
            Setting::Value(due) => {
                fields.insert("due_on".into(), json!(due));
            }
            Setting::Null => {
                fields.insert("due_on".into(), Value::Null);
            }
            Setting::Absent => {}
        }
        let mut custom = Map::new();
        match spec.status.as_deref() {
            Setting::Value(status) => match self.status_option(snapshot, status) {
                Some((field, option)) => {
                    custom.insert(field, json!(option));
                }
                None => warn!(status, "no status option matches"),
            },
            Setting::Null => {
                if let Some(field) = self.field_named(snapshot, "status") {
                    custom.insert(field.id.clone(), Value::Null);
                }
            }
            Setting::Absent => {}
        }
        match spec.priority {
            Setting::Value(level) => match self.priority_option(snapshot, level) {
                Some((field, option)) => {
                    custom.insert(field, json!(option));
                }
                None => warn!(level, "no priority option matches"),
            },
            Setting::Null => {
                if let Some(field) = self.field_named(snapshot, "priority") {
                    custom.insert(field.id.clone(), Value::Null);
                }
            }
            Setting::Absent => {}
        }
        if !custom.is_empty() {
            fields.insert("custom_fields".into(), Value::Object(custom));
        }
        if !fields.is_empty() {
            if let Err(e) = self.api.update_task(&gid, &fields).await {
                return OperationResult::failed(op, ErrorKind::Remote, e.to_string());
            }
            if let Some(new_title) = &spec.new_title {
                ledger.record_task(new_title, &gid);
            }
        }
        if let Some(section) = &spec.section {
            match self.ensure_section(section, snapshot).await {
                Ok(section_gid) => {
                    if let Err(e) = self.api.add_to_section(&gid, &section_gid).await {
                        warn!(section, error = %e, "failed to move into section");
                    }
                }
                Err(e) => warn!(section, error = %e, "failed to create section"),
            }
        }
        OperationResult::ok(op)
    }

    async fn clear_custom_field(
        &self,
        op: &Operation,
        target: &str,
        field_name: &str,
        snapshot: &WorkspaceSnapshot,
        ledger: &BatchLedger,
    ) -> OperationResult {
        let Some(gid) = self.resolve_task_id(snapshot, ledger, target) else {
            return OperationResult::not_found(op, "task", target);
        };
        let Some(field) = self.field_named(snapshot, field_name) else {
            return OperationResult::failed(
                op,
                ErrorKind::Unsupported,
                format!("project has no {field_name} field"),
            );
        };
        let mut custom = Map::new();
        custom.insert(field.id.clone(), Value::Null);
        let mut fields = Map::new();
        fields.insert("custom_fields".into(), Value::Object(custom));
        match self.api.update_task(&gid, &fields).await {
            Ok(()) => OperationResult::ok(op),
            Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
        }
    }

    async fn apply_create_subtask(
        &self,
        op: &Operation,
        spec: &CreateSubtask,
        snapshot: &WorkspaceSnapshot,
        ledger: &mut BatchLedger,
    ) -> OperationResult {
        let Some(parent_gid) = self.resolve_task_id(snapshot, ledger, &spec.parent) else {
            return OperationResult::not_found(op, "parent task", &spec.parent);
        };
        let assignee_id = spec
            .assignee
            .as_deref()
            .and_then(|a| snapshot.resolve_user(a))
            .map(|u| u.id.clone());
        let completed = spec
            .status
            .as_deref()
            .is_some_and(|s| is_done_status(s));
        match self
            .api
            .create_subtask(
                &parent_gid,
                &spec.title,
                assignee_id.as_deref(),
                spec.due_date.as_deref(),
                completed,
            )
            .await
        {
            Ok(gid) => {
                ledger.record_task(&spec.title, &gid);
                OperationResult::ok(op)
            }
            Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
        }
    }

    /// Subtask lookups go through the live subtask list of the parent when
    /// one is named; snapshot tasks otherwise.
    async fn resolve_subtask_gid(
        &self,
        snapshot: &WorkspaceSnapshot,
        ledger: &BatchLedger,
        parent: Option<&str>,
        reference: &str,
    ) -> Result<Option<String>, TransportError> {
        if let Some(gid) = ledger.task_id(reference) {
            return Ok(Some(gid.to_string()));
        }
        if let Some(parent_ref) = parent {
            let Some(parent_gid) = ledger.resolve_task_id(snapshot, parent_ref) else {
                return Ok(None);
            };
            let subtasks = self.api.get_subtasks(&parent_gid).await?;
            let names: Vec<&str> = subtasks.iter().map(|t| t.name.as_str()).collect();
            return Ok(resolve::resolve(reference, &names, Scope::Task)
                .map(|i| subtasks[i].id.clone()));
        }
        Ok(snapshot.resolve_task(reference).map(|t| t.id.clone()))
    }

    async fn apply_update_subtask(
        &self,
        op: &Operation,
        spec: &UpdateSubtask,
        snapshot: &WorkspaceSnapshot,
        ledger: &mut BatchLedger,
    ) -> OperationResult {
        let gid = match self
            .resolve_subtask_gid(snapshot, ledger, spec.parent.as_deref(), &spec.target)
            .await
        {
            Ok(Some(gid)) => gid,
            Ok(None) => return OperationResult::not_found(op, "subtask", &spec.target),
            Err(e) => return OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
        };
        if let Setting::Value(status) = spec.status.as_deref() {
            if let Err(e) = self.api.set_completed(&gid, is_done_status(status)).await {
                return OperationResult::failed(op, ErrorKind::Remote, e.to_string());
            }
        }
        let mut fields = Map::new();
        if let Some(new_title) = &spec.new_title {
            fields.insert("name".into(), json!(new_title));
        }
        if let Some(description) = &spec.description {
            fields.insert("notes".into(), json!(description));
        }
        match spec.assignee.as_deref() {
            Setting::Value(assignee) => {
                if let Some(user) = snapshot.resolve_user(assignee) {
                    fields.insert("assignee".into(), json!(user.id));
                }
            }
            Setting::Null => {
                fields.insert("assignee".into(), Value::Null);
            }
            Setting::Absent => {}
        }
        match spec.due_date.as_deref() {
            Setting::Value(due) => {
                fields.insert("due_on".into(), json!(due));
            }
            Setting::Null => {
                fields.insert("due_on".into(), Value::Null);
            }
            Setting::Absent => {}
        }
        if fields.is_empty() {
            return OperationResult::ok(op);
        }
        match self.api.update_task(&gid, &fields).await {
            Ok(()) => OperationResult::ok(op),
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
                let Some(gid) = self.resolve_task_id(snapshot, ledger, target) else {
                    return OperationResult::not_found(op, "task", target);
                };
                let mut fields = Map::new();
                fields.insert("name".into(), json!(new_name));
                match self.api.update_task(&gid, &fields).await {
                    Ok(()) => {
                        ledger.record_task(new_name, &gid);
                        OperationResult::ok(op)
                    }
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::Delete { target } => {
                let Some(gid) = self.resolve_task_id(snapshot, ledger, target) else {
                    return OperationResult::not_found(op, "task", target);
                };
                match self.api.delete_task(&gid).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::Comment { target, text } => {
                let Some(gid) = self.resolve_task_id(snapshot, ledger, target) else {
                    return OperationResult::not_found(op, "task", target);
                };
                match self.api.add_story(&gid, text).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::DeleteComment { target, text } => {
                let Some(gid) = self.resolve_task_id(snapshot, ledger, target) else {
                    return OperationResult::not_found(op, "task", target);
                };
                let stories = match self.api.get_stories(&gid).await {
                    Ok(stories) => stories,
                    Err(e) => return OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                };
                let needle = text.to_lowercase();
                let Some(story) = stories
                    .iter()
                    .find(|s| s.text.to_lowercase().contains(&needle))
                else {
                    return OperationResult::not_found(op, "comment", text);
                };
                match self.api.delete_story(&story.id).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::Assign { target, assignee } => {
                let Some(gid) = self.resolve_task_id(snapshot, ledger, target) else {
                    return OperationResult::not_found(op, "task", target);
                };
                let Some(user) = snapshot.resolve_user(assignee) else {
                    return OperationResult::not_found(op, "user", assignee);
                };
                let mut fields = Map::new();
                fields.insert("assignee".into(), json!(user.id));
                match self.api.update_task(&gid, &fields).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::RemoveAssignee { target } => {
                let Some(gid) = self.resolve_task_id(snapshot, ledger, target) else {
                    return OperationResult::not_found(op, "task", target);
                };
                let mut fields = Map::new();
                fields.insert("assignee".into(), Value::Null);
                match self.api.update_task(&gid, &fields).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::RemoveStatus { target } => {
                self.clear_custom_field(op, target, "status", snapshot, ledger)
                    .await
            }
            Operation::RemovePriority { target } => {
                self.clear_custom_field(op, target, "priority", snapshot, ledger)
                    .await
            }
            // Tags are left to the project's own conventions; once the
            // target resolves, the batch treats them as satisfied so one
            // stray tag op does not mark an otherwise-applied transcript
            // as failed.
            Operation::CreateLabel { label, target } => {
                if let Some(target) = target {
                    if self.resolve_task_id(snapshot, ledger, target).is_none() {
                        return OperationResult::not_found(op, "task", target);
                    }
                }
                debug!(label, "tag operations are a no-op on Asana");
                OperationResult::ok(op)
            }
            Operation::AssignLabel { target, label }
            | Operation::RemoveLabel { target, label } => {
                if self.resolve_task_id(snapshot, ledger, target).is_none() {
                    return OperationResult::not_found(op, "task", target);
                }
                debug!(label, "tag operations are a no-op on Asana");
                OperationResult::ok(op)
            }
            Operation::AddSection { target, section } => {
                let Some(gid) = self.resolve_task_id(snapshot, ledger, target) else {
                    return OperationResult::not_found(op, "task", target);
                };
                let section_gid = match self.ensure_section(section, snapshot).await {
                    Ok(gid) => gid,
                    Err(e) => return OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                };
                match self.api.add_to_section(&gid, &section_gid).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::RemoveSection { target } => {
                // "No section" does not exist in Asana; fall back to the
                // project's first (default) section.
                let Some(gid) = self.resolve_task_id(snapshot, ledger, target) else {
                    return OperationResult::not_found(op, "task", target);
                };
                let Some(section) = snapshot.sections.first() else {
                    return OperationResult::failed(
                        op,
                        ErrorKind::Unsupported,
                        "project has no sections",
                    );
                };
                match self.api.add_to_section(&gid, &section.id).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::CreateSubtask(spec) => {
                self.apply_create_subtask(op, spec, snapshot, ledger).await
            }
            Operation::UpdateSubtask(spec) => {
                self.apply_update_subtask(op, spec, snapshot, ledger).await
            }
            Operation::DeleteSubtask { parent, target } => {
                let gid = match self
                    .resolve_subtask_gid(snapshot, ledger, parent.as_deref(), target)
                    .await
                {
                    Ok(Some(gid)) => gid,
                    Ok(None) => return OperationResult::not_found(op, "subtask", target),
                    Err(e) => return OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                };
                match self.api.delete_task(&gid).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::CreateChecklist { target, checklist } => {
                let Some(gid) = self.resolve_task_id(snapshot, ledger, target) else {
                    return OperationResult::not_found(op, "task", target);
                };
                match self.populate_checklist(&gid, checklist).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::UpdateChecklist {
                target,
                checklist,
                new_name,
            } => {
                let Some(gid) = self.resolve_task_id(snapshot, ledger, target) else {
                    return OperationResult::not_found(op, "task", target);
                };
                let found = match self.resolve_checklist(&gid, checklist).await {
                    Ok(found) => found,
                    Err(e) => return OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                };
                let Some(record) = found else {
                    return OperationResult::not_found(op, "checklist", checklist);
                };
                let mut fields = Map::new();
                fields.insert("name".into(), json!(new_name));
                match self.api.update_task(&record.id, &fields).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::DeleteChecklist { target, checklist } => {
                let Some(gid) = self.resolve_task_id(snapshot, ledger, target) else {
                    return OperationResult::not_found(op, "task", target);
                };
                let found = match self.resolve_checklist(&gid, checklist).await {
                    Ok(found) => found,
                    Err(e) => return OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                };
                let Some(record) = found else {
                    return OperationResult::not_found(op, "checklist", checklist);
                };
                match self.api.delete_task(&record.id).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::AddChecklistItem {
                target,
                checklist,
                item,
            } => {
                let Some(gid) = self.resolve_task_id(snapshot, ledger, target) else {
                    return OperationResult::not_found(op, "task", target);
                };
                let found = match self.resolve_checklist(&gid, checklist).await {
                    Ok(found) => found,
                    Err(e) => return OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                };
                let Some(record) = found else {
                    return OperationResult::not_found(op, "checklist", checklist);
                };
                match self
                    .api
                    .create_subtask(&record.id, item, None, None, false)
                    .await
                {
                    Ok(_) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::UpdateChecklistItem {
                target,
                checklist,
                item,
                state,
                new_name,
            } => {
                let Some(gid) = self.resolve_task_id(snapshot, ledger, target) else {
                    return OperationResult::not_found(op, "task", target);
                };
                let found = match self.resolve_checklist(&gid, checklist).await {
                    Ok(found) => found,
                    Err(e) => return OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                };
                let Some(list) = found else {
                    return OperationResult::not_found(op, "checklist", checklist);
                };
                let found_item = match self.resolve_item(&list.id, item).await {
                    Ok(found_item) => found_item,
                    Err(e) => return OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                };
                let Some(record) = found_item else {
                    return OperationResult::not_found(op, "checklist item", item);
                };
                if let Some(state) = state {
                    let done = matches!(state, ItemState::Complete);
                    if let Err(e) = self.api.set_completed(&record.id, done).await {
                        return OperationResult::failed(op, ErrorKind::Remote, e.to_string());
                    }
                }
                if let Some(new_name) = new_name {
                    let mut fields = Map::new();
                    fields.insert("name".into(), json!(new_name));
                    if let Err(e) = self.api.update_task(&record.id, &fields).await {
                        return OperationResult::failed(op, ErrorKind::Remote, e.to_string());
                    }
                }
                OperationResult::ok(op)
            }
            Operation::DeleteChecklistItem {
                target,
                checklist,
                item,
            } => {
                let Some(gid) = self.resolve_task_id(snapshot, ledger, target) else {
                    return OperationResult::not_found(op, "task", target);
                };
                let found = match self.resolve_checklist(&gid, checklist).await {
                    Ok(found) => found,
                    Err(e) => return OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                };
                let Some(list) = found else {
                    return OperationResult::not_found(op, "checklist", checklist);
                };
                let found_item = match self.resolve_item(&list.id, item).await {
                    Ok(found_item) => found_item,
                    Err(e) => return OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                };
                let Some(record) = found_item else {
                    return OperationResult::not_found(op, "checklist item", item);
                };
                match self.api.delete_task(&record.id).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::AddReflection(_) | Operation::CreateImprovementTask { .. } => {
                OperationResult::failed(
                    op,
                    ErrorKind::Unsupported,
                    "reflection boards are not supported on Asana",
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
}

fn is_done_status(status: &str) -> bool {
    matches!(
        canonical::squash(status).as_str(),
        "done" | "complete" | "completed" | "finished"
    )
}

#[async_trait]
impl Backend for AsanaBackend {
    fn id(&self) -> &str {
        "asana"
    }

    fn name(&self) -> &str {
        "Asana"
    }

    async fn fetch_snapshot(&self) -> Result<WorkspaceSnapshot, TransportError> {
        self.api.fetch_project().await
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

/// Live REST client, authenticated with a personal access token.
pub struct AsanaClient {
    http: reqwest::Client,
    token: String,
    project_id: String,
}

impl AsanaClient {
    pub fn new(token: &str, project_id: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.to_string(),
            project_id: project_id.to_string(),
        }
    }

    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, TransportError> {
        let mut req = self
            .http
            .request(method, format!("{ASANA_BASE}{path}"))
            .bearer_auth(&self.token);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(TransportError::api("Asana", status.as_u16(), text));
        }
        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| TransportError::decode(e.to_string()))
    }

    async fn get(&self, path: &str) -> Result<Value, TransportError> {
        self.request(reqwest::Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, TransportError> {
        self.request(reqwest::Method::POST, path, Some(body)).await
    }

    async fn put(&self, path: &str, body: Value) -> Result<Value, TransportError> {
        self.request(reqwest::Method::PUT, path, Some(body)).await
    }
}

fn data_array(value: &Value) -> Vec<Value> {
    value["data"].as_array().cloned().unwrap_or_default()
}

fn gid_of(value: &Value) -> Result<String, TransportError> {
    value["data"]["gid"]
        .as_str()
        .map(String::from)
        .ok_or_else(|| TransportError::decode("response carried no gid"))
}

fn task_record(value: &Value) -> Option<TaskRecord> {
    Some(TaskRecord {
        id: value["gid"].as_str()?.to_string(),
        name: value["name"].as_str()?.to_string(),
        description: value["notes"].as_str().map(String::from),
        ..Default::default()
    })
}

#[async_trait]
impl AsanaApi for AsanaClient {
    async fn fetch_project(&self) -> Result<WorkspaceSnapshot, TransportError> {
        let project = self.get(&format!("/projects/{}", self.project_id)).await?;
        let workspace_gid = project["data"]["workspace"]["gid"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| TransportError::decode("project carried no workspace"))?;

        let pid = &self.project_id;
        let tasks_path = format!("/projects/{pid}/tasks?opt_fields=name,notes");
        let sections_path = format!("/projects/{pid}/sections");
        let fields_path = format!(
            "/projects/{pid}/custom_field_settings?opt_fields=custom_field.name,custom_field.enum_options.name"
        );
        let users_path = format!("/workspaces/{workspace_gid}/users?opt_fields=name,email");
        let (tasks, sections, field_settings, users) = tokio::join!(
            self.get(&tasks_path),
            self.get(&sections_path),
            self.get(&fields_path),
            self.get(&users_path),
        );

        let tasks: Vec<TaskRecord> = data_array(&tasks?)
            .iter()
            .filter_map(task_record)
            .collect();
        let sections: Vec<NamedRecord> = data_array(&sections?)
            .iter()
            .filter_map(|s| {
                Some(NamedRecord {
                    id: s["gid"].as_str()?.to_string(),
                    name: s["name"].as_str()?.to_string(),
                })
            })
            .collect();
        let custom_fields: Vec<CustomFieldRecord> = data_array(&field_settings?)
            .iter()
            .filter_map(|setting| {
                let field = &setting["custom_field"];
                Some(CustomFieldRecord {
                    id: field["gid"].as_str()?.to_string(),
                    name: field["name"].as_str()?.to_string(),
                    options: field["enum_options"]
                        .as_array()
                        .map(|options| {
                            options
                                .iter()
                                .filter_map(|o| {
                                    Some(NamedRecord {
                                        id: o["gid"].as_str()?.to_string(),
                                        name: o["name"].as_str()?.to_string(),
                                    })
                                })
                                .collect()
                        })
                        .unwrap_or_default(),
                })
            })
            .collect();
        let users: Vec<UserRecord> = data_array(&users?)
            .iter()
            .filter_map(|u| {
                Some(UserRecord {
                    id: u["gid"].as_str()?.to_string(),
                    name: u["name"].as_str()?.to_string(),
                    email: u["email"].as_str().map(String::from),
                })
            })
            .collect();

        Ok(WorkspaceSnapshot {
            tasks,
            users,
            sections,
            custom_fields,
            ..Default::default()
        })
    }

    async fn create_task(
        &self,
        name: &str,
        notes: Option<&str>,
        assignee_id: Option<&str>,
        due_on: Option<&str>,
    ) -> Result<String, TransportError> {
        let mut data = Map::new();
        data.insert("name".into(), json!(name));
        data.insert("projects".into(), json!([self.project_id]));
        if let Some(notes) = notes {
            data.insert("notes".into(), json!(notes));
        }
        if let Some(assignee) = assignee_id {
            data.insert("assignee".into(), json!(assignee));
        }
        if let Some(due) = due_on {
            data.insert("due_on".into(), json!(due));
        }
        let response = self.post("/tasks", json!({ "data": data })).await?;
        gid_of(&response)
    }

    async fn update_task(
        &self,
        gid: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), TransportError> {
        self.put(&format!("/tasks/{gid}"), json!({ "data": fields }))
            .await?;
        Ok(())
    }

    async fn delete_task(&self, gid: &str) -> Result<(), TransportError> {
        self.request(reqwest::Method::DELETE, &format!("/tasks/{gid}"), None)
            .await?;
        Ok(())
    }

    async fn create_section(&self, name: &str) -> Result<NamedRecord, TransportError> {
        let response = self
            .post(
                &format!("/projects/{}/sections", self.project_id),
                json!({ "data": { "name": name } }),
            )
            .await?;
        Ok(NamedRecord {
            id: gid_of(&response)?,
            name: name.to_string(),
        })
    }

    async fn add_to_section(
        &self,
        task_gid: &str,
        section_gid: &str,
    ) -> Result<(), TransportError> {
        self.post(
            &format!("/sections/{section_gid}/addTask"),
            json!({ "data": { "task": task_gid } }),
        )
        .await?;
        Ok(())
    }

    async fn add_story(&self, task_gid: &str, text: &str) -> Result<(), TransportError> {
        self.post(
            &format!("/tasks/{task_gid}/stories"),
            json!({ "data": { "text": text } }),
        )
        .await?;
        Ok(())
    }

    async fn get_stories(&self, task_gid: &str) -> Result<Vec<CommentRecord>, TransportError> {
        let response = self
            .get(&format!("/tasks/{task_gid}/stories?opt_fields=text,type"))
            .await?;
        Ok(data_array(&response)
            .iter()
            .filter(|s| s["type"].as_str() == Some("comment") || s["type"].is_null())
            .filter_map(|s| {
                Some(CommentRecord {
                    id: s["gid"].as_str()?.to_string(),
                    text: s["text"].as_str()?.to_string(),
                })
            })
            .collect())
    }

    async fn delete_story(&self, gid: &str) -> Result<(), TransportError> {
        self.request(reqwest::Method::DELETE, &format!("/stories/{gid}"), None)
            .await?;
        Ok(())
    }

    async fn create_subtask(
        &self,
        parent_gid: &str,
        name: &str,
        assignee_id: Option<&str>,
        due_on: Option<&str>,
        completed: bool,
    ) -> Result<String, TransportError> {
        let mut data = Map::new();
        data.insert("name".into(), json!(name));
        if let Some(assignee) = assignee_id {
            data.insert("assignee".into(), json!(assignee));
        }
        if let Some(due) = due_on {
            data.insert("due_on".into(), json!(due));
        }
        if completed {
            data.insert("completed".into(), json!(true));
        }
        let response = self
            .post(
                &format!("/tasks/{parent_gid}/subtasks"),
                json!({ "data": data }),
            )
            .await?;
        gid_of(&response)
    }

    async fn get_subtasks(&self, task_gid: &str) -> Result<Vec<TaskRecord>, TransportError> {
        let response = self
            .get(&format!("/tasks/{task_gid}/subtasks?opt_fields=name,notes"))
            .await?;
        Ok(data_array(&response).iter().filter_map(task_record).collect())
    }

    async fn set_completed(&self, gid: &str, completed: bool) -> Result<(), TransportError> {
        let mut fields = Map::new();
        fields.insert("completed".into(), json!(completed));
        self.update_task(gid, &fields).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockApi {
        calls: Mutex<Vec<String>>,
        updates: Mutex<Vec<(String, Map<String, Value>)>>,
        subtasks: HashMap<String, Vec<TaskRecord>>,
        stories: Vec<CommentRecord>,
    }

    impl MockApi {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn updates(&self) -> Vec<(String, Map<String, Value>)> {
            self.updates.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AsanaApi for MockApi {
        async fn fetch_project(&self) -> Result<WorkspaceSnapshot, TransportError> {
            Ok(WorkspaceSnapshot::default())
        }

        async fn create_task(
            &self,
            name: &str,
            _notes: Option<&str>,
            assignee_id: Option<&str>,
            _due_on: Option<&str>,
        ) -> Result<String, TransportError> {
            self.record(format!(
                "create_task:{name}:assignee={}",
                assignee_id.unwrap_or("")
            ));
            Ok(format!("gid-{name}"))
        }

        async fn update_task(
            &self,
            gid: &str,
            fields: &Map<String, Value>,
        ) -> Result<(), TransportError> {
            self.record(format!("update_task:{gid}"));
            self.updates.lock().unwrap().push((gid.to_string(), fields.clone()));
            Ok(())
        }

        async fn delete_task(&self, gid: &str) -> Result<(), TransportError> {
            self.record(format!("delete_task:{gid}"));
            Ok(())
        }

        async fn create_section(&self, name: &str) -> Result<NamedRecord, TransportError> {
            self.record(format!("create_section:{name}"));
            Ok(NamedRecord {
                id: format!("sec-{name}"),
                name: name.to_string(),
            })
        }

        async fn add_to_section(
            &self,
            task_gid: &str,
            section_gid: &str,
        ) -> Result<(), TransportError> {
            self.record(format!("add_to_section:{task_gid}:{section_gid}"));
            Ok(())
        }

        async fn add_story(&self, task_gid: &str, text: &str) -> Result<(), TransportError> {
            self.record(format!("add_story:{task_gid}:{text}"));
            Ok(())
        }

        async fn get_stories(
            &self,
            _task_gid: &str,
        ) -> Result<Vec<CommentRecord>, TransportError> {
            Ok(self.stories.clone())
        }

        async fn delete_story(&self, gid: &str) -> Result<(), TransportError> {
            self.record(format!("delete_story:{gid}"));
            Ok(())
        }

        async fn create_subtask(
            &self,
            parent_gid: &str,
            name: &str,
            _assignee_id: Option<&str>,
            _due_on: Option<&str>,
            completed: bool,
        ) -> Result<String, TransportError> {
            self.record(format!("create_subtask:{parent_gid}:{name}:done={completed}"));
            Ok(format!("sub-{name}"))
        }

        async fn get_subtasks(&self, task_gid: &str) -> Result<Vec<TaskRecord>, TransportError> {
            Ok(self.subtasks.get(task_gid).cloned().unwrap_or_default())
        }

        async fn set_completed(&self, gid: &str, completed: bool) -> Result<(), TransportError> {
            self.record(format!("set_completed:{gid}:{completed}"));
            Ok(())
        }
    }

    fn project() -> WorkspaceSnapshot {
        WorkspaceSnapshot {
            tasks: vec![TaskRecord {
                id: "gid-1".into(),
                name: "Draft launch plan".into(),
                ..Default::default()
            }],
            users: vec![UserRecord {
                id: "u-dana".into(),
                name: "Dana Ortiz".into(),
                email: None,
            }],
            sections: vec![
                NamedRecord {
                    id: "sec-backlog".into(),
                    name: "Backlog".into(),
                },
                NamedRecord {
                    id: "sec-doing".into(),
                    name: "Doing".into(),
                },
            ],
            custom_fields: vec![
                CustomFieldRecord {
                    id: "cf-status".into(),
                    name: "Status".into(),
                    options: vec![
                        NamedRecord {
                            id: "opt-on-track".into(),
                            name: "On Track".into(),
                        },
                        NamedRecord {
                            id: "opt-at-risk".into(),
                            name: "At Risk".into(),
                        },
                        NamedRecord {
                            id: "opt-off-track".into(),
                            name: "Off Track".into(),
                        },
                    ],
                },
                CustomFieldRecord {
                    id: "cf-priority".into(),
                    name: "Priority".into(),
                    options: vec![
                        NamedRecord {
                            id: "opt-high".into(),
                            name: "High".into(),
                        },
                        NamedRecord {
                            id: "opt-medium".into(),
                            name: "Medium".into(),
                        },
                        NamedRecord {
                            id: "opt-low".into(),
                            name: "Low".into(),
                        },
                    ],
                },
            ],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn explicit_null_priority_clears_field_but_absent_leaves_it_alone() {
        let api = Arc::new(MockApi::default());
        let backend = AsanaBackend::new(api.clone());
        let ops = vec![
            Operation::Update(UpdateTask {
                target: "Draft launch plan".into(),
                priority: Setting::Null,
                ..Default::default()
            }),
            Operation::Update(UpdateTask {
                target: "Draft launch plan".into(),
                description: Some("updated".into()),
                ..Default::default()
            }),
        ];
        let results = backend.apply(&ops, &project()).await;
        assert!(results.iter().all(|r| r.success));
        let updates = api.updates();
        let custom = updates[0].1["custom_fields"].as_object().unwrap();
        assert_eq!(custom["cf-priority"], Value::Null);
        assert!(!updates[1].1.contains_key("custom_fields"));
    }

    #[tokio::test]
    async fn status_resolves_to_enum_option_via_canonical_bucket() {
        let api = Arc::new(MockApi::default());
        let backend = AsanaBackend::new(api.clone());
        let ops = vec![Operation::Update(UpdateTask {
            target: "Draft launch plan".into(),
            status: Setting::Value("blocked".into()),
            ..Default::default()
        })];
        let results = backend.apply(&ops, &project()).await;
        assert!(results[0].success);
        let updates = api.updates();
        let custom = updates[0].1["custom_fields"].as_object().unwrap();
        // "blocked" canonicalizes to "off track".
        assert_eq!(custom["cf-status"], json!("opt-off-track"));
    }

    #[tokio::test]
    async fn remove_assignee_sends_explicit_null() {
        let api = Arc::new(MockApi::default());
        let backend = AsanaBackend::new(api.clone());
        let ops = vec![Operation::RemoveAssignee {
            target: "Draft launch plan".into(),
        }];
        let results = backend.apply(&ops, &project()).await;
        assert!(results[0].success);
        assert_eq!(api.updates()[0].1["assignee"], Value::Null);
    }

    #[tokio::test]
    async fn checklist_items_are_nested_subtasks() {
        let api = Arc::new(MockApi::default());
        let backend = AsanaBackend::new(api.clone());
        let ops = vec![Operation::CreateChecklist {
            target: "Draft launch plan".into(),
            checklist: ChecklistSpec {
                name: "Pre-launch".into(),
                items: vec!["Write copy".into(), "Book venue".into()],
            },
        }];
        let results = backend.apply(&ops, &project()).await;
        assert!(results[0].success);
        assert_eq!(
            api.calls(),
            vec![
                "create_subtask:gid-1:Pre-launch:done=false".to_string(),
                "create_subtask:sub-Pre-launch:Write copy:done=false".to_string(),
                "create_subtask:sub-Pre-launch:Book venue:done=false".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn checklist_item_completion_resolves_positionally() {
        let mut subtasks = HashMap::new();
        subtasks.insert(
            "gid-1".to_string(),
            vec![TaskRecord {
                id: "sub-list".into(),
                name: "Pre-launch".into(),
                ..Default::default()
            }],
        );
        subtasks.insert(
            "sub-list".to_string(),
            vec![
                TaskRecord {
                    id: "item-1".into(),
                    name: "Write copy".into(),
                    ..Default::default()
                },
                TaskRecord {
                    id: "item-2".into(),
                    name: "Book venue".into(),
                    ..Default::default()
                },
            ],
        );
        let api = Arc::new(MockApi {
            subtasks,
            ..Default::default()
        });
        let backend = AsanaBackend::new(api.clone());
        let ops = vec![Operation::UpdateChecklistItem {
            target: "Draft launch plan".into(),
            checklist: "Pre-launch".into(),
            item: "second item".into(),
            state: Some(ItemState::Complete),
            new_name: None,
        }];
        let results = backend.apply(&ops, &project()).await;
        assert!(results[0].success, "{results:?}");
        assert_eq!(api.calls(), vec!["set_completed:item-2:true".to_string()]);
    }

    #[tokio::test]
    async fn tag_operations_succeed_without_remote_calls() {
        let api = Arc::new(MockApi::default());
        let backend = AsanaBackend::new(api.clone());
        let ops = vec![Operation::AssignLabel {
            target: "Draft launch plan".into(),
            label: "urgent".into(),
        }];
        let results = backend.apply(&ops, &project()).await;
        assert!(results[0].success);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn tag_operation_on_missing_task_fails() {
        let api = Arc::new(MockApi::default());
        let backend = AsanaBackend::new(api.clone());
        let ops = vec![Operation::AssignLabel {
            target: "nonexistent task".into(),
            label: "urgent".into(),
        }];
        let results = backend.apply(&ops, &WorkspaceSnapshot::default()).await;
        assert!(!results[0].success);
        assert_eq!(results[0].error.as_ref().unwrap().kind, ErrorKind::NotFound);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn remove_section_falls_back_to_first_section() {
        let api = Arc::new(MockApi::default());
        let backend = AsanaBackend::new(api.clone());
        let ops = vec![Operation::RemoveSection {
            target: "Draft launch plan".into(),
        }];
        let results = backend.apply(&ops, &project()).await;
        assert!(results[0].success);
        assert_eq!(
            api.calls(),
            vec!["add_to_section:gid-1:sec-backlog".to_string()]
        );
    }

    #[tokio::test]
    async fn delete_comment_matches_story_by_substring() {
        let api = Arc::new(MockApi {
            stories: vec![
                CommentRecord {
                    id: "st-1".into(),
                    text: "Kickoff went well".into(),
                },
                CommentRecord {
                    id: "st-2".into(),
                    text: "Waiting on budget approval".into(),
                },
            ],
            ..Default::default()
        });
        let backend = AsanaBackend::new(api.clone());
        let ops = vec![Operation::DeleteComment {
            target: "Draft launch plan".into(),
            text: "budget".into(),
        }];
        let results = backend.apply(&ops, &project()).await;
        assert!(results[0].success);
        assert_eq!(api.calls(), vec!["delete_story:st-2".to_string()]);
    }

    #[tokio::test]
    async fn reflections_are_unsupported() {
        let api = Arc::new(MockApi::default());
        let backend = AsanaBackend::new(api.clone());
        let ops = vec![Operation::CreateImprovementTask {
            name: "Automate deploys".into(),
            description: None,
            checklist_items: Vec::new(),
        }];
        let results = backend.apply(&ops, &project()).await;
        assert_eq!(
            results[0].error.as_ref().unwrap().kind,
            ErrorKind::Unsupported
        );
    }

    #[tokio::test]
    async fn missing_status_field_makes_remove_status_unsupported() {
        let api = Arc::new(MockApi::default());
        let backend = AsanaBackend::new(api.clone());
        let mut snapshot = project();
        snapshot.custom_fields.clear();
        let ops = vec![Operation::RemoveStatus {
            target: "Draft launch plan".into(),
        }];
        let results = backend.apply(&ops, &snapshot).await;
        assert_eq!(
            results[0].error.as_ref().unwrap().kind,
            ErrorKind::Unsupported
        );
    }
}
