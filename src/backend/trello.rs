//! Trello backend.
//!
//! Trello has no native status or priority field: lists play the role of
//! status columns, so status changes become list moves and the applier
//! keeps a variation table mapping spoken column names ("todo", "doing")
//! onto whatever lists the board actually has. Checklists and comments are
//! native. Assignment uses replace semantics: a card carries exactly the
//! members of its last assign.

use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde_json::Value;
use tracing::{debug, warn};

use super::{Backend, TransportError};
use crate::config::TrelloConfig;
use crate::ops::canonical::squash;
use crate::ops::resolve::{self, Scope};
use crate::ops::{
    ChecklistSpec, CreateTask, ErrorKind, ItemState, Operation, OperationResult, Reflection,
    ReflectionKind, Setting, UpdateTask,
};
use crate::snapshot::{
    BatchLedger, ChecklistItemRecord, ChecklistRecord, CommentRecord, NamedRecord, TaskRecord,
    UserRecord, WorkspaceSnapshot,
};

const TRELLO_BASE: &str = "https://api.trello.com/1";

const LABEL_COLORS: &[&str] = &[
    "green", "yellow", "orange", "red", "purple", "blue", "sky", "lime", "pink", "black",
];

/// Spoken names for the common board columns. A requested status matching
/// any entry in a group resolves to the first list on the board whose name
/// matches any entry of the same group.
const LIST_VARIATIONS: &[&[&str]] = &[
    &["not started", "to do", "todo", "backlog", "new"],
    &["in progress", "doing", "ongoing", "active"],
    &["done", "completed", "finished", "complete"],
];

const GOING_WELL_LIST: &str = "What's going well?";
const NOT_GOING_WELL_LIST: &str = "What's not going well?";
const CHANGES_LIST: &str = "What changes/ideas to make?";

/// Patch for an existing card. `due` keeps the present-null distinction:
/// `Null` clears the due date, `Absent` leaves it alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardPatch {
    pub name: Option<String>,
    pub desc: Option<String>,
    pub due: Setting<String>,
}

impl CardPatch {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.desc.is_none() && self.due.is_absent()
    }
}

/// Remote calls the Trello applier needs.
#[async_trait]
pub trait TrelloApi: Send + Sync {
    async fn fetch_board(&self) -> Result<WorkspaceSnapshot, TransportError>;
    async fn create_list(&self, name: &str) -> Result<NamedRecord, TransportError>;
    async fn create_card(
        &self,
        list_id: &str,
        name: &str,
        desc: Option<&str>,
        due: Option<&str>,
    ) -> Result<String, TransportError>;
    async fn update_card(&self, card_id: &str, patch: &CardPatch) -> Result<(), TransportError>;
    async fn move_card(&self, card_id: &str, list_id: &str) -> Result<(), TransportError>;
    async fn delete_card(&self, card_id: &str) -> Result<(), TransportError>;
    async fn add_comment(&self, card_id: &str, text: &str) -> Result<(), TransportError>;
    async fn get_comments(&self, card_id: &str) -> Result<Vec<CommentRecord>, TransportError>;
    async fn delete_comment(&self, comment_id: &str) -> Result<(), TransportError>;
    async fn set_members(&self, card_id: &str, member_ids: &[String])
        -> Result<(), TransportError>;
    async fn create_label(&self, name: &str, color: &str) -> Result<NamedRecord, TransportError>;
    async fn add_label(&self, card_id: &str, label_id: &str) -> Result<(), TransportError>;
    async fn remove_label(&self, card_id: &str, label_id: &str) -> Result<(), TransportError>;
    async fn get_checklists(&self, card_id: &str)
        -> Result<Vec<ChecklistRecord>, TransportError>;
    async fn create_checklist(
        &self,
        card_id: &str,
        name: &str,
    ) -> Result<ChecklistRecord, TransportError>;
    async fn rename_checklist(&self, checklist_id: &str, name: &str)
        -> Result<(), TransportError>;
    async fn delete_checklist(&self, checklist_id: &str) -> Result<(), TransportError>;
    async fn add_item(
        &self,
        checklist_id: &str,
        name: &str,
    ) -> Result<ChecklistItemRecord, TransportError>;
    async fn update_item(
        &self,
        card_id: &str,
        item_id: &str,
        name: Option<&str>,
        state: Option<&str>,
    ) -> Result<(), TransportError>;
    async fn delete_item(&self, checklist_id: &str, item_id: &str) -> Result<(), TransportError>;
}

pub struct TrelloBackend {
    api: Arc<dyn TrelloApi>,
}

impl TrelloBackend {
    pub fn new(api: Arc<dyn TrelloApi>) -> Self {
        Self { api }
    }

    pub fn live(config: &TrelloConfig) -> Self {
        Self::new(Arc::new(TrelloClient::new(
            &config.api_key,
            &config.token,
            &config.board_id,
        )))
    }

    /// Pick the list a status name refers to: variation-group match first,
    /// then fuzzy resolution, then the board's first list.
    fn list_for_status(&self, status: Option<&str>, snapshot: &WorkspaceSnapshot) -> Option<String> {
        if let Some(status) = status {
            let wanted = squash(status);
            let group = LIST_VARIATIONS
                .iter()
                .find(|group| group.contains(&wanted.as_str()));
            if let Some(group) = group {
                for variant in *group {
                    if let Some(list) = snapshot
                        .sections
                        .iter()
                        .find(|l| squash(&l.name) == *variant)
                    {
                        return Some(list.id.clone());
                    }
                }
            }
            if let Some(list) = snapshot.resolve_section(status) {
                return Some(list.id.clone());
            }
        }
        snapshot.sections.first().map(|l| l.id.clone())
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
        let color = LABEL_COLORS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("blue");
        let label = self.api.create_label(name, color).await?;
        ledger.record_label(name, &label.id);
        Ok(label.id)
    }

    async fn ensure_list(
        &self,
        name: &str,
        snapshot: &WorkspaceSnapshot,
    ) -> Result<String, TransportError> {
        if let Some(list) = snapshot
            .sections
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(name))
        {
            return Ok(list.id.clone());
        }
        Ok(self.api.create_list(name).await?.id)
    }

    async fn attach_labels(
        &self,
        card_id: &str,
        labels: &[String],
        snapshot: &WorkspaceSnapshot,
        ledger: &mut BatchLedger,
    ) {
        for label in labels {
            match self.ensure_label(label, snapshot, ledger).await {
                Ok(label_id) => {
                    if let Err(e) = self.api.add_label(card_id, &label_id).await {
                        warn!(label, error = %e, "failed to attach label");
                    }
                }
                Err(e) => warn!(label, error = %e, "failed to create label"),
            }
        }
    }

    async fn set_assignee(
        &self,
        card_id: &str,
        assignee: &str,
        snapshot: &WorkspaceSnapshot,
    ) -> Option<String> {
        let Some(user) = snapshot.resolve_user(assignee) else {
            return Some(format!("member '{assignee}' not found"));
        };
        match self.api.set_members(card_id, &[user.id.clone()]).await {
            Ok(()) => None,
            Err(e) => Some(e.to_string()),
        }
    }

    async fn apply_create(
        &self,
        op: &Operation,
        spec: &CreateTask,
        snapshot: &WorkspaceSnapshot,
        ledger: &mut BatchLedger,
    ) -> OperationResult {
        let status = spec.section.as_deref().or(spec.status.as_deref());
        let Some(list_id) = self.list_for_status(status, snapshot) else {
            return OperationResult::failed(op, ErrorKind::Invalid, "board has no lists");
        };
        let card_id = match self
            .api
            .create_card(
                &list_id,
                &spec.title,
                spec.description.as_deref(),
                spec.due_date.as_deref(),
            )
            .await
        {
            Ok(id) => id,
            Err(e) => return OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
        };
        ledger.record_task(&spec.title, &card_id);

        if let Some(assignee) = &spec.assignee {
            if let Some(reason) = self.set_assignee(&card_id, assignee, snapshot).await {
                warn!(card = %spec.title, reason, "could not assign member on create");
            }
        }
        self.attach_labels(&card_id, &spec.labels, snapshot, ledger).await;
        if let Some(comment) = &spec.comment {
            if let Err(e) = self.api.add_comment(&card_id, comment).await {
                warn!(card = %spec.title, error = %e, "failed to add comment on create");
            }
        }
        if let Some(checklist) = &spec.checklist {
            if let Err(e) = self.populate_checklist(&card_id, checklist).await {
                warn!(card = %spec.title, error = %e, "failed to add checklist on create");
            }
        }
        if spec.priority.is_some() {
            debug!(card = %spec.title, "Trello has no priority field; ignoring priority");
        }
        OperationResult::ok(op)
    }

    async fn populate_checklist(
        &self,
        card_id: &str,
        spec: &ChecklistSpec,
    ) -> Result<(), TransportError> {
        let checklist = self.api.create_checklist(card_id, &spec.name).await?;
        for item in &spec.items {
            if let Err(e) = self.api.add_item(&checklist.id, item).await {
                warn!(item, error = %e, "failed to add checklist item");
            }
        }
        Ok(())
    }

    async fn apply_update(
        &self,
        op: &Operation,
        spec: &UpdateTask,
        snapshot: &WorkspaceSnapshot,
        ledger: &mut BatchLedger,
    ) -> OperationResult {
        let Some(card_id) = ledger.resolve_task_id(snapshot, &spec.target) else {
            return OperationResult::not_found(op, "card", &spec.target);
        };
        let patch = CardPatch {
            name: spec.new_title.clone(),
            desc: spec.description.clone(),
            due: spec.due_date.clone(),
        };
        let mut primary_done = false;
        if !patch.is_empty() {
            if let Err(e) = self.api.update_card(&card_id, &patch).await {
                return OperationResult::failed(op, ErrorKind::Remote, e.to_string());
            }
            primary_done = true;
            if let Some(new_name) = &spec.new_title {
                ledger.record_task(new_name, &card_id);
            }
        }
        match spec.status.as_deref() {
            Setting::Value(status) => {
                if let Some(list_id) = self.list_for_status(Some(status), snapshot) {
                    match self.api.move_card(&card_id, &list_id).await {
                        Ok(()) => {}
                        Err(e) if !primary_done => {
                            return OperationResult::failed(op, ErrorKind::Remote, e.to_string())
                        }
                        Err(e) => warn!(card = %spec.target, error = %e, "failed to move card"),
                    }
                }
            }
            Setting::Null => {
                // Clearing a status means moving back to the first list.
                if let Some(list_id) = snapshot.sections.first().map(|l| l.id.clone()) {
                    if let Err(e) = self.api.move_card(&card_id, &list_id).await {
                        warn!(card = %spec.target, error = %e, "failed to move card");
                    }
                }
            }
            Setting::Absent => {}
        }
        if let Some(section) = &spec.section {
            match self.ensure_list(section, snapshot).await {
                Ok(list_id) => {
                    if let Err(e) = self.api.move_card(&card_id, &list_id).await {
                        warn!(card = %spec.target, error = %e, "failed to move card to section");
                    }
                }
                Err(e) => warn!(section, error = %e, "failed to resolve section list"),
            }
        }
        match spec.assignee.as_deref() {
            Setting::Value(assignee) => {
                if let Some(reason) = self.set_assignee(&card_id, assignee, snapshot).await {
                    warn!(card = %spec.target, reason, "could not change assignee");
                }
            }
            Setting::Null => {
                if let Err(e) = self.api.set_members(&card_id, &[]).await {
                    warn!(card = %spec.target, error = %e, "failed to clear members");
                }
            }
            Setting::Absent => {}
        }
        self.attach_labels(&card_id, &spec.labels, snapshot, ledger).await;
        if !spec.priority.is_absent() {
            debug!(card = %spec.target, "Trello has no priority field; ignoring priority");
        }
        OperationResult::ok(op)
    }

    async fn resolve_checklist(
        &self,
        card_id: &str,
        reference: &str,
    ) -> Result<Option<ChecklistRecord>, TransportError> {
        let checklists = self.api.get_checklists(card_id).await?;
        let names: Vec<&str> = checklists.iter().map(|c| c.name.as_str()).collect();
        Ok(resolve::resolve(reference, &names, Scope::Checklist)
            .map(|i| checklists[i].clone()))
    }

    async fn apply_reflection(
        &self,
        op: &Operation,
        reflection: &Reflection,
        snapshot: &WorkspaceSnapshot,
        ledger: &mut BatchLedger,
    ) -> OperationResult {
        let list_name = match reflection.kind {
            ReflectionKind::Positive => GOING_WELL_LIST,
            ReflectionKind::Negative => NOT_GOING_WELL_LIST,
        };
        let list_id = match self.ensure_list(list_name, snapshot).await {
            Ok(id) => id,
            Err(e) => return OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
        };
        let mut desc = String::new();
        for (i, item) in reflection.items.iter().enumerate() {
            desc.push_str(&format!("{}. {item}\n", i + 1));
        }
        if !reflection.lessons.is_empty() {
            desc.push_str("\nLessons:\n");
            for lesson in &reflection.lessons {
                desc.push_str(&format!("- {lesson}\n"));
            }
        }
        let desc = (!desc.is_empty()).then_some(desc);
        match self
            .api
            .create_card(&list_id, &reflection.name, desc.as_deref(), None)
            .await
        {
            Ok(card_id) => {
                ledger.record_task(&reflection.name, &card_id);
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
                let Some(card_id) = ledger.resolve_task_id(snapshot, target) else {
                    return OperationResult::not_found(op, "card", target);
                };
                let patch = CardPatch {
                    name: Some(new_name.clone()),
                    ..Default::default()
                };
                match self.api.update_card(&card_id, &patch).await {
                    Ok(()) => {
                        ledger.record_task(new_name, &card_id);
                        OperationResult::ok(op)
                    }
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::Delete { target } => {
                let Some(card_id) = ledger.resolve_task_id(snapshot, target) else {
                    return OperationResult::not_found(op, "card", target);
                };
                match self.api.delete_card(&card_id).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::Comment { target, text } => {
                let Some(card_id) = ledger.resolve_task_id(snapshot, target) else {
                    return OperationResult::not_found(op, "card", target);
                };
                match self.api.add_comment(&card_id, text).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::DeleteComment { target, text } => {
                let Some(card_id) = ledger.resolve_task_id(snapshot, target) else {
                    return OperationResult::not_found(op, "card", target);
                };
                let comments = match self.api.get_comments(&card_id).await {
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
                let Some(card_id) = ledger.resolve_task_id(snapshot, target) else {
                    return OperationResult::not_found(op, "card", target);
                };
                let Some(user) = snapshot.resolve_user(assignee) else {
                    return OperationResult::not_found(op, "member", assignee);
                };
                match self.api.set_members(&card_id, &[user.id.clone()]).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::RemoveAssignee { target } => {
                let Some(card_id) = ledger.resolve_task_id(snapshot, target) else {
                    return OperationResult::not_found(op, "card", target);
                };
                match self.api.set_members(&card_id, &[]).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::CreateLabel { label, target } => {
                // Find-or-create: an existing label is a success.
                let label_id = match self.ensure_label(label, snapshot, ledger).await {
                    Ok(id) => id,
                    Err(e) => {
                        return OperationResult::failed(op, ErrorKind::Remote, e.to_string())
                    }
                };
                if let Some(target) = target {
                    match ledger.resolve_task_id(snapshot, target) {
                        Some(card_id) => {
                            if let Err(e) = self.api.add_label(&card_id, &label_id).await {
                                warn!(label, error = %e, "failed to attach new label");
                            }
                        }
                        None => warn!(label, target, "label target card not found"),
                    }
                }
                OperationResult::ok(op)
            }
            Operation::AssignLabel { target, label } => {
                let Some(card_id) = ledger.resolve_task_id(snapshot, target) else {
                    return OperationResult::not_found(op, "card", target);
                };
                let label_id = match self.ensure_label(label, snapshot, ledger).await {
                    Ok(id) => id,
                    Err(e) => return OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                };
                match self.api.add_label(&card_id, &label_id).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::RemoveLabel { target, label } => {
                let Some(card_id) = ledger.resolve_task_id(snapshot, target) else {
                    return OperationResult::not_found(op, "card", target);
                };
                let Some(label_id) = ledger.resolve_label_id(snapshot, label) else {
                    // Removing a label that does not exist is trivially done.
                    return OperationResult::ok(op);
                };
                if let Err(e) = self.api.remove_label(&card_id, &label_id).await {
                    warn!(label, error = %e, "label removal reported an error; treating as detached");
                }
                OperationResult::ok(op)
            }
            Operation::AddSection { target, section } => {
                let Some(card_id) = ledger.resolve_task_id(snapshot, target) else {
                    return OperationResult::not_found(op, "card", target);
                };
                let list_id = match self.ensure_list(section, snapshot).await {
                    Ok(id) => id,
                    Err(e) => return OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                };
                match self.api.move_card(&card_id, &list_id).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::RemoveSection { target } => {
                let Some(card_id) = ledger.resolve_task_id(snapshot, target) else {
                    return OperationResult::not_found(op, "card", target);
                };
                match snapshot.sections.first() {
                    Some(list) => match self.api.move_card(&card_id, &list.id).await {
                        Ok(()) => OperationResult::ok(op),
                        Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                    },
                    None => OperationResult::ok(op),
                }
            }
            Operation::RemoveStatus { .. } | Operation::RemovePriority { .. } => {
                OperationResult::failed(
                    op,
                    ErrorKind::Unsupported,
                    "Trello has no status or priority fields to clear",
                )
            }
            Operation::CreateChecklist { target, checklist } => {
                let Some(card_id) = ledger.resolve_task_id(snapshot, target) else {
                    return OperationResult::not_found(op, "card", target);
                };
                match self.populate_checklist(&card_id, checklist).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::UpdateChecklist {
                target,
                checklist,
                new_name,
            } => {
                let Some(card_id) = ledger.resolve_task_id(snapshot, target) else {
                    return OperationResult::not_found(op, "card", target);
                };
                match self.resolve_checklist(&card_id, checklist).await {
                    Ok(Some(found)) => match self.api.rename_checklist(&found.id, new_name).await {
                        Ok(()) => OperationResult::ok(op),
                        Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                    },
                    Ok(None) => OperationResult::not_found(op, "checklist", checklist),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::DeleteChecklist { target, checklist } => {
                let Some(card_id) = ledger.resolve_task_id(snapshot, target) else {
                    return OperationResult::not_found(op, "card", target);
                };
                match self.resolve_checklist(&card_id, checklist).await {
                    Ok(Some(found)) => match self.api.delete_checklist(&found.id).await {
                        Ok(()) => OperationResult::ok(op),
                        Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                    },
                    Ok(None) => OperationResult::not_found(op, "checklist", checklist),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::AddChecklistItem {
                target,
                checklist,
                item,
            } => {
                let Some(card_id) = ledger.resolve_task_id(snapshot, target) else {
                    return OperationResult::not_found(op, "card", target);
                };
                let found = match self.resolve_checklist(&card_id, checklist).await {
                    Ok(found) => found,
                    Err(e) => return OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                };
                let checklist_id = match found {
                    Some(found) => found.id,
                    None if resolve::is_positional(checklist) => {
                        return OperationResult::not_found(op, "checklist", checklist);
                    }
                    None => {
                        // Find-or-create on plain names.
                        let name = if checklist.is_empty() { "Checklist" } else { checklist };
                        match self.api.create_checklist(&card_id, name).await {
                            Ok(created) => created.id,
                            Err(e) => {
                                return OperationResult::failed(
                                    op,
                                    ErrorKind::Remote,
                                    e.to_string(),
                                )
                            }
                        }
                    }
                };
                match self.api.add_item(&checklist_id, item).await {
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
                let Some(card_id) = ledger.resolve_task_id(snapshot, target) else {
                    return OperationResult::not_found(op, "card", target);
                };
                let Ok(found) = self.resolve_checklist(&card_id, checklist).await else {
                    return OperationResult::failed(op, ErrorKind::Remote, "checklist fetch failed");
                };
                let Some(found) = found else {
                    return OperationResult::not_found(op, "checklist", checklist);
                };
                let names: Vec<&str> = found.items.iter().map(|i| i.name.as_str()).collect();
                let item_id = match resolve::resolve(item, &names, Scope::Item) {
                    Some(i) => found.items[i].id.clone(),
                    None if resolve::is_positional(item) => {
                        return OperationResult::not_found(op, "checklist item", item);
                    }
                    None => {
                        // Auto-create on update applies to plain names only.
                        match self.api.add_item(&found.id, item).await {
                            Ok(created) => created.id,
                            Err(e) => {
                                return OperationResult::failed(
                                    op,
                                    ErrorKind::Remote,
                                    e.to_string(),
                                )
                            }
                        }
                    }
                };
                let state = state.map(|s| match s {
                    ItemState::Complete => "complete",
                    ItemState::Incomplete => "incomplete",
                });
                match self
                    .api
                    .update_item(&card_id, &item_id, new_name.as_deref(), state)
                    .await
                {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::DeleteChecklistItem {
                target,
                checklist,
                item,
            } => {
                let Some(card_id) = ledger.resolve_task_id(snapshot, target) else {
                    return OperationResult::not_found(op, "card", target);
                };
                let Ok(found) = self.resolve_checklist(&card_id, checklist).await else {
                    return OperationResult::failed(op, ErrorKind::Remote, "checklist fetch failed");
                };
                let Some(found) = found else {
                    return OperationResult::not_found(op, "checklist", checklist);
                };
                let names: Vec<&str> = found.items.iter().map(|i| i.name.as_str()).collect();
                let Some(i) = resolve::resolve(item, &names, Scope::Item) else {
                    return OperationResult::not_found(op, "checklist item", item);
                };
                match self.api.delete_item(&found.id, &found.items[i].id).await {
                    Ok(()) => OperationResult::ok(op),
                    Err(e) => OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                }
            }
            Operation::AddReflection(reflection) => {
                self.apply_reflection(op, reflection, snapshot, ledger).await
            }
            Operation::CreateImprovementTask {
                name,
                description,
                checklist_items,
            } => {
                let list_id = match self.ensure_list(CHANGES_LIST, snapshot).await {
                    Ok(id) => id,
                    Err(e) => return OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                };
                let card_id = match self
                    .api
                    .create_card(&list_id, name, description.as_deref(), None)
                    .await
                {
                    Ok(id) => id,
                    Err(e) => return OperationResult::failed(op, ErrorKind::Remote, e.to_string()),
                };
                ledger.record_task(name, &card_id);
                if !checklist_items.is_empty() {
                    let spec = ChecklistSpec {
                        name: "Action items".into(),
                        items: checklist_items.clone(),
                    };
                    if let Err(e) = self.populate_checklist(&card_id, &spec).await {
                        warn!(card = %name, error = %e, "failed to add action items");
                    }
                }
                OperationResult::ok(op)
            }
            Operation::CreateSubtask(_)
            | Operation::UpdateSubtask(_)
            | Operation::DeleteSubtask { .. } => OperationResult::failed(
                op,
                ErrorKind::Unsupported,
                "Trello has no subtasks; use checklists instead",
            ),
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

#[async_trait]
impl Backend for TrelloBackend {
    fn id(&self) -> &str {
        "trello"
    }

    fn name(&self) -> &str {
        "Trello"
    }

    async fn fetch_snapshot(&self) -> Result<WorkspaceSnapshot, TransportError> {
        self.api.fetch_board().await
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

/// Live REST client. All calls carry `key`/`token` as query parameters.
pub struct TrelloClient {
    http: reqwest::Client,
    api_key: String,
    token: String,
    board_id: String,
}

impl TrelloClient {
    pub fn new(api_key: &str, token: &str, board_id: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.to_string(),
            token: token.to_string(),
            board_id: board_id.to_string(),
        }
    }

    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Value, TransportError> {
        let url = format!("{TRELLO_BASE}{path}");
        let mut query: Vec<(&str, &str)> = vec![("key", &self.api_key), ("token", &self.token)];
        query.extend_from_slice(params);
        let response = self.http.request(method, &url).query(&query).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TransportError::api("Trello", status.as_u16(), body));
        }
        if body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| TransportError::decode(e.to_string()))
    }

    async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, TransportError> {
        self.request(reqwest::Method::GET, path, params).await
    }

    async fn post(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, TransportError> {
        self.request(reqwest::Method::POST, path, params).await
    }

    async fn put(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, TransportError> {
        self.request(reqwest::Method::PUT, path, params).await
    }

    async fn delete(&self, path: &str) -> Result<(), TransportError> {
        self.request(reqwest::Method::DELETE, path, &[]).await?;
        Ok(())
    }
}

fn id_of(value: &Value) -> Result<String, TransportError> {
    value
        .get("id")
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| TransportError::decode("missing id in response"))
}

fn named_record(value: &Value) -> Result<NamedRecord, TransportError> {
    Ok(NamedRecord {
        id: id_of(value)?,
        name: value
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

#[async_trait]
impl TrelloApi for TrelloClient {
    async fn fetch_board(&self) -> Result<WorkspaceSnapshot, TransportError> {
        let board = &self.board_id;
        let lists_path = format!("/boards/{board}/lists");
        let cards_path = format!("/boards/{board}/cards");
        let labels_path = format!("/boards/{board}/labels");
        let members_path = format!("/boards/{board}/members");
        let (lists, cards, labels, members) = tokio::join!(
            self.get(&lists_path, &[]),
            self.get(&cards_path, &[("fields", "name,desc,idList,idLabels,idMembers")]),
            self.get(&labels_path, &[]),
            self.get(&members_path, &[]),
        );
        let (lists, cards, labels, members) = (lists?, cards?, labels?, members?);

        let sections: Vec<NamedRecord> = lists
            .as_array()
            .map(|arr| arr.iter().filter_map(|l| named_record(l).ok()).collect())
            .unwrap_or_default();
        let label_records: Vec<NamedRecord> = labels
            .as_array()
            .map(|arr| arr.iter().filter_map(|l| named_record(l).ok()).collect())
            .unwrap_or_default();
        let users: Vec<UserRecord> = members
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| {
                        Some(UserRecord {
                            id: m.get("id")?.as_str()?.to_string(),
                            name: m
                                .get("fullName")
                                .or_else(|| m.get("username"))?
                                .as_str()?
                                .to_string(),
                            email: None,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let tasks: Vec<TaskRecord> = cards
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|card| {
                        let list_name = card.get("idList").and_then(Value::as_str).and_then(|id| {
                            sections.iter().find(|l| l.id == id).map(|l| l.name.clone())
                        });
                        let card_labels = card
                            .get("idLabels")
                            .and_then(Value::as_array)
                            .map(|ids| {
                                ids.iter()
                                    .filter_map(Value::as_str)
                                    .filter_map(|id| {
                                        label_records
                                            .iter()
                                            .find(|l| l.id == id)
                                            .map(|l| l.name.clone())
                                    })
                                    .collect()
                            })
                            .unwrap_or_default();
                        Some(TaskRecord {
                            id: card.get("id")?.as_str()?.to_string(),
                            name: card.get("name")?.as_str()?.to_string(),
                            description: card
                                .get("desc")
                                .and_then(Value::as_str)
                                .filter(|d| !d.is_empty())
                                .map(String::from),
                            status: list_name,
                            labels: card_labels,
                            ..Default::default()
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(WorkspaceSnapshot {
            tasks,
            users,
            sections,
            labels: label_records,
            ..Default::default()
        })
    }

    async fn create_list(&self, name: &str) -> Result<NamedRecord, TransportError> {
        let value = self
            .post("/lists", &[("name", name), ("idBoard", &self.board_id)])
            .await?;
        named_record(&value)
    }

    async fn create_card(
        &self,
        list_id: &str,
        name: &str,
        desc: Option<&str>,
        due: Option<&str>,
    ) -> Result<String, TransportError> {
        let mut params = vec![("idList", list_id), ("name", name)];
        if let Some(desc) = desc {
            params.push(("desc", desc));
        }
        if let Some(due) = due {
            params.push(("due", due));
        }
        let value = self.post("/cards", &params).await?;
        id_of(&value)
    }

    async fn update_card(&self, card_id: &str, patch: &CardPatch) -> Result<(), TransportError> {
        let mut params: Vec<(&str, &str)> = Vec::new();
        if let Some(name) = &patch.name {
            params.push(("name", name));
        }
        if let Some(desc) = &patch.desc {
            params.push(("desc", desc));
        }
        match &patch.due {
            Setting::Value(due) => params.push(("due", due)),
            Setting::Null => params.push(("due", "null")),
            Setting::Absent => {}
        }
        self.put(&format!("/cards/{card_id}"), &params).await?;
        Ok(())
    }

    async fn move_card(&self, card_id: &str, list_id: &str) -> Result<(), TransportError> {
        self.put(&format!("/cards/{card_id}"), &[("idList", list_id)])
            .await?;
        Ok(())
    }

    async fn delete_card(&self, card_id: &str) -> Result<(), TransportError> {
        self.delete(&format!("/cards/{card_id}")).await
    }

    async fn add_comment(&self, card_id: &str, text: &str) -> Result<(), TransportError> {
        self.post(&format!("/cards/{card_id}/actions/comments"), &[("text", text)])
            .await?;
        Ok(())
    }

    async fn get_comments(&self, card_id: &str) -> Result<Vec<CommentRecord>, TransportError> {
        let value = self
            .get(
                &format!("/cards/{card_id}/actions"),
                &[("filter", "commentCard")],
            )
            .await?;
        Ok(value
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|action| {
                        Some(CommentRecord {
                            id: action.get("id")?.as_str()?.to_string(),
                            text: action
                                .get("data")?
                                .get("text")?
                                .as_str()?
                                .to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_comment(&self, comment_id: &str) -> Result<(), TransportError> {
        self.delete(&format!("/actions/{comment_id}")).await
    }

    async fn set_members(
        &self,
        card_id: &str,
        member_ids: &[String],
    ) -> Result<(), TransportError> {
        let joined = member_ids.join(",");
        self.put(&format!("/cards/{card_id}"), &[("idMembers", joined.as_str())])
            .await?;
        Ok(())
    }

    async fn create_label(&self, name: &str, color: &str) -> Result<NamedRecord, TransportError> {
        let value = self
            .post(
                "/labels",
                &[("name", name), ("color", color), ("idBoard", &self.board_id)],
            )
            .await?;
        named_record(&value)
    }

    async fn add_label(&self, card_id: &str, label_id: &str) -> Result<(), TransportError> {
        self.post(&format!("/cards/{card_id}/idLabels"), &[("value", label_id)])
            .await?;
        Ok(())
    }

    async fn remove_label(&self, card_id: &str, label_id: &str) -> Result<(), TransportError> {
        self.delete(&format!("/cards/{card_id}/idLabels/{label_id}"))
            .await
    }

    async fn get_checklists(
        &self,
        card_id: &str,
    ) -> Result<Vec<ChecklistRecord>, TransportError> {
        let value = self.get(&format!("/cards/{card_id}/checklists"), &[]).await?;
        Ok(value
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|checklist| {
                        let items = checklist
                            .get("checkItems")
                            .and_then(Value::as_array)
                            .map(|items| {
                                items
                                    .iter()
                                    .filter_map(|item| {
                                        Some(ChecklistItemRecord {
                                            id: item.get("id")?.as_str()?.to_string(),
                                            name: item.get("name")?.as_str()?.to_string(),
                                            done: item.get("state").and_then(Value::as_str)
                                                == Some("complete"),
                                        })
                                    })
                                    .collect()
                            })
                            .unwrap_or_default();
                        Some(ChecklistRecord {
                            id: checklist.get("id")?.as_str()?.to_string(),
                            name: checklist.get("name")?.as_str()?.to_string(),
                            items,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create_checklist(
        &self,
        card_id: &str,
        name: &str,
    ) -> Result<ChecklistRecord, TransportError> {
        let value = self
            .post("/checklists", &[("idCard", card_id), ("name", name)])
            .await?;
        Ok(ChecklistRecord {
            id: id_of(&value)?,
            name: name.to_string(),
            items: Vec::new(),
        })
    }

    async fn rename_checklist(
        &self,
        checklist_id: &str,
        name: &str,
    ) -> Result<(), TransportError> {
        self.put(&format!("/checklists/{checklist_id}/name"), &[("value", name)])
            .await?;
        Ok(())
    }

    async fn delete_checklist(&self, checklist_id: &str) -> Result<(), TransportError> {
        self.delete(&format!("/checklists/{checklist_id}")).await
    }

    async fn add_item(
        &self,
        checklist_id: &str,
        name: &str,
    ) -> Result<ChecklistItemRecord, TransportError> {
        let value = self
            .post(
                &format!("/checklists/{checklist_id}/checkItems"),
                &[("name", name)],
            )
            .await?;
        Ok(ChecklistItemRecord {
            id: id_of(&value)?,
            name: name.to_string(),
            done: false,
        })
    }

    async fn update_item(
        &self,
        card_id: &str,
        item_id: &str,
        name: Option<&str>,
        state: Option<&str>,
    ) -> Result<(), TransportError> {
        let mut params: Vec<(&str, &str)> = Vec::new();
        if let Some(name) = name {
            params.push(("name", name));
        }
        if let Some(state) = state {
            params.push(("state", state));
        }
        self.put(&format!("/cards/{card_id}/checkItem/{item_id}"), &params)
            .await?;
        Ok(())
    }

    async fn delete_item(
        &self,
        checklist_id: &str,
        item_id: &str,
    ) -> Result<(), TransportError> {
        self.delete(&format!("/checklists/{checklist_id}/checkItems/{item_id}"))
            .await
    }
}
