//! Operation model for the reconciliation pipeline.
//!
//! Operations arrive as loosely-structured JSON from the extraction step
//! and are parsed into one tagged variant per intent, each carrying only
//! the fields valid for that intent. Clearable fields use [`Setting`] so
//! that "key present with null" (clear the remote value) stays distinct
//! from "key absent" (leave the remote value alone) all the way to the
//! backend call.

pub mod canonical;
pub mod parse;
pub mod resolve;
pub mod sequence;
pub mod signature;
pub mod summary;

use serde::Serialize;
use serde_json::{Map, Value};

/// Tri-state for clearable fields on update-like operations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Setting<T> {
    /// Key absent from the payload: leave the remote value unchanged.
    #[default]
    Absent,
    /// Key present with an explicit null: clear the remote value.
    Null,
    /// Key present with a value: set the remote value.
    Value(T),
}

impl<T> Setting<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Setting::Absent)
    }

    pub fn as_ref(&self) -> Setting<&T> {
        match self {
            Setting::Absent => Setting::Absent,
            Setting::Null => Setting::Null,
            Setting::Value(v) => Setting::Value(v),
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Setting::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl Setting<String> {
    pub fn as_deref(&self) -> Setting<&str> {
        match self {
            Setting::Absent => Setting::Absent,
            Setting::Null => Setting::Null,
            Setting::Value(v) => Setting::Value(v.as_str()),
        }
    }
}

/// A checklist payload on create-like operations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChecklistSpec {
    pub name: String,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Complete,
    Incomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflectionKind {
    Positive,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<u8>,
    pub assignee: Option<String>,
    pub due_date: Option<String>,
    pub labels: Vec<String>,
    pub section: Option<String>,
    pub comment: Option<String>,
    pub checklist: Option<ChecklistSpec>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateTask {
    pub target: String,
    pub new_title: Option<String>,
    pub description: Option<String>,
    pub status: Setting<String>,
    pub priority: Setting<u8>,
    pub assignee: Setting<String>,
    pub due_date: Setting<String>,
    pub labels: Vec<String>,
    pub section: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateSubtask {
    pub parent: String,
    pub title: String,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub due_date: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateSubtask {
    pub parent: Option<String>,
    pub target: String,
    pub new_title: Option<String>,
    pub description: Option<String>,
    pub status: Setting<String>,
    pub assignee: Setting<String>,
    pub due_date: Setting<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reflection {
    pub kind: ReflectionKind,
    pub name: String,
    pub items: Vec<String>,
    pub lessons: Vec<String>,
}

/// One intended mutation against the remote workspace.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Create(CreateTask),
    Update(UpdateTask),
    Rename { target: String, new_name: String },
    Delete { target: String },
    Comment { target: String, text: String },
    DeleteComment { target: String, text: String },
    Assign { target: String, assignee: String },
    RemoveAssignee { target: String },
    RemoveStatus { target: String },
    RemovePriority { target: String },
    CreateLabel { label: String, target: Option<String> },
    AssignLabel { target: String, label: String },
    RemoveLabel { target: String, label: String },
    AddSection { target: String, section: String },
    RemoveSection { target: String },
    CreateSubtask(CreateSubtask),
    UpdateSubtask(UpdateSubtask),
    DeleteSubtask { parent: Option<String>, target: String },
    CreateChecklist { target: String, checklist: ChecklistSpec },
    UpdateChecklist { target: String, checklist: String, new_name: String },
    DeleteChecklist { target: String, checklist: String },
    AddChecklistItem { target: String, checklist: String, item: String },
    UpdateChecklistItem {
        target: String,
        checklist: String,
        item: String,
        state: Option<ItemState>,
        new_name: Option<String>,
    },
    DeleteChecklistItem { target: String, checklist: String, item: String },
    AddReflection(Reflection),
    CreateImprovementTask {
        name: String,
        description: Option<String>,
        checklist_items: Vec<String>,
    },
    /// Intent string the parser did not recognize. Carried through so the
    /// applier can report it as failed instead of dropping it silently.
    Unknown { intent: String, fields: Map<String, Value> },
    /// Input that was not a JSON object at all.
    Malformed { raw: Value },
}

impl Operation {
    /// Stable intent name, used in results and summaries.
    pub fn intent(&self) -> &str {
        match self {
            Operation::Create(_) => "create",
            Operation::Update(_) => "update",
            Operation::Rename { .. } => "rename",
            Operation::Delete { .. } => "delete",
            Operation::Comment { .. } => "comment",
            Operation::DeleteComment { .. } => "delete_comment",
            Operation::Assign { .. } => "assign",
            Operation::RemoveAssignee { .. } => "remove_assignee",
            Operation::RemoveStatus { .. } => "remove_status",
            Operation::RemovePriority { .. } => "remove_priority",
            Operation::CreateLabel { .. } => "create_label",
            Operation::AssignLabel { .. } => "assign_label",
            Operation::RemoveLabel { .. } => "remove_label",
            Operation::AddSection { .. } => "add_section",
            Operation::RemoveSection { .. } => "remove_section",
            Operation::CreateSubtask(_) => "create_subtask",
            Operation::UpdateSubtask(_) => "update_subtask",
            Operation::DeleteSubtask { .. } => "delete_subtask",
            Operation::CreateChecklist { .. } => "create_checklist",
            Operation::UpdateChecklist { .. } => "update_checklist",
            Operation::DeleteChecklist { .. } => "delete_checklist",
            Operation::AddChecklistItem { .. } => "add_checklist_item",
            Operation::UpdateChecklistItem { .. } => "update_checklist_item",
            Operation::DeleteChecklistItem { .. } => "delete_checklist_item",
            Operation::AddReflection(_) => "add_reflection",
            Operation::CreateImprovementTask { .. } => "create_improvement_task",
            Operation::Unknown { intent, .. } => intent,
            Operation::Malformed { .. } => "malformed",
        }
    }

    /// The identifying reference for summaries and results, usually the
    /// target task title.
    pub fn target(&self) -> &str {
        match self {
            Operation::Create(spec) => &spec.title,
            Operation::Update(spec) => &spec.target,
            Operation::Rename { target, .. }
            | Operation::Delete { target }
            | Operation::Comment { target, .. }
            | Operation::DeleteComment { target, .. }
            | Operation::Assign { target, .. }
            | Operation::RemoveAssignee { target }
            | Operation::RemoveStatus { target }
            | Operation::RemovePriority { target }
            | Operation::AssignLabel { target, .. }
            | Operation::RemoveLabel { target, .. }
            | Operation::AddSection { target, .. }
            | Operation::RemoveSection { target }
            | Operation::CreateChecklist { target, .. }
            | Operation::UpdateChecklist { target, .. }
            | Operation::DeleteChecklist { target, .. }
            | Operation::AddChecklistItem { target, .. }
            | Operation::UpdateChecklistItem { target, .. }
            | Operation::DeleteChecklistItem { target, .. } => target,
            Operation::CreateLabel { label, .. } => label,
            Operation::CreateSubtask(spec) => &spec.title,
            Operation::UpdateSubtask(spec) => &spec.target,
            Operation::DeleteSubtask { target, .. } => target,
            Operation::AddReflection(r) => &r.name,
            Operation::CreateImprovementTask { name, .. } => name,
            Operation::Unknown { .. } | Operation::Malformed { .. } => "",
        }
    }
}

/// Classification attached to failed operation results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Invalid,
    UnknownIntent,
    Remote,
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of one applied operation, in processing order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResult {
    pub intent: String,
    pub target: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApplyError>,
}

impl OperationResult {
    pub fn ok(op: &Operation) -> Self {
        Self {
            intent: op.intent().to_string(),
            target: op.target().to_string(),
            success: true,
            error: None,
        }
    }

    pub fn failed(op: &Operation, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            intent: op.intent().to_string(),
            target: op.target().to_string(),
            success: false,
            error: Some(ApplyError {
                kind,
                message: message.into(),
            }),
        }
    }

    pub fn not_found(op: &Operation, what: &str, reference: &str) -> Self {
        Self::failed(
            op,
            ErrorKind::NotFound,
            format!("{what} '{reference}' not found"),
        )
    }
}
