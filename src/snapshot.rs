//! Point-in-time view of remote workspace state.
//!
//! The snapshot is fetched once before a batch runs and is never refreshed
//! mid-batch; every name resolution in the batch works against this single
//! consistent view. Entities created earlier in the same batch are not in
//! the snapshot, so appliers record them in a [`BatchLedger`] which is
//! consulted before the snapshot during resolution.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ops::resolve::{self, Scope};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChecklistItemRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChecklistRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub items: Vec<ChecklistItemRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A named entity with a remote identifier: list, section, workflow state,
/// label, or tag, depending on the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamedRecord {
    pub id: String,
    pub name: String,
}

/// An enum-backed custom field (Asana status/priority) with its options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomFieldRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub options: Vec<NamedRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub checklists: Vec<ChecklistRecord>,
    #[serde(default)]
    pub subtasks: Vec<TaskRecord>,
}

/// Immutable remote state used for name resolution during one batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceSnapshot {
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
    #[serde(default)]
    pub users: Vec<UserRecord>,
    /// Lists (Trello) or sections (Asana).
    #[serde(default)]
    pub sections: Vec<NamedRecord>,
    /// Workflow states (Linear); unused by backends without native states.
    #[serde(default)]
    pub states: Vec<NamedRecord>,
    #[serde(default)]
    pub labels: Vec<NamedRecord>,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldRecord>,
}

impl WorkspaceSnapshot {
    pub fn resolve_task(&self, reference: &str) -> Option<&TaskRecord> {
        let names: Vec<&str> = self.tasks.iter().map(|t| t.name.as_str()).collect();
        resolve::resolve(reference, &names, Scope::Task).map(|i| &self.tasks[i])
    }

    pub fn resolve_user(&self, reference: &str) -> Option<&UserRecord> {
        let names: Vec<&str> = self.users.iter().map(|u| u.name.as_str()).collect();
        resolve::resolve(reference, &names, Scope::User).map(|i| &self.users[i])
    }

    pub fn resolve_label(&self, reference: &str) -> Option<&NamedRecord> {
        let names: Vec<&str> = self.labels.iter().map(|l| l.name.as_str()).collect();
        resolve::resolve(reference, &names, Scope::Label).map(|i| &self.labels[i])
    }

    pub fn resolve_section(&self, reference: &str) -> Option<&NamedRecord> {
        let names: Vec<&str> = self.sections.iter().map(|s| s.name.as_str()).collect();
        resolve::resolve(reference, &names, Scope::Section).map(|i| &self.sections[i])
    }

    pub fn resolve_state(&self, reference: &str) -> Option<&NamedRecord> {
        let names: Vec<&str> = self.states.iter().map(|s| s.name.as_str()).collect();
        resolve::resolve(reference, &names, Scope::Section).map(|i| &self.states[i])
    }

    /// Exact (lowercased) title lookup, used by the pre-existing-name check
    /// that keeps re-extracted creates from duplicating remote tasks.
    pub fn has_task_named(&self, title: &str) -> bool {
        let lower = title.trim().to_lowercase();
        self.tasks.iter().any(|t| t.name.to_lowercase() == lower)
    }
}

/// Names and ids of entities created earlier in the current batch.
///
/// Keys are lowercased names; lookups are exact, not fuzzy, since the batch
/// itself produced these names moments ago.
#[derive(Debug, Default)]
pub struct BatchLedger {
    tasks: HashMap<String, String>,
    labels: HashMap<String, String>,
}

impl BatchLedger {
    pub fn record_task(&mut self, name: &str, id: impl Into<String>) {
        self.tasks.insert(name.trim().to_lowercase(), id.into());
    }

    pub fn task_id(&self, reference: &str) -> Option<&str> {
        self.tasks
            .get(&reference.trim().to_lowercase())
            .map(String::as_str)
    }

    pub fn record_label(&mut self, name: &str, id: impl Into<String>) {
        self.labels.insert(name.trim().to_lowercase(), id.into());
    }

    pub fn label_id(&self, reference: &str) -> Option<&str> {
        self.labels
            .get(&reference.trim().to_lowercase())
            .map(String::as_str)
    }

    /// Ledger first, snapshot second: same-batch creates win over the
    /// stale snapshot.
    pub fn resolve_task_id(&self, snapshot: &WorkspaceSnapshot, reference: &str) -> Option<String> {
        if let Some(id) = self.task_id(reference) {
            return Some(id.to_string());
        }
        snapshot.resolve_task(reference).map(|t| t.id.clone())
    }

    pub fn resolve_label_id(
        &self,
        snapshot: &WorkspaceSnapshot,
        reference: &str,
    ) -> Option<String> {
        if let Some(id) = self.label_id(reference) {
            return Some(id.to_string());
        }
        snapshot.resolve_label(reference).map(|l| l.id.clone())
    }
}
