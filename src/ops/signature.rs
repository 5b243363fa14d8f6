//! Operation fingerprints for duplicate suppression.
//!
//! A signature captures "same real-world action", not "identical payload":
//! two creates of the same title/status/assignee/priority are duplicates
//! even if their descriptions differ, and any two deletes of the same
//! title are duplicates regardless of other fields. Signatures are pure
//! functions of the operation, so they work both within a batch and across
//! batches when the caller keeps the processed set around (re-processed
//! audio segments in a streaming session).

use std::collections::HashSet;

use super::{Operation, Setting};

/// Deterministic fingerprint for `op`, or `None` for input that was not an
/// object at all (such operations still get recorded as failed results,
/// they just cannot be deduplicated).
pub fn signature(op: &Operation) -> Option<String> {
    let sig = match op {
        Operation::Create(spec) => format!(
            "create:{}:{}:{}:{}",
            spec.title,
            spec.status.as_deref().unwrap_or(""),
            spec.assignee.as_deref().unwrap_or(""),
            spec.priority.map(|p| p.to_string()).unwrap_or_default(),
        ),
        Operation::Update(spec) => {
            let mut fields: Vec<String> = Vec::new();
            if let Some(v) = &spec.new_title {
                fields.push(format!("new_title={v}"));
            }
            if let Some(v) = &spec.description {
                fields.push(format!("description={v}"));
            }
            push_setting(&mut fields, "status", &spec.status);
            push_setting(&mut fields, "assignee", &spec.assignee);
            push_setting(&mut fields, "due_date", &spec.due_date);
            match &spec.priority {
                Setting::Absent => {}
                Setting::Null => fields.push("priority=null".into()),
                Setting::Value(v) => fields.push(format!("priority={v}")),
            }
            if !spec.labels.is_empty() {
                fields.push(format!("labels={}", spec.labels.join(",")));
            }
            if let Some(v) = &spec.section {
                fields.push(format!("section={v}"));
            }
            fields.sort();
            format!("update:{}:{}", spec.target, fields.join(":"))
        }
        Operation::Comment { target, text } => format!("comment:{target}:{text}"),
        Operation::Assign { target, assignee } => format!("assign:{target}:{assignee}"),
        Operation::Delete { target } => format!("delete:{target}"),
        Operation::Rename { target, new_name } => format!("rename:{target}:{new_name}"),
        Operation::DeleteComment { target, text } => format!("delete_comment:{target}:{text}"),
        Operation::RemoveAssignee { target } => format!("remove_assignee:{target}"),
        Operation::RemoveStatus { target } => format!("remove_status:{target}"),
        Operation::RemovePriority { target } => format!("remove_priority:{target}"),
        Operation::CreateLabel { label, target } => format!(
            "create_label:{label}:{}",
            target.as_deref().unwrap_or("")
        ),
        Operation::AssignLabel { target, label } => format!("assign_label:{target}:{label}"),
        Operation::RemoveLabel { target, label } => format!("remove_label:{target}:{label}"),
        Operation::AddSection { target, section } => format!("add_section:{target}:{section}"),
        Operation::RemoveSection { target } => format!("remove_section:{target}"),
        Operation::CreateSubtask(spec) => format!("create_subtask:{}:{}", spec.parent, spec.title),
        Operation::UpdateSubtask(spec) => format!(
            "update_subtask:{}:{}:{}",
            spec.parent.as_deref().unwrap_or(""),
            spec.target,
            spec.new_title.as_deref().unwrap_or(""),
        ),
        Operation::DeleteSubtask { parent, target } => format!(
            "delete_subtask:{}:{target}",
            parent.as_deref().unwrap_or("")
        ),
        Operation::CreateChecklist { target, checklist } => {
            format!("create_checklist:{target}:{}", checklist.name)
        }
        Operation::UpdateChecklist {
            target,
            checklist,
            new_name,
        } => format!("update_checklist:{target}:{checklist}:{new_name}"),
        Operation::DeleteChecklist { target, checklist } => {
            format!("delete_checklist:{target}:{checklist}")
        }
        Operation::AddChecklistItem {
            target,
            checklist,
            item,
        } => format!("add_checklist_item:{target}:{checklist}:{item}"),
        Operation::UpdateChecklistItem {
            target,
            checklist,
            item,
            state,
            new_name,
        } => format!(
            "update_checklist_item:{target}:{checklist}:{item}:{state:?}:{}",
            new_name.as_deref().unwrap_or("")
        ),
        Operation::DeleteChecklistItem {
            target,
            checklist,
            item,
        } => format!("delete_checklist_item:{target}:{checklist}:{item}"),
        Operation::AddReflection(r) => format!(
            "add_reflection:{:?}:{}:{}",
            r.kind,
            r.name,
            r.items.join(",")
        ),
        Operation::CreateImprovementTask { name, .. } => {
            format!("create_improvement_task:{name}")
        }
        Operation::Unknown { intent, fields } => {
            let mut parts: Vec<String> = fields
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            parts.sort();
            format!("{intent}:{}", parts.join(":"))
        }
        Operation::Malformed { .. } => return None,
    };
    Some(sig.to_lowercase())
}

fn push_setting(fields: &mut Vec<String>, name: &str, setting: &Setting<String>) {
    match setting {
        Setting::Absent => {}
        Setting::Null => fields.push(format!("{name}=null")),
        Setting::Value(v) => fields.push(format!("{name}={v}")),
    }
}

/// Duplicate filter spanning one batch, optionally seeded with signatures
/// from earlier batches.
#[derive(Debug, Default)]
pub struct DedupFilter {
    seen: HashSet<String>,
}

impl DedupFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_processed(processed: impl IntoIterator<Item = String>) -> Self {
        Self {
            seen: processed.into_iter().collect(),
        }
    }

    /// Returns true the first time an operation's signature is seen.
    /// Operations without a signature are always admitted.
    pub fn admit(&mut self, op: &Operation) -> bool {
        match signature(op) {
            Some(sig) => self.seen.insert(sig),
            None => true,
        }
    }

    pub fn processed(&self) -> impl Iterator<Item = &str> {
        self.seen.iter().map(String::as_str)
    }

    pub fn into_processed(self) -> HashSet<String> {
        self.seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{CreateTask, UpdateTask};
    use serde_json::json;

    fn create(title: &str, assignee: Option<&str>) -> Operation {
        Operation::Create(CreateTask {
            title: title.into(),
            assignee: assignee.map(String::from),
            ..Default::default()
        })
    }

    #[test]
    fn create_signature_ignores_description() {
        let a = Operation::Create(CreateTask {
            title: "Set up CI".into(),
            description: Some("one wording".into()),
            ..Default::default()
        });
        let b = Operation::Create(CreateTask {
            title: "set up ci".into(),
            description: Some("different wording".into()),
            ..Default::default()
        });
        assert_eq!(signature(&a), signature(&b));
    }

    #[test]
    fn create_signature_distinguishes_assignee() {
        assert_ne!(
            signature(&create("Set up CI", Some("Bob"))),
            signature(&create("Set up CI", Some("Alice")))
        );
    }

    #[test]
    fn delete_signature_depends_on_title_only() {
        let a = Operation::Delete {
            target: "Old task".into(),
        };
        let b = Operation::Delete {
            target: "OLD TASK".into(),
        };
        assert_eq!(signature(&a), signature(&b));
    }

    #[test]
    fn update_signature_sorts_fields_and_keeps_nulls() {
        let a = Operation::Update(UpdateTask {
            target: "Fix bug".into(),
            priority: Setting::Null,
            description: Some("x".into()),
            ..Default::default()
        });
        let b = Operation::Update(UpdateTask {
            target: "Fix bug".into(),
            description: Some("x".into()),
            priority: Setting::Null,
            ..Default::default()
        });
        assert_eq!(signature(&a), signature(&b));
        let absent = Operation::Update(UpdateTask {
            target: "Fix bug".into(),
            description: Some("x".into()),
            ..Default::default()
        });
        assert_ne!(signature(&a), signature(&absent));
    }

    #[test]
    fn malformed_has_no_signature() {
        assert_eq!(
            signature(&Operation::Malformed { raw: json!("x") }),
            None
        );
    }

    #[test]
    fn filter_admits_each_signature_once() {
        let mut filter = DedupFilter::new();
        let op = create("Set up CI", None);
        assert!(filter.admit(&op));
        assert!(!filter.admit(&op));
        assert!(filter.admit(&create("Other task", None)));
    }

    #[test]
    fn filter_rejects_signatures_from_earlier_batches() {
        let op = create("Set up CI", None);
        let sig = signature(&op).unwrap();
        let mut filter = DedupFilter::with_processed([sig]);
        assert!(!filter.admit(&op));
    }

    #[test]
    fn malformed_operations_are_always_admitted() {
        let mut filter = DedupFilter::new();
        let op = Operation::Malformed { raw: json!(1) };
        assert!(filter.admit(&op));
        assert!(filter.admit(&op));
    }
}
