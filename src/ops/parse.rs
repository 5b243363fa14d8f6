//! Parsing raw extracted operations into typed [`Operation`] values.
//!
//! The extraction step produces JSON objects keyed by an intent string plus
//! free-form fields whose names drift between batches ("task" vs "title",
//! "member" vs "assignee", "epic" vs "label"). Parsing presence-checks the
//! fields each intent requires and accepts the known aliases; it never
//! drops an operation: unrecognized intents become [`Operation::Unknown`]
//! and non-objects become [`Operation::Malformed`] so the applier can
//! report them.

use serde_json::{Map, Value};

use super::canonical;
use super::{
    ChecklistSpec, CreateSubtask, CreateTask, ItemState, Operation, Reflection, ReflectionKind,
    Setting, UpdateSubtask, UpdateTask,
};

const TITLE_KEYS: &[&str] = &["task", "title", "name", "task_name", "card"];
const TARGET_KEYS: &[&str] = &["task", "target", "target_task", "title", "name", "card", "issue"];
const DESCRIPTION_KEYS: &[&str] = &["description", "desc", "notes"];
const ASSIGNEE_KEYS: &[&str] = &["assignee", "member", "user", "person"];
const DUE_KEYS: &[&str] = &["due_date", "deadline", "due", "due_on"];
const LABEL_KEYS: &[&str] = &["labels", "label", "epic", "epics", "tags", "tag"];
const STATUS_KEYS: &[&str] = &["status", "state"];
const SECTION_KEYS: &[&str] = &["section", "column"];
const COMMENT_KEYS: &[&str] = &["comment", "text", "content"];
const CHECKLIST_KEYS: &[&str] = &["checklist", "checklist_name"];
const ITEM_KEYS: &[&str] = &["item", "checklist_item", "item_name"];
const PARENT_KEYS: &[&str] = &["parent", "parent_task", "parent_title", "task"];

pub fn parse_batch(values: &[Value]) -> Vec<Operation> {
    values.iter().map(parse_operation).collect()
}

pub fn parse_operation(value: &Value) -> Operation {
    let Some(map) = value.as_object() else {
        return Operation::Malformed { raw: value.clone() };
    };
    let intent = str_field(map, &["intent", "operation", "op", "action"])
        .map(|s| canonical::squash(&s).replace(' ', "_"))
        .unwrap_or_default();

    match intent.as_str() {
        "create" | "create_task" | "add" | "add_task" | "create_card" => parse_create(map),
        "update" | "update_task" | "modify" | "update_card" => parse_update(map),
        "rename" | "rename_task" => {
            match (
                str_field(map, TARGET_KEYS),
                str_field(map, &["new_name", "new_title", "rename_to"]),
            ) {
                (Some(target), Some(new_name)) => Operation::Rename { target, new_name },
                _ => unknown(intent, map),
            }
        }
        "delete" | "delete_task" | "remove" | "remove_task" | "delete_card" => {
            match str_field(map, TARGET_KEYS) {
                Some(target) => Operation::Delete { target },
                None => unknown(intent, map),
            }
        }
        "comment" | "add_comment" => {
            match (str_field(map, TARGET_KEYS), str_field(map, COMMENT_KEYS)) {
                (Some(target), Some(text)) => Operation::Comment { target, text },
                _ => unknown(intent, map),
            }
        }
        "delete_comment" | "remove_comment" => {
            match (str_field(map, TARGET_KEYS), str_field(map, COMMENT_KEYS)) {
                (Some(target), Some(text)) => Operation::DeleteComment { target, text },
                _ => unknown(intent, map),
            }
        }
        "assign" | "assign_member" | "assign_task" | "assign_user" => {
            match (str_field(map, TARGET_KEYS), str_field(map, ASSIGNEE_KEYS)) {
                (Some(target), Some(assignee)) => Operation::Assign { target, assignee },
                _ => unknown(intent, map),
            }
        }
        "remove_assignee" | "unassign" | "remove_member" | "remove_assignee_sub_issue" => {
            match str_field(map, TARGET_KEYS) {
                Some(target) => Operation::RemoveAssignee { target },
                None => unknown(intent, map),
            }
        }
        "remove_status" => match str_field(map, TARGET_KEYS) {
            Some(target) => Operation::RemoveStatus { target },
            None => unknown(intent, map),
        },
        "remove_priority" => match str_field(map, TARGET_KEYS) {
            Some(target) => Operation::RemovePriority { target },
            None => unknown(intent, map),
        },
        "create_label" | "create_epic" => match str_field(map, LABEL_KEYS) {
            Some(label) => Operation::CreateLabel {
                label,
                target: str_field(map, TARGET_KEYS),
            },
            None => unknown(intent, map),
        },
        "assign_label" | "assign_epic" | "add_label" | "add_epic" | "add_tag" => {
            match (str_field(map, TARGET_KEYS), str_field(map, LABEL_KEYS)) {
                (Some(target), Some(label)) => Operation::AssignLabel { target, label },
                _ => unknown(intent, map),
            }
        }
        "remove_label" | "remove_epic" | "remove_tag" | "remove_label_sub_issue" => {
            match (str_field(map, TARGET_KEYS), str_field(map, LABEL_KEYS)) {
                (Some(target), Some(label)) => Operation::RemoveLabel { target, label },
                _ => unknown(intent, map),
            }
        }
        "add_section" | "add_to_section" | "move_to_section" | "set_section" => {
            match (str_field(map, TARGET_KEYS), str_field(map, SECTION_KEYS)) {
                (Some(target), Some(section)) => Operation::AddSection { target, section },
                _ => unknown(intent, map),
            }
        }
        "remove_section" | "remove_from_section" => match str_field(map, TARGET_KEYS) {
            Some(target) => Operation::RemoveSection { target },
            None => unknown(intent, map),
        },
        "create_subtask" | "add_subtask" | "create_sub_issue" => {
            let parent = str_field(map, PARENT_KEYS);
            let title = str_field(map, &["subtask", "subtask_name", "title", "name"]);
            match (parent, title) {
                (Some(parent), Some(title)) => Operation::CreateSubtask(CreateSubtask {
                    parent,
                    title,
                    description: str_field(map, DESCRIPTION_KEYS),
                    assignee: str_field(map, ASSIGNEE_KEYS),
                    due_date: str_field(map, DUE_KEYS).map(|d| canonical::normalize_due_date(&d)),
                    status: str_field(map, STATUS_KEYS),
                }),
                _ => unknown(intent, map),
            }
        }
        "update_subtask" | "update_sub_issue" => {
            match str_field(map, &["subtask", "subtask_name", "target", "title", "name"]) {
                Some(target) => Operation::UpdateSubtask(UpdateSubtask {
                    parent: str_field(map, PARENT_KEYS),
                    target,
                    new_title: str_field(map, &["new_name", "new_title"]),
                    description: str_field(map, DESCRIPTION_KEYS),
                    status: setting_field(map, STATUS_KEYS),
                    assignee: setting_field(map, ASSIGNEE_KEYS),
                    due_date: due_setting(map),
                }),
                None => unknown(intent, map),
            }
        }
        "delete_subtask" | "remove_subtask" | "delete_sub_issue" => {
            match str_field(map, &["subtask", "subtask_name", "target", "title", "name"]) {
                Some(target) => Operation::DeleteSubtask {
                    parent: str_field(map, PARENT_KEYS),
                    target,
                },
                None => unknown(intent, map),
            }
        }
        "create_checklist" | "add_checklist" => {
            match (str_field(map, TARGET_KEYS), checklist_spec(map)) {
                (Some(target), Some(checklist)) => {
                    Operation::CreateChecklist { target, checklist }
                }
                _ => unknown(intent, map),
            }
        }
        "update_checklist" | "rename_checklist" => {
            match (
                str_field(map, TARGET_KEYS),
                str_field(map, CHECKLIST_KEYS),
                str_field(map, &["new_name", "new_title"]),
            ) {
                (Some(target), Some(checklist), Some(new_name)) => Operation::UpdateChecklist {
                    target,
                    checklist,
                    new_name,
                },
                _ => unknown(intent, map),
            }
        }
        "delete_checklist" | "remove_checklist" => {
            match (str_field(map, TARGET_KEYS), str_field(map, CHECKLIST_KEYS)) {
                (Some(target), Some(checklist)) => {
                    Operation::DeleteChecklist { target, checklist }
                }
                _ => unknown(intent, map),
            }
        }
        "add_checklist_item" | "add_item" | "create_checklist_item" => {
            match (str_field(map, TARGET_KEYS), str_field(map, ITEM_KEYS)) {
                (Some(target), Some(item)) => Operation::AddChecklistItem {
                    target,
                    checklist: str_field(map, CHECKLIST_KEYS).unwrap_or_default(),
                    item,
                },
                _ => unknown(intent, map),
            }
        }
        "update_checklist_item" | "update_item" | "check_item" | "complete_item" => {
            match (str_field(map, TARGET_KEYS), str_field(map, ITEM_KEYS)) {
                (Some(target), Some(item)) => Operation::UpdateChecklistItem {
                    target,
                    checklist: str_field(map, CHECKLIST_KEYS).unwrap_or_default(),
                    item,
                    state: item_state(map, &intent),
                    new_name: str_field(map, &["new_name", "new_title"]),
                },
                _ => unknown(intent, map),
            }
        }
        "delete_checklist_item" | "remove_checklist_item" | "delete_item" | "remove_item" => {
            match (str_field(map, TARGET_KEYS), str_field(map, ITEM_KEYS)) {
                (Some(target), Some(item)) => Operation::DeleteChecklistItem {
                    target,
                    checklist: str_field(map, CHECKLIST_KEYS).unwrap_or_default(),
                    item,
                },
                _ => unknown(intent, map),
            }
        }
        "add_reflection" | "add_positive_reflection" | "add_negative_reflection"
        | "add_reflection_positive" | "add_reflection_negative" | "whats_going_well"
        | "whats_not_going_well" => match str_field(map, TITLE_KEYS) {
            Some(name) => Operation::AddReflection(Reflection {
                kind: reflection_kind(map, &intent),
                name,
                items: list_field(map, &["items", "points", "reflections"]),
                lessons: list_field(map, &["lessons", "lessons_learned", "learnings"]),
            }),
            None => unknown(intent, map),
        },
        "create_improvement_task" | "improvement_task" | "add_improvement" => {
            match str_field(map, TITLE_KEYS) {
                Some(name) => Operation::CreateImprovementTask {
                    name,
                    description: str_field(map, DESCRIPTION_KEYS),
                    checklist_items: list_field(map, &["checklist_items", "items", "actions"]),
                },
                None => unknown(intent, map),
            }
        }
        _ => unknown(intent, map),
    }
}

fn parse_create(map: &Map<String, Value>) -> Operation {
    let Some(title) = str_field(map, TITLE_KEYS) else {
        return unknown("create".to_string(), map);
    };
    Operation::Create(CreateTask {
        title,
        description: str_field(map, DESCRIPTION_KEYS),
        status: str_field(map, STATUS_KEYS),
        priority: priority_field(map).value().copied(),
        assignee: str_field(map, ASSIGNEE_KEYS),
        due_date: str_field(map, DUE_KEYS).map(|d| canonical::normalize_due_date(&d)),
        labels: list_field(map, LABEL_KEYS),
        section: str_field(map, SECTION_KEYS),
        comment: str_field(map, COMMENT_KEYS),
        checklist: checklist_spec(map),
    })
}

fn parse_update(map: &Map<String, Value>) -> Operation {
    let Some(target) = str_field(map, TARGET_KEYS) else {
        return unknown("update".to_string(), map);
    };
    let new_title = str_field(map, &["new_name", "new_title", "rename_to"]);
    let update = UpdateTask {
        target,
        new_title,
        description: str_field(map, DESCRIPTION_KEYS),
        status: setting_field(map, STATUS_KEYS),
        priority: priority_field(map),
        assignee: setting_field(map, ASSIGNEE_KEYS),
        due_date: due_setting(map),
        labels: list_field(map, LABEL_KEYS),
        section: str_field(map, SECTION_KEYS),
    };
    // An update that only carries a rename is a rename, so the sequencer
    // can move it ahead of operations referencing the new name.
    if let Some(new_name) = &update.new_title {
        let only_rename = update.description.is_none()
            && update.status.is_absent()
            && update.priority.is_absent()
            && update.assignee.is_absent()
            && update.due_date.is_absent()
            && update.labels.is_empty()
            && update.section.is_none();
        if only_rename {
            return Operation::Rename {
                target: update.target,
                new_name: new_name.clone(),
            };
        }
    }
    Operation::Update(update)
}

fn unknown(intent: String, map: &Map<String, Value>) -> Operation {
    Operation::Unknown {
        intent,
        fields: map.clone(),
    }
}

/// First present key whose value is a non-empty string (numbers are
/// accepted and stringified, since the extractor sometimes emits bare
/// numbers for dates and ordinals).
fn str_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        match map.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// Tri-state read: absent key vs explicit null vs value.
fn setting_field(map: &Map<String, Value>, keys: &[&str]) -> Setting<String> {
    for key in keys {
        match map.get(*key) {
            Some(Value::Null) => return Setting::Null,
            Some(Value::String(s)) => {
                if s.trim().is_empty() || s.trim().eq_ignore_ascii_case("none") {
                    return Setting::Null;
                }
                return Setting::Value(s.trim().to_string());
            }
            Some(Value::Number(n)) => return Setting::Value(n.to_string()),
            _ => {}
        }
    }
    Setting::Absent
}

fn due_setting(map: &Map<String, Value>) -> Setting<String> {
    match setting_field(map, DUE_KEYS) {
        Setting::Value(raw) => Setting::Value(canonical::normalize_due_date(&raw)),
        other => other,
    }
}

fn priority_field(map: &Map<String, Value>) -> Setting<u8> {
    match map.get("priority") {
        None => Setting::Absent,
        Some(Value::Null) => Setting::Null,
        Some(value) => match canonical::priority_level(value) {
            Some(level) => Setting::Value(level),
            // Unrecognized priority text is treated as absent rather than
            // guessed at.
            None => Setting::Absent,
        },
    }
}

fn list_field(map: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    for key in keys {
        match map.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => {
                return vec![s.trim().to_string()];
            }
            Some(Value::Array(values)) => {
                return values
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            _ => {}
        }
    }
    Vec::new()
}

/// Checklist payload: either `{"checklist": {"name": .., "items": [..]}}`
/// or the flat `checklist_name` + `checklist_items` shape.
fn checklist_spec(map: &Map<String, Value>) -> Option<ChecklistSpec> {
    if let Some(Value::Object(checklist)) = map.get("checklist") {
        return Some(ChecklistSpec {
            name: str_field(checklist, &["name", "title"]).unwrap_or_else(|| "Checklist".into()),
            items: list_field(checklist, &["items"]),
        });
    }
    let items = list_field(map, &["checklist_items", "items"]);
    let name = str_field(map, &["checklist_name", "checklist"]);
    if items.is_empty() && name.is_none() {
        return None;
    }
    Some(ChecklistSpec {
        name: name.unwrap_or_else(|| "Checklist".into()),
        items,
    })
}

fn item_state(map: &Map<String, Value>, intent: &str) -> Option<ItemState> {
    if intent == "check_item" || intent == "complete_item" {
        return Some(ItemState::Complete);
    }
    match map.get("state").or_else(|| map.get("checked")) {
        Some(Value::Bool(true)) => Some(ItemState::Complete),
        Some(Value::Bool(false)) => Some(ItemState::Incomplete),
        Some(Value::String(s)) => match canonical::squash(s).as_str() {
            "complete" | "completed" | "done" | "checked" | "true" => Some(ItemState::Complete),
            "incomplete" | "unchecked" | "open" | "false" => Some(ItemState::Incomplete),
            _ => None,
        },
        _ => None,
    }
}

fn reflection_kind(map: &Map<String, Value>, intent: &str) -> ReflectionKind {
    if intent.contains("not") || intent.contains("negative") {
        return ReflectionKind::Negative;
    }
    if intent.contains("positive") || intent.contains("well") {
        return ReflectionKind::Positive;
    }
    match str_field(map, &["type", "polarity", "category"]).map(|s| canonical::squash(&s)) {
        Some(kind) if kind.contains("not") || kind.contains("negative") => {
            ReflectionKind::Negative
        }
        _ => ReflectionKind::Positive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_accepts_field_aliases() {
        let op = parse_operation(&json!({
            "operation": "create",
            "task": "Set up CI",
            "desc": "pipeline work",
            "member": "Bob",
            "epic": "infra",
            "deadline": "2026-09-01"
        }));
        let Operation::Create(spec) = op else {
            panic!("expected create, got {op:?}")
        };
        assert_eq!(spec.title, "Set up CI");
        assert_eq!(spec.description.as_deref(), Some("pipeline work"));
        assert_eq!(spec.assignee.as_deref(), Some("Bob"));
        assert_eq!(spec.labels, vec!["infra".to_string()]);
        assert_eq!(spec.due_date.as_deref(), Some("2026-09-01"));
    }

    #[test]
    fn update_distinguishes_null_from_absent() {
        let op = parse_operation(&json!({
            "intent": "update",
            "task": "Fix bug",
            "priority": null,
            "description": "new text"
        }));
        let Operation::Update(spec) = op else {
            panic!("expected update")
        };
        assert_eq!(spec.priority, Setting::Null);
        assert_eq!(spec.status, Setting::Absent);
        assert_eq!(spec.description.as_deref(), Some("new text"));
    }

    #[test]
    fn update_with_only_new_name_becomes_rename() {
        let op = parse_operation(&json!({
            "intent": "update",
            "task": "Old name",
            "new_name": "New name"
        }));
        assert_eq!(
            op,
            Operation::Rename {
                target: "Old name".into(),
                new_name: "New name".into()
            }
        );
    }

    #[test]
    fn update_with_new_name_and_fields_stays_update() {
        let op = parse_operation(&json!({
            "intent": "update",
            "task": "Old name",
            "new_name": "New name",
            "status": "done"
        }));
        assert!(matches!(op, Operation::Update(_)));
    }

    #[test]
    fn priority_words_are_canonicalized_at_parse() {
        let op = parse_operation(&json!({
            "intent": "create",
            "title": "Hotfix",
            "priority": "urgent"
        }));
        let Operation::Create(spec) = op else {
            panic!("expected create")
        };
        assert_eq!(spec.priority, Some(1));
    }

    #[test]
    fn sub_issue_intents_map_to_subtask_variants() {
        let op = parse_operation(&json!({
            "operation": "create_sub_issue",
            "parent_title": "Launch",
            "title": "Write copy"
        }));
        let Operation::CreateSubtask(spec) = op else {
            panic!("expected subtask create, got {op:?}")
        };
        assert_eq!(spec.parent, "Launch");
        assert_eq!(spec.title, "Write copy");

        let op = parse_operation(&json!({
            "operation": "update_sub_issue",
            "title": "Write copy",
            "status": "done"
        }));
        assert!(matches!(op, Operation::UpdateSubtask(_)));

        let op = parse_operation(&json!({
            "operation": "delete_sub_issue",
            "title": "Write copy"
        }));
        assert!(matches!(op, Operation::DeleteSubtask { .. }));
    }

    #[test]
    fn sub_issue_assignee_and_label_removal_intents() {
        let op = parse_operation(&json!({
            "operation": "remove_assignee_sub_issue",
            "title": "Testing sub-issue"
        }));
        assert_eq!(
            op,
            Operation::RemoveAssignee {
                target: "Testing sub-issue".into()
            }
        );

        let op = parse_operation(&json!({
            "operation": "remove_label_sub_issue",
            "title": "Frontend sub-issue",
            "label": "bug"
        }));
        assert_eq!(
            op,
            Operation::RemoveLabel {
                target: "Frontend sub-issue".into(),
                label: "bug".into()
            }
        );
    }

    #[test]
    fn checklist_item_and_reflection_intent_aliases() {
        let op = parse_operation(&json!({
            "operation": "create_checklist_item",
            "task": "Launch",
            "item": "Order swag"
        }));
        assert!(matches!(op, Operation::AddChecklistItem { .. }));

        let op = parse_operation(&json!({
            "operation": "add_reflection_negative",
            "name": "Sprint 12",
            "items": ["scope creep"]
        }));
        let Operation::AddReflection(r) = op else {
            panic!("expected reflection, got {op:?}")
        };
        assert_eq!(r.kind, ReflectionKind::Negative);

        let op = parse_operation(&json!({
            "operation": "add_reflection_positive",
            "name": "Sprint 12",
            "items": ["demo went great"]
        }));
        let Operation::AddReflection(r) = op else {
            panic!("expected reflection, got {op:?}")
        };
        assert_eq!(r.kind, ReflectionKind::Positive);
    }

    #[test]
    fn unknown_intent_is_preserved_not_dropped() {
        let op = parse_operation(&json!({
            "intent": "archive_board",
            "board": "Q3"
        }));
        let Operation::Unknown { intent, fields } = op else {
            panic!("expected unknown")
        };
        assert_eq!(intent, "archive_board");
        assert!(fields.contains_key("board"));
    }

    #[test]
    fn non_object_input_is_malformed() {
        assert!(matches!(
            parse_operation(&json!("just a string")),
            Operation::Malformed { .. }
        ));
        assert!(matches!(
            parse_operation(&json!(42)),
            Operation::Malformed { .. }
        ));
    }

    #[test]
    fn checklist_accepts_both_shapes() {
        let nested = parse_operation(&json!({
            "intent": "create",
            "title": "Launch",
            "checklist": {"name": "Prep", "items": ["a", "b"]}
        }));
        let Operation::Create(spec) = nested else {
            panic!()
        };
        let checklist = spec.checklist.unwrap();
        assert_eq!(checklist.name, "Prep");
        assert_eq!(checklist.items.len(), 2);

        let flat = parse_operation(&json!({
            "intent": "create",
            "title": "Launch",
            "checklist_name": "Prep",
            "checklist_items": ["a"]
        }));
        let Operation::Create(spec) = flat else {
            panic!()
        };
        assert_eq!(spec.checklist.unwrap().name, "Prep");
    }

    #[test]
    fn check_item_intent_implies_complete() {
        let op = parse_operation(&json!({
            "intent": "check_item",
            "task": "Launch",
            "item": "second item"
        }));
        let Operation::UpdateChecklistItem { state, .. } = op else {
            panic!("expected item update")
        };
        assert_eq!(state, Some(ItemState::Complete));
    }

    #[test]
    fn reflection_polarity_from_intent_and_field() {
        let op = parse_operation(&json!({
            "intent": "add_reflection",
            "name": "Sprint 12",
            "type": "not going well",
            "items": ["scope creep"]
        }));
        let Operation::AddReflection(r) = op else {
            panic!()
        };
        assert_eq!(r.kind, ReflectionKind::Negative);
        assert_eq!(r.items, vec!["scope creep".to_string()]);
    }

    #[test]
    fn missing_required_field_falls_back_to_unknown() {
        let op = parse_operation(&json!({"intent": "assign", "task": "X"}));
        assert!(matches!(op, Operation::Unknown { .. }));
    }
}
