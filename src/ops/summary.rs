//! Human-readable batch summaries.
//!
//! One line per result, in processing order, so a reviewer can see exactly
//! which of many requested actions took effect and which did not, with the
//! failure reason inline.

use super::OperationResult;

fn describe(intent: &str) -> Option<&'static str> {
    Some(match intent {
        "create" => "Created task",
        "update" => "Updated task",
        "rename" => "Renamed task",
        "delete" => "Deleted task",
        "comment" => "Added comment to",
        "delete_comment" => "Deleted comment on",
        "assign" => "Assigned",
        "remove_assignee" => "Removed assignee from",
        "remove_status" => "Removed status from",
        "remove_priority" => "Removed priority from",
        "create_label" => "Created label",
        "assign_label" => "Added label to",
        "remove_label" => "Removed label from",
        "add_section" => "Moved to section",
        "remove_section" => "Removed from section",
        "create_subtask" => "Created subtask",
        "update_subtask" => "Updated subtask",
        "delete_subtask" => "Deleted subtask",
        "create_checklist" => "Created checklist on",
        "update_checklist" => "Updated checklist on",
        "delete_checklist" => "Deleted checklist on",
        "add_checklist_item" => "Added checklist item to",
        "update_checklist_item" => "Updated checklist item on",
        "delete_checklist_item" => "Deleted checklist item on",
        "add_reflection" => "Added reflection",
        "create_improvement_task" => "Created improvement task",
        _ => return None,
    })
}

fn line(result: &OperationResult) -> String {
    let action = match describe(&result.intent) {
        Some(verb) => verb.to_string(),
        None if result.intent.is_empty() || result.intent == "malformed" => {
            "Operation".to_string()
        }
        None => format!("Operation '{}'", result.intent),
    };
    let subject = if result.target.is_empty() {
        String::new()
    } else {
        format!(" '{}'", result.target)
    };
    if result.success {
        format!("✅ {action}{subject}")
    } else {
        let reason = result
            .error
            .as_ref()
            .map(|e| e.message.as_str())
            .unwrap_or("failed");
        format!("❌ {action}{subject}: {reason}")
    }
}

/// Render all results, one per line, preserving processing order.
pub fn summarize(results: &[OperationResult]) -> String {
    results.iter().map(line).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{ErrorKind, Operation};

    #[test]
    fn success_and_failure_lines_interleave_in_order() {
        let create = Operation::Create(crate::ops::CreateTask {
            title: "Set up CI".into(),
            ..Default::default()
        });
        let assign = Operation::Assign {
            target: "Set up CI".into(),
            assignee: "Bob".into(),
        };
        let results = vec![
            OperationResult::ok(&create),
            OperationResult::failed(&assign, ErrorKind::NotFound, "member 'Bob' not found"),
        ];
        let summary = summarize(&results);
        let lines: Vec<_> = summary.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "✅ Created task 'Set up CI'");
        assert_eq!(lines[1], "❌ Assigned 'Set up CI': member 'Bob' not found");
    }

    #[test]
    fn unknown_intents_render_with_their_name() {
        let op = Operation::Unknown {
            intent: "archive_board".into(),
            fields: Default::default(),
        };
        let result =
            OperationResult::failed(&op, ErrorKind::UnknownIntent, "unknown intent 'archive_board'");
        assert_eq!(
            summarize(&[result]),
            "❌ Operation 'archive_board': unknown intent 'archive_board'"
        );
    }

    #[test]
    fn empty_batch_renders_empty_summary() {
        assert_eq!(summarize(&[]), "");
    }
}
