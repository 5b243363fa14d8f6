//! Canonicalization of free-text status, priority, and due-date values.
//!
//! Spoken updates use whatever vocabulary the speaker likes ("it's green",
//! "that one is blocked"); backends each have their own representation
//! (Trello lists, Linear workflow states and integer priorities, Asana
//! custom-field enums). This module normalizes vocabulary only; mapping the
//! canonical value onto a backend-specific identifier is the applier's job.

use chrono::{Datelike, NaiveDate, Utc};
use serde_json::Value;

use super::{Operation, Setting};

/// Lowercase and collapse `-`/`_`/whitespace runs to single spaces, so that
/// "on-track", "on_track", and "On  Track" all compare equal.
pub fn squash(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_space = true;
    for ch in raw.trim().chars() {
        let ch = match ch {
            '-' | '_' => ' ',
            other => other,
        };
        if ch.is_whitespace() {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.extend(ch.to_lowercase());
            last_space = false;
        }
    }
    out.trim_end().to_string()
}

/// Map a free-text status onto the canonical bucket vocabulary.
/// Unrecognized input passes through unchanged; appliers fuzzy-match it
/// against backend-specific state names afterwards.
pub fn canonical_status(raw: &str) -> String {
    match squash(raw).as_str() {
        "on track" | "ontrack" | "green" | "to do" | "todo" | "not started" => {
            "on track".to_string()
        }
        "at risk" | "yellow" => "at risk".to_string(),
        "off track" | "red" | "blocked" | "stuck" | "delayed" => "off track".to_string(),
        _ => raw.trim().to_string(),
    }
}

/// Map free-text priority onto the integer scale (0 none, 1 urgent,
/// 2 high, 3 medium, 4 low). Integers 0..=4 pass through; anything else is
/// unrecognized and yields `None`.
pub fn priority_level(raw: &Value) -> Option<u8> {
    match raw {
        Value::Number(n) => {
            let n = n.as_i64()?;
            (0..=4).contains(&n).then_some(n as u8)
        }
        Value::String(s) => priority_level_str(s),
        _ => None,
    }
}

pub fn priority_level_str(raw: &str) -> Option<u8> {
    match squash(raw).as_str() {
        "urgent" | "critical" | "p0" => Some(1),
        "high" | "important" | "p1" => Some(2),
        "medium" | "normal" | "p2" => Some(3),
        "low" | "minor" | "p3" => Some(4),
        "none" | "no priority" => Some(0),
        other => {
            let n: i64 = other.parse().ok()?;
            (0..=4).contains(&n).then_some(n as u8)
        }
    }
}

/// Canonical name for an integer priority level, for backends that model
/// priority as a named enum rather than a native integer field.
pub fn priority_name(level: u8) -> Option<&'static str> {
    match level {
        1 => Some("urgent"),
        2 => Some("high"),
        3 => Some("medium"),
        4 => Some("low"),
        _ => None,
    }
}

/// Normalize a spoken due date to `YYYY-MM-DD`. Dates without a year get
/// the current year. Unparseable input is returned unchanged; the backend
/// will reject it if it cares.
pub fn normalize_due_date(raw: &str) -> String {
    let raw = raw.trim();
    if NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok() {
        return raw.to_string();
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(&format!("{}-{raw}", Utc::now().year()), "%Y-%m-%d")
    {
        return parsed.format("%Y-%m-%d").to_string();
    }
    raw.to_string()
}

/// Status keywords recognized inside tags, descriptions, and titles.
/// Multi-word entries come first so "not started" wins over "started"-free
/// scans and "off track" wins before any shorter fragment could.
const STATUS_KEYWORDS: &[&str] = &[
    "not started",
    "in progress",
    "in review",
    "on track",
    "off track",
    "at risk",
    "to do",
    "completed",
    "finished",
    "testing",
    "blocked",
    "stuck",
    "delayed",
    "backlog",
    "ongoing",
    "review",
    "doing",
    "todo",
    "done",
    "qa",
];

/// First recognized status keyword contained in `text`, if any.
pub fn find_status_keyword(text: &str) -> Option<&'static str> {
    let squashed = squash(text);
    STATUS_KEYWORDS
        .iter()
        .find(|kw| squashed.contains(*kw))
        .copied()
}

/// A section reference whose whole name is a status keyword ("move it to
/// In Review") is really a status, not a column placement. Exact match
/// only; a section genuinely named "Review notes" stays a section.
fn section_status(section: Option<&str>) -> Option<&'static str> {
    let squashed = squash(section?);
    STATUS_KEYWORDS.iter().find(|kw| squashed == **kw).copied()
}

/// Promote a status mentioned out-of-band into the operation's status
/// field. Checked in order: tags, section name, description, title, then
/// the whole transcript as a last resort. First hit wins and only one
/// promotion happens per operation; a tag consumed as a status is removed
/// from the tag list so it is not also attached as a label. A section that
/// names a status is promoted but kept as a section too.
pub fn promote_status(ops: &mut [Operation], transcript: Option<&str>) {
    for op in ops {
        match op {
            Operation::Create(spec) if spec.status.is_none() => {
                if let Some(i) = spec
                    .labels
                    .iter()
                    .position(|l| find_status_keyword(l).is_some())
                {
                    let label = spec.labels.remove(i);
                    spec.status = Some(label);
                    continue;
                }
                let from_text = section_status(spec.section.as_deref())
                    .or_else(|| spec.description.as_deref().and_then(find_status_keyword))
                    .or_else(|| find_status_keyword(&spec.title))
                    .or_else(|| transcript.and_then(find_status_keyword));
                if let Some(kw) = from_text {
                    spec.status = Some(kw.to_string());
                }
            }
            Operation::Update(spec) if spec.status.is_absent() => {
                if let Some(i) = spec
                    .labels
                    .iter()
                    .position(|l| find_status_keyword(l).is_some())
                {
                    let label = spec.labels.remove(i);
                    spec.status = Setting::Value(label);
                    continue;
                }
                let from_text = section_status(spec.section.as_deref())
                    .or_else(|| spec.description.as_deref().and_then(find_status_keyword));
                if let Some(kw) = from_text {
                    spec.status = Setting::Value(kw.to_string());
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{CreateTask, UpdateTask};

    #[test]
    fn status_variants_collapse_to_one_bucket() {
        let canonical = canonical_status("on-track");
        assert_eq!(canonical_status("ontrack"), canonical);
        assert_eq!(canonical_status("green"), canonical);
        assert_eq!(canonical_status("To Do"), canonical);
        assert_eq!(canonical, "on track");
    }

    #[test]
    fn off_track_bucket_covers_blocked_vocabulary() {
        for raw in ["off_track", "red", "Blocked", "stuck", "delayed"] {
            assert_eq!(canonical_status(raw), "off track", "{raw}");
        }
        assert_eq!(canonical_status("at-risk"), "at risk");
        assert_eq!(canonical_status("yellow"), "at risk");
    }

    #[test]
    fn unrecognized_status_passes_through() {
        assert_eq!(canonical_status("purple"), "purple");
        assert_eq!(canonical_status("In Review"), "In Review");
    }

    #[test]
    fn priority_words_map_to_levels() {
        assert_eq!(priority_level_str("urgent"), Some(1));
        assert_eq!(priority_level_str("P0"), Some(1));
        assert_eq!(priority_level_str("Important"), Some(2));
        assert_eq!(priority_level_str("normal"), Some(3));
        assert_eq!(priority_level_str("minor"), Some(4));
        assert_eq!(priority_level_str("no-priority"), Some(0));
        assert_eq!(priority_level_str("whenever"), None);
    }

    #[test]
    fn priority_integers_pass_through_in_range() {
        assert_eq!(priority_level(&serde_json::json!(2)), Some(2));
        assert_eq!(priority_level(&serde_json::json!(7)), None);
        assert_eq!(priority_level(&serde_json::json!("3")), Some(3));
    }

    #[test]
    fn due_date_gets_current_year_when_missing() {
        assert_eq!(normalize_due_date("2025-12-01"), "2025-12-01");
        let normalized = normalize_due_date("12-01");
        assert!(normalized.ends_with("-12-01"), "{normalized}");
        assert_eq!(normalized.len(), 10);
    }

    #[test]
    fn tag_status_is_promoted_and_removed() {
        let mut ops = vec![Operation::Create(CreateTask {
            title: "Ship v2".into(),
            labels: vec!["frontend".into(), "blocked".into()],
            ..Default::default()
        })];
        promote_status(&mut ops, None);
        let Operation::Create(spec) = &ops[0] else {
            panic!("variant changed")
        };
        assert_eq!(spec.status.as_deref(), Some("blocked"));
        assert_eq!(spec.labels, vec!["frontend".to_string()]);
    }

    #[test]
    fn description_status_beats_transcript() {
        let mut ops = vec![Operation::Create(CreateTask {
            title: "Ship v2".into(),
            description: Some("currently in progress".into()),
            ..Default::default()
        })];
        promote_status(&mut ops, Some("everything is done"));
        let Operation::Create(spec) = &ops[0] else {
            panic!("variant changed")
        };
        assert_eq!(spec.status.as_deref(), Some("in progress"));
    }

    #[test]
    fn review_and_qa_vocabulary_is_recognized() {
        assert_eq!(find_status_keyword("in review with legal"), Some("in review"));
        assert_eq!(find_status_keyword("ready for review"), Some("review"));
        assert_eq!(find_status_keyword("waiting on QA"), Some("qa"));
        assert_eq!(find_status_keyword("still testing"), Some("testing"));
    }

    #[test]
    fn section_named_after_status_becomes_status() {
        let mut ops = vec![
            Operation::Create(CreateTask {
                title: "Ship v2".into(),
                section: Some("In Review".into()),
                ..Default::default()
            }),
            Operation::Update(UpdateTask {
                target: "Ship v2".into(),
                section: Some("QA".into()),
                ..Default::default()
            }),
            Operation::Create(CreateTask {
                title: "Draft Q2 report".into(),
                section: Some("Reporting".into()),
                ..Default::default()
            }),
        ];
        promote_status(&mut ops, None);
        let Operation::Create(first) = &ops[0] else {
            panic!("variant changed")
        };
        assert_eq!(first.status.as_deref(), Some("in review"));
        // The section placement itself is preserved.
        assert_eq!(first.section.as_deref(), Some("In Review"));
        let Operation::Update(second) = &ops[1] else {
            panic!("variant changed")
        };
        assert_eq!(second.status.as_deref(), Setting::Value("qa"));
        let Operation::Create(third) = &ops[2] else {
            panic!("variant changed")
        };
        assert_eq!(third.status, None);
    }

    #[test]
    fn explicit_status_is_never_overwritten() {
        let mut ops = vec![Operation::Create(CreateTask {
            title: "Ship v2".into(),
            status: Some("In Review".into()),
            labels: vec!["done".into()],
            ..Default::default()
        })];
        promote_status(&mut ops, None);
        let Operation::Create(spec) = &ops[0] else {
            panic!("variant changed")
        };
        assert_eq!(spec.status.as_deref(), Some("In Review"));
        assert_eq!(spec.labels, vec!["done".to_string()]);
    }
}
