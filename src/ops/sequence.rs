//! Dependency-aware batch ordering.
//!
//! Resolution is name-based, not id-based, so ordering within a batch
//! matters: a rename must run before anything referencing the new name, a
//! label must exist before a create attaches it, and a create must land
//! before follow-up operations look its title up. Rather than a dependency
//! graph, ordering uses four coarse buckets that cover every dependency
//! class the extractor actually produces; task deletes always move to the
//! very end so nothing in the batch loses its target mid-flight.

use super::Operation;

#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum Bucket {
    Rename,
    LabelCreate,
    Create,
    Rest,
    Delete,
}

fn bucket(op: &Operation) -> Bucket {
    match op {
        Operation::Rename { .. } => Bucket::Rename,
        Operation::CreateLabel { .. } => Bucket::LabelCreate,
        Operation::Create(_) => Bucket::Create,
        Operation::Delete { .. } => Bucket::Delete,
        _ => Bucket::Rest,
    }
}

/// Stable bucket reordering: renames, then label creations, then creates,
/// then everything else, with task deletes last. Relative order within a
/// bucket is the original extraction order.
pub fn sequence(ops: Vec<Operation>) -> Vec<Operation> {
    let mut renames = Vec::new();
    let mut label_creates = Vec::new();
    let mut creates = Vec::new();
    let mut rest = Vec::new();
    let mut deletes = Vec::new();
    for op in ops {
        match bucket(&op) {
            Bucket::Rename => renames.push(op),
            Bucket::LabelCreate => label_creates.push(op),
            Bucket::Create => creates.push(op),
            Bucket::Rest => rest.push(op),
            Bucket::Delete => deletes.push(op),
        }
    }
    let mut out = renames;
    out.append(&mut label_creates);
    out.append(&mut creates);
    out.append(&mut rest);
    out.append(&mut deletes);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::CreateTask;

    fn create(title: &str) -> Operation {
        Operation::Create(CreateTask {
            title: title.into(),
            ..Default::default()
        })
    }

    #[test]
    fn deletes_always_move_last() {
        let ops = vec![
            Operation::Delete { target: "A".into() },
            create("B"),
            Operation::Comment {
                target: "B".into(),
                text: "hi".into(),
            },
            Operation::Delete { target: "C".into() },
        ];
        let ordered = sequence(ops);
        let intents: Vec<_> = ordered.iter().map(|op| op.intent()).collect();
        assert_eq!(intents, ["create", "comment", "delete", "delete"]);
        assert_eq!(ordered[2].target(), "A");
        assert_eq!(ordered[3].target(), "C");
    }

    #[test]
    fn renames_and_label_creates_precede_creates() {
        let ops = vec![
            create("New feature"),
            Operation::CreateLabel {
                label: "infra".into(),
                target: None,
            },
            Operation::Rename {
                target: "Old".into(),
                new_name: "New".into(),
            },
        ];
        let intents: Vec<_> = sequence(ops).iter().map(|op| op.intent().to_string()).collect();
        assert_eq!(intents, ["rename", "create_label", "create"]);
    }

    #[test]
    fn relative_order_within_a_bucket_is_preserved() {
        let ops = vec![create("first"), create("second"), create("third")];
        let ordered = sequence(ops);
        let titles: Vec<_> = ordered.iter().map(|op| op.target()).collect();
        assert_eq!(titles, ["first", "second", "third"]);
    }

    #[test]
    fn subtask_and_checklist_deletes_stay_in_place() {
        let ops = vec![
            Operation::DeleteChecklist {
                target: "T".into(),
                checklist: "C".into(),
            },
            create("X"),
        ];
        let intents: Vec<_> = sequence(ops).iter().map(|op| op.intent().to_string()).collect();
        // Only whole-task deletes are postponed.
        assert_eq!(intents, ["create", "delete_checklist"]);
    }

    #[test]
    fn unknown_operations_keep_their_slot_in_rest() {
        let ops = vec![
            Operation::Unknown {
                intent: "archive".into(),
                fields: Default::default(),
            },
            Operation::Comment {
                target: "T".into(),
                text: "x".into(),
            },
        ];
        let intents: Vec<_> = sequence(ops).iter().map(|op| op.intent().to_string()).collect();
        assert_eq!(intents, ["archive", "comment"]);
    }
}
