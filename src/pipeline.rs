//! End-to-end batch pipeline: parse, normalize, filter, sequence, apply,
//! summarize.
//!
//! The pipeline owns no remote state. Callers hand it the raw operation
//! payload, a snapshot fetched moments before, and the dedup filter carrying
//! signatures from earlier batches of the same session; it hands back one
//! result per surviving operation plus a rendered summary.

use serde_json::Value;
use tracing::{debug, info};

use crate::backend::Backend;
use crate::ops::signature::DedupFilter;
use crate::ops::{canonical, parse, sequence, summary, Operation, OperationResult};
use crate::snapshot::WorkspaceSnapshot;

pub struct BatchOutcome {
    /// True when the applier ran the whole batch. Individual operation
    /// failures land in `results`; they do not clear this flag.
    pub success: bool,
    pub results: Vec<OperationResult>,
    pub summary: String,
}

/// Run one batch against a backend.
///
/// Duplicates (within the batch or carried in `dedup`) and creates whose
/// exact title already exists remotely are dropped silently; they produce
/// no result line. Everything else produces exactly one result.
pub async fn run_batch(
    raw: &[Value],
    transcript: Option<&str>,
    backend: &dyn Backend,
    snapshot: &WorkspaceSnapshot,
    dedup: &mut DedupFilter,
) -> BatchOutcome {
    let mut ops = parse::parse_batch(raw);
    canonical::promote_status(&mut ops, transcript);

    let ops: Vec<Operation> = ops
        .into_iter()
        .filter(|op| {
            if !dedup.admit(op) {
                debug!(intent = op.intent(), target = op.target(), "duplicate operation skipped");
                return false;
            }
            if let Operation::Create(spec) = op {
                if snapshot.has_task_named(&spec.title) {
                    debug!(title = %spec.title, "task already exists; create skipped");
                    return false;
                }
            }
            true
        })
        .collect();

    let ops = sequence::sequence(ops);
    info!(
        backend = backend.id(),
        operations = ops.len(),
        "applying batch"
    );
    let results = backend.apply(&ops, snapshot).await;
    let summary = summary::summarize(&results);
    BatchOutcome {
        success: true,
        results,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::backend::TransportError;
    use crate::snapshot::TaskRecord;

    /// Succeeds at everything; records nothing remote.
    struct AcceptAll;

    #[async_trait]
    impl Backend for AcceptAll {
        fn id(&self) -> &str {
            "accept-all"
        }

        fn name(&self) -> &str {
            "Accept All"
        }

        async fn fetch_snapshot(&self) -> Result<WorkspaceSnapshot, TransportError> {
            Ok(WorkspaceSnapshot::default())
        }

        async fn apply(
            &self,
            ops: &[Operation],
            _snapshot: &WorkspaceSnapshot,
        ) -> Vec<OperationResult> {
            ops.iter().map(OperationResult::ok).collect()
        }
    }

    #[tokio::test]
    async fn create_then_assign_produces_two_lines_in_order() {
        let raw = vec![
            json!({"intent": "create", "title": "Set up CI"}),
            json!({"intent": "assign", "task": "Set up CI", "assignee": "Dana"}),
        ];
        let snapshot = WorkspaceSnapshot::default();
        let mut dedup = DedupFilter::new();
        let outcome = run_batch(&raw, None, &AcceptAll, &snapshot, &mut dedup).await;
        assert_eq!(outcome.results.len(), 2);
        let lines: Vec<_> = outcome.summary.lines().collect();
        assert_eq!(lines[0], "✅ Created task 'Set up CI'");
        assert_eq!(lines[1], "✅ Assigned 'Set up CI'");
    }

    #[tokio::test]
    async fn duplicate_create_is_silently_dropped() {
        let raw = vec![
            json!({"intent": "create", "title": "Set up CI"}),
            json!({"intent": "create", "title": "Set up CI", "description": "different text"}),
        ];
        let snapshot = WorkspaceSnapshot::default();
        let mut dedup = DedupFilter::new();
        let outcome = run_batch(&raw, None, &AcceptAll, &snapshot, &mut dedup).await;
        // Same signature even though descriptions differ.
        assert_eq!(outcome.results.len(), 1);
    }

    #[tokio::test]
    async fn create_for_existing_remote_title_is_skipped() {
        let raw = vec![json!({"intent": "create", "title": "Set up CI"})];
        let snapshot = WorkspaceSnapshot {
            tasks: vec![TaskRecord {
                id: "t1".into(),
                name: "Set up CI".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut dedup = DedupFilter::new();
        let outcome = run_batch(&raw, None, &AcceptAll, &snapshot, &mut dedup).await;
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.summary, "");
    }

    #[tokio::test]
    async fn signatures_survive_across_batches() {
        let raw = vec![json!({"intent": "create", "title": "Set up CI"})];
        let snapshot = WorkspaceSnapshot::default();
        let mut dedup = DedupFilter::new();
        let first = run_batch(&raw, None, &AcceptAll, &snapshot, &mut dedup).await;
        assert_eq!(first.results.len(), 1);

        let mut next = DedupFilter::with_processed(dedup.processed().map(String::from));
        let second = run_batch(&raw, None, &AcceptAll, &snapshot, &mut next).await;
        assert!(second.results.is_empty());
    }

    /// Every operation fails with a not-found error.
    struct RejectAll;

    #[async_trait]
    impl Backend for RejectAll {
        fn id(&self) -> &str {
            "reject-all"
        }

        fn name(&self) -> &str {
            "Reject All"
        }

        async fn fetch_snapshot(&self) -> Result<WorkspaceSnapshot, TransportError> {
            Ok(WorkspaceSnapshot::default())
        }

        async fn apply(
            &self,
            ops: &[Operation],
            _snapshot: &WorkspaceSnapshot,
        ) -> Vec<OperationResult> {
            ops.iter()
                .map(|op| OperationResult::not_found(op, "task", op.target()))
                .collect()
        }
    }

    #[tokio::test]
    async fn batch_succeeds_even_when_operations_fail() {
        let raw = vec![json!({"intent": "assign", "task": "Missing", "assignee": "Dana"})];
        let snapshot = WorkspaceSnapshot::default();
        let mut dedup = DedupFilter::new();
        let outcome = run_batch(&raw, None, &RejectAll, &snapshot, &mut dedup).await;
        // Running the batch to completion is success; the failed operation
        // is reported in its own result, not the batch flag.
        assert!(outcome.success);
        assert!(!outcome.results[0].success);
    }

    #[tokio::test]
    async fn deletes_run_after_creates() {
        let raw = vec![
            json!({"intent": "delete", "task": "Old draft"}),
            json!({"intent": "create", "title": "New draft"}),
        ];
        let snapshot = WorkspaceSnapshot::default();
        let mut dedup = DedupFilter::new();
        let outcome = run_batch(&raw, None, &AcceptAll, &snapshot, &mut dedup).await;
        assert_eq!(outcome.results[0].intent, "create");
        assert_eq!(outcome.results[1].intent, "delete");
    }
}
