//! Best-effort bulk application of one command across many requests
//!
//! Items are independent: one failure never blocks or rolls back another's
//! success, and the caller always gets a complete per-item report. Stock
//! contention between items on the same product is already handled by the
//! accept guard, so no extra coordination happens here.

use crate::error::WorkflowError;
use crate::request::{Command, RequestStatus};
use crate::service::{ApprovalService, TransitionOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkItemOutcome {
    Applied { status: RequestStatus },
    NotApplicable { status: RequestStatus },
    InsufficientStock { required: u64, on_hand: u64 },
    NotFound,
    Failed { reason: String },
}

impl BulkItemOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, BulkItemOutcome::Applied { .. })
    }
}

/// Per-item report from one bulk invocation. Ephemeral: never persisted.
#[derive(Debug, Default)]
pub struct BulkReport {
    pub items: Vec<(String, BulkItemOutcome)>,
}

impl BulkReport {
    pub fn applied(&self) -> usize {
        self.items.iter().filter(|(_, o)| o.is_applied()).count()
    }

    pub fn failed(&self) -> usize {
        self.items.len() - self.applied()
    }

    pub fn outcome(&self, request_id: &str) -> Option<&BulkItemOutcome> {
        self.items
            .iter()
            .find(|(id, _)| id == request_id)
            .map(|(_, o)| o)
    }

    /// One line for the dashboard toast, e.g. "applied 7 of 9".
    pub fn summary(&self) -> String {
        format!("applied {} of {}", self.applied(), self.items.len())
    }
}

impl ApprovalService {
    /// Drive `command` across every id, recording success or the specific
    /// failure reason per item. Never aborts early.
    pub fn bulk_apply(&self, command: Command, request_ids: &[String], actor: &str) -> BulkReport {
        let mut report = BulkReport::default();
        for request_id in request_ids {
            let outcome = match self.apply(command, request_id, actor) {
                Ok(TransitionOutcome::Applied { status, .. }) => {
                    BulkItemOutcome::Applied { status }
                }
                Ok(TransitionOutcome::NotApplicable { status }) => {
                    BulkItemOutcome::NotApplicable { status }
                }
                Ok(TransitionOutcome::InsufficientStock { required, on_hand }) => {
                    BulkItemOutcome::InsufficientStock { required, on_hand }
                }
                Err(err) => match err.downcast_ref::<WorkflowError>() {
                    Some(WorkflowError::NotFound(_)) => BulkItemOutcome::NotFound,
                    _ => BulkItemOutcome::Failed {
                        reason: err.to_string(),
                    },
                },
            };
            report.items.push((request_id.clone(), outcome));
        }
        tracing::debug!(?command, summary = %report.summary(), "bulk apply finished");
        report
    }
}
