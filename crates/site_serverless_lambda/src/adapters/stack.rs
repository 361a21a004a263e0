use std::collections::BTreeMap;
use std::fmt;

pub type StackOutputMap = BTreeMap<String, String>;

pub trait StackDeployer {
    /// Creates or updates the stack and blocks until it settles, returning its outputs.
    fn deploy_stack(&self, name: &str, template_body: &str) -> Result<StackOutputMap, String>;

    /// `None` when the stack does not exist.
    fn stack_outputs(&self, name: &str) -> Result<Option<StackOutputMap>, String>;

    fn delete_stack(&self, name: &str) -> Result<(), String>;
}

/// Where a CloudFormation stack sits, as far as deploy and teardown care.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackPhase {
    Missing,
    InProgress,
    /// Last operation succeeded.
    Complete,
    /// An update or import was rolled back; the previous template and its
    /// outputs are still live.
    RolledBack { reason: String },
    /// Creation failed and rolled back. The stack can only be deleted.
    RolledBackOnCreate { reason: String },
    Failed { status: String, reason: String },
}

/// Which operation a deploy just started, to judge the phase it settles in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOperation {
    Create,
    Update,
}

pub fn classify_stack_status(status: &str, reason: Option<&str>) -> StackPhase {
    let reason = reason.unwrap_or("no status reason reported").to_string();
    match status {
        "DELETE_COMPLETE" => StackPhase::Missing,
        "CREATE_COMPLETE" | "UPDATE_COMPLETE" | "IMPORT_COMPLETE" => StackPhase::Complete,
        "UPDATE_ROLLBACK_COMPLETE" | "IMPORT_ROLLBACK_COMPLETE" => {
            StackPhase::RolledBack { reason }
        }
        "ROLLBACK_COMPLETE" => StackPhase::RolledBackOnCreate { reason },
        // A change set that was never executed; nothing will move it forward.
        "REVIEW_IN_PROGRESS" => StackPhase::Failed {
            status: status.to_string(),
            reason,
        },
        raw if raw.ends_with("_IN_PROGRESS") => StackPhase::InProgress,
        raw => StackPhase::Failed {
            status: raw.to_string(),
            reason,
        },
    }
}

impl StackPhase {
    /// Stable with live outputs; an update can be issued from here.
    pub fn is_updatable(&self) -> bool {
        matches!(self, Self::Complete | Self::RolledBack { .. })
    }
}

impl StackOperation {
    /// Judges the phase a stack settled in after this operation.
    pub fn outcome(self, settled: &StackPhase) -> Result<(), String> {
        match (self, settled) {
            (_, StackPhase::Complete) => Ok(()),
            (Self::Update, StackPhase::RolledBack { reason }) => {
                Err(format!("stack update rolled back: {reason}"))
            }
            (Self::Create, StackPhase::RolledBackOnCreate { reason }) => {
                Err(format!("stack creation rolled back: {reason}"))
            }
            (_, other) => Err(format!("stack settled as {other}")),
        }
    }
}

impl fmt::Display for StackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("missing"),
            Self::InProgress => f.write_str("in progress"),
            Self::Complete => f.write_str("complete"),
            Self::RolledBack { reason } => write!(f, "rolled back ({reason})"),
            Self::RolledBackOnCreate { reason } => write!(f, "rolled back on create ({reason})"),
            Self::Failed { status, reason } => write!(f, "{status}: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_statuses_are_updatable() {
        for status in ["CREATE_COMPLETE", "UPDATE_COMPLETE", "IMPORT_COMPLETE"] {
            let phase = classify_stack_status(status, None);
            assert_eq!(phase, StackPhase::Complete, "{status}");
            assert!(phase.is_updatable());
        }
    }

    #[test]
    fn in_progress_statuses_are_waited_on() {
        for status in [
            "CREATE_IN_PROGRESS",
            "UPDATE_IN_PROGRESS",
            "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
            "UPDATE_ROLLBACK_IN_PROGRESS",
            "ROLLBACK_IN_PROGRESS",
            "DELETE_IN_PROGRESS",
        ] {
            assert_eq!(
                classify_stack_status(status, None),
                StackPhase::InProgress,
                "{status}"
            );
        }
    }

    #[test]
    fn rolled_back_updates_keep_live_outputs() {
        for status in ["UPDATE_ROLLBACK_COMPLETE", "IMPORT_ROLLBACK_COMPLETE"] {
            let phase = classify_stack_status(status, Some("resource limit"));
            assert_eq!(
                phase,
                StackPhase::RolledBack {
                    reason: "resource limit".to_string(),
                }
            );
            assert!(phase.is_updatable());
        }
    }

    #[test]
    fn rollback_complete_needs_recreation() {
        let phase = classify_stack_status("ROLLBACK_COMPLETE", Some("bucket exists"));

        assert_eq!(
            phase,
            StackPhase::RolledBackOnCreate {
                reason: "bucket exists".to_string(),
            }
        );
        assert!(!phase.is_updatable());
    }

    #[test]
    fn delete_complete_means_missing() {
        assert_eq!(
            classify_stack_status("DELETE_COMPLETE", None),
            StackPhase::Missing
        );
    }

    #[test]
    fn failed_statuses_carry_status_and_reason() {
        for status in [
            "DELETE_FAILED",
            "UPDATE_ROLLBACK_FAILED",
            "REVIEW_IN_PROGRESS",
        ] {
            let phase = classify_stack_status(status, Some("bucket not empty"));
            assert_eq!(
                phase,
                StackPhase::Failed {
                    status: status.to_string(),
                    reason: "bucket not empty".to_string(),
                }
            );
            assert!(!phase.is_updatable());
        }
        assert_eq!(
            classify_stack_status("DELETE_FAILED", None).to_string(),
            "DELETE_FAILED: no status reason reported"
        );
    }

    #[test]
    fn update_that_rolls_back_fails_the_deploy() {
        let settled = StackPhase::RolledBack {
            reason: "role creation denied".to_string(),
        };

        let error = StackOperation::Update
            .outcome(&settled)
            .expect_err("rollback should fail the update");
        assert!(error.contains("role creation denied"));
        assert_eq!(
            StackOperation::Update.outcome(&StackPhase::Complete),
            Ok(())
        );
    }

    #[test]
    fn create_that_rolls_back_reports_the_reason() {
        let settled = StackPhase::RolledBackOnCreate {
            reason: "bucket name already exists".to_string(),
        };

        let error = StackOperation::Create
            .outcome(&settled)
            .expect_err("rollback should fail the create");
        assert_eq!(
            error,
            "stack creation rolled back: bucket name already exists"
        );
        assert_eq!(
            StackOperation::Create.outcome(&StackPhase::Complete),
            Ok(())
        );
    }

    #[test]
    fn vanished_stack_is_a_failed_outcome() {
        let error = StackOperation::Create
            .outcome(&StackPhase::Missing)
            .expect_err("missing stack should fail");
        assert_eq!(error, "stack settled as missing");
    }
}
