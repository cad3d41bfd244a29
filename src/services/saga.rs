// src/services/saga.rs
//! Explicit step tracking for multi-store flows.
//!
//! The three stores share no transaction boundary, so each lifecycle
//! operation commits step by step. A [`Saga`] records every completed
//! step together with its declared rollback disposition:
//!
//! - [`Disposition::Retain`]: the artifact survives a later failure and
//!   is reconciled out of band. Its reference is returned from
//!   [`Saga::abort`] so the caller can attach it to the surfaced error.
//! - [`Disposition::Compensate`]: a best-effort rollback runs during
//!   unwind. A failed compensation is logged as a cleanup warning and the
//!   artifact joins the retained list; it never aborts anything.
//!
//! Unwinding runs in reverse completion order.

use crate::errors::CleanupWarning;
use futures::future::BoxFuture;
use log::{debug, info};

/// Declared rollback policy for one completed step.
pub enum Disposition {
    Retain,
    Compensate,
}

struct Step {
    name: &'static str,
    artifact: Option<String>,
    disposition: Disposition,
    compensation: Option<BoxFuture<'static, bool>>,
}

/// Ordered record of the steps an operation has completed so far.
pub struct Saga {
    operation: &'static str,
    steps: Vec<Step>,
}

impl Saga {
    pub fn new(operation: &'static str) -> Self {
        Saga {
            operation,
            steps: Vec::new(),
        }
    }

    /// Records a completed step whose artifact is kept on failure.
    pub fn retain(&mut self, name: &'static str, artifact: impl Into<String>) {
        self.steps.push(Step {
            name,
            artifact: Some(artifact.into()),
            disposition: Disposition::Retain,
            compensation: None,
        });
    }

    /// Records a completed step with a best-effort rollback. The
    /// compensation future resolves to `true` when the rollback took
    /// effect.
    #[allow(dead_code)]
    pub fn compensate(
        &mut self,
        name: &'static str,
        artifact: impl Into<String>,
        compensation: BoxFuture<'static, bool>,
    ) {
        self.steps.push(Step {
            name,
            artifact: Some(artifact.into()),
            disposition: Disposition::Compensate,
            compensation: Some(compensation),
        });
    }

    /// The operation failed: unwind in reverse order. Returns the
    /// references of every artifact left behind (retained, or whose
    /// compensation failed) for attachment to the surfaced error.
    pub async fn abort(self) -> Vec<String> {
        let mut orphaned = Vec::new();
        for step in self.steps.into_iter().rev() {
            match step.disposition {
                Disposition::Compensate => {
                    let rolled_back = match step.compensation {
                        Some(compensation) => compensation.await,
                        None => false,
                    };
                    if rolled_back {
                        debug!("{}: compensated step '{}'", self.operation, step.name);
                    } else if let Some(artifact) = step.artifact {
                        CleanupWarning {
                            operation: self.operation,
                            target: artifact.clone(),
                            reason: format!("compensation for step '{}' failed", step.name),
                        }
                        .emit();
                        orphaned.push(artifact);
                    }
                }
                Disposition::Retain => {
                    if let Some(artifact) = step.artifact {
                        info!(
                            "{}: step '{}' retained artifact '{}', reconciled out of band",
                            self.operation, step.name, artifact
                        );
                        orphaned.push(artifact);
                    }
                }
            }
        }
        orphaned
    }

    /// The operation succeeded; recorded compensations are dropped
    /// unexecuted.
    pub fn commit(self) {
        debug!(
            "{}: committed after {} steps",
            self.operation,
            self.steps.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn abort_returns_retained_artifacts_in_reverse_order() {
        let mut saga = Saga::new("create-certificate");
        saga.retain("persist-photo", "photo_1.png");
        saga.retain("upload-pdf", "QmAbc");

        let orphaned = saga.abort().await;
        assert_eq!(orphaned, vec!["QmAbc".to_string(), "photo_1.png".to_string()]);
    }

    #[tokio::test]
    async fn successful_compensation_leaves_no_orphan() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();

        let mut saga = Saga::new("test-op");
        saga.compensate(
            "upload",
            "QmAbc",
            Box::pin(async move {
                flag.store(true, Ordering::SeqCst);
                true
            }),
        );

        let orphaned = saga.abort().await;
        assert!(ran.load(Ordering::SeqCst));
        assert!(orphaned.is_empty());
    }

    #[tokio::test]
    async fn failed_compensation_is_swallowed_and_reported() {
        let mut saga = Saga::new("test-op");
        saga.compensate("upload", "QmAbc", Box::pin(async { false }));

        let orphaned = saga.abort().await;
        assert_eq!(orphaned, vec!["QmAbc".to_string()]);
    }

    #[tokio::test]
    async fn commit_drops_compensations_unexecuted() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();

        let mut saga = Saga::new("test-op");
        saga.compensate(
            "upload",
            "QmAbc",
            Box::pin(async move {
                flag.store(true, Ordering::SeqCst);
                true
            }),
        );
        saga.commit();
        assert!(!ran.load(Ordering::SeqCst));
    }
}
