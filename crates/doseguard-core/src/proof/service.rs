//! Proof-of-dose workflow.
//!
//! One user action drives a dose through:
//!
//! ```text
//! (Pending | Fired) -> Acknowledging -> Acknowledged -> removed
//!                           |
//!                           +-> back to the prior status on any failure
//! ```
//!
//! Nothing here retries on its own; a retry is a new `submit` call.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use super::capture::{CaptureError, EvidenceCapture, EvidenceRef};
use crate::dose::{DoseId, DoseStatus, Session};
use crate::error::{CoreError, Result, WorkflowFailure};
use crate::storage::AlarmStore;
use crate::sync::{AcknowledgeRequest, DoseBackend};

/// HTTP status the backend uses to accept a proof.
const ACCEPTED_STATUS: u16 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum UploadOutcome {
    Pending,
    Accepted,
    Rejected { status: u16 },
    Failed,
}

/// One proof attempt. Lives only as long as the attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProofSubmission {
    pub dose_id: DoseId,
    pub evidence: EvidenceRef,
    pub outcome: UploadOutcome,
}

pub struct ProofOfActionService {
    store: Arc<AlarmStore>,
    backend: Arc<dyn DoseBackend>,
    capture: Arc<dyn EvidenceCapture>,
}

impl ProofOfActionService {
    pub fn new(
        store: Arc<AlarmStore>,
        backend: Arc<dyn DoseBackend>,
        capture: Arc<dyn EvidenceCapture>,
    ) -> Self {
        Self {
            store,
            backend,
            capture,
        }
    }

    /// Capture evidence for a dose, upload it and acknowledge the dose.
    ///
    /// On success the dose is gone from the store. On any failure the dose
    /// is back in the status it had before the call.
    pub async fn submit(&self, session: &Session, dose_id: DoseId) -> Result<ProofSubmission> {
        let dose = self
            .store
            .get(dose_id)
            .ok_or(CoreError::NotFound { dose_id })?;
        if !dose.status.accepts_proof() {
            return Err(CoreError::InvalidTransition {
                dose_id,
                from: dose.status,
                to: DoseStatus::Acknowledging,
            });
        }
        let prior = dose.status;
        self.store.transition(dose_id, DoseStatus::Acknowledging)?;

        match self.capture_and_upload(session, dose_id).await {
            Ok(submission) => {
                self.finish(dose_id)?;
                tracing::info!(dose_id, "dose acknowledged");
                Ok(submission)
            }
            Err(error) => {
                self.revert(dose_id, prior);
                tracing::warn!(dose_id, %error, "proof not accepted, dose reverted");
                Err(error)
            }
        }
    }

    async fn capture_and_upload(
        &self,
        session: &Session,
        dose_id: DoseId,
    ) -> Result<ProofSubmission> {
        let evidence = self.capture.capture().await.map_err(|e| match e {
            CaptureError::Canceled => CoreError::Workflow(WorkflowFailure::CaptureCanceled),
            CaptureError::Unavailable(msg) => {
                CoreError::Workflow(WorkflowFailure::CaptureUnavailable(msg))
            }
            CaptureError::PermissionDenied => CoreError::PermissionDenied {
                capability: "camera".into(),
            },
        })?;

        let image = tokio::fs::read(&evidence.path).await.map_err(|e| {
            WorkflowFailure::EvidenceUnreadable(format!("{}: {e}", evidence.path.display()))
        })?;

        let mut submission = ProofSubmission {
            dose_id,
            evidence,
            outcome: UploadOutcome::Pending,
        };

        let request = AcknowledgeRequest {
            dose_id,
            nss: session.nss.clone(),
            file_name: format!("alarma_{dose_id}_{}.jpg", Utc::now().timestamp_millis()),
            image,
        };

        match self.backend.acknowledge(request).await {
            Ok(ACCEPTED_STATUS) => {
                submission.outcome = UploadOutcome::Accepted;
                Ok(submission)
            }
            Ok(status) => {
                submission.outcome = UploadOutcome::Rejected { status };
                tracing::debug!(?submission, "proof rejected");
                Err(WorkflowFailure::UploadRejected { status }.into())
            }
            Err(e) => {
                submission.outcome = UploadOutcome::Failed;
                tracing::debug!(?submission, "proof upload failed");
                Err(WorkflowFailure::UploadFailed(e).into())
            }
        }
    }

    /// Terminal step: `Acknowledging -> Acknowledged`, then evict.
    fn finish(&self, dose_id: DoseId) -> Result<()> {
        match self.store.transition(dose_id, DoseStatus::Acknowledged) {
            Ok(_) => {}
            // A sync dropped the dose while the upload was in flight.
            Err(CoreError::NotFound { .. }) => return Ok(()),
            Err(e) => return Err(e),
        }
        self.store.remove(dose_id)?;
        Ok(())
    }

    fn revert(&self, dose_id: DoseId, prior: DoseStatus) {
        if let Err(e) = self.store.transition(dose_id, prior) {
            tracing::warn!(dose_id, error = %e, "could not revert dose status");
        }
    }
}
