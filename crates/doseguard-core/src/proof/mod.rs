//! Proof-of-action: photo evidence that closes out a dose.

pub mod capture;
pub mod service;

pub use capture::{CaptureError, EvidenceCapture, EvidenceRef};
pub use service::{ProofOfActionService, ProofSubmission, UploadOutcome};
