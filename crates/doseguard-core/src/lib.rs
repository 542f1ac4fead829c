//! # doseguard Core Library
//!
//! Client-side lifecycle engine for medication reminders: keeps a local
//! cache of a patient's doses in step with the backend, turns each dose
//! into exactly one platform alert, routes delivered alerts back to their
//! dose, and closes a dose out only once photo evidence has been accepted.
//!
//! ## Architecture
//!
//! - **Storage**: SQLite-backed dose cache and alert handle registry,
//!   TOML-based configuration
//! - **Sync**: HTTP backend client and reconciliation into the local cache
//! - **Notify**: alert scheduling with cancel-before-create, and routing of
//!   delivered alerts
//! - **Proof**: capture, upload and acknowledge workflow
//!
//! ## Key Components
//!
//! - [`DoseEngine`]: composition root used by front ends
//! - [`AlarmStore`]: active dose set with status transitions
//! - [`AlarmSyncService`]: backend fetch and reconciliation
//! - [`NotificationScheduler`]: the only creator of platform alerts
//! - [`NotificationRouter`]: alert payload to dose resolution
//! - [`ProofOfActionService`]: proof-of-dose workflow
//!
//! Platform capabilities (alerts, camera) are traits; front ends supply
//! implementations.

pub mod dose;
pub mod engine;
pub mod error;
pub mod notify;
pub mod proof;
pub mod storage;
pub mod sync;

pub use dose::{Dose, DoseId, DoseStatus, Session};
pub use engine::{DoseEngine, RefreshReport};
pub use error::{
    ConfigError, CoreError, DatabaseError, DoseDecodeError, TransportError, ValidationError,
    WorkflowFailure,
};
pub use notify::{
    AlertContent, AlertPayload, AlertPolicy, NotificationPlatform, NotificationRouter,
    NotificationScheduler, PlatformError, PlatformHandle, RouteOutcome, ScheduleReport,
    ScheduleSummary, Trigger,
};
pub use proof::{
    CaptureError, EvidenceCapture, EvidenceRef, ProofOfActionService, ProofSubmission,
    UploadOutcome,
};
pub use storage::{AlarmStore, Config, Database, ScheduleHandle, ScheduleHandleRegistry};
pub use sync::{AlarmSyncService, DoseBackend, HttpBackend, SyncReport, SyncStatus};
