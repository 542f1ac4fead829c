//! Platform alerts: creation, cancellation and routing of delivered alerts.

pub mod platform;
pub mod router;
pub mod scheduler;

pub use platform::{
    AlertContent, AlertPayload, AlertPolicy, NotificationPlatform, PlatformError, PlatformHandle,
    Trigger,
};
pub use router::{NotificationRouter, RouteOutcome};
pub use scheduler::{NotificationScheduler, ScheduleFailure, ScheduleReport, ScheduleSummary};
