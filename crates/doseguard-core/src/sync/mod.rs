//! Backend synchronization.
//!
//! The backend is the source of truth for which doses exist; the local
//! store is the source of truth for where each dose is in its lifecycle.

pub mod backend;
pub mod sync_service;
pub mod wire;

pub use backend::{AcknowledgeRequest, DoseBackend, HttpBackend};
pub use sync_service::{reconcile, AlarmSyncService, SyncReport, SyncStatus};
pub use wire::{decode_all, decode_dose, parse_instant};
