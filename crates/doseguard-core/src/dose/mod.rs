//! Dose records and their lifecycle.
//!
//! ## State Transitions
//!
//! ```text
//! Pending -> Fired -> Acknowledging -> Acknowledged
//!    |                    |
//!    +--> Acknowledging   +--> (back to the prior status on failure)
//! ```
//!
//! `Acknowledged` is terminal: the record is evicted from the active set
//! right after reaching it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Backend-assigned dose identifier.
pub type DoseId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoseStatus {
    /// Known locally, alert not fired yet.
    Pending,
    /// Alert fired; waiting for proof.
    Fired,
    /// Proof capture or upload in flight.
    Acknowledging,
    /// Backend accepted the proof.
    Acknowledged,
}

impl DoseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoseStatus::Pending => "pending",
            DoseStatus::Fired => "fired",
            DoseStatus::Acknowledging => "acknowledging",
            DoseStatus::Acknowledged => "acknowledged",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DoseStatus::Pending),
            "fired" => Some(DoseStatus::Fired),
            "acknowledging" => Some(DoseStatus::Acknowledging),
            "acknowledged" => Some(DoseStatus::Acknowledged),
            _ => None,
        }
    }

    /// Whether the lifecycle permits moving from `self` to `to`.
    pub fn can_transition_to(&self, to: DoseStatus) -> bool {
        use DoseStatus::*;
        matches!(
            (self, to),
            (Pending, Fired)
                | (Pending, Acknowledging)
                | (Fired, Acknowledging)
                | (Acknowledging, Pending)
                | (Acknowledging, Fired)
                | (Acknowledging, Acknowledged)
        )
    }

    /// Statuses from which the user may start a proof submission.
    pub fn accepts_proof(&self) -> bool {
        matches!(self, DoseStatus::Pending | DoseStatus::Fired)
    }
}

impl fmt::Display for DoseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single medication reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dose {
    pub id: DoseId,
    pub medication_name: String,
    /// Absolute instant; never changes after the record is created.
    pub scheduled_at: DateTime<Utc>,
    pub status: DoseStatus,
}

impl Dose {
    /// New dose in the `Pending` state.
    pub fn new(
        id: DoseId,
        medication_name: impl Into<String>,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            medication_name: medication_name.into(),
            scheduled_at,
            status: DoseStatus::Pending,
        }
    }

    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at <= now
    }
}

/// The patient whose doses are being managed.
///
/// Owned by the session-bootstrap layer; the core only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Session {
    /// Social security number, used by the backend as the user key.
    pub nss: String,
}

impl Session {
    pub fn new(nss: impl Into<String>) -> Self {
        Self { nss: nss.into() }
    }
}
