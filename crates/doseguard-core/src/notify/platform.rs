//! Boundary with the OS notification scheduler.
//!
//! The platform is an external collaborator; this module only defines what
//! the core needs from it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dose::DoseId;

/// Opaque correlation token returned by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformHandle(String);

impl PlatformHandle {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// When an alert should fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// As soon as possible.
    Immediate,
    /// At this exact instant.
    At(DateTime<Utc>),
}

impl Trigger {
    pub fn policy(&self) -> AlertPolicy {
        match self {
            Trigger::Immediate => AlertPolicy::Immediate,
            Trigger::At(_) => AlertPolicy::At,
        }
    }
}

/// Which scheduling policy produced an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertPolicy {
    /// Dose was overdue at scheduling time.
    Immediate,
    /// Dose fires at its scheduled instant.
    At,
}

impl AlertPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertPolicy::Immediate => "immediate",
            AlertPolicy::At => "at",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "immediate" => Some(AlertPolicy::Immediate),
            "at" => Some(AlertPolicy::At),
            _ => None,
        }
    }
}

/// Visible part of an alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertContent {
    pub title: String,
    pub body: String,
    pub sound: String,
}

/// Data attached to every alert so a fired or tapped alert can be routed
/// without asking the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    pub route_name: String,
    pub dose_id: DoseId,
}

impl AlertPayload {
    pub fn new(route_name: impl Into<String>, dose_id: DoseId) -> Self {
        Self {
            route_name: route_name.into(),
            dose_id,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "routeName": self.route_name, "doseId": self.dose_id })
    }

    /// Decode a payload as delivered by the platform.
    ///
    /// Some platforms stringify custom data, so a numeric string is
    /// accepted for `doseId`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let route_name = value.get("routeName")?.as_str()?.to_string();
        let dose_id = match value.get("doseId")? {
            serde_json::Value::Number(n) => n.as_i64()?,
            serde_json::Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        Some(Self { route_name, dose_id })
    }
}

/// Errors reported by the platform scheduler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("notification permission denied")]
    PermissionDenied,

    #[error("unknown alert handle {0}")]
    UnknownHandle(String),

    #[error("platform rejected the request: {0}")]
    Rejected(String),
}

/// OS-level notification scheduler.
#[async_trait]
pub trait NotificationPlatform: Send + Sync {
    /// Create an alert. The returned handle is what `cancel` takes.
    async fn create(
        &self,
        trigger: Trigger,
        content: &AlertContent,
        payload: &AlertPayload,
    ) -> Result<PlatformHandle, PlatformError>;

    /// Cancel a previously created alert.
    async fn cancel(&self, handle: &PlatformHandle) -> Result<(), PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_json_uses_camel_case_keys() {
        let payload = AlertPayload::new("ActiveAlarmScreen", 7);
        let json = payload.to_json();
        assert_eq!(json["routeName"], "ActiveAlarmScreen");
        assert_eq!(json["doseId"], 7);
        assert_eq!(serde_json::to_value(&payload).unwrap(), json);
    }

    #[test]
    fn payload_accepts_stringified_dose_id() {
        let json = serde_json::json!({ "routeName": "ActiveAlarmScreen", "doseId": "12" });
        assert_eq!(
            AlertPayload::from_json(&json),
            Some(AlertPayload::new("ActiveAlarmScreen", 12))
        );
    }

    #[test]
    fn payload_rejects_foreign_data() {
        assert!(AlertPayload::from_json(&serde_json::json!({ "screen": "Home" })).is_none());
        assert!(AlertPayload::from_json(&serde_json::json!({
            "routeName": "ActiveAlarmScreen",
            "doseId": "seven"
        }))
        .is_none());
    }

    #[test]
    fn trigger_maps_to_policy() {
        assert_eq!(Trigger::Immediate.policy(), AlertPolicy::Immediate);
        assert_eq!(Trigger::At(Utc::now()).policy(), AlertPolicy::At);
    }
}
