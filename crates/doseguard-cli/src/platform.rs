//! Terminal stand-ins for the device's notification scheduler and camera.

use std::path::PathBuf;

use async_trait::async_trait;
use doseguard_core::{
    AlertContent, AlertPayload, CaptureError, EvidenceCapture, EvidenceRef, NotificationPlatform,
    PlatformError, PlatformHandle, Trigger,
};

/// Prints alerts instead of scheduling them with the OS.
pub struct ConsolePlatform;

#[async_trait]
impl NotificationPlatform for ConsolePlatform {
    async fn create(
        &self,
        trigger: Trigger,
        content: &AlertContent,
        payload: &AlertPayload,
    ) -> Result<PlatformHandle, PlatformError> {
        let when = match trigger {
            Trigger::Immediate => "now".to_string(),
            Trigger::At(at) => at.to_rfc3339(),
        };
        println!(
            "[alert {when}] {}: {} (sound: {}) {}",
            content.title,
            content.body,
            content.sound,
            payload.to_json()
        );
        Ok(PlatformHandle::new(uuid::Uuid::new_v4().to_string()))
    }

    async fn cancel(&self, handle: &PlatformHandle) -> Result<(), PlatformError> {
        tracing::debug!(handle = handle.as_str(), "alert canceled");
        Ok(())
    }
}

/// Uses a photo already on disk as the captured evidence.
pub struct FileEvidence {
    path: Option<PathBuf>,
}

impl FileEvidence {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl EvidenceCapture for FileEvidence {
    async fn capture(&self) -> Result<EvidenceRef, CaptureError> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| CaptureError::Unavailable("no photo given (use --photo)".into()))?;
        if !path.is_file() {
            return Err(CaptureError::Unavailable(format!(
                "{} is not a file",
                path.display()
            )));
        }
        Ok(EvidenceRef::new(path.clone()))
    }
}
