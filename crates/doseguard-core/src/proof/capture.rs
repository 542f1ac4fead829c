//! Boundary with the camera.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A captured photo, stored as a JPEG file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRef {
    pub path: PathBuf,
}

impl EvidenceRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("capture canceled by the user")]
    Canceled,

    #[error("camera unavailable: {0}")]
    Unavailable(String),

    #[error("camera permission denied")]
    PermissionDenied,
}

/// Takes the photo that proves a dose was taken.
#[async_trait]
pub trait EvidenceCapture: Send + Sync {
    async fn capture(&self) -> Result<EvidenceRef, CaptureError>;
}
