//! Fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use doseguard_core::storage::NotificationsConfig;
use doseguard_core::sync::AcknowledgeRequest;
use doseguard_core::{
    AlertContent, AlertPayload, CaptureError, Database, DoseBackend, DoseEngine, DoseId,
    EvidenceCapture, EvidenceRef, NotificationPlatform, PlatformError, PlatformHandle, Session,
    TransportError, Trigger,
};
use serde_json::{json, Value};

pub const NSS: &str = "12345678901";

pub fn session() -> Session {
    Session::new(NSS)
}

/// Backend record in the wire format.
pub fn record(id: DoseId, name: &str, at: DateTime<Utc>) -> Value {
    json!({ "id": id, "nombre_medicamento": name, "hora_programada": at.to_rfc3339() })
}

#[derive(Default)]
pub struct FakeBackend {
    pub records: Mutex<Vec<Value>>,
    pub fail_fetch: AtomicBool,
    /// `None` makes the upload fail at the transport level.
    pub ack_status: Mutex<Option<u16>>,
    pub fail_token: AtomicBool,
    pub fetch_delay: Mutex<Option<Duration>>,
    pub acks: Mutex<Vec<AcknowledgeRequest>>,
    pub tokens: Mutex<Vec<(String, String)>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeBackend {
    pub fn with_records(records: Vec<Value>) -> Self {
        let backend = Self::default();
        backend.set_records(records);
        *backend.ack_status.lock().unwrap() = Some(200);
        backend
    }

    pub fn set_records(&self, records: Vec<Value>) {
        *self.records.lock().unwrap() = records;
    }
}

#[async_trait]
impl DoseBackend for FakeBackend {
    async fn fetch_doses(&self, _session: &Session) -> Result<Vec<Value>, TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(TransportError::Timeout);
        }
        Ok(self.records.lock().unwrap().clone())
    }

    async fn acknowledge(&self, request: AcknowledgeRequest) -> Result<u16, TransportError> {
        self.acks.lock().unwrap().push(request);
        let status = *self.ack_status.lock().unwrap();
        status.ok_or(TransportError::Timeout)
    }

    async fn register_token(&self, session: &Session, token: &str) -> Result<(), TransportError> {
        if self.fail_token.load(Ordering::SeqCst) {
            return Err(TransportError::Status {
                status: 500,
                body: "boom".into(),
            });
        }
        self.tokens
            .lock()
            .unwrap()
            .push((session.nss.clone(), token.to_string()));
        Ok(())
    }
}

/// Keeps live alerts in memory, keyed by token.
#[derive(Default)]
pub struct RecordingPlatform {
    live: Mutex<HashMap<String, (Trigger, AlertContent, AlertPayload)>>,
    next: AtomicU64,
    pub cancels: AtomicUsize,
    /// Holds `create` for one dose this long before the alert exists.
    pub create_delay: Mutex<Option<(DoseId, Duration)>>,
}

#[async_trait]
impl NotificationPlatform for RecordingPlatform {
    async fn create(
        &self,
        trigger: Trigger,
        content: &AlertContent,
        payload: &AlertPayload,
    ) -> Result<PlatformHandle, PlatformError> {
        let delay = *self.create_delay.lock().unwrap();
        if let Some((dose_id, delay)) = delay {
            if dose_id == payload.dose_id {
                tokio::time::sleep(delay).await;
            }
        }
        let token = format!("alert-{}", self.next.fetch_add(1, Ordering::SeqCst));
        self.live
            .lock()
            .unwrap()
            .insert(token.clone(), (trigger, content.clone(), payload.clone()));
        Ok(PlatformHandle::new(token))
    }

    async fn cancel(&self, handle: &PlatformHandle) -> Result<(), PlatformError> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.live
            .lock()
            .unwrap()
            .remove(handle.as_str())
            .map(|_| ())
            .ok_or_else(|| PlatformError::UnknownHandle(handle.as_str().to_string()))
    }
}

impl RecordingPlatform {
    pub fn live_for(&self, dose_id: DoseId) -> Vec<(Trigger, AlertContent, AlertPayload)> {
        self.live
            .lock()
            .unwrap()
            .values()
            .filter(|(_, _, p)| p.dose_id == dose_id)
            .cloned()
            .collect()
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap().len()
    }
}

pub struct FixedCapture {
    pub result: Mutex<Result<EvidenceRef, CaptureError>>,
}

impl FixedCapture {
    pub fn returning(result: Result<EvidenceRef, CaptureError>) -> Self {
        Self {
            result: Mutex::new(result),
        }
    }
}

#[async_trait]
impl EvidenceCapture for FixedCapture {
    async fn capture(&self) -> Result<EvidenceRef, CaptureError> {
        self.result.lock().unwrap().clone()
    }
}

/// An engine wired to fakes, plus handles on the fakes.
pub struct Harness {
    pub engine: DoseEngine,
    pub backend: Arc<FakeBackend>,
    pub platform: Arc<RecordingPlatform>,
    pub capture: Arc<FixedCapture>,
    pub photo: PathBuf,
    _dir: tempfile::TempDir,
}

impl Harness {
    pub fn new(records: Vec<Value>) -> Self {
        Self::with_db(records, Arc::new(Database::open_in_memory().unwrap()))
    }

    pub fn with_db(records: Vec<Value>, db: Arc<Database>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("dose.jpg");
        std::fs::write(&photo, b"\xFF\xD8\xFF\xE0fake-jpeg").unwrap();

        let backend = Arc::new(FakeBackend::with_records(records));
        let platform = Arc::new(RecordingPlatform::default());
        let capture = Arc::new(FixedCapture::returning(Ok(EvidenceRef::new(photo.clone()))));
        let engine = DoseEngine::with_backend(
            backend.clone(),
            db,
            NotificationsConfig::default(),
            platform.clone(),
            capture.clone(),
        )
        .unwrap();

        Self {
            engine,
            backend,
            platform,
            capture,
            photo,
            _dir: dir,
        }
    }
}
