//! Wires the store, sync, scheduler, router and proof workflow together.
//!
//! The engine owns the ordering rules between components: scheduling only
//! ever sees the result of a finished sync, and an accepted proof always
//! tears down the dose's alert.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::dose::{Dose, DoseId, Session};
use crate::error::{DoseDecodeError, Result};
use crate::notify::{
    AlertPayload, NotificationPlatform, NotificationRouter, NotificationScheduler, RouteOutcome,
    ScheduleReport,
};
use crate::proof::{EvidenceCapture, ProofOfActionService, ProofSubmission};
use crate::storage::{AlarmStore, Config, Database, NotificationsConfig, ScheduleHandleRegistry};
use crate::sync::{AlarmSyncService, DoseBackend, HttpBackend, SyncStatus};

/// Outcome of one `refresh`.
#[derive(Debug)]
pub struct RefreshReport {
    pub doses: Vec<Dose>,
    pub dropped: Vec<DoseDecodeError>,
    pub schedule: ScheduleReport,
    /// Doses whose stale alert was canceled.
    pub pruned: Vec<DoseId>,
}

pub struct DoseEngine {
    store: Arc<AlarmStore>,
    backend: Arc<dyn DoseBackend>,
    sync: AlarmSyncService,
    scheduler: NotificationScheduler,
    router: NotificationRouter,
    proof: ProofOfActionService,
    refresh_gate: Mutex<()>,
}

impl DoseEngine {
    /// Build an engine talking to the configured HTTP backend.
    pub fn new(
        config: &Config,
        db: Arc<Database>,
        platform: Arc<dyn NotificationPlatform>,
        capture: Arc<dyn EvidenceCapture>,
    ) -> Result<Self> {
        let backend = Arc::new(HttpBackend::new(&config.api)?);
        Self::with_backend(
            backend,
            db,
            config.notifications.clone(),
            platform,
            capture,
        )
    }

    /// Build an engine over any backend.
    ///
    /// Opening the store rehydrates it, so a crash mid-proof leaves the dose
    /// `Fired` rather than stuck in `Acknowledging`.
    pub fn with_backend(
        backend: Arc<dyn DoseBackend>,
        db: Arc<Database>,
        notifications: NotificationsConfig,
        platform: Arc<dyn NotificationPlatform>,
        capture: Arc<dyn EvidenceCapture>,
    ) -> Result<Self> {
        let store = Arc::new(AlarmStore::open(db.clone())?);
        let registry = ScheduleHandleRegistry::new(db.clone());

        Ok(Self {
            sync: AlarmSyncService::new(backend.clone(), store.clone(), db),
            scheduler: NotificationScheduler::new(store.clone(), registry, platform, notifications),
            router: NotificationRouter::new(store.clone()),
            proof: ProofOfActionService::new(store.clone(), backend.clone(), capture),
            backend,
            store,
            refresh_gate: Mutex::new(()),
        })
    }

    /// Sync the session's doses, then schedule an alert for each.
    ///
    /// When the sync fails nothing is scheduled and the cached doses stay
    /// as they were.
    pub async fn refresh(&self, session: &Session) -> Result<RefreshReport> {
        let _gate = self.refresh_gate.lock().await;

        let synced = self.sync.sync_detailed(session).await?;
        let schedule = self.scheduler.schedule_all(&synced.doses).await;

        // Read back after scheduling: a proof may have evicted doses meanwhile.
        let active: HashSet<DoseId> = self.store.list().iter().map(|d| d.id).collect();
        let pruned = self.scheduler.prune(&active).await?;

        tracing::info!(
            doses = synced.doses.len(),
            scheduled = schedule.scheduled.len(),
            failed = schedule.failures.len(),
            pruned = pruned.len(),
            "refresh complete"
        );

        Ok(RefreshReport {
            doses: synced.doses,
            dropped: synced.dropped,
            schedule,
            pruned,
        })
    }

    /// Handle a delivered or tapped alert.
    pub fn deliver(&self, payload: &AlertPayload) -> RouteOutcome {
        if let Err(error) = self.scheduler.mark_fired(payload.dose_id) {
            tracing::warn!(dose_id = payload.dose_id, %error, "could not mark dose fired");
        }
        self.router.on_event(payload)
    }

    /// Same as [`deliver`](Self::deliver) for an undecoded platform payload.
    pub fn deliver_raw(&self, data: &serde_json::Value) -> RouteOutcome {
        match AlertPayload::from_json(data) {
            Some(payload) => self.deliver(&payload),
            None => self.router.on_raw_event(data),
        }
    }

    /// Run the proof workflow for a dose and drop its alert on acceptance.
    pub async fn submit_proof(
        &self,
        session: &Session,
        dose_id: DoseId,
    ) -> Result<ProofSubmission> {
        let submission = self.proof.submit(session, dose_id).await?;
        if let Err(error) = self.scheduler.cancel(dose_id).await {
            tracing::warn!(dose_id, %error, "alert of acknowledged dose not canceled");
        }
        Ok(submission)
    }

    /// Forward a push token to the backend. Never touches dose state.
    pub async fn register_push_token(&self, session: &Session, token: &str) -> Result<()> {
        match self.backend.register_token(session, token).await {
            Ok(()) => {
                tracing::info!("push token registered");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "push token registration failed");
                Err(e.into())
            }
        }
    }

    pub fn list(&self) -> Vec<Dose> {
        self.store.list()
    }

    pub fn status(&self, session: &Session) -> Result<SyncStatus> {
        self.sync.status(session)
    }

    pub fn store(&self) -> &Arc<AlarmStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &NotificationScheduler {
        &self.scheduler
    }
}
