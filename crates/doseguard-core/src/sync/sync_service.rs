//! Pulls the session's dose list and reconciles it into the local store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::backend::DoseBackend;
use super::wire::decode_all;
use crate::dose::{Dose, Session};
use crate::error::{DoseDecodeError, Result};
use crate::storage::{AlarmStore, Database};

/// Result of one successful sync.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Active doses after reconciliation, ordered like `AlarmStore::list`.
    pub doses: Vec<Dose>,
    /// Backend records that were dropped, with the reason.
    pub dropped: Vec<DoseDecodeError>,
    pub synced_at: DateTime<Utc>,
}

/// Sync bookkeeping for one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Last successful sync timestamp.
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Number of active doses in the local cache.
    pub cached_count: usize,
}

pub struct AlarmSyncService {
    backend: Arc<dyn DoseBackend>,
    store: Arc<AlarmStore>,
    db: Arc<Database>,
    /// One gate per session so concurrent syncs for a session run one after
    /// the other instead of racing on `replace_all`.
    gates: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AlarmSyncService {
    pub fn new(backend: Arc<dyn DoseBackend>, store: Arc<AlarmStore>, db: Arc<Database>) -> Self {
        Self {
            backend,
            store,
            db,
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch, validate and reconcile the session's doses.
    ///
    /// On transport failure the cached set is left untouched and the error
    /// is returned; callers may keep showing the stale list.
    pub async fn sync(&self, session: &Session) -> Result<Vec<Dose>> {
        Ok(self.sync_detailed(session).await?.doses)
    }

    /// Same as [`sync`](Self::sync), also reporting dropped records.
    pub async fn sync_detailed(&self, session: &Session) -> Result<SyncReport> {
        let gate = self.gate_for(session).await;
        let _in_flight = gate.lock().await;

        let records = match self.backend.fetch_doses(session).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, "sync failed, keeping cached doses");
                return Err(e.into());
            }
        };

        let (fetched, dropped) = decode_all(&records);
        for reason in &dropped {
            tracing::warn!(%reason, "dropped backend dose record");
        }

        let reconciled = reconcile(fetched, &self.store.list());
        self.store.replace_all(reconciled)?;

        let synced_at = Utc::now();
        self.db
            .kv_set(&last_sync_key(session), &synced_at.to_rfc3339())?;

        let doses = self.store.list();
        tracing::info!(
            active = doses.len(),
            dropped = dropped.len(),
            "dose list synced"
        );
        Ok(SyncReport {
            doses,
            dropped,
            synced_at,
        })
    }

    pub fn status(&self, session: &Session) -> Result<SyncStatus> {
        let last_sync_at = self
            .db
            .kv_get(&last_sync_key(session))?
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|t| t.with_timezone(&Utc));
        Ok(SyncStatus {
            last_sync_at,
            cached_count: self.store.len(),
        })
    }

    async fn gate_for(&self, session: &Session) -> Arc<Mutex<()>> {
        self.gates
            .lock()
            .await
            .entry(session.nss.clone())
            .or_default()
            .clone()
    }
}

fn last_sync_key(session: &Session) -> String {
    format!("sync.last_success.{}", session.nss)
}

/// Carry local lifecycle state over to freshly fetched records.
///
/// The backend knows nothing about alert status, so a dose that is still
/// the same record keeps its local status. A changed instant means a new
/// record, which starts over as `Pending`.
pub fn reconcile(fetched: Vec<Dose>, local: &[Dose]) -> Vec<Dose> {
    let local: HashMap<_, _> = local.iter().map(|d| (d.id, d)).collect();
    fetched
        .into_iter()
        .map(|mut dose| {
            match local.get(&dose.id) {
                Some(existing) if existing.scheduled_at == dose.scheduled_at => {
                    dose.status = existing.status;
                }
                Some(existing) => {
                    tracing::debug!(
                        dose_id = dose.id,
                        was = %existing.scheduled_at,
                        now = %dose.scheduled_at,
                        "dose rescheduled upstream, resetting status"
                    );
                }
                None => {}
            }
            dose
        })
        .collect()
}
