//! Turns doses into platform alerts.
//!
//! The scheduler is the only component that creates or cancels platform
//! alerts. Before an alert is created for a dose, any alert previously
//! created for the same dose is canceled, so re-running a sync never
//! stacks up duplicate alerts.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::platform::{AlertContent, AlertPayload, NotificationPlatform, PlatformError, Trigger};
use crate::dose::{Dose, DoseId, DoseStatus};
use crate::error::{CoreError, Result};
use crate::storage::{AlarmStore, NotificationsConfig, ScheduleHandle, ScheduleHandleRegistry};

/// A dose the scheduler could not turn into an alert.
#[derive(Debug)]
pub struct ScheduleFailure {
    pub dose_id: DoseId,
    pub error: CoreError,
}

fn in_proof(status: DoseStatus) -> bool {
    matches!(status, DoseStatus::Acknowledging | DoseStatus::Acknowledged)
}

/// Outcome of one `schedule_all` pass.
#[derive(Debug, Default)]
pub struct ScheduleReport {
    pub scheduled: Vec<ScheduleHandle>,
    /// Doses with a proof in flight or already gone from the store.
    pub skipped: Vec<DoseId>,
    pub failures: Vec<ScheduleFailure>,
}

impl ScheduleReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Summary row for display.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleSummary {
    pub scheduled: usize,
    pub skipped: usize,
    pub failed: Vec<(DoseId, String)>,
}

impl From<&ScheduleReport> for ScheduleSummary {
    fn from(report: &ScheduleReport) -> Self {
        Self {
            scheduled: report.scheduled.len(),
            skipped: report.skipped.len(),
            failed: report
                .failures
                .iter()
                .map(|f| (f.dose_id, f.error.to_string()))
                .collect(),
        }
    }
}

pub struct NotificationScheduler {
    store: Arc<AlarmStore>,
    registry: ScheduleHandleRegistry,
    platform: Arc<dyn NotificationPlatform>,
    copy: NotificationsConfig,
}

impl NotificationScheduler {
    pub fn new(
        store: Arc<AlarmStore>,
        registry: ScheduleHandleRegistry,
        platform: Arc<dyn NotificationPlatform>,
        copy: NotificationsConfig,
    ) -> Self {
        Self {
            store,
            registry,
            platform,
            copy,
        }
    }

    /// Schedule one alert per dose against the current wall clock.
    pub async fn schedule_all(&self, doses: &[Dose]) -> ScheduleReport {
        self.schedule_all_at(doses, Utc::now()).await
    }

    /// Schedule one alert per dose, treating `now` as the current instant.
    ///
    /// Doses are processed in the given order. A failure on one dose is
    /// recorded and does not stop the others.
    pub async fn schedule_all_at(&self, doses: &[Dose], now: DateTime<Utc>) -> ScheduleReport {
        let mut report = ScheduleReport::default();

        for dose in doses {
            // The slice can predate a proof that finished since it was taken.
            let current = match self.store.get(dose.id) {
                Some(current) if !in_proof(current.status) => current,
                Some(current) => {
                    tracing::debug!(
                        dose_id = dose.id,
                        status = %current.status,
                        "not rescheduling"
                    );
                    report.skipped.push(dose.id);
                    continue;
                }
                None => {
                    tracing::debug!(dose_id = dose.id, "dose no longer active");
                    report.skipped.push(dose.id);
                    continue;
                }
            };

            match self.schedule_one(&current, now).await {
                Ok(Some(handle)) => report.scheduled.push(handle),
                Ok(None) => report.skipped.push(dose.id),
                Err(error) => {
                    tracing::warn!(dose_id = dose.id, %error, "dose left unscheduled");
                    report.failures.push(ScheduleFailure {
                        dose_id: dose.id,
                        error,
                    });
                }
            }
        }

        tracing::info!(
            scheduled = report.scheduled.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            "schedule pass finished"
        );
        report
    }

    /// Returns `None` when the dose was acknowledged while its alert was
    /// being created; that alert is canceled again.
    async fn schedule_one(
        &self,
        dose: &Dose,
        now: DateTime<Utc>,
    ) -> Result<Option<ScheduleHandle>> {
        self.cancel_existing(dose.id).await?;

        let (trigger, content) = if dose.is_overdue_at(now) {
            (
                Trigger::Immediate,
                AlertContent {
                    title: self.copy.overdue_title.clone(),
                    body: self.copy.render_overdue_body(&dose.medication_name),
                    sound: self.copy.overdue_sound.clone(),
                },
            )
        } else {
            (
                Trigger::At(dose.scheduled_at),
                AlertContent {
                    title: self.copy.due_title.clone(),
                    body: self.copy.render_due_body(&dose.medication_name),
                    sound: self.copy.due_sound.clone(),
                },
            )
        };
        let payload = AlertPayload::new(self.copy.active_route.clone(), dose.id);

        let token = self.platform.create(trigger, &content, &payload).await?;

        let handle = ScheduleHandle {
            dose_id: dose.id,
            token,
            policy: trigger.policy(),
            trigger_at: match trigger {
                Trigger::Immediate => now,
                Trigger::At(at) => at,
            },
            created_at: now,
        };

        if let Err(e) = self.registry.insert(&handle) {
            // Without a registry row the alert could never be canceled.
            if let Err(cancel_err) = self.platform.cancel(&handle.token).await {
                tracing::warn!(dose_id = dose.id, error = %cancel_err, "orphaned alert");
            }
            return Err(e);
        }

        // Registered first so a concurrent proof can find and cancel it too.
        let still_active = self
            .store
            .get(dose.id)
            .is_some_and(|d| d.status != DoseStatus::Acknowledged);
        if !still_active {
            tracing::debug!(dose_id = dose.id, "dose acknowledged during scheduling");
            self.cancel_existing(dose.id).await?;
            return Ok(None);
        }

        if trigger == Trigger::Immediate {
            self.mark_fired(dose.id)?;
        }

        tracing::debug!(
            dose_id = dose.id,
            policy = handle.policy.as_str(),
            trigger_at = %handle.trigger_at,
            "alert created"
        );
        Ok(Some(handle))
    }

    /// Cancel the alert currently registered for a dose, if any.
    ///
    /// An alert the platform no longer knows about counts as canceled.
    async fn cancel_existing(&self, dose_id: DoseId) -> Result<bool> {
        let Some(existing) = self.registry.get(dose_id)? else {
            return Ok(false);
        };

        match self.platform.cancel(&existing.token).await {
            Ok(()) => {}
            Err(PlatformError::UnknownHandle(token)) => {
                tracing::debug!(dose_id, token = %token, "previous alert already gone");
            }
            Err(e) => return Err(e.into()),
        }
        self.registry.remove(dose_id)?;
        Ok(true)
    }

    /// Record that a dose's alert fired.
    ///
    /// Moves a `Pending` dose to `Fired`; anything else is left as is.
    /// Returns the updated dose when a transition happened.
    pub fn mark_fired(&self, dose_id: DoseId) -> Result<Option<Dose>> {
        match self.store.get(dose_id) {
            Some(dose) if dose.status == DoseStatus::Pending => {
                self.store.transition(dose_id, DoseStatus::Fired).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Cancel and forget the alert of one dose. Returns whether one existed.
    pub async fn cancel(&self, dose_id: DoseId) -> Result<bool> {
        self.cancel_existing(dose_id).await
    }

    /// Cancel alerts whose dose is no longer active.
    ///
    /// Returns the ids whose alerts were canceled. Failures are logged and
    /// the handle is kept so a later pass can retry.
    pub async fn prune(&self, active_ids: &HashSet<DoseId>) -> Result<Vec<DoseId>> {
        let mut pruned = Vec::new();
        for handle in self.registry.list()? {
            if active_ids.contains(&handle.dose_id) {
                continue;
            }
            match self.cancel_existing(handle.dose_id).await {
                Ok(_) => pruned.push(handle.dose_id),
                Err(error) => {
                    tracing::warn!(dose_id = handle.dose_id, %error, "stale alert not canceled")
                }
            }
        }
        if !pruned.is_empty() {
            tracing::info!(count = pruned.len(), "stale alerts canceled");
        }
        Ok(pruned)
    }

    /// Live handles, ordered by dose id.
    pub fn handles(&self) -> Result<Vec<ScheduleHandle>> {
        self.registry.list()
    }
}
