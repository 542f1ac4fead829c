//! Resolves fired or tapped alerts back to dose records.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use super::platform::AlertPayload;
use crate::dose::{Dose, DoseId};
use crate::storage::AlarmStore;

/// What the UI should do with a delivered alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RouteOutcome {
    /// Open `route_name` with the resolved dose.
    Navigate { route_name: String, dose: Dose },
    /// The dose left the active set after the alert was created.
    /// Show a notice; this is an expected race, not a failure.
    NotFound { dose_id: DoseId },
    /// Payload did not come from this scheduler.
    Ignored,
}

/// Read-only: routing never mutates the store.
pub struct NotificationRouter {
    store: Arc<AlarmStore>,
}

impl NotificationRouter {
    pub fn new(store: Arc<AlarmStore>) -> Self {
        Self { store }
    }

    pub fn on_event(&self, payload: &AlertPayload) -> RouteOutcome {
        match self.store.get(payload.dose_id) {
            Some(dose) => RouteOutcome::Navigate {
                route_name: payload.route_name.clone(),
                dose,
            },
            None => {
                tracing::warn!(dose_id = payload.dose_id, "alert for a dose no longer active");
                RouteOutcome::NotFound {
                    dose_id: payload.dose_id,
                }
            }
        }
    }

    /// Route an undecoded platform payload.
    pub fn on_raw_event(&self, data: &serde_json::Value) -> RouteOutcome {
        match AlertPayload::from_json(data) {
            Some(payload) => self.on_event(&payload),
            None => {
                tracing::debug!(%data, "ignoring foreign alert payload");
                RouteOutcome::Ignored
            }
        }
    }

    /// Consume delivered alerts one at a time, in delivery order.
    ///
    /// Returns when the event channel closes or the intent receiver is
    /// dropped.
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<AlertPayload>,
        intents: mpsc::Sender<RouteOutcome>,
    ) {
        while let Some(payload) = events.recv().await {
            let outcome = self.on_event(&payload);
            if intents.send(outcome).await.is_err() {
                tracing::debug!("intent receiver dropped, router stopping");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use chrono::Utc;

    fn router_with(doses: Vec<Dose>) -> (Arc<AlarmStore>, NotificationRouter) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = Arc::new(AlarmStore::open(db).unwrap());
        store.replace_all(doses).unwrap();
        (store.clone(), NotificationRouter::new(store))
    }

    #[test]
    fn known_dose_navigates_with_record() {
        let dose = Dose::new(7, "Omeprazol", Utc::now());
        let (_store, router) = router_with(vec![dose.clone()]);
        assert_eq!(
            router.on_event(&AlertPayload::new("ActiveAlarmScreen", 7)),
            RouteOutcome::Navigate {
                route_name: "ActiveAlarmScreen".into(),
                dose
            }
        );
    }

    #[test]
    fn unknown_dose_is_not_found_and_store_unchanged() {
        let (store, router) = router_with(vec![Dose::new(1, "A", Utc::now())]);
        let before = store.list();
        assert_eq!(
            router.on_event(&AlertPayload::new("ActiveAlarmScreen", 99)),
            RouteOutcome::NotFound { dose_id: 99 }
        );
        assert_eq!(store.list(), before);
    }

    #[test]
    fn foreign_payload_is_ignored() {
        let (_store, router) = router_with(vec![]);
        assert_eq!(
            router.on_raw_event(&serde_json::json!({ "screen": "HomeScreen" })),
            RouteOutcome::Ignored
        );
    }

    #[tokio::test]
    async fn run_preserves_delivery_order() {
        let (_store, router) = router_with(vec![Dose::new(1, "A", Utc::now())]);
        let (event_tx, event_rx) = mpsc::channel(4);
        let (intent_tx, mut intent_rx) = mpsc::channel(4);

        event_tx.send(AlertPayload::new("ActiveAlarmScreen", 2)).await.unwrap();
        event_tx.send(AlertPayload::new("ActiveAlarmScreen", 1)).await.unwrap();
        drop(event_tx);

        router.run(event_rx, intent_tx).await;

        assert_eq!(
            intent_rx.recv().await.unwrap(),
            RouteOutcome::NotFound { dose_id: 2 }
        );
        assert!(matches!(
            intent_rx.recv().await.unwrap(),
            RouteOutcome::Navigate { dose, .. } if dose.id == 1
        ));
        assert!(intent_rx.recv().await.is_none());
    }
}
