//! Authoritative local cache of the session's active doses.
//!
//! The in-memory set is an immutable snapshot behind an `RwLock`. Every
//! mutation writes SQLite in a single transaction first and only then swaps
//! the snapshot, all while holding the write lock. Readers therefore see
//! either the old or the new set, and a restart rehydrates exactly what the
//! last completed mutation left behind.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::database::Database;
use crate::dose::{Dose, DoseId, DoseStatus};
use crate::error::{CoreError, DatabaseError, Result, ValidationError};

type Snapshot = Arc<BTreeMap<DoseId, Dose>>;

/// Owns every `Dose` record; the only place their status is mutated.
pub struct AlarmStore {
    db: Arc<Database>,
    doses: RwLock<Snapshot>,
}

impl AlarmStore {
    /// Rehydrate the store from durable storage.
    ///
    /// Doses left in `Acknowledging` by an interrupted upload are reverted
    /// to `Fired`, and stray `Acknowledged` rows are evicted.
    pub fn open(db: Arc<Database>) -> Result<Self> {
        let doses = {
            let mut conn = db.conn();
            let tx = conn.transaction()?;
            let reverted = tx.execute(
                "UPDATE doses SET status = ?1 WHERE status = ?2",
                params![DoseStatus::Fired.as_str(), DoseStatus::Acknowledging.as_str()],
            )?;
            if reverted > 0 {
                tracing::warn!(reverted, "reverted interrupted acknowledgements to fired");
            }
            tx.execute(
                "DELETE FROM doses WHERE status = ?1",
                params![DoseStatus::Acknowledged.as_str()],
            )?;
            let doses = load_all(&tx)?;
            tx.commit()?;
            doses
        };

        tracing::debug!(count = doses.len(), "alarm store rehydrated");
        Ok(Self {
            db,
            doses: RwLock::new(Arc::new(doses)),
        })
    }

    /// Atomically replace the whole cached set.
    ///
    /// # Errors
    /// Fails without touching state if two records share an id.
    pub fn replace_all(&self, doses: Vec<Dose>) -> Result<()> {
        let mut next = BTreeMap::new();
        for dose in doses {
            let id = dose.id;
            if next.insert(id, dose).is_some() {
                return Err(ValidationError::DuplicateDoseId(id).into());
            }
        }

        let mut guard = self.write();
        {
            let mut conn = self.db.conn();
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM doses", [])?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO doses (id, medication_name, scheduled_at, status)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for dose in next.values() {
                    stmt.execute(params![
                        dose.id,
                        dose.medication_name,
                        dose.scheduled_at.to_rfc3339(),
                        dose.status.as_str(),
                    ])?;
                }
            }
            tx.commit()?;
        }
        *guard = Arc::new(next);
        Ok(())
    }

    pub fn get(&self, id: DoseId) -> Option<Dose> {
        self.read().get(&id).cloned()
    }

    /// Evict a dose from the active set. Returns the removed record.
    pub fn remove(&self, id: DoseId) -> Result<Option<Dose>> {
        let mut guard = self.write();
        if !guard.contains_key(&id) {
            return Ok(None);
        }

        self.db
            .conn()
            .execute("DELETE FROM doses WHERE id = ?1", params![id])?;

        let mut next = (**guard).clone();
        let removed = next.remove(&id);
        *guard = Arc::new(next);
        Ok(removed)
    }

    /// Apply a lifecycle transition and return the updated record.
    ///
    /// # Errors
    /// `NotFound` if the dose is not active, `InvalidTransition` if the
    /// lifecycle does not allow the change.
    pub fn transition(&self, id: DoseId, to: DoseStatus) -> Result<Dose> {
        let mut guard = self.write();
        let current = guard.get(&id).ok_or(CoreError::NotFound { dose_id: id })?;
        if !current.status.can_transition_to(to) {
            return Err(CoreError::InvalidTransition {
                dose_id: id,
                from: current.status,
                to,
            });
        }

        self.db.conn().execute(
            "UPDATE doses SET status = ?1 WHERE id = ?2",
            params![to.as_str(), id],
        )?;

        let mut updated = current.clone();
        updated.status = to;
        let mut next = (**guard).clone();
        next.insert(id, updated.clone());
        *guard = Arc::new(next);

        tracing::debug!(dose_id = id, status = %to, "dose transitioned");
        Ok(updated)
    }

    /// Active doses ordered by scheduled instant, then id.
    pub fn list(&self) -> Vec<Dose> {
        let snapshot = self.snapshot();
        let mut doses: Vec<Dose> = snapshot.values().cloned().collect();
        doses.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at).then(a.id.cmp(&b.id)));
        doses
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Cheap handle on the current set; later mutations do not affect it.
    pub fn snapshot(&self) -> Snapshot {
        self.read().clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Snapshot> {
        self.doses.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Snapshot> {
        self.doses.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn load_all(conn: &Connection) -> Result<BTreeMap<DoseId, Dose>> {
    let mut stmt =
        conn.prepare("SELECT id, medication_name, scheduled_at, status FROM doses")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut doses = BTreeMap::new();
    for row in rows {
        let (id, medication_name, scheduled_at, status) = row?;
        let scheduled_at = DateTime::parse_from_rfc3339(&scheduled_at)
            .map_err(|e| corrupt(format!("dose {id}: scheduled_at: {e}")))?
            .with_timezone(&Utc);
        let status = DoseStatus::parse(&status)
            .ok_or_else(|| corrupt(format!("dose {id}: unknown status '{status}'")))?;
        doses.insert(
            id,
            Dose {
                id,
                medication_name,
                scheduled_at,
                status,
            },
        );
    }
    Ok(doses)
}

fn corrupt(message: String) -> DatabaseError {
    DatabaseError::CorruptRow {
        table: "doses".into(),
        message,
    }
}
