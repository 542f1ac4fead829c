//! Durable correlation between doses and live platform alerts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::database::Database;
use crate::dose::DoseId;
use crate::error::{DatabaseError, Result};
use crate::notify::platform::{AlertPolicy, PlatformHandle};

/// One live platform alert for one dose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleHandle {
    pub dose_id: DoseId,
    pub token: PlatformHandle,
    pub policy: AlertPolicy,
    /// Instant the alert was set to fire (creation time for immediate alerts).
    pub trigger_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Handle table keyed by dose id.
///
/// Only the notification scheduler writes here.
pub struct ScheduleHandleRegistry {
    db: Arc<Database>,
}

impl ScheduleHandleRegistry {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn get(&self, dose_id: DoseId) -> Result<Option<ScheduleHandle>> {
        let conn = self.db.conn();
        let row = conn
            .query_row(
                "SELECT dose_id, token, policy, trigger_at, created_at
                 FROM schedule_handles WHERE dose_id = ?1",
                params![dose_id],
                raw_row,
            )
            .optional()?;
        row.map(decode).transpose()
    }

    /// Record the handle for a dose. An existing row is overwritten, so
    /// callers must cancel the previous alert first.
    pub fn insert(&self, handle: &ScheduleHandle) -> Result<()> {
        self.db.conn().execute(
            "INSERT OR REPLACE INTO schedule_handles
                (dose_id, token, policy, trigger_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                handle.dose_id,
                handle.token.as_str(),
                handle.policy.as_str(),
                handle.trigger_at.to_rfc3339(),
                handle.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn remove(&self, dose_id: DoseId) -> Result<()> {
        self.db.conn().execute(
            "DELETE FROM schedule_handles WHERE dose_id = ?1",
            params![dose_id],
        )?;
        Ok(())
    }

    /// All live handles ordered by dose id.
    pub fn list(&self) -> Result<Vec<ScheduleHandle>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT dose_id, token, policy, trigger_at, created_at
             FROM schedule_handles ORDER BY dose_id",
        )?;
        let rows = stmt.query_map([], raw_row)?;
        let mut handles = Vec::new();
        for row in rows {
            handles.push(decode(row?)?);
        }
        Ok(handles)
    }
}

type RawRow = (DoseId, String, String, String, String);

fn raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn decode((dose_id, token, policy, trigger_at, created_at): RawRow) -> Result<ScheduleHandle> {
    let corrupt = |message: String| DatabaseError::CorruptRow {
        table: "schedule_handles".into(),
        message: format!("dose {dose_id}: {message}"),
    };
    let instant = |raw: &str| {
        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| corrupt(e.to_string()))
    };

    Ok(ScheduleHandle {
        dose_id,
        token: PlatformHandle::new(token),
        policy: AlertPolicy::parse(&policy)
            .ok_or_else(|| corrupt(format!("unknown policy '{policy}'")))?,
        trigger_at: instant(&trigger_at)?,
        created_at: instant(&created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(dose_id: DoseId, token: &str) -> ScheduleHandle {
        let now = Utc::now();
        ScheduleHandle {
            dose_id,
            token: PlatformHandle::new(token),
            policy: AlertPolicy::At,
            trigger_at: now,
            created_at: now,
        }
    }

    #[test]
    fn insert_replaces_previous_row_for_same_dose() {
        let registry = ScheduleHandleRegistry::new(Arc::new(Database::open_in_memory().unwrap()));
        registry.insert(&handle(1, "first")).unwrap();
        registry.insert(&handle(1, "second")).unwrap();

        let handles = registry.list().unwrap();
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].token.as_str(), "second");
    }

    #[test]
    fn remove_then_get_is_none() {
        let registry = ScheduleHandleRegistry::new(Arc::new(Database::open_in_memory().unwrap()));
        registry.insert(&handle(7, "tok")).unwrap();
        assert!(registry.get(7).unwrap().is_some());
        registry.remove(7).unwrap();
        assert!(registry.get(7).unwrap().is_none());
    }
}
