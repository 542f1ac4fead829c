//! Decoding of backend dose records.
//!
//! The backend speaks Spanish field names:
//!
//! ```json
//! { "id": 12, "nombre_medicamento": "Paracetamol", "hora_programada": "2030-01-01T08:00:00Z" }
//! ```
//!
//! Records are decoded one by one so a single malformed entry never takes
//! the rest of the list down with it.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::dose::{Dose, DoseId};
use crate::error::DoseDecodeError;

/// Parse an absolute instant.
///
/// Accepts RFC 3339 with any offset (normalized to UTC) and RFC 2822.
/// Offset-less timestamps are rejected: they do not name an instant.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Decode one backend record into a `Pending` dose.
pub fn decode_dose(value: &serde_json::Value) -> Result<Dose, DoseDecodeError> {
    let obj = value.as_object().ok_or(DoseDecodeError::NotAnObject)?;

    let id: DoseId = match obj.get("id") {
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or(DoseDecodeError::MissingField("id"))?;

    let medication_name = obj
        .get("nombre_medicamento")
        .and_then(|v| v.as_str())
        .ok_or(DoseDecodeError::MissingField("nombre_medicamento"))?;

    let scheduled_at = match obj.get("hora_programada") {
        Some(serde_json::Value::String(raw)) => {
            parse_instant(raw).ok_or_else(|| DoseDecodeError::InvalidInstant {
                id,
                raw: raw.clone(),
            })?
        }
        other => {
            return Err(DoseDecodeError::InvalidInstant {
                id,
                raw: other.map(|v| v.to_string()).unwrap_or_default(),
            })
        }
    };

    Ok(Dose::new(id, medication_name, scheduled_at))
}

/// Decode a whole backend list, keeping the first record of each id.
///
/// Returns the valid doses in backend order plus every dropped record's
/// reason.
pub fn decode_all(records: &[serde_json::Value]) -> (Vec<Dose>, Vec<DoseDecodeError>) {
    let mut seen = HashSet::new();
    let mut doses = Vec::with_capacity(records.len());
    let mut dropped = Vec::new();

    for record in records {
        match decode_dose(record) {
            Ok(dose) if !seen.insert(dose.id) => {
                dropped.push(DoseDecodeError::DuplicateId(dose.id));
            }
            Ok(dose) => doses.push(dose),
            Err(e) => dropped.push(e),
        }
    }

    (doses, dropped)
}
