//! Pin service — add, remove, measurement attach, listing, stats.
//!
//! DESIGN
//! ======
//! Pin mutations update in-memory session state immediately and mark the
//! pin dirty for debounced persistence. Deletes hit Postgres immediately
//! (not deferred) but are best-effort: a failed remote delete is logged and
//! the local removal stands, matching the no-rollback model of the rest of
//! the workflow.

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::model::{LatLng, MeasurementSummary};
use crate::state::{AppState, Pin, now_ms};

/// Window for the "recent pins" stat.
const RECENT_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PinError {
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),
    #[error("pin not found: {0}")]
    PinNotFound(Uuid),
}

/// Session pin counters for the stat cards.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PinStats {
    pub total: usize,
    pub recent_24h: usize,
}

// =============================================================================
// MUTATIONS
// =============================================================================

/// Create a pin in a session.
///
/// # Errors
///
/// Returns `SessionNotFound` if the session isn't open.
pub async fn add_pin(
    state: &AppState,
    session_id: Uuid,
    address: &str,
    position: LatLng,
) -> Result<Pin, PinError> {
    let mut sessions = state.sessions.write().await;
    let session = sessions
        .get_mut(&session_id)
        .ok_or(PinError::SessionNotFound(session_id))?;

    let pin = Pin {
        id: Uuid::new_v4(),
        session_id,
        address: address.to_owned(),
        position,
        measurement: None,
        created_at_ms: now_ms(),
    };

    let result = pin.clone();
    session.dirty_pins.insert(pin.id);
    session.pins.insert(pin.id, pin);

    Ok(result)
}

/// Remove a pin. Removing an absent id is a no-op, not an error.
///
/// # Errors
///
/// Returns `SessionNotFound` if the session isn't open.
pub async fn remove_pin(state: &AppState, session_id: Uuid, pin_id: Uuid) -> Result<(), PinError> {
    let removed = {
        let mut sessions = state.sessions.write().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or(PinError::SessionNotFound(session_id))?;
        session.dirty_pins.remove(&pin_id);
        let removed = session.pins.remove(&pin_id).is_some();
        if removed {
            // A flush snapshotting this pin may already be in flight; the
            // tombstone lets the next flush cycle delete the row again.
            session.deleted_pins.insert(pin_id);
        }
        removed
    };

    if removed && let Some(pool) = &state.pool {
        if let Err(error) = sqlx::query("DELETE FROM pins WHERE id = $1")
            .bind(pin_id)
            .execute(pool)
            .await
        {
            warn!(error = %error, %pin_id, "remote pin delete failed; local removal stands");
        }
    }

    Ok(())
}

/// Attach (or replace) a measurement summary on a pin. Idempotent:
/// re-saving the same summary leaves the same stored value.
///
/// # Errors
///
/// Returns `PinNotFound` if the pin doesn't exist.
pub async fn attach_measurement(
    state: &AppState,
    session_id: Uuid,
    pin_id: Uuid,
    summary: MeasurementSummary,
) -> Result<Pin, PinError> {
    let mut sessions = state.sessions.write().await;
    let session = sessions
        .get_mut(&session_id)
        .ok_or(PinError::SessionNotFound(session_id))?;
    let pin = session
        .pins
        .get_mut(&pin_id)
        .ok_or(PinError::PinNotFound(pin_id))?;

    pin.measurement = Some(summary);
    session.dirty_pins.insert(pin_id);

    Ok(pin.clone())
}

// =============================================================================
// QUERIES
// =============================================================================

/// All pins in a session, oldest first.
///
/// # Errors
///
/// Returns `SessionNotFound` if the session isn't open.
pub async fn list_pins(state: &AppState, session_id: Uuid) -> Result<Vec<Pin>, PinError> {
    let sessions = state.sessions.read().await;
    let session = sessions
        .get(&session_id)
        .ok_or(PinError::SessionNotFound(session_id))?;

    let mut pins: Vec<Pin> = session.pins.values().cloned().collect();
    pins.sort_by_key(|pin| (pin.created_at_ms, pin.id));
    Ok(pins)
}

/// Total and last-24h pin counts.
///
/// # Errors
///
/// Returns `SessionNotFound` if the session isn't open.
pub async fn pin_stats(state: &AppState, session_id: Uuid) -> Result<PinStats, PinError> {
    let sessions = state.sessions.read().await;
    let session = sessions
        .get(&session_id)
        .ok_or(PinError::SessionNotFound(session_id))?;

    let cutoff = now_ms() - RECENT_WINDOW_MS;
    let recent_24h = session
        .pins
        .values()
        .filter(|pin| pin.created_at_ms > cutoff)
        .count();

    Ok(PinStats { total: session.pins.len(), recent_24h })
}

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Upsert a batch of pins. Called by the persistence task and by the
/// workflow's immediate mirror.
///
/// # Errors
///
/// Returns the underlying database error; callers decide whether that is
/// fatal (it never is for the workflow).
pub async fn flush_pins(pool: &sqlx::PgPool, pins: &[Pin]) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for pin in pins {
        sqlx::query(
            "INSERT INTO pins (id, session_id, address, lat, lng, \
             measured_length_ft, measured_width_ft, measured_area_sq_ft, created_at_ms) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (id) DO UPDATE SET \
             address = EXCLUDED.address, lat = EXCLUDED.lat, lng = EXCLUDED.lng, \
             measured_length_ft = EXCLUDED.measured_length_ft, \
             measured_width_ft = EXCLUDED.measured_width_ft, \
             measured_area_sq_ft = EXCLUDED.measured_area_sq_ft",
        )
        .bind(pin.id)
        .bind(pin.session_id)
        .bind(&pin.address)
        .bind(pin.position.lat)
        .bind(pin.position.lng)
        .bind(pin.measurement.map(|m| m.length_ft))
        .bind(pin.measurement.map(|m| m.width_ft))
        .bind(pin.measurement.map(|m| m.area_sq_ft))
        .bind(pin.created_at_ms)
        .execute(tx.as_mut())
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Load a session's pins back from the remote store, oldest first. Used to
/// hydrate a reopened session on an online restart.
///
/// # Errors
///
/// Returns the underlying database error.
pub async fn load_pins(pool: &sqlx::PgPool, session_id: Uuid) -> Result<Vec<Pin>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (Uuid, String, f64, f64, Option<f64>, Option<f64>, Option<f64>, i64)>(
        "SELECT id, address, lat, lng, \
         measured_length_ft, measured_width_ft, measured_area_sq_ft, created_at_ms \
         FROM pins WHERE session_id = $1 \
         ORDER BY created_at_ms ASC, id ASC",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, address, lat, lng, length_ft, width_ft, area_sq_ft, created_at_ms)| {
            let measurement = match (length_ft, width_ft, area_sq_ft) {
                (Some(length_ft), Some(width_ft), Some(area_sq_ft)) => {
                    Some(MeasurementSummary { length_ft, width_ft, area_sq_ft })
                }
                _ => None,
            };
            Pin { id, session_id, address, position: LatLng::new(lat, lng), measurement, created_at_ms }
        })
        .collect())
}

#[cfg(test)]
#[path = "pin_test.rs"]
mod tests;
