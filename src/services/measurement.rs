//! Measurement service — create, list, bulk clear.
//!
//! DESIGN
//! ======
//! Records are immutable once created; the only delete path is the
//! session-wide clear, mirroring the observed product behavior. Validation
//! happens before anything is stored: the kind/dimension pairing, the
//! material rule (beds only), and the dimension bounds all reject up front,
//! so a stored record always carries consistent derived values.

use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::measure::{self, MeasureError};
use crate::model::{Coordinates, Dimensions, FeatureKind, Material, Measurement, format_cu_ft, format_sq_ft};
use crate::state::{AppState, now_ms};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MeasurementError {
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),
    #[error(transparent)]
    Invalid(#[from] MeasureError),
    #[error("material not allowed for {kind} measurements")]
    MaterialNotAllowed { kind: &'static str },
}

/// Client payload for a new measurement. Area and volume are not accepted
/// here; they are derived.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveMeasurementRequest {
    #[serde(rename = "type")]
    pub kind: FeatureKind,
    #[serde(default)]
    pub material: Option<Material>,
    pub dimensions: Dimensions,
    pub location: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    /// Owning pin, when the measurement was taken against one.
    #[serde(default)]
    pub pin_id: Option<Uuid>,
}

// =============================================================================
// CREATE
// =============================================================================

/// Validate, derive area/volume, and store a measurement.
///
/// # Errors
///
/// Returns `Invalid` for bad dimensions or a kind/variant mismatch, and
/// `MaterialNotAllowed` when a material is supplied for a kind that takes
/// none.
pub async fn save_measurement(
    state: &AppState,
    session_id: Uuid,
    request: SaveMeasurementRequest,
) -> Result<Measurement, MeasurementError> {
    if request.material.is_some() && !request.kind.accepts_material() {
        return Err(MeasurementError::MaterialNotAllowed { kind: request.kind.as_str() });
    }
    let derived = measure::derive(request.kind, &request.dimensions)?;
    debug!(
        kind = request.kind.as_str(),
        area = derived.area_sq_ft.map(format_sq_ft),
        volume = derived.volume_cu_ft.map(format_cu_ft),
        "derived measurement"
    );

    let measurement = Measurement {
        id: Uuid::new_v4(),
        session_id,
        pin_id: request.pin_id,
        kind: request.kind,
        material: request.material,
        dimensions: request.dimensions,
        area_sq_ft: derived.area_sq_ft,
        volume_cu_ft: derived.volume_cu_ft,
        location: request.location,
        notes: request.notes,
        coordinates: request.coordinates,
        created_at_ms: now_ms(),
    };

    let mut sessions = state.sessions.write().await;
    let session = sessions
        .get_mut(&session_id)
        .ok_or(MeasurementError::SessionNotFound(session_id))?;

    let result = measurement.clone();
    session.dirty_measurements.insert(measurement.id);
    session.measurements.insert(measurement.id, measurement);

    Ok(result)
}

// =============================================================================
// QUERIES
// =============================================================================

/// All measurements in a session, newest first.
///
/// # Errors
///
/// Returns `SessionNotFound` if the session isn't open.
pub async fn list_measurements(state: &AppState, session_id: Uuid) -> Result<Vec<Measurement>, MeasurementError> {
    let sessions = state.sessions.read().await;
    let session = sessions
        .get(&session_id)
        .ok_or(MeasurementError::SessionNotFound(session_id))?;

    let mut records: Vec<Measurement> = session.measurements.values().cloned().collect();
    records.sort_by_key(|m| (std::cmp::Reverse(m.created_at_ms), m.id));
    Ok(records)
}

// =============================================================================
// BULK CLEAR
// =============================================================================

/// Delete every measurement in a session. Returns the number removed.
/// The remote delete is immediate but best-effort; the local clear stands
/// either way.
///
/// # Errors
///
/// Returns `SessionNotFound` if the session isn't open.
pub async fn clear_measurements(state: &AppState, session_id: Uuid) -> Result<usize, MeasurementError> {
    let cleared = {
        let mut sessions = state.sessions.write().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or(MeasurementError::SessionNotFound(session_id))?;
        session.dirty_measurements.clear();
        let ids: Vec<Uuid> = session.measurements.keys().copied().collect();
        // An in-flight flush may re-insert these rows after the immediate
        // delete below; the tombstones make the next flush delete them again.
        session.deleted_measurements.extend(ids);
        let count = session.measurements.len();
        session.measurements.clear();
        count
    };

    if cleared > 0 && let Some(pool) = &state.pool {
        if let Err(error) = sqlx::query("DELETE FROM measurements WHERE session_id = $1")
            .bind(session_id)
            .execute(pool)
            .await
        {
            warn!(error = %error, %session_id, "remote measurement clear failed; local clear stands");
        }
    }

    Ok(cleared)
}

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Insert a batch of measurement rows. Records are immutable, so a
/// duplicate flush is a no-op.
///
/// # Errors
///
/// Returns the underlying database error.
pub async fn flush_measurements(pool: &sqlx::PgPool, records: &[Measurement]) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for record in records {
        let dimensions = serde_json::to_value(&record.dimensions).unwrap_or_default();
        let coordinates = record
            .coordinates
            .as_ref()
            .and_then(|c| serde_json::to_value(c).ok());

        sqlx::query(
            "INSERT INTO measurements (id, session_id, pin_id, kind, material, dimensions, \
             area_sq_ft, volume_cu_ft, location, notes, coordinates, created_at_ms) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(record.id)
        .bind(record.session_id)
        .bind(record.pin_id)
        .bind(record.kind.as_str())
        .bind(record.material.map(Material::as_str))
        .bind(&dimensions)
        .bind(record.area_sq_ft)
        .bind(record.volume_cu_ft)
        .bind(&record.location)
        .bind(&record.notes)
        .bind(coordinates)
        .bind(record.created_at_ms)
        .execute(tx.as_mut())
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// One `measurements` row as it comes off the wire. JSONB columns arrive
/// as raw values and are decoded per row.
type MeasurementRow = (
    Uuid,
    Option<Uuid>,
    String,
    Option<String>,
    serde_json::Value,
    Option<f64>,
    Option<f64>,
    String,
    String,
    Option<serde_json::Value>,
    i64,
);

/// Load a session's measurements back from the remote store. Rows with an
/// unknown kind or unreadable dimensions are skipped with a warning rather
/// than failing the whole hydrate.
///
/// # Errors
///
/// Returns the underlying database error.
pub async fn load_measurements(
    pool: &sqlx::PgPool,
    session_id: Uuid,
) -> Result<Vec<Measurement>, sqlx::Error> {
    let rows = sqlx::query_as::<_, MeasurementRow>(
        "SELECT id, pin_id, kind, material, dimensions, \
         area_sq_ft, volume_cu_ft, location, notes, coordinates, created_at_ms \
         FROM measurements WHERE session_id = $1 \
         ORDER BY created_at_ms ASC, id ASC",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for (id, pin_id, kind, material, dimensions, area_sq_ft, volume_cu_ft, location, notes, coordinates, created_at_ms) in rows {
        let Some(kind) = FeatureKind::parse(&kind) else {
            warn!(%id, kind, "unknown measurement kind in store; skipping row");
            continue;
        };
        let dimensions = match serde_json::from_value::<Dimensions>(dimensions) {
            Ok(dimensions) => dimensions,
            Err(error) => {
                warn!(%id, error = %error, "unreadable dimensions in store; skipping row");
                continue;
            }
        };

        records.push(Measurement {
            id,
            session_id,
            pin_id,
            kind,
            material: material.as_deref().and_then(Material::parse),
            dimensions,
            area_sq_ft,
            volume_cu_ft,
            location,
            notes,
            coordinates: coordinates.and_then(|v| serde_json::from_value(v).ok()),
            created_at_ms,
        });
    }
    Ok(records)
}

#[cfg(test)]
#[path = "measurement_test.rs"]
mod tests;
