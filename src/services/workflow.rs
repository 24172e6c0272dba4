//! Measurement workflow — orchestration over resolver, surface, engine,
//! and pin/measurement stores.
//!
//! DESIGN
//! ======
//! Pure sequencing, no business rules of its own: search → pin placement →
//! optional measurement → save. Saving a measurement against a pin always
//! upserts that pin's summary. There is no transactionality across the
//! pin + measurement write: when the remote mirror fails the local copy
//! stands, the failure is logged, and the response reports `mirrored:
//! false` instead of rolling back.

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::model::{FeatureKind, LatLng, MeasurementSummary};
use crate::services::address::{self, ResolveError};
use crate::services::measurement::{self, MeasurementError, SaveMeasurementRequest};
use crate::services::pin::{self, PinError};
use crate::state::{AppState, Pin, SessionState};
use crate::surface::{ClickOutcome, PathMeasurement};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Pin(#[from] PinError),
    #[error(transparent)]
    Measurement(#[from] MeasurementError),
}

/// Result of resolving a search term into a placed pin.
#[derive(Debug, Clone, Serialize)]
pub struct SearchPinOutcome {
    pub pin: Pin,
    /// Whether the coordinates came from a real match.
    pub exact: bool,
}

/// Result of saving a measurement, including the mirror status.
#[derive(Debug, Clone, Serialize)]
pub struct MeasureSaveOutcome {
    pub measurement: crate::model::Measurement,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<Pin>,
    /// False when the remote mirror write failed (or the service is
    /// offline); the local copy stands either way.
    pub mirrored: bool,
}

// =============================================================================
// SESSIONS
// =============================================================================

/// What a session opened with: its id plus the rows already available,
/// either still in memory or hydrated from the remote store.
#[derive(Debug, Clone, Copy)]
pub struct SessionOpened {
    pub id: Uuid,
    pub restored_pins: usize,
    pub restored_measurements: usize,
}

/// Open a measurement session. Without a requested id a fresh empty
/// session is created. Reopening a known id keeps the in-memory state;
/// when online, an unknown requested id is hydrated from the `pins` and
/// `measurements` tables, so a restart does not orphan persisted rows.
/// Mirrors the offline snapshot restore at boot.
pub async fn open_session(state: &AppState, requested: Option<Uuid>) -> SessionOpened {
    let session_id = requested.unwrap_or_else(Uuid::new_v4);

    {
        let sessions = state.sessions.read().await;
        if let Some(session) = sessions.get(&session_id) {
            return SessionOpened {
                id: session_id,
                restored_pins: session.pins.len(),
                restored_measurements: session.measurements.len(),
            };
        }
    }

    let mut session = SessionState::new();
    if requested.is_some() && let Some(pool) = &state.pool {
        match hydrate_session(pool, session_id).await {
            Ok((pins, measurements)) => {
                // Hydrated rows are already remote; nothing is marked dirty.
                for pin in pins {
                    session.pins.insert(pin.id, pin);
                }
                for record in measurements {
                    session.measurements.insert(record.id, record);
                }
            }
            Err(error) => {
                warn!(error = %error, %session_id, "session hydrate failed; opening empty");
            }
        }
    }

    let mut sessions = state.sessions.write().await;
    let session = sessions.entry(session_id).or_insert(session);
    SessionOpened {
        id: session_id,
        restored_pins: session.pins.len(),
        restored_measurements: session.measurements.len(),
    }
}

async fn hydrate_session(
    pool: &sqlx::PgPool,
    session_id: Uuid,
) -> Result<(Vec<Pin>, Vec<crate::model::Measurement>), sqlx::Error> {
    let pins = pin::load_pins(pool, session_id).await?;
    let measurements = measurement::load_measurements(pool, session_id).await?;
    Ok((pins, measurements))
}

// =============================================================================
// SEARCH → PIN
// =============================================================================

/// Resolve a free-text term and drop a pin at the result. Markers on the
/// surface are fully replaced with the session's pin set afterwards.
///
/// # Errors
///
/// Propagates resolver failures (empty query, transient provider error)
/// and `SessionNotFound`.
pub async fn search_and_pin(
    state: &AppState,
    session_id: Uuid,
    term: &str,
) -> Result<SearchPinOutcome, WorkflowError> {
    let resolved = {
        let surface = state.surface.lock().await;
        address::resolve(surface.as_ref(), term).await?
    };

    let pin = pin::add_pin(state, session_id, &resolved.address, resolved.position).await?;

    let positions: Vec<LatLng> = pin::list_pins(state, session_id)
        .await?
        .iter()
        .map(|p| p.position)
        .collect();
    {
        let mut surface = state.surface.lock().await;
        surface.set_markers(&positions);
        surface.fit_bounds(&positions);
    }

    Ok(SearchPinOutcome { pin, exact: resolved.exact })
}

// =============================================================================
// MEASURE → SAVE
// =============================================================================

/// Save a measurement and upsert the owning pin's summary, then mirror
/// both to the remote store when online.
///
/// # Errors
///
/// Propagates validation failures and missing sessions/pins. A mirror
/// failure is not an error.
pub async fn measure_and_save(
    state: &AppState,
    session_id: Uuid,
    request: SaveMeasurementRequest,
) -> Result<MeasureSaveOutcome, WorkflowError> {
    let pin_id = request.pin_id;
    let measurement = measurement::save_measurement(state, session_id, request).await?;

    let pin = match (pin_id, summary_of(&measurement)) {
        (Some(pin_id), Some(summary)) => {
            Some(pin::attach_measurement(state, session_id, pin_id, summary).await?)
        }
        _ => None,
    };

    let mirrored = mirror_now(state, session_id, &measurement, pin.as_ref()).await;
    Ok(MeasureSaveOutcome { measurement, pin, mirrored })
}

fn summary_of(measurement: &crate::model::Measurement) -> Option<MeasurementSummary> {
    match (&measurement.dimensions, measurement.area_sq_ft) {
        (crate::model::Dimensions::Linear { length_ft, width_ft, .. }, Some(area_sq_ft)) => {
            Some(MeasurementSummary { length_ft: *length_ft, width_ft: *width_ft, area_sq_ft })
        }
        _ => None,
    }
}

/// Immediate mirror of a fresh measurement (and its pin) to Postgres.
/// Returns whether the mirror landed; dirty flags are cleared only on
/// success so the background flush retries the rest.
async fn mirror_now(
    state: &AppState,
    session_id: Uuid,
    measurement: &crate::model::Measurement,
    pin: Option<&Pin>,
) -> bool {
    let Some(pool) = &state.pool else {
        return false;
    };

    let result = async {
        measurement::flush_measurements(pool, std::slice::from_ref(measurement)).await?;
        if let Some(pin) = pin {
            pin::flush_pins(pool, std::slice::from_ref(pin)).await?;
        }
        Ok::<(), sqlx::Error>(())
    }
    .await;

    match result {
        Ok(()) => {
            let mut sessions = state.sessions.write().await;
            if let Some(session) = sessions.get_mut(&session_id) {
                session.dirty_measurements.remove(&measurement.id);
                if let Some(pin) = pin {
                    session.dirty_pins.remove(&pin.id);
                }
            }
            true
        }
        Err(error) => {
            warn!(error = %error, %session_id, "measurement mirror failed; keeping local copy");
            false
        }
    }
}

// =============================================================================
// PATH MEASUREMENT
// =============================================================================

/// Drive the surface's measuring mode over a traced path and return the
/// completed polygon measurement.
///
/// # Errors
///
/// Returns `SessionNotFound` for an unknown session and a degenerate-path
/// validation error when fewer than 3 points are supplied.
pub async fn trace_path(
    state: &AppState,
    session_id: Uuid,
    kind: FeatureKind,
    points: &[LatLng],
) -> Result<PathMeasurement, WorkflowError> {
    {
        let sessions = state.sessions.read().await;
        if !sessions.contains_key(&session_id) {
            return Err(WorkflowError::Measurement(MeasurementError::SessionNotFound(session_id)));
        }
    }

    let mut surface = state.surface.lock().await;
    surface.begin_measuring(kind);

    for point in points {
        if let ClickOutcome::Measured(result) = surface.click(*point) {
            return Ok(result);
        }
    }

    surface.cancel_measuring();
    Err(WorkflowError::Measurement(MeasurementError::Invalid(
        crate::measure::MeasureError::DegeneratePath(points.len()),
    )))
}

#[cfg(test)]
#[path = "workflow_test.rs"]
mod tests;
