//! Session and pin routes, including the JSONL snapshot surface.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{LatLng, MeasurementSummary};
use crate::services::pin::{self, PinError, PinStats};
use crate::services::workflow::{self, SearchPinOutcome, WorkflowError};
use crate::state::{AppState, Pin, now_ms};

// =============================================================================
// SESSIONS
// =============================================================================

#[derive(Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub online: bool,
    /// Pins already available at open (kept in memory or hydrated from
    /// the remote store).
    pub restored_pins: usize,
    pub restored_measurements: usize,
}

#[derive(Deserialize, Default)]
pub struct CreateSessionBody {
    /// Reopen an existing session instead of minting a fresh id. When
    /// online and not in memory, the session is hydrated from Postgres.
    pub id: Option<Uuid>,
}

/// `POST /api/sessions` — open a measurement session. The body is
/// optional; `{"id": ...}` reopens that session.
pub async fn create_session(
    State(state): State<AppState>,
    body: Option<Json<CreateSessionBody>>,
) -> (StatusCode, Json<SessionResponse>) {
    let requested = body.and_then(|Json(body)| body.id);
    let opened = workflow::open_session(&state, requested).await;
    (
        StatusCode::CREATED,
        Json(SessionResponse {
            id: opened.id,
            online: state.online(),
            restored_pins: opened.restored_pins,
            restored_measurements: opened.restored_measurements,
        }),
    )
}

// =============================================================================
// PINS
// =============================================================================

#[derive(Deserialize)]
pub struct CreatePinBody {
    pub address: Option<String>,
    pub lat: f64,
    pub lng: f64,
}

/// `GET /api/sessions/:id/pins` — list pins, oldest first.
pub async fn list_pins(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Vec<Pin>>, StatusCode> {
    let pins = pin::list_pins(&state, session_id)
        .await
        .map_err(pin_error_to_status)?;
    Ok(Json(pins))
}

/// `POST /api/sessions/:id/pins` — place a pin directly (map click).
pub async fn create_pin(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<CreatePinBody>,
) -> Result<(StatusCode, Json<Pin>), StatusCode> {
    let address = body.address.unwrap_or_else(|| "Dropped pin".to_owned());
    let created = pin::add_pin(&state, session_id, &address, LatLng::new(body.lat, body.lng))
        .await
        .map_err(pin_error_to_status)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `DELETE /api/sessions/:id/pins/:pin_id` — remove a pin. Absent ids are
/// a no-op, per the store contract.
pub async fn delete_pin(
    State(state): State<AppState>,
    Path((session_id, pin_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    pin::remove_pin(&state, session_id, pin_id)
        .await
        .map_err(pin_error_to_status)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `GET /api/sessions/:id/pins/stats` — total and recent pin counters.
pub async fn stats(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<PinStats>, StatusCode> {
    let stats = pin::pin_stats(&state, session_id)
        .await
        .map_err(pin_error_to_status)?;
    Ok(Json(stats))
}

// =============================================================================
// SEARCH → PIN
// =============================================================================

#[derive(Deserialize)]
pub struct SearchPinBody {
    pub term: String,
}

/// `POST /api/sessions/:id/search-pin` — resolve a free-text address and
/// drop a pin at the result.
pub async fn search_pin(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<SearchPinBody>,
) -> Result<(StatusCode, Json<SearchPinOutcome>), StatusCode> {
    let outcome = workflow::search_and_pin(&state, session_id, &body.term)
        .await
        .map_err(workflow_error_to_status)?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

// =============================================================================
// ERROR MAPPING
// =============================================================================

pub(crate) fn pin_error_to_status(err: PinError) -> StatusCode {
    match err {
        PinError::SessionNotFound(_) | PinError::PinNotFound(_) => StatusCode::NOT_FOUND,
    }
}

pub(crate) fn workflow_error_to_status(err: WorkflowError) -> StatusCode {
    use crate::services::address::ResolveError;
    use crate::services::measurement::MeasurementError;

    match err {
        WorkflowError::Resolve(ResolveError::EmptyQuery) => StatusCode::BAD_REQUEST,
        WorkflowError::Resolve(ResolveError::Provider(_)) => StatusCode::BAD_GATEWAY,
        WorkflowError::Pin(e) => pin_error_to_status(e),
        WorkflowError::Measurement(MeasurementError::SessionNotFound(_)) => StatusCode::NOT_FOUND,
        WorkflowError::Measurement(
            MeasurementError::Invalid(_) | MeasurementError::MaterialNotAllowed { .. },
        ) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

// =============================================================================
// EXPORT / IMPORT
// =============================================================================

#[derive(Serialize)]
struct SessionExportMetaLine {
    #[serde(rename = "type")]
    line_type: &'static str,
    version: u8,
    session_id: Uuid,
    exported_at_ms: i64,
    pin_count: usize,
}

#[derive(Serialize)]
struct SessionExportPinLine {
    #[serde(rename = "type")]
    line_type: &'static str,
    #[serde(flatten)]
    pin: Pin,
}

#[derive(Deserialize)]
pub struct ImportJsonlBody {
    pub jsonl: String,
}

#[derive(Serialize)]
pub struct ImportJsonlResponse {
    pub imported: usize,
    pub skipped: usize,
}

/// `GET /api/sessions/:id/export.jsonl` — download the session's pins as
/// NDJSON/JSONL.
pub async fn export_jsonl(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Response, StatusCode> {
    let pins = pin::list_pins(&state, session_id)
        .await
        .map_err(pin_error_to_status)?;

    let mut lines = Vec::with_capacity(pins.len() + 1);
    let meta = SessionExportMetaLine {
        line_type: "session_export_meta",
        version: 1,
        session_id,
        exported_at_ms: now_ms(),
        pin_count: pins.len(),
    };
    let meta_line = serde_json::to_string(&meta).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    lines.push(format!("{meta_line}\n"));

    for pin in pins {
        let line = SessionExportPinLine { line_type: "pin", pin };
        let serialized = serde_json::to_string(&line).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        lines.push(format!("{serialized}\n"));
    }

    let stream = futures::stream::iter(
        lines
            .into_iter()
            .map(|line| Ok::<axum::body::Bytes, std::convert::Infallible>(axum::body::Bytes::from(line))),
    );
    let body = axum::body::Body::from_stream(stream);
    let filename = format!("session-{session_id}.jsonl");

    Ok((
        [
            (CONTENT_TYPE, "application/x-ndjson; charset=utf-8"),
            (CONTENT_DISPOSITION, &format!("attachment; filename=\"{filename}\"")),
        ],
        body,
    )
        .into_response())
}

/// Parse one JSONL line into a pin for this session. Meta lines and
/// unknown shapes are skipped. Imported pins get fresh ids.
pub(crate) fn parse_import_pin_line(line: &str, session_id: Uuid) -> Result<Option<Pin>, serde_json::Error> {
    let value = serde_json::from_str::<serde_json::Value>(line)?;
    let Some(map) = value.as_object() else {
        return Ok(None);
    };

    let line_type = map.get("type").and_then(serde_json::Value::as_str);
    if line_type == Some("session_export_meta") {
        return Ok(None);
    }
    if line_type != Some("pin") && !map.contains_key("position") {
        return Ok(None);
    }

    let Some(position) = map.get("position").and_then(|v| {
        let lat = v.get("lat").and_then(serde_json::Value::as_f64)?;
        let lng = v.get("lng").and_then(serde_json::Value::as_f64)?;
        Some(LatLng::new(lat, lng))
    }) else {
        return Ok(None);
    };

    let address = map
        .get("address")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("Imported pin")
        .to_owned();
    let measurement = map
        .get("measurement")
        .and_then(|v| serde_json::from_value::<MeasurementSummary>(v.clone()).ok());
    let created_at_ms = map
        .get("created_at_ms")
        .and_then(serde_json::Value::as_i64)
        .unwrap_or_else(now_ms);

    Ok(Some(Pin { id: Uuid::new_v4(), session_id, address, position, measurement, created_at_ms }))
}

/// `POST /api/sessions/:id/import.jsonl` — import NDJSON/JSONL pin lines.
pub async fn import_jsonl(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<ImportJsonlBody>,
) -> Result<Json<ImportJsonlResponse>, StatusCode> {
    let mut pins = Vec::new();
    let mut skipped = 0_usize;

    for raw_line in body.jsonl.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_import_pin_line(line, session_id) {
            Ok(Some(pin)) => pins.push(pin),
            Ok(None) | Err(_) => skipped = skipped.saturating_add(1),
        }
    }

    {
        let mut sessions = state.sessions.write().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or(StatusCode::NOT_FOUND)?;
        for pin in &pins {
            session.dirty_pins.insert(pin.id);
            session.pins.insert(pin.id, pin.clone());
        }
    }

    Ok(Json(ImportJsonlResponse { imported: pins.len(), skipped }))
}

#[cfg(test)]
#[path = "pins_test.rs"]
mod tests;
