//! Measurement routes: list, create, bulk clear, and path measurement.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{FeatureKind, LatLng, Measurement};
use crate::services::measurement::{self, MeasurementError, SaveMeasurementRequest};
use crate::services::workflow::{self, MeasureSaveOutcome};
use crate::state::AppState;

use super::pins::workflow_error_to_status;

/// `GET /api/sessions/:id/measurements` — list records, newest first.
pub async fn list(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Vec<Measurement>>, StatusCode> {
    let records = measurement::list_measurements(&state, session_id)
        .await
        .map_err(measurement_error_to_status)?;
    Ok(Json(records))
}

/// `POST /api/sessions/:id/measurements` — validate, derive, save, and
/// upsert the owning pin. A failed remote mirror still returns 201 with
/// `mirrored: false`.
pub async fn create(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SaveMeasurementRequest>,
) -> Result<(StatusCode, Json<MeasureSaveOutcome>), StatusCode> {
    let outcome = workflow::measure_and_save(&state, session_id, request)
        .await
        .map_err(workflow_error_to_status)?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[derive(Serialize)]
pub struct ClearResponse {
    pub cleared: usize,
}

/// `DELETE /api/sessions/:id/measurements` — bulk clear, the only delete
/// path for measurement records.
pub async fn clear(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ClearResponse>, StatusCode> {
    let cleared = measurement::clear_measurements(&state, session_id)
        .await
        .map_err(measurement_error_to_status)?;
    Ok(Json(ClearResponse { cleared }))
}

// =============================================================================
// PATH MEASUREMENT
// =============================================================================

#[derive(Deserialize)]
pub struct MeasurePathBody {
    #[serde(rename = "type")]
    pub kind: FeatureKind,
    pub points: Vec<LatLng>,
}

#[derive(Debug, Serialize)]
pub struct MeasurePathResponse {
    #[serde(rename = "type")]
    pub kind: FeatureKind,
    pub area_sq_ft: f64,
    pub points: Vec<LatLng>,
}

/// `POST /api/sessions/:id/measure-path` — trace a polygon on the surface
/// and return the computed area as a measurement seed.
pub async fn measure_path(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<MeasurePathBody>,
) -> Result<Json<MeasurePathResponse>, StatusCode> {
    let result = workflow::trace_path(&state, session_id, body.kind, &body.points)
        .await
        .map_err(workflow_error_to_status)?;
    Ok(Json(MeasurePathResponse { kind: result.kind, area_sq_ft: result.area_sq_ft, points: result.path }))
}

pub(crate) fn measurement_error_to_status(err: MeasurementError) -> StatusCode {
    match err {
        MeasurementError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        MeasurementError::Invalid(_) | MeasurementError::MaterialNotAllowed { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Dimensions;
    use crate::state::test_helpers;

    #[test]
    fn measurement_error_to_status_maps_validation() {
        let err = MeasurementError::Invalid(crate::measure::MeasureError::InvalidDepth(-1.0));
        assert_eq!(measurement_error_to_status(err), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn measurement_error_to_status_maps_missing_session() {
        let err = MeasurementError::SessionNotFound(Uuid::nil());
        assert_eq!(measurement_error_to_status(err), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn create_list_clear_round_trip() {
        let state = test_helpers::test_app_state();
        let session_id = test_helpers::seed_session(&state).await;

        let request = SaveMeasurementRequest {
            kind: FeatureKind::Driveway,
            material: None,
            dimensions: Dimensions::Linear { length_ft: 40.0, width_ft: 12.0, depth_in: 0.0 },
            location: "front driveway".into(),
            notes: String::new(),
            coordinates: None,
            pin_id: None,
        };
        let (status, Json(outcome)) = create(State(state.clone()), Path(session_id), Json(request))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(outcome.measurement.area_sq_ft, Some(480.0));

        let Json(records) = list(State(state.clone()), Path(session_id)).await.unwrap();
        assert_eq!(records.len(), 1);

        let Json(cleared) = clear(State(state.clone()), Path(session_id)).await.unwrap();
        assert_eq!(cleared.cleared, 1);
        let Json(records) = list(State(state), Path(session_id)).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn create_rejects_bad_dimensions_as_422() {
        let state = test_helpers::test_app_state();
        let session_id = test_helpers::seed_session(&state).await;

        let request = SaveMeasurementRequest {
            kind: FeatureKind::Lawn,
            material: None,
            dimensions: Dimensions::Linear { length_ft: 0.0, width_ft: 10.0, depth_in: 0.0 },
            location: "bad".into(),
            notes: String::new(),
            coordinates: None,
            pin_id: None,
        };
        let result = create(State(state), Path(session_id), Json(request)).await;
        assert_eq!(result.unwrap_err(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn measure_path_route_computes_area() {
        let state = test_helpers::test_app_state();
        let session_id = test_helpers::seed_session(&state).await;

        let body = MeasurePathBody {
            kind: FeatureKind::Garden,
            points: vec![
                LatLng::new(40.7000, -74.0000),
                LatLng::new(40.7000, -73.9995),
                LatLng::new(40.7005, -74.0000),
            ],
        };
        let Json(response) = measure_path(State(state), Path(session_id), Json(body)).await.unwrap();
        assert_eq!(response.kind, FeatureKind::Garden);
        assert!(response.area_sq_ft > 0.0);
        assert_eq!(response.points.len(), 3);
    }

    #[tokio::test]
    async fn measure_path_unknown_session_is_404() {
        let state = test_helpers::test_app_state();
        let body = MeasurePathBody {
            kind: FeatureKind::Lawn,
            points: vec![
                LatLng::new(40.7000, -74.0000),
                LatLng::new(40.7000, -73.9995),
                LatLng::new(40.7005, -74.0000),
            ],
        };
        let result = measure_path(State(state), Path(Uuid::new_v4()), Json(body)).await;
        assert_eq!(result.unwrap_err(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn measure_path_route_rejects_two_points() {
        let state = test_helpers::test_app_state();
        let session_id = test_helpers::seed_session(&state).await;

        let body = MeasurePathBody {
            kind: FeatureKind::Lawn,
            points: vec![LatLng::new(40.7, -74.0), LatLng::new(40.71, -74.0)],
        };
        let result = measure_path(State(state), Path(session_id), Json(body)).await;
        assert_eq!(result.unwrap_err(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
