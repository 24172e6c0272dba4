use super::*;
use crate::services::address::ResolveError;
use crate::services::measurement::MeasurementError;
use crate::state::test_helpers;

#[test]
fn pin_error_to_status_maps_not_found() {
    assert_eq!(pin_error_to_status(PinError::SessionNotFound(Uuid::nil())), StatusCode::NOT_FOUND);
    assert_eq!(pin_error_to_status(PinError::PinNotFound(Uuid::nil())), StatusCode::NOT_FOUND);
}

#[test]
fn workflow_error_to_status_maps_empty_query() {
    let err = WorkflowError::Resolve(ResolveError::EmptyQuery);
    assert_eq!(workflow_error_to_status(err), StatusCode::BAD_REQUEST);
}

#[test]
fn workflow_error_to_status_maps_validation() {
    let err = WorkflowError::Measurement(MeasurementError::MaterialNotAllowed { kind: "lawn" });
    assert_eq!(workflow_error_to_status(err), StatusCode::UNPROCESSABLE_ENTITY);
}

#[test]
fn workflow_error_to_status_maps_missing_session() {
    let err = WorkflowError::Measurement(MeasurementError::SessionNotFound(Uuid::nil()));
    assert_eq!(workflow_error_to_status(err), StatusCode::NOT_FOUND);
}

#[test]
fn parse_import_skips_meta_line() {
    let line = r#"{"type":"session_export_meta","version":1,"session_id":"00000000-0000-0000-0000-000000000000"}"#;
    let result = parse_import_pin_line(line, Uuid::nil()).unwrap();
    assert!(result.is_none());
}

#[test]
fn parse_import_skips_unknown_type() {
    let line = r#"{"type":"unknown_type","foo":"bar"}"#;
    let result = parse_import_pin_line(line, Uuid::nil()).unwrap();
    assert!(result.is_none());
}

#[test]
fn parse_import_parses_pin_line() {
    let session_id = Uuid::new_v4();
    let line = r#"{"type":"pin","address":"456 Broadway, New York, NY 10013","position":{"lat":40.7505,"lng":-74.0025},"measurement":{"length_ft":20.0,"width_ft":15.0,"area_sq_ft":300.0},"created_at_ms":1700000000000}"#;
    let pin = parse_import_pin_line(line, session_id).unwrap().unwrap();
    assert_eq!(pin.session_id, session_id);
    assert_eq!(pin.address, "456 Broadway, New York, NY 10013");
    assert!((pin.position.lat - 40.7505).abs() < f64::EPSILON);
    assert!((pin.position.lng - (-74.0025)).abs() < f64::EPSILON);
    let summary = pin.measurement.unwrap();
    assert!((summary.area_sq_ft - 300.0).abs() < f64::EPSILON);
    assert_eq!(pin.created_at_ms, 1_700_000_000_000);
}

#[test]
fn parse_import_defaults_missing_fields() {
    let line = r#"{"position":{"lat":40.7,"lng":-74.0}}"#;
    let pin = parse_import_pin_line(line, Uuid::nil()).unwrap().unwrap();
    assert_eq!(pin.address, "Imported pin");
    assert!(pin.measurement.is_none());
}

#[test]
fn parse_import_rejects_malformed_position() {
    let line = r#"{"type":"pin","position":{"lat":"not a number"}}"#;
    let result = parse_import_pin_line(line, Uuid::nil()).unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn create_session_then_pin_round_trip() {
    let state = test_helpers::test_app_state();
    let (status, Json(session)) = create_session(State(state.clone()), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(!session.online);
    assert_eq!(session.restored_pins, 0);

    let body = CreatePinBody { address: Some("456 Broadway".into()), lat: 40.7505, lng: -74.0025 };
    let (status, Json(pin)) = create_pin(State(state.clone()), Path(session.id), Json(body))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::CREATED);

    let Json(pins) = list_pins(State(state.clone()), Path(session.id)).await.unwrap();
    assert_eq!(pins.len(), 1);
    assert_eq!(pins[0].id, pin.id);

    delete_pin(State(state.clone()), Path((session.id, pin.id))).await.unwrap();
    let Json(pins) = list_pins(State(state), Path(session.id)).await.unwrap();
    assert!(pins.is_empty());
}

#[tokio::test]
async fn create_session_with_known_id_reports_existing_pins() {
    let state = test_helpers::test_app_state();
    let session_id = test_helpers::seed_session(&state).await;
    let body = CreatePinBody { address: None, lat: 40.7, lng: -74.0 };
    create_pin(State(state.clone()), Path(session_id), Json(body)).await.unwrap();

    let (status, Json(session)) =
        create_session(State(state), Some(Json(CreateSessionBody { id: Some(session_id) }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(session.id, session_id);
    assert_eq!(session.restored_pins, 1);
    assert_eq!(session.restored_measurements, 0);
}

#[tokio::test]
async fn create_session_with_unknown_id_opens_empty_offline() {
    // Offline there is nothing to hydrate from; the requested id is still
    // honored so a client can resume against its own snapshot exports.
    let state = test_helpers::test_app_state();
    let requested = Uuid::new_v4();
    let (_, Json(session)) =
        create_session(State(state.clone()), Some(Json(CreateSessionBody { id: Some(requested) }))).await;
    assert_eq!(session.id, requested);
    assert_eq!(session.restored_pins, 0);

    let Json(pins) = list_pins(State(state), Path(requested)).await.unwrap();
    assert!(pins.is_empty());
}

#[tokio::test]
async fn list_pins_unknown_session_is_404() {
    let state = test_helpers::test_app_state();
    let result = list_pins(State(state), Path(Uuid::new_v4())).await;
    assert_eq!(result.unwrap_err(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn import_jsonl_counts_imported_and_skipped() {
    let state = test_helpers::test_app_state();
    let session_id = test_helpers::seed_session(&state).await;

    let jsonl = concat!(
        r#"{"type":"session_export_meta","version":1}"#,
        "\n",
        r#"{"type":"pin","address":"a","position":{"lat":1.0,"lng":2.0}}"#,
        "\n",
        "garbage line\n",
        r#"{"type":"pin","address":"b","position":{"lat":3.0,"lng":4.0}}"#,
        "\n",
    );
    let Json(response) = import_jsonl(
        State(state.clone()),
        Path(session_id),
        Json(ImportJsonlBody { jsonl: jsonl.into() }),
    )
    .await
    .unwrap();
    assert_eq!(response.imported, 2);
    assert_eq!(response.skipped, 2);

    let Json(pins) = list_pins(State(state), Path(session_id)).await.unwrap();
    assert_eq!(pins.len(), 2);
}

#[tokio::test]
async fn search_pin_route_places_catalog_pin() {
    let state = test_helpers::test_app_state();
    let session_id = test_helpers::seed_session(&state).await;

    let (status, Json(outcome)) = search_pin(
        State(state.clone()),
        Path(session_id),
        Json(SearchPinBody { term: "Wall St".into() }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert!(outcome.exact);
    assert!(outcome.pin.address.contains("Wall St"));

    let Json(counters) = stats(State(state), Path(session_id)).await.unwrap();
    assert_eq!(counters.total, 1);
    assert_eq!(counters.recent_24h, 1);
}

#[tokio::test]
async fn search_pin_blank_term_is_400() {
    let state = test_helpers::test_app_state();
    let session_id = test_helpers::seed_session(&state).await;
    let result = search_pin(State(state), Path(session_id), Json(SearchPinBody { term: "  ".into() })).await;
    assert_eq!(result.unwrap_err(), StatusCode::BAD_REQUEST);
}
