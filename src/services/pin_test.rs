use super::*;
use crate::state::test_helpers;

#[tokio::test]
async fn add_pin_succeeds_and_marks_dirty() {
    let state = test_helpers::test_app_state();
    let session_id = test_helpers::seed_session(&state).await;

    let pin = add_pin(&state, session_id, "456 Broadway, New York, NY 10013", LatLng::new(40.7505, -74.0025))
        .await
        .unwrap();
    assert_eq!(pin.address, "456 Broadway, New York, NY 10013");
    assert!(pin.measurement.is_none());

    let sessions = state.sessions.read().await;
    let session = sessions.get(&session_id).unwrap();
    assert!(session.pins.contains_key(&pin.id));
    assert!(session.dirty_pins.contains(&pin.id));
}

#[tokio::test]
async fn add_pin_unknown_session_fails() {
    let state = test_helpers::test_app_state();
    let result = add_pin(&state, Uuid::new_v4(), "nowhere", LatLng::new(0.0, 0.0)).await;
    assert!(matches!(result.unwrap_err(), PinError::SessionNotFound(_)));
}

#[tokio::test]
async fn remove_pin_deletes_from_list() {
    let state = test_helpers::test_app_state();
    let session_id = test_helpers::seed_session(&state).await;
    let pin = add_pin(&state, session_id, "somewhere", LatLng::new(40.7, -74.0))
        .await
        .unwrap();

    remove_pin(&state, session_id, pin.id).await.unwrap();
    let pins = list_pins(&state, session_id).await.unwrap();
    assert!(pins.is_empty());
}

#[tokio::test]
async fn remove_pin_leaves_tombstone_for_flush() {
    let state = test_helpers::test_app_state();
    let session_id = test_helpers::seed_session(&state).await;
    let pin = add_pin(&state, session_id, "somewhere", LatLng::new(40.7, -74.0))
        .await
        .unwrap();

    remove_pin(&state, session_id, pin.id).await.unwrap();

    let sessions = state.sessions.read().await;
    let session = sessions.get(&session_id).unwrap();
    assert!(!session.dirty_pins.contains(&pin.id));
    assert!(session.deleted_pins.contains(&pin.id));
}

#[tokio::test]
async fn remove_absent_pin_is_a_no_op() {
    let state = test_helpers::test_app_state();
    let session_id = test_helpers::seed_session(&state).await;
    // No throw, no error, no tombstone.
    let absent = Uuid::new_v4();
    remove_pin(&state, session_id, absent).await.unwrap();

    let sessions = state.sessions.read().await;
    assert!(!sessions.get(&session_id).unwrap().deleted_pins.contains(&absent));
}

#[tokio::test]
async fn attach_measurement_upserts_and_is_idempotent() {
    let state = test_helpers::test_app_state();
    let session_id = test_helpers::seed_session(&state).await;
    let pin = add_pin(&state, session_id, "lawn job", LatLng::new(40.7, -74.0))
        .await
        .unwrap();

    let summary = MeasurementSummary { length_ft: 20.0, width_ft: 15.0, area_sq_ft: 300.0 };
    let updated = attach_measurement(&state, session_id, pin.id, summary).await.unwrap();
    assert_eq!(updated.measurement, Some(summary));

    // Re-save with the same input yields the same stored value.
    let again = attach_measurement(&state, session_id, pin.id, summary).await.unwrap();
    assert_eq!(again.measurement, Some(summary));

    let pins = list_pins(&state, session_id).await.unwrap();
    assert_eq!(pins[0].measurement, Some(summary));
}

#[tokio::test]
async fn attach_measurement_unknown_pin_fails() {
    let state = test_helpers::test_app_state();
    let session_id = test_helpers::seed_session(&state).await;
    let summary = MeasurementSummary { length_ft: 1.0, width_ft: 1.0, area_sq_ft: 1.0 };
    let result = attach_measurement(&state, session_id, Uuid::new_v4(), summary).await;
    assert!(matches!(result.unwrap_err(), PinError::PinNotFound(_)));
}

#[tokio::test]
async fn list_pins_is_oldest_first() {
    let state = test_helpers::test_app_state();
    let session_id = test_helpers::seed_session(&state).await;

    // Force distinct timestamps by seeding directly.
    {
        let mut sessions = state.sessions.write().await;
        let session = sessions.get_mut(&session_id).unwrap();
        let mut older = test_helpers::dummy_pin(session_id);
        older.address = "older".into();
        older.created_at_ms -= 5_000;
        let mut newer = test_helpers::dummy_pin(session_id);
        newer.address = "newer".into();
        session.pins.insert(older.id, older);
        session.pins.insert(newer.id, newer);
    }

    let pins = list_pins(&state, session_id).await.unwrap();
    assert_eq!(pins.len(), 2);
    assert_eq!(pins[0].address, "older");
    assert_eq!(pins[1].address, "newer");
}

#[tokio::test]
async fn pin_stats_counts_recent_window() {
    let state = test_helpers::test_app_state();
    let session_id = test_helpers::seed_session(&state).await;

    {
        let mut sessions = state.sessions.write().await;
        let session = sessions.get_mut(&session_id).unwrap();
        let mut stale = test_helpers::dummy_pin(session_id);
        stale.created_at_ms -= 2 * 24 * 60 * 60 * 1000;
        session.pins.insert(stale.id, stale);
        let fresh = test_helpers::dummy_pin(session_id);
        session.pins.insert(fresh.id, fresh);
    }

    let stats = pin_stats(&state, session_id).await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.recent_24h, 1);
}
