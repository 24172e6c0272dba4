//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds an optional database pool (absent when running offline), the mounted
//! map surface, and a map of live measurement sessions. Each session owns its
//! in-memory pins and measurements plus dirty sets for debounced persistence.
//! Sessions are single-writer: nothing is shared across them.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::model::{LatLng, Measurement, MeasurementSummary};
use crate::surface::MapSurface;

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

// =============================================================================
// PIN
// =============================================================================

/// A saved property location, optionally carrying measurement results.
/// Mirrors the `pins` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pin {
    pub id: Uuid,
    pub session_id: Uuid,
    pub address: String,
    pub position: LatLng,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement: Option<MeasurementSummary>,
    /// Milliseconds since Unix epoch.
    pub created_at_ms: i64,
}

// =============================================================================
// SESSION STATE
// =============================================================================

/// Per-session live state. Kept in memory for interactive latency and
/// flushed to Postgres (or the local snapshot) by the persistence task.
pub struct SessionState {
    /// Current pins keyed by pin ID.
    pub pins: HashMap<Uuid, Pin>,
    /// Saved measurements keyed by measurement ID.
    pub measurements: HashMap<Uuid, Measurement>,
    /// Pin IDs modified since last flush.
    pub dirty_pins: HashSet<Uuid>,
    /// Measurement IDs created since last flush.
    pub dirty_measurements: HashSet<Uuid>,
    /// Pin IDs removed locally but possibly still present remotely. An
    /// in-flight flush can upsert a clone of a pin that was deleted while
    /// the write was running; the tombstone lets the next flush delete it
    /// again, so removal always converges.
    pub deleted_pins: HashSet<Uuid>,
    /// Measurement IDs cleared locally but possibly still present remotely.
    pub deleted_measurements: HashSet<Uuid>,
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pins: HashMap::new(),
            measurements: HashMap::new(),
            dirty_pins: HashSet::new(),
            dirty_measurements: HashSet::new(),
            deleted_pins: HashSet::new(),
            deleted_measurements: HashSet::new(),
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state. Clone is required by Axum — all inner fields
/// are Arc-wrapped or cheaply cloneable.
#[derive(Clone)]
pub struct AppState {
    /// `None` when no database is configured or reachable; the service then
    /// runs offline against the local snapshot only.
    pub pool: Option<PgPool>,
    pub sessions: Arc<RwLock<HashMap<Uuid, SessionState>>>,
    /// The mounted map surface (live provider or deterministic mock).
    pub surface: Arc<Mutex<Box<dyn MapSurface>>>,
    /// Where the offline snapshot is written.
    pub snapshot_path: Arc<PathBuf>,
}

impl AppState {
    #[must_use]
    pub fn new(pool: Option<PgPool>, surface: Box<dyn MapSurface>, snapshot_path: PathBuf) -> Self {
        Self {
            pool,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            surface: Arc::new(Mutex::new(surface)),
            snapshot_path: Arc::new(snapshot_path),
        }
    }

    /// Whether writes are mirrored to the remote store.
    #[must_use]
    pub fn online(&self) -> bool {
        self.pool.is_some()
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use crate::model::{Coordinates, Dimensions, FeatureKind};
    use crate::surface::mock::MockSurface;

    /// Create an offline test `AppState` backed by a mock surface.
    #[must_use]
    pub fn test_app_state() -> AppState {
        let snapshot = std::env::temp_dir().join(format!("groundplot-test-{}.json", Uuid::new_v4()));
        AppState::new(None, Box::new(MockSurface::new()), snapshot)
    }

    /// Seed an empty session and return its ID.
    pub async fn seed_session(state: &AppState) -> Uuid {
        let session_id = Uuid::new_v4();
        let mut sessions = state.sessions.write().await;
        sessions.insert(session_id, SessionState::new());
        session_id
    }

    /// Create a dummy `Pin` for testing.
    #[must_use]
    pub fn dummy_pin(session_id: Uuid) -> Pin {
        Pin {
            id: Uuid::new_v4(),
            session_id,
            address: "123 Main St, New York, NY 10001".into(),
            position: LatLng::new(40.7589, -73.9851),
            measurement: None,
            created_at_ms: now_ms(),
        }
    }

    /// Create a dummy lawn `Measurement` for testing.
    #[must_use]
    pub fn dummy_measurement(session_id: Uuid, pin_id: Option<Uuid>) -> Measurement {
        Measurement {
            id: Uuid::new_v4(),
            session_id,
            pin_id,
            kind: FeatureKind::Lawn,
            material: None,
            dimensions: Dimensions::Linear { length_ft: 20.0, width_ft: 15.0, depth_in: 0.0 },
            area_sq_ft: Some(300.0),
            volume_cu_ft: None,
            location: "test lawn".into(),
            notes: String::new(),
            coordinates: Some(Coordinates::Point { position: LatLng::new(40.7128, -74.006) }),
            created_at_ms: now_ms(),
        }
    }
}
