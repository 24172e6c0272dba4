//! Persistence service — background flush for dirty pins and measurements.
//!
//! DESIGN
//! ======
//! A background task flushes dirty session state, then sleeps before the
//! next cycle. Online, dirty pins are upserted and dirty measurements
//! inserted into Postgres; dirty ids are drained under the lock and
//! restored on failure so nothing is lost to a flush error. Local
//! deletions leave tombstones that each cycle turns into remote deletes
//! after the upserts, so a removal racing an in-flight write still
//! converges on deletion. Offline, the whole session map is serialized to
//! a JSON snapshot file and reloaded at the next offline startup.
//!
//! ERROR HANDLING
//! ==============
//! Flush failures are logged and retried on the next cycle. Duplicate
//! flush attempts are acceptable (upserts / insert-on-conflict-nothing);
//! silent data loss is not.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::model::Measurement;
use crate::state::{AppState, Pin, SessionState, now_ms};

const DEFAULT_FLUSH_INTERVAL_MS: u64 = 500;
const SNAPSHOT_VERSION: u8 = 1;

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Spawn the background persistence task. Returns a handle for shutdown.
pub fn spawn_persistence_task(state: AppState) -> JoinHandle<()> {
    let flush_interval_ms = env_parse("FLUSH_INTERVAL_MS", DEFAULT_FLUSH_INTERVAL_MS);
    info!(flush_interval_ms, online = state.online(), "persistence flush configured");
    tokio::spawn(async move {
        loop {
            flush_all_dirty(&state).await;
            tokio::time::sleep(Duration::from_millis(flush_interval_ms)).await;
        }
    })
}

// =============================================================================
// FLUSH
// =============================================================================

struct DirtyFlushBatch {
    session_id: Uuid,
    pins: Vec<Pin>,
    measurements: Vec<Measurement>,
    pin_ids: Vec<Uuid>,
    measurement_ids: Vec<Uuid>,
    deleted_pin_ids: Vec<Uuid>,
    deleted_measurement_ids: Vec<Uuid>,
}

async fn flush_all_dirty(state: &AppState) {
    if state.online() {
        flush_to_database(state).await;
    } else {
        flush_to_snapshot(state).await;
    }
}

async fn flush_to_database(state: &AppState) {
    let Some(pool) = &state.pool else { return };

    // PHASE: DRAIN DIRTY IDS + SNAPSHOT ROWS
    // Clones are collected under the lock, I/O happens lock-free.
    let batches = {
        let mut sessions = state.sessions.write().await;
        let mut collected = Vec::new();

        for (session_id, session) in sessions.iter_mut() {
            if session.dirty_pins.is_empty()
                && session.dirty_measurements.is_empty()
                && session.deleted_pins.is_empty()
                && session.deleted_measurements.is_empty()
            {
                continue;
            }

            let pin_ids: Vec<Uuid> = session.dirty_pins.drain().collect();
            let measurement_ids: Vec<Uuid> = session.dirty_measurements.drain().collect();
            let pins = pin_ids
                .iter()
                .filter_map(|id| session.pins.get(id).cloned())
                .collect();
            let measurements = measurement_ids
                .iter()
                .filter_map(|id| session.measurements.get(id).cloned())
                .collect();

            collected.push(DirtyFlushBatch {
                session_id: *session_id,
                pins,
                measurements,
                pin_ids,
                measurement_ids,
                deleted_pin_ids: session.deleted_pins.drain().collect(),
                deleted_measurement_ids: session.deleted_measurements.drain().collect(),
            });
        }

        collected
    };

    // PHASE: FLUSH PER SESSION; RESTORE DIRTY IDS ON FAILURE
    // Deletes run after the upserts so a stale clone resurrected by an
    // earlier in-flight write is removed in the same cycle.
    for batch in batches {
        let result = async {
            if !batch.measurements.is_empty() {
                crate::services::measurement::flush_measurements(pool, &batch.measurements).await?;
            }
            if !batch.pins.is_empty() {
                crate::services::pin::flush_pins(pool, &batch.pins).await?;
            }
            if !batch.deleted_measurement_ids.is_empty() {
                sqlx::query("DELETE FROM measurements WHERE id = ANY($1)")
                    .bind(&batch.deleted_measurement_ids)
                    .execute(pool)
                    .await?;
            }
            if !batch.deleted_pin_ids.is_empty() {
                sqlx::query("DELETE FROM pins WHERE id = ANY($1)")
                    .bind(&batch.deleted_pin_ids)
                    .execute(pool)
                    .await?;
            }
            Ok::<(), sqlx::Error>(())
        }
        .await;

        if let Err(e) = result {
            error!(
                error = %e,
                pins = batch.pins.len(),
                measurements = batch.measurements.len(),
                session_id = %batch.session_id,
                "persistence flush failed; will retry"
            );
            let mut sessions = state.sessions.write().await;
            if let Some(session) = sessions.get_mut(&batch.session_id) {
                session.dirty_pins.extend(batch.pin_ids);
                session.dirty_measurements.extend(batch.measurement_ids);
                session.deleted_pins.extend(batch.deleted_pin_ids);
                session.deleted_measurements.extend(batch.deleted_measurement_ids);
            }
        }
    }
}

async fn flush_to_snapshot(state: &AppState) {
    let has_dirty = {
        let sessions = state.sessions.read().await;
        sessions.values().any(|s| {
            !s.dirty_pins.is_empty()
                || !s.dirty_measurements.is_empty()
                || !s.deleted_pins.is_empty()
                || !s.deleted_measurements.is_empty()
        })
    };
    if !has_dirty {
        return;
    }

    match write_snapshot(state).await {
        Ok(()) => {
            // The snapshot holds the whole session map, so deletions are
            // already reflected; tombstones are spent once it lands.
            let mut sessions = state.sessions.write().await;
            for session in sessions.values_mut() {
                session.dirty_pins.clear();
                session.dirty_measurements.clear();
                session.deleted_pins.clear();
                session.deleted_measurements.clear();
            }
        }
        Err(e) => {
            warn!(error = %e, path = %state.snapshot_path.display(), "snapshot write failed; will retry");
        }
    }
}

// =============================================================================
// SNAPSHOT FORMAT
// =============================================================================

#[derive(Serialize, Deserialize)]
struct SessionSnapshot {
    pins: Vec<Pin>,
    measurements: Vec<Measurement>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u8,
    saved_at_ms: i64,
    sessions: HashMap<Uuid, SessionSnapshot>,
}

/// Serialize the whole session map to the snapshot file.
///
/// # Errors
///
/// Returns an error when serialization or the file write fails.
pub async fn write_snapshot(state: &AppState) -> std::io::Result<()> {
    let snapshot = {
        let sessions = state.sessions.read().await;
        Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at_ms: now_ms(),
            sessions: sessions
                .iter()
                .map(|(id, s)| {
                    (*id, SessionSnapshot {
                        pins: s.pins.values().cloned().collect(),
                        measurements: s.measurements.values().cloned().collect(),
                    })
                })
                .collect(),
        }
    };

    let bytes = serde_json::to_vec(&snapshot)?;
    tokio::fs::write(state.snapshot_path.as_path(), bytes).await
}

/// Load a snapshot written by a previous offline run. Missing or
/// malformed files yield an empty session map rather than an error.
pub async fn load_snapshot(path: &Path) -> HashMap<Uuid, SessionState> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(_) => return HashMap::new(),
    };

    let snapshot: Snapshot = match serde_json::from_slice(&bytes) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(error = %e, path = %path.display(), "snapshot unreadable; starting empty");
            return HashMap::new();
        }
    };

    info!(sessions = snapshot.sessions.len(), path = %path.display(), "restored offline snapshot");
    snapshot
        .sessions
        .into_iter()
        .map(|(id, s)| {
            let mut session = SessionState::new();
            for pin in s.pins {
                session.pins.insert(pin.id, pin);
            }
            for record in s.measurements {
                session.measurements.insert(record.id, record);
            }
            (id, session)
        })
        .collect()
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
