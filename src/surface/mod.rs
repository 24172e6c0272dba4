//! Map surface abstraction.
//!
//! DESIGN
//! ======
//! Two interchangeable surfaces sit behind one trait: a live provider-backed
//! surface (forward geocoding over HTTP) and a deterministic local mock. The
//! choice is made once at mount by an async capability probe with a bounded
//! timeout; on timeout or failure the service degrades to the mock silently.
//! Degradation is not an error condition — the mock is fully functional for
//! pin placement and path measurement.
//!
//! Each surface runs a small phase machine:
//! `Loading → {Ready | Unavailable}`, and `Ready → Measuring(n) → Ready`
//! on path completion or cancel. Markers are fully replaced on every
//! change; there is no incremental diffing.

pub mod live;
pub mod mock;

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::measure;
use crate::model::{FeatureKind, LatLng};

/// A traced path completes as soon as it has this many vertices.
pub const PATH_MIN_POINTS: usize = 3;

const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2_000;

// =============================================================================
// TYPES
// =============================================================================

/// Lifecycle of a surface instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfacePhase {
    Loading,
    Ready,
    Unavailable,
    /// Measuring mode with the number of path points accumulated so far.
    Measuring { points: usize },
}

/// Emitted when a click lands while not measuring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinEvent {
    pub position: LatLng,
}

/// A finished path measurement: the traced outline and its computed area.
#[derive(Debug, Clone, PartialEq)]
pub struct PathMeasurement {
    pub kind: FeatureKind,
    pub path: Vec<LatLng>,
    pub area_sq_ft: f64,
}

/// What a click produced, depending on the surface phase.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// Normal mode: a pin placement event.
    Pin(PinEvent),
    /// Measuring mode, path not yet complete.
    PathProgress { points: usize },
    /// Measuring mode, path complete. The surface returns to `Ready`.
    Measured(PathMeasurement),
}

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("geocode provider error: {0}")]
    Provider(#[from] reqwest::Error),
    #[error("no geocode result for {0:?}")]
    NoResult(String),
    #[error("unparsable geocode response")]
    Unparsable,
}

// =============================================================================
// TRAIT
// =============================================================================

/// One rendering/interaction surface. Implementations: [`live::LiveSurface`]
/// and [`mock::MockSurface`].
#[async_trait]
pub trait MapSurface: Send + Sync {
    fn phase(&self) -> SurfacePhase;

    /// Handle a click at a map coordinate. In `Ready` this is a pin
    /// placement; in measuring mode it extends the traced path.
    fn click(&mut self, position: LatLng) -> ClickOutcome;

    /// Replace all markers. Full clear + redraw, no diffing.
    fn set_markers(&mut self, positions: &[LatLng]);

    fn marker_count(&self) -> usize;

    /// Enter measuring mode for the given feature kind, dropping any
    /// partial path.
    fn begin_measuring(&mut self, kind: FeatureKind);

    /// Abandon measuring mode and return to `Ready`.
    fn cancel_measuring(&mut self);

    /// Re-center the viewport on the bounding box of `points`.
    fn fit_bounds(&mut self, points: &[LatLng]);

    /// Resolve an address to a coordinate.
    async fn geocode(&self, address: &str) -> Result<LatLng, SurfaceError>;

    /// Human-readable backend name for logs.
    fn backend(&self) -> &'static str;
}

// =============================================================================
// MEASURING STATE
// =============================================================================

/// Path accumulation shared by both surface implementations.
#[derive(Debug, Default)]
pub(crate) struct MeasuringState {
    active: Option<(FeatureKind, Vec<LatLng>)>,
}

impl MeasuringState {
    pub(crate) fn begin(&mut self, kind: FeatureKind) {
        self.active = Some((kind, Vec::new()));
    }

    pub(crate) fn cancel(&mut self) {
        self.active = None;
    }

    pub(crate) fn points(&self) -> Option<usize> {
        self.active.as_ref().map(|(_, path)| path.len())
    }

    /// Add a path point. Completes (and resets) once the path reaches
    /// `PATH_MIN_POINTS`.
    pub(crate) fn push(&mut self, position: LatLng) -> Option<ClickOutcome> {
        let (kind, path) = self.active.as_mut()?;
        path.push(position);
        if path.len() < PATH_MIN_POINTS {
            return Some(ClickOutcome::PathProgress { points: path.len() });
        }

        let (kind, path) = (*kind, std::mem::take(path));
        self.active = None;
        // Degenerate (collinear) outlines measure as zero area.
        let area_sq_ft = measure::polygon_area_sq_ft(&path).unwrap_or(0.0);
        Some(ClickOutcome::Measured(PathMeasurement { kind, path, area_sq_ft }))
    }
}

// =============================================================================
// MOUNT
// =============================================================================

/// Surface selection knobs, read from the environment.
#[derive(Debug, Clone)]
pub struct SurfaceConfig {
    /// Base URL of a forward-geocoding provider. `None` means mock only.
    pub provider_url: Option<String>,
    pub probe_timeout: Duration,
}

impl SurfaceConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let timeout_ms = std::env::var("MAP_PROBE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_PROBE_TIMEOUT_MS);
        Self {
            provider_url: std::env::var("MAP_PROVIDER_URL").ok().filter(|v| !v.is_empty()),
            probe_timeout: Duration::from_millis(timeout_ms),
        }
    }
}

/// One-shot capability probe and surface mount.
///
/// Probes the configured provider with a bounded timeout; any failure or
/// timeout falls back to the deterministic mock. Never returns an error:
/// an unreachable provider is a degradation, not a fault.
pub async fn probe_and_mount(config: &SurfaceConfig) -> Box<dyn MapSurface> {
    let Some(provider_url) = config.provider_url.as_deref() else {
        info!("no map provider configured; mounting mock surface");
        return Box::new(mock::MockSurface::new());
    };

    let client = reqwest::Client::new();
    let probe = client.get(format!("{}/status", provider_url.trim_end_matches('/'))).send();

    // The live surface sits in `Loading` until the probe verdict arrives.
    let mut surface = live::LiveSurface::new(provider_url.to_owned(), client);

    match tokio::time::timeout(config.probe_timeout, probe).await {
        Ok(Ok(response)) if response.status().is_success() => {
            surface.mark_ready();
            info!(provider = provider_url, "map provider probe ok; mounting live surface");
            Box::new(surface)
        }
        Ok(Ok(response)) => {
            surface.mark_unavailable();
            info!(provider = provider_url, status = %response.status(), phase = ?surface.phase(), "map provider unhealthy; mounting mock surface");
            Box::new(mock::MockSurface::new())
        }
        Ok(Err(error)) => {
            surface.mark_unavailable();
            info!(provider = provider_url, error = %error, phase = ?surface.phase(), "map provider unreachable; mounting mock surface");
            Box::new(mock::MockSurface::new())
        }
        Err(_) => {
            surface.mark_unavailable();
            info!(provider = provider_url, timeout = ?config.probe_timeout, phase = ?surface.phase(), "map provider probe timed out; mounting mock surface");
            Box::new(mock::MockSurface::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mount_without_provider_uses_mock() {
        let config = SurfaceConfig { provider_url: None, probe_timeout: Duration::from_millis(50) };
        let surface = probe_and_mount(&config).await;
        assert_eq!(surface.backend(), "mock");
        assert_eq!(surface.phase(), SurfacePhase::Ready);
    }

    #[tokio::test]
    async fn mount_with_unreachable_provider_falls_back_to_mock() {
        // Nothing listens on this port; the probe fails fast (or times out)
        // and the mock surface still emits pin events on click.
        let config = SurfaceConfig {
            provider_url: Some("http://127.0.0.1:1".into()),
            probe_timeout: Duration::from_millis(200),
        };
        let mut surface = probe_and_mount(&config).await;
        assert_eq!(surface.backend(), "mock");

        let outcome = surface.click(LatLng::new(40.71, -74.0));
        assert!(matches!(outcome, ClickOutcome::Pin(PinEvent { .. })));
    }

    #[test]
    fn measuring_state_completes_at_three_points() {
        let mut measuring = MeasuringState::default();
        measuring.begin(FeatureKind::Lawn);

        let a = measuring.push(LatLng::new(40.7000, -74.0000)).unwrap();
        assert_eq!(a, ClickOutcome::PathProgress { points: 1 });
        let b = measuring.push(LatLng::new(40.7000, -73.9990)).unwrap();
        assert_eq!(b, ClickOutcome::PathProgress { points: 2 });

        let Some(ClickOutcome::Measured(result)) = measuring.push(LatLng::new(40.7010, -74.0000)) else {
            panic!("third point should complete the path");
        };
        assert_eq!(result.kind, FeatureKind::Lawn);
        assert_eq!(result.path.len(), 3);
        assert!(result.area_sq_ft > 0.0);
        assert!(measuring.points().is_none());
    }

    #[test]
    fn measuring_state_cancel_drops_path() {
        let mut measuring = MeasuringState::default();
        measuring.begin(FeatureKind::Patio);
        measuring.push(LatLng::new(40.7, -74.0));
        measuring.cancel();
        assert!(measuring.points().is_none());
        assert!(measuring.push(LatLng::new(40.7, -74.0)).is_none());
    }
}
