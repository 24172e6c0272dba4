//! Live provider-backed surface.
//!
//! Wraps a forward-geocoding HTTP provider (Nominatim-compatible search
//! endpoint). A fresh instance is `Loading` until the mount probe delivers
//! a verdict: `Ready` on a healthy provider, `Unavailable` otherwise (at
//! which point the mount swaps in the mock). Marker and viewport state are
//! tracked locally; the provider is consulted only for geocoding. Geocode
//! failures are surfaced to the caller and never retried automatically.

use async_trait::async_trait;
use serde::Deserialize;

use crate::model::{FeatureKind, LatLng};

use super::{ClickOutcome, MapSurface, MeasuringState, PinEvent, SurfaceError, SurfacePhase};

pub struct LiveSurface {
    base_url: String,
    client: reqwest::Client,
    markers: Vec<LatLng>,
    center: Option<LatLng>,
    measuring: MeasuringState,
    /// Mount verdict: `Loading` until the probe resolves it.
    mount_phase: SurfacePhase,
}

/// One row of a Nominatim-style search response. Coordinates arrive as
/// strings.
#[derive(Debug, Deserialize)]
struct GeocodeRow {
    lat: String,
    lon: String,
}

impl LiveSurface {
    #[must_use]
    pub fn new(base_url: String, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client,
            markers: Vec::new(),
            center: None,
            measuring: MeasuringState::default(),
            mount_phase: SurfacePhase::Loading,
        }
    }

    /// The probe confirmed the provider; the surface takes interactions.
    pub fn mark_ready(&mut self) {
        self.mount_phase = SurfacePhase::Ready;
    }

    /// The probe failed or timed out. The caller mounts the mock instead.
    pub fn mark_unavailable(&mut self) {
        self.mount_phase = SurfacePhase::Unavailable;
    }
}

#[async_trait]
impl MapSurface for LiveSurface {
    fn phase(&self) -> SurfacePhase {
        if self.mount_phase != SurfacePhase::Ready {
            return self.mount_phase;
        }
        match self.measuring.points() {
            Some(points) => SurfacePhase::Measuring { points },
            None => SurfacePhase::Ready,
        }
    }

    fn click(&mut self, position: LatLng) -> ClickOutcome {
        self.measuring
            .push(position)
            .unwrap_or(ClickOutcome::Pin(PinEvent { position }))
    }

    fn set_markers(&mut self, positions: &[LatLng]) {
        self.markers = positions.to_vec();
    }

    fn marker_count(&self) -> usize {
        self.markers.len()
    }

    fn begin_measuring(&mut self, kind: FeatureKind) {
        self.measuring.begin(kind);
    }

    fn cancel_measuring(&mut self) {
        self.measuring.cancel();
    }

    fn fit_bounds(&mut self, points: &[LatLng]) {
        if points.is_empty() {
            return;
        }
        let lat = points.iter().map(|p| p.lat).sum::<f64>();
        let lng = points.iter().map(|p| p.lng).sum::<f64>();
        #[allow(clippy::cast_precision_loss)]
        let n = points.len() as f64;
        self.center = Some(LatLng::new(lat / n, lng / n));
    }

    async fn geocode(&self, address: &str) -> Result<LatLng, SurfaceError> {
        let rows: Vec<GeocodeRow> = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("format", "json"), ("limit", "1"), ("q", address)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| SurfaceError::NoResult(address.to_owned()))?;
        let lat = row.lat.parse::<f64>().map_err(|_| SurfaceError::Unparsable)?;
        let lng = row.lon.parse::<f64>().map_err(|_| SurfaceError::Unparsable)?;
        Ok(LatLng::new(lat, lng))
    }

    fn backend(&self) -> &'static str {
        "live"
    }
}
