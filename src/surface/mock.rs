//! Deterministic mock surface.
//!
//! Stands in when no map provider is reachable, and in tests. Geocoding
//! matches the demo catalog first; unknown addresses get a synthesized
//! coordinate derived from a hash of the address text, bounded to the same
//! ±0.01° window the resolver uses. Deterministic by construction: the same
//! address always lands on the same spot.

use async_trait::async_trait;

use crate::catalog::{self, FALLBACK_JITTER_DEGREES, FALLBACK_ORIGIN};
use crate::model::{FeatureKind, LatLng};

use super::{ClickOutcome, MapSurface, MeasuringState, PinEvent, SurfaceError, SurfacePhase};

pub struct MockSurface {
    center: LatLng,
    markers: Vec<LatLng>,
    measuring: MeasuringState,
}

impl MockSurface {
    #[must_use]
    pub fn new() -> Self {
        Self { center: FALLBACK_ORIGIN, markers: Vec::new(), measuring: MeasuringState::default() }
    }

    #[must_use]
    pub fn center(&self) -> LatLng {
        self.center
    }
}

impl Default for MockSurface {
    fn default() -> Self {
        Self::new()
    }
}

/// FNV-1a over the address text, folded into `[-jitter, jitter)` offsets.
fn synthesized_position(address: &str) -> LatLng {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for byte in address.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }

    #[allow(clippy::cast_precision_loss)]
    let unit = |h: u64| (h % 10_000) as f64 / 10_000.0;
    let lat_offset = (unit(hash) - 0.5) * 2.0 * FALLBACK_JITTER_DEGREES;
    let lng_offset = (unit(hash >> 32) - 0.5) * 2.0 * FALLBACK_JITTER_DEGREES;

    LatLng::new(FALLBACK_ORIGIN.lat + lat_offset, FALLBACK_ORIGIN.lng + lng_offset)
}

#[async_trait]
impl MapSurface for MockSurface {
    fn phase(&self) -> SurfacePhase {
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
        let (mut min_lat, mut max_lat) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_lng, mut max_lng) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in points {
            min_lat = min_lat.min(p.lat);
            max_lat = max_lat.max(p.lat);
            min_lng = min_lng.min(p.lng);
            max_lng = max_lng.max(p.lng);
        }
        self.center = LatLng::new((min_lat + max_lat) / 2.0, (min_lng + max_lng) / 2.0);
    }

    async fn geocode(&self, address: &str) -> Result<LatLng, SurfaceError> {
        let needle = address.trim().to_lowercase();
        if needle.is_empty() {
            return Err(SurfaceError::NoResult(address.to_owned()));
        }
        let exact = catalog::sample_addresses()
            .iter()
            .find(|c| c.address.to_lowercase().contains(&needle));
        Ok(exact.map_or_else(|| synthesized_position(address), |c| c.position))
    }

    fn backend(&self) -> &'static str {
        "mock"
    }
}
