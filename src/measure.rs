//! Measurement engine — area, volume, and polygon geometry.
//!
//! DESIGN
//! ======
//! Pure arithmetic, no state. Rectangular area is `length × width` in feet;
//! volume converts a depth in inches to feet (`area × depth / 12`). Traced
//! outlines use the shoelace formula over a local equirectangular projection:
//! longitude degrees are scaled by the cosine of the path's mean latitude,
//! which is accurate to well under a percent at parcel scale.
//!
//! The dimension ceiling exists to catch fat-finger input, not as a
//! physical constraint.

use crate::model::{Dimensions, FeatureKind, LatLng};

/// Upper bound on a single linear dimension, in feet.
pub const MAX_DIMENSION_FT: f64 = 10_000.0;

/// Feet per degree of latitude (WGS84 mean).
const FEET_PER_DEGREE_LAT: f64 = 364_567.2;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MeasureError {
    #[error("invalid {name}: {value} (must be > 0 and <= {MAX_DIMENSION_FT} ft)")]
    InvalidDimension { name: &'static str, value: f64 },
    #[error("invalid depth: {0} in (must be >= 0)")]
    InvalidDepth(f64),
    #[error("path has {0} points; a traced outline needs at least 3")]
    DegeneratePath(usize),
    #[error("dimensions do not match feature kind {kind}")]
    KindMismatch { kind: &'static str },
}

// =============================================================================
// RECTANGULAR AREA & VOLUME
// =============================================================================

/// Area of a rectangular feature in square feet.
///
/// # Errors
///
/// Returns `InvalidDimension` when either side is non-positive, non-finite,
/// or exceeds `MAX_DIMENSION_FT`.
pub fn rect_area(length_ft: f64, width_ft: f64) -> Result<f64, MeasureError> {
    check_dimension("length", length_ft)?;
    check_dimension("width", width_ft)?;
    Ok(length_ft * width_ft)
}

/// Volume in cubic feet from an area in square feet and a depth in inches.
///
/// # Errors
///
/// Returns `InvalidDepth` for negative or non-finite depth.
pub fn volume(area_sq_ft: f64, depth_in: f64) -> Result<f64, MeasureError> {
    if !depth_in.is_finite() || depth_in < 0.0 {
        return Err(MeasureError::InvalidDepth(depth_in));
    }
    Ok(area_sq_ft * depth_in / 12.0)
}

fn check_dimension(name: &'static str, value: f64) -> Result<(), MeasureError> {
    if !value.is_finite() || value <= 0.0 || value > MAX_DIMENSION_FT {
        return Err(MeasureError::InvalidDimension { name, value });
    }
    Ok(())
}

// =============================================================================
// POLYGON AREA
// =============================================================================

/// Area enclosed by a traced outline, in square feet.
///
/// Shoelace formula on a local projection centered at the path's mean
/// latitude. The path is treated as closed; the final vertex does not need
/// to repeat the first.
///
/// # Errors
///
/// Returns `DegeneratePath` when fewer than 3 vertices are supplied.
pub fn polygon_area_sq_ft(path: &[LatLng]) -> Result<f64, MeasureError> {
    if path.len() < 3 {
        return Err(MeasureError::DegeneratePath(path.len()));
    }

    #[allow(clippy::cast_precision_loss)]
    let mean_lat = path.iter().map(|p| p.lat).sum::<f64>() / path.len() as f64;
    let feet_per_degree_lng = FEET_PER_DEGREE_LAT * mean_lat.to_radians().cos();

    let mut twice_area = 0.0;
    for i in 0..path.len() {
        let a = path[i];
        let b = path[(i + 1) % path.len()];
        let (ax, ay) = (a.lng * feet_per_degree_lng, a.lat * FEET_PER_DEGREE_LAT);
        let (bx, by) = (b.lng * feet_per_degree_lng, b.lat * FEET_PER_DEGREE_LAT);
        twice_area += ax * by - bx * ay;
    }

    Ok(twice_area.abs() / 2.0)
}

// =============================================================================
// DERIVATION
// =============================================================================

/// Values computed from raw dimensions at save time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derived {
    pub area_sq_ft: Option<f64>,
    pub volume_cu_ft: Option<f64>,
}

/// Derive area/volume for a measurement, enforcing the kind/variant pairing:
/// snowfall records carry a snowfall depth and nothing else, every other
/// kind carries linear dimensions.
///
/// # Errors
///
/// Returns `KindMismatch` when the variant disagrees with the kind, or the
/// underlying dimension checks fail.
pub fn derive(kind: FeatureKind, dimensions: &Dimensions) -> Result<Derived, MeasureError> {
    match (kind, dimensions) {
        (FeatureKind::Snowfall, Dimensions::Snowfall { depth_in }) => {
            if !depth_in.is_finite() || *depth_in < 0.0 {
                return Err(MeasureError::InvalidDepth(*depth_in));
            }
            Ok(Derived { area_sq_ft: None, volume_cu_ft: None })
        }
        (FeatureKind::Snowfall, Dimensions::Linear { .. })
        | (_, Dimensions::Snowfall { .. }) => Err(MeasureError::KindMismatch { kind: kind.as_str() }),
        (_, Dimensions::Linear { length_ft, width_ft, depth_in }) => {
            let area = rect_area(*length_ft, *width_ft)?;
            let vol = volume(area, *depth_in)?;
            let volume_cu_ft = if *depth_in > 0.0 { Some(vol) } else { None };
            Ok(Derived { area_sq_ft: Some(area), volume_cu_ft })
        }
    }
}

#[cfg(test)]
#[path = "measure_test.rs"]
mod tests;
