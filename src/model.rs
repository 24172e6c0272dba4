//! Domain types for pins, measurements, and the address catalog.
//!
//! DESIGN
//! ======
//! Measurement dimensions are a tagged union: a record carries either linear
//! dimensions (length/width/depth) or a snowfall depth, never both. The
//! feature kind selects which variant is legal, and validation in the
//! measurement service enforces the pairing. Derived values (area, volume)
//! are always computed server-side and never accepted from the client.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// COORDINATES
// =============================================================================

/// A WGS84 point. All map interactions speak in these.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Where a measurement was taken: a single point (pin) or a traced outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Coordinates {
    Point { position: LatLng },
    Path { points: Vec<LatLng> },
}

// =============================================================================
// FEATURE KINDS & MATERIALS
// =============================================================================

/// The property feature being measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Lawn,
    Driveway,
    Flowerbed,
    Garden,
    Patio,
    Snowfall,
}

impl FeatureKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lawn => "lawn",
            Self::Driveway => "driveway",
            Self::Flowerbed => "flowerbed",
            Self::Garden => "garden",
            Self::Patio => "patio",
            Self::Snowfall => "snowfall",
        }
    }

    /// Inverse of [`Self::as_str`], for rows loaded back from the store.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "lawn" => Some(Self::Lawn),
            "driveway" => Some(Self::Driveway),
            "flowerbed" => Some(Self::Flowerbed),
            "garden" => Some(Self::Garden),
            "patio" => Some(Self::Patio),
            "snowfall" => Some(Self::Snowfall),
            _ => None,
        }
    }

    /// Only planted beds take a fill material.
    #[must_use]
    pub fn accepts_material(self) -> bool {
        matches!(self, Self::Flowerbed | Self::Garden)
    }
}

/// Fill material for flowerbed/garden measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Material {
    Topsoil,
    Mulch,
    Stone,
}

impl Material {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Topsoil => "topsoil",
            Self::Mulch => "mulch",
            Self::Stone => "stone",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "topsoil" => Some(Self::Topsoil),
            "mulch" => Some(Self::Mulch),
            "stone" => Some(Self::Stone),
            _ => None,
        }
    }
}

// =============================================================================
// DIMENSIONS
// =============================================================================

/// Raw recorded dimensions. Exactly one variant per measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dimensions {
    /// Length and width in feet, optional depth in inches.
    Linear {
        length_ft: f64,
        width_ft: f64,
        #[serde(default)]
        depth_in: f64,
    },
    /// Accumulated snowfall in inches. No area or volume is derived.
    Snowfall { depth_in: f64 },
}

// =============================================================================
// MEASUREMENT
// =============================================================================

/// A saved measurement record. Immutable once created; the only delete
/// path is the session-wide bulk clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub id: Uuid,
    pub session_id: Uuid,
    /// Pin this measurement was taken against, when one exists.
    pub pin_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: FeatureKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<Material>,
    pub dimensions: Dimensions,
    /// Derived, never client-supplied. Absent for snowfall records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_sq_ft: Option<f64>,
    /// Derived: `area × depth_in / 12`. Absent when depth is zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_cu_ft: Option<f64>,
    pub location: String,
    #[serde(default)]
    pub notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    /// Milliseconds since Unix epoch.
    pub created_at_ms: i64,
}

/// The slice of a measurement that a pin carries for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSummary {
    pub length_ft: f64,
    pub width_ft: f64,
    pub area_sq_ft: f64,
}

// =============================================================================
// ADDRESS CANDIDATES
// =============================================================================

/// A catalog row offered by address search. Read-only reference data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressCandidate {
    pub address: String,
    pub position: LatLng,
    pub category: String,
}

// =============================================================================
// DISPLAY FORMATTING
// =============================================================================

/// One decimal place, the display convention for areas and volumes.
#[must_use]
pub fn format_sq_ft(area: f64) -> String {
    format!("{area:.1} sq ft")
}

#[must_use]
pub fn format_cu_ft(volume: f64) -> String {
    format!("{volume:.1} cubic ft")
}
