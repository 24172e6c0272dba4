//! Address resolver — catalog search and coordinate resolution.
//!
//! DESIGN
//! ======
//! `search` filters the demo catalog by case-insensitive substring match
//! against address text or category tag; results keep catalog order
//! (first-match-wins, not relevance-ranked) and cap at 5.
//!
//! `resolve` prefers an exact catalog match, then asks the mounted surface's
//! geocoder. When the geocoder has no answer, coordinates are synthesized by
//! jittering a fixed origin with bounded random noise (±0.01°). That jitter
//! is a demo placeholder, not real geocoding; production deployments should
//! point `MAP_PROVIDER_URL` at a geocoder. Provider failures are surfaced as
//! a retryable error and never retried automatically.

use rand::Rng;
use serde::Serialize;
use tracing::debug;

use crate::catalog::{self, FALLBACK_JITTER_DEGREES, FALLBACK_ORIGIN};
use crate::model::{AddressCandidate, LatLng};
use crate::surface::{MapSurface, SurfaceError};

/// Candidate list cap for autocomplete.
pub const MAX_CANDIDATES: usize = 5;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("empty search term")]
    EmptyQuery,
    /// Transient provider failure. Retryable by the user, never auto-retried.
    #[error("address search failed: {0}")]
    Provider(#[source] SurfaceError),
}

/// A resolved search term: a display address plus coordinates.
#[derive(Debug, Clone, Serialize)]
pub struct Resolved {
    pub address: String,
    pub position: LatLng,
    /// Whether the coordinates came from a real match rather than the
    /// jittered fallback.
    pub exact: bool,
}

// =============================================================================
// SEARCH
// =============================================================================

/// Filter the catalog. Empty or whitespace-only terms return nothing.
#[must_use]
pub fn search(term: &str) -> Vec<AddressCandidate> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    catalog::sample_addresses()
        .iter()
        .filter(|c| c.address.to_lowercase().contains(&needle) || c.category.to_lowercase().contains(&needle))
        .take(MAX_CANDIDATES)
        .cloned()
        .collect()
}

// =============================================================================
// RESOLVE
// =============================================================================

/// Resolve a free-text term to a display address and coordinates.
///
/// # Errors
///
/// Returns `EmptyQuery` for blank input and `Provider` when the surface's
/// geocoder fails transiently.
pub async fn resolve(surface: &dyn MapSurface, term: &str) -> Result<Resolved, ResolveError> {
    let trimmed = term.trim();
    if trimmed.is_empty() {
        return Err(ResolveError::EmptyQuery);
    }

    let needle = trimmed.to_lowercase();
    if let Some(candidate) = catalog::sample_addresses()
        .iter()
        .find(|c| c.address.to_lowercase().contains(&needle))
    {
        return Ok(Resolved { address: candidate.address.clone(), position: candidate.position, exact: true });
    }

    match surface.geocode(trimmed).await {
        Ok(position) => Ok(Resolved { address: trimmed.to_owned(), position, exact: false }),
        Err(SurfaceError::NoResult(_) | SurfaceError::Unparsable) => {
            debug!(term = trimmed, "geocoder had no answer; synthesizing placeholder coordinates");
            Ok(Resolved { address: trimmed.to_owned(), position: jittered_fallback(), exact: false })
        }
        Err(error @ SurfaceError::Provider(_)) => Err(ResolveError::Provider(error)),
    }
}

/// Placeholder coordinates: the fallback origin plus bounded random noise.
fn jittered_fallback() -> LatLng {
    let mut rng = rand::rng();
    LatLng::new(
        FALLBACK_ORIGIN.lat + rng.random_range(-FALLBACK_JITTER_DEGREES..=FALLBACK_JITTER_DEGREES),
        FALLBACK_ORIGIN.lng + rng.random_range(-FALLBACK_JITTER_DEGREES..=FALLBACK_JITTER_DEGREES),
    )
}
