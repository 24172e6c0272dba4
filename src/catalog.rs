//! Sample address catalog for demo search and autocomplete.
//!
//! These are the reference rows the resolver matches against when no
//! external geocoder is configured. Coordinates are real Manhattan
//! locations; the list order is the presentation order.

use std::sync::OnceLock;

use crate::model::{AddressCandidate, LatLng};

/// Fallback origin for unresolvable addresses (lower Manhattan).
pub const FALLBACK_ORIGIN: LatLng = LatLng::new(40.7128, -74.0060);

/// Jitter applied around `FALLBACK_ORIGIN` for synthesized coordinates,
/// in degrees.
pub const FALLBACK_JITTER_DEGREES: f64 = 0.01;

static CATALOG: OnceLock<Vec<AddressCandidate>> = OnceLock::new();

fn entry(address: &str, lat: f64, lng: f64, category: &str) -> AddressCandidate {
    AddressCandidate { address: address.to_owned(), position: LatLng::new(lat, lng), category: category.to_owned() }
}

/// The static demo catalog, built once.
pub fn sample_addresses() -> &'static [AddressCandidate] {
    CATALOG.get_or_init(|| {
        vec![
            entry("123 Main St, New York, NY 10001", 40.7589, -73.9851, "Residential"),
            entry("456 Broadway, New York, NY 10013", 40.7505, -74.0025, "Commercial"),
            entry("789 Park Ave, New York, NY 10021", 40.7736, -73.9566, "Residential"),
            entry("321 Fifth Ave, New York, NY 10016", 40.7484, -73.9857, "Commercial"),
            entry("654 Wall St, New York, NY 10005", 40.7074, -74.0113, "Financial"),
            entry("987 Central Park West, New York, NY 10025", 40.7829, -73.9654, "Luxury"),
            entry("147 Houston St, New York, NY 10012", 40.7256, -73.9986, "Mixed Use"),
            entry("258 Madison Ave, New York, NY 10016", 40.7505, -73.9799, "Office"),
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_eight_entries() {
        assert_eq!(sample_addresses().len(), 8);
    }

    #[test]
    fn broadway_entry_coordinates() {
        let broadway = sample_addresses()
            .iter()
            .find(|c| c.address.contains("Broadway"))
            .unwrap();
        assert!((broadway.position.lat - 40.7505).abs() < f64::EPSILON);
        assert!((broadway.position.lng - (-74.0025)).abs() < f64::EPSILON);
    }
}
