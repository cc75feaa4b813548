//! Document identity for areas.
//!
//! New areas derive their document ID from their coordinates: latitude and
//! longitude formatted to nine decimal places and joined by `_`. The
//! derivation is deterministic, so two areas created at numerically
//! identical coordinates collide and overwrite one another. This is a
//! known modeling limitation and is intentionally not strengthened here.

/// Derives the document ID for a new area at the given coordinates.
///
/// Existing areas keep whatever ID the store assigned; this is only used
/// on the new-area path.
pub fn derive_document_id(lat: f64, lng: f64) -> String {
    format!("{lat:.9}_{lng:.9}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_format() {
        assert_eq!(
            derive_document_id(37.123456789, 127.123456789),
            "37.123456789_127.123456789"
        );
    }

    #[test]
    fn test_derive_pads_to_nine_places() {
        assert_eq!(derive_document_id(37.5, 127.0), "37.500000000_127.000000000");
    }

    #[test]
    fn test_derive_truncation_is_rounding() {
        // More than nine places rounds rather than truncates.
        assert_eq!(
            derive_document_id(37.1234567891, 127.1234567899),
            "37.123456789_127.123456790"
        );
    }

    #[test]
    fn test_identical_coordinates_collide() {
        assert_eq!(
            derive_document_id(37.1, 127.1),
            derive_document_id(37.1, 127.1)
        );
    }

    #[test]
    fn test_negative_coordinates() {
        assert_eq!(
            derive_document_id(-33.868819999, 151.209295001),
            "-33.868819999_151.209295001"
        );
    }
}
