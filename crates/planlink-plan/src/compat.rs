//! Source-engine version compatibility guard
//!
//! The plan format is owned by the source engine and changes between its
//! releases. The translator is tested against an inclusive version range;
//! outside it we warn and proceed, since the translator is merely untested
//! there, not known broken.

use tracing::warn;

/// Oldest source-engine release the translator is tested against
pub const MIN_SOURCE_VERSION: &str = "0.20.31";

/// Newest source-engine release the translator is tested against
pub const MAX_SOURCE_VERSION: &str = "1.33.1";

/// Split a dotted version into numeric components. Versions are compared
/// component-wise, never lexicographically, so "0.10.0" orders after
/// "0.9.9".
fn components(version: &str) -> Option<Vec<u64>> {
    version
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect()
}

/// Inclusive range check against `[MIN_SOURCE_VERSION, MAX_SOURCE_VERSION]`.
/// `None` when `version` does not parse as dotted numerals.
pub fn version_in_range(version: &str) -> Option<bool> {
    let v = components(version)?;
    let min = components(MIN_SOURCE_VERSION)?;
    let max = components(MAX_SOURCE_VERSION)?;
    // Vec<u64> ordering is element-wise with length as tiebreak
    Some(v >= min && v <= max)
}

/// Non-fatal guard: warn when the source library version is outside the
/// tested range (or unparseable) and let translation proceed. Returns
/// whether the version is known to be in range.
pub fn check_source_version(version: &str) -> bool {
    match version_in_range(version) {
        Some(true) => true,
        Some(false) => {
            warn!(
                version,
                min = MIN_SOURCE_VERSION,
                max = MAX_SOURCE_VERSION,
                "source library version outside tested range; proceeding anyway"
            );
            false
        }
        None => {
            warn!(
                version,
                "could not parse source library version; proceeding anyway"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_wise_not_lexicographic() {
        // Lexicographic comparison would misorder these
        assert_eq!(components("0.10.0"), Some(vec![0, 10, 0]));
        assert!(components("0.10.0") > components("0.9.9"));
        assert!(components("1.2.10") > components("1.2.9"));
    }

    #[test]
    fn test_in_range() {
        assert_eq!(version_in_range("1.0.0"), Some(true));
        assert_eq!(version_in_range(MIN_SOURCE_VERSION), Some(true));
        assert_eq!(version_in_range(MAX_SOURCE_VERSION), Some(true));
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(version_in_range("0.19.0"), Some(false));
        assert_eq!(version_in_range("2.0.0"), Some(false));
    }

    #[test]
    fn test_unparseable() {
        assert_eq!(version_in_range("1.0.0-beta.1"), None);
        assert_eq!(version_in_range("not-a-version"), None);
    }

    #[test]
    fn test_check_is_non_fatal() {
        assert!(check_source_version("1.5.0"));
        assert!(!check_source_version("2.0.0"));
        assert!(!check_source_version("garbage"));
    }
}
