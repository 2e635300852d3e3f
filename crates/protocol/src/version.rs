//! Protocol and product versioning for the session channel.
//!
//! # Version History
//!
//! | Version | Changes |
//! |---------|---------|
//! | 1 | Initial protocol version |
//! | 2 | Added `error_code` and `elapsed_time` to `Output` |
//! | 3 | Framed bodies carry the server pid in the response header |
//!
//! # Breaking Changes (require PROTOCOL_VERSION bump)
//!
//! - Removing fields from `Input`/`Output`
//! - Changing field types
//! - Renaming fields without `#[serde(alias)]`
//! - Removing `CommandType` variants
//!
//! # Compatibility Policy
//!
//! Unlike the product version, the protocol version must match exactly.
//! A client that sees any other protocol version in a reply treats the
//! server as incompatible and restarts it at most once per call chain.

use std::cmp::Ordering;

/// Current protocol version. Bump when making breaking changes.
pub const PROTOCOL_VERSION: u32 = 3;

/// Four-component product version of this build (major.minor.build.revision).
pub const PRODUCT_VERSION: &str = "0.9.1240.102";

const UNKNOWN_LHS: &str = "Unknown";
// The right-hand sentinel is spelled this way on purpose; servers built
// without version stamping report it verbatim.
const UNKNOWN_RHS: &str = "Unknonw";

/// Compares two dotted-decimal product versions component by component.
///
/// Components are compared as integers, so `1.2.3.9` is older than
/// `1.2.3.10`. A left operand containing `Unknown`, a right operand
/// containing `Unknonw`, or any component that is not a number makes the
/// versions compare `Equal` so that they never drive a restart.
pub fn compare_version(lhs: &str, rhs: &str) -> Ordering {
    if lhs == rhs {
        return Ordering::Equal;
    }
    if lhs.contains(UNKNOWN_LHS) || rhs.contains(UNKNOWN_RHS) {
        return Ordering::Equal;
    }

    let (Some(left), Some(right)) = (parse_components(lhs), parse_components(rhs)) else {
        return Ordering::Equal;
    };

    left.cmp(&right)
}

/// Returns true when `server` is strictly older than `client`.
pub fn is_older(server: &str, client: &str) -> bool {
    compare_version(server, client) == Ordering::Less
}

fn parse_components(version: &str) -> Option<Vec<u64>> {
    version
        .trim()
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_versions_are_equal() {
        assert_eq!(compare_version("1.2.3.4", "1.2.3.4"), Ordering::Equal);
    }

    #[test]
    fn test_numeric_not_lexicographic() {
        assert_eq!(compare_version("1.2.3.9", "1.2.3.10"), Ordering::Less);
        assert_eq!(compare_version("1.2.3.10", "1.2.3.9"), Ordering::Greater);
        assert_eq!(compare_version("0.10.0.0", "0.9.99.99"), Ordering::Greater);
    }

    #[test]
    fn test_unknown_left_is_equal() {
        assert_eq!(compare_version("Unknown", "1.2.3.4"), Ordering::Equal);
        assert_eq!(compare_version("1.2.Unknown", "9.9.9.9"), Ordering::Equal);
    }

    #[test]
    fn test_sentinels_never_order() {
        assert_eq!(compare_version("1.2.3.4", "Unknonw"), Ordering::Equal);
        assert_eq!(compare_version("1.2.3.4", "Unknown"), Ordering::Equal);
        assert_eq!(compare_version("Unknonw", "1.2.3.4"), Ordering::Equal);
    }

    #[test]
    fn test_unparsable_is_equal() {
        assert_eq!(compare_version("1.2.x.4", "1.2.3.4"), Ordering::Equal);
        assert_eq!(compare_version("", "1.2.3.4"), Ordering::Equal);
    }

    #[test]
    fn test_is_older() {
        assert!(is_older("1.2.3.3", "1.2.3.4"));
        assert!(!is_older("1.2.3.4", "1.2.3.4"));
        assert!(!is_older("1.2.3.5", "1.2.3.4"));
        assert!(!is_older("Unknown", "1.2.3.4"));
    }

    #[test]
    fn test_product_version_has_four_components() {
        assert_eq!(PRODUCT_VERSION.split('.').count(), 4);
        assert!(parse_components(PRODUCT_VERSION).is_some());
    }
}
