//! Lenient semantic server-version parsing.
//!
//! Analysis servers report versions like `7.9`, `9.9.0.65466` or
//! `10.4.1-rc1`. Strict semver parsing would reject most of those, so this
//! parser takes the leading `major.minor.patch` numeric segments and ignores
//! whatever follows.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A parsed server version, ordered by `major.minor.patch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerVersion {
    /// Major version component
    pub major: u32,
    /// Minor version component
    pub minor: u32,
    /// Patch version component
    pub patch: u32,
}

impl ServerVersion {
    /// Create a version from its components.
    #[must_use]
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a raw version string leniently.
    ///
    /// Missing minor/patch default to zero (`"10.4"` is `10.4.0`); build
    /// segments past the patch (`"9.9.0.65466"`) and suffixes after the
    /// first non-numeric character (`"10.4.1-rc1"`) are ignored. Returns
    /// `None` when no leading numeric major component exists.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.trim().split('.');

        let major = parse_component(parts.next()?)?;
        let minor = parts.next().and_then(parse_component).unwrap_or(0);
        let patch = parts.next().and_then(parse_component).unwrap_or(0);

        Some(Self::new(major, minor, patch))
    }

    /// True when this version is at or above the given components.
    #[must_use]
    pub fn is_at_least(&self, major: u32, minor: u32, patch: u32) -> bool {
        *self >= Self::new(major, minor, patch)
    }
}

/// Take the leading decimal digits of one dot-separated segment.
fn parse_component(segment: &str) -> Option<u32> {
    let digits: String = segment.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

impl PartialOrd for ServerVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ServerVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_version() {
        assert_eq!(ServerVersion::parse("7.2.0"), Some(ServerVersion::new(7, 2, 0)));
    }

    #[test]
    fn test_parse_short_version() {
        assert_eq!(ServerVersion::parse("10.4"), Some(ServerVersion::new(10, 4, 0)));
        assert_eq!(ServerVersion::parse("8"), Some(ServerVersion::new(8, 0, 0)));
    }

    #[test]
    fn test_parse_build_segment_ignored() {
        assert_eq!(
            ServerVersion::parse("9.9.0.65466"),
            Some(ServerVersion::new(9, 9, 0))
        );
    }

    #[test]
    fn test_parse_suffix_ignored() {
        assert_eq!(
            ServerVersion::parse("10.4.1-rc1"),
            Some(ServerVersion::new(10, 4, 1))
        );
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(ServerVersion::parse("DEV"), None);
        assert_eq!(ServerVersion::parse(""), None);
        assert_eq!(ServerVersion::parse("v10.4"), None);
    }

    #[test]
    fn test_ordering() {
        assert!(ServerVersion::new(7, 2, 0) > ServerVersion::new(7, 1, 9));
        assert!(ServerVersion::new(10, 0, 0) > ServerVersion::new(9, 9, 9));
        assert_eq!(ServerVersion::new(7, 2, 0), ServerVersion::new(7, 2, 0));
    }

    #[test]
    fn test_is_at_least() {
        let v = ServerVersion::new(10, 4, 0);
        assert!(v.is_at_least(10, 4, 0));
        assert!(v.is_at_least(7, 2, 0));
        assert!(!v.is_at_least(10, 4, 1));
    }

    #[test]
    fn test_display() {
        assert_eq!(ServerVersion::new(10, 4, 0).to_string(), "10.4.0");
    }
}
