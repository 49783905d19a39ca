//! Version types
//!
//! Two version notions live side by side:
//! - `SyntacticVersion`: the (major, minor) position of a schema inside a lineage
//! - `ReleaseVersion`: the semver name of a published version directory

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Serialize};

/// Position of a schema in its lineage, serialized as `[major, minor]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SyntacticVersion(pub u64, pub u64);

impl SyntacticVersion {
    pub const ZERO: SyntacticVersion = SyntacticVersion(0, 0);

    pub fn new(major: u64, minor: u64) -> Self {
        Self(major, minor)
    }

    pub fn major(&self) -> u64 {
        self.0
    }

    pub fn minor(&self) -> u64 {
        self.1
    }

    /// Whether `next` may directly follow `self` in a lineage
    pub fn admits_successor(&self, next: &SyntacticVersion) -> bool {
        (next.0 == self.0 && Some(next.1) == self.1.checked_add(1))
            || (Some(next.0) == self.0.checked_add(1) && next.1 == 0)
    }

    /// File-name friendly rendering, e.g. `v1-2`
    pub fn file_stem(&self) -> String {
        format!("v{}-{}", self.0, self.1)
    }
}

impl fmt::Display for SyntacticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0, self.1)
    }
}

impl FromStr for SyntacticVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix('v').unwrap_or(s);
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| format!("expected <major>.<minor>, got '{}'", s))?;
        let major = major
            .parse()
            .map_err(|_| format!("invalid major version in '{}'", s))?;
        let minor = minor
            .parse()
            .map_err(|_| format!("invalid minor version in '{}'", s))?;
        Ok(Self(major, minor))
    }
}

/// Semantic version naming a published release directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseVersion {
    /// Semantic version (e.g., "1.2.3")
    pub version: Version,
    /// Directory name as found on disk, if it was read from one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

impl ReleaseVersion {
    pub fn new(version: Version) -> Self {
        Self { version, dir: None }
    }

    /// Parse a version string, tolerating a leading `v`
    pub fn parse(version_str: &str) -> Result<Self, semver::Error> {
        let trimmed = version_str.strip_prefix('v').unwrap_or(version_str);
        let version = Version::parse(trimmed)?;
        Ok(Self::new(version))
    }

    /// Get the version string (e.g., "1.2.3")
    pub fn version_string(&self) -> String {
        self.version.to_string()
    }

    /// Directory name for this release: the on-disk name when known,
    /// otherwise the bare version string
    pub fn dir_name(&self) -> String {
        self.dir.clone().unwrap_or_else(|| self.version_string())
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.version)
    }
}

impl PartialEq for ReleaseVersion {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for ReleaseVersion {}

impl PartialOrd for ReleaseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReleaseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version.cmp(&other.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntactic_successors() {
        let v = SyntacticVersion(0, 0);
        assert!(v.admits_successor(&SyntacticVersion(0, 1)));
        assert!(v.admits_successor(&SyntacticVersion(1, 0)));
        assert!(!v.admits_successor(&SyntacticVersion(0, 2)));
        assert!(!v.admits_successor(&SyntacticVersion(1, 1)));
        assert!(!v.admits_successor(&SyntacticVersion(0, 0)));

        let edge = SyntacticVersion(u64::MAX, u64::MAX);
        assert!(!edge.admits_successor(&SyntacticVersion(u64::MAX, 0)));
        assert!(!edge.admits_successor(&SyntacticVersion(0, 0)));
    }

    #[test]
    fn test_syntactic_serializes_as_pair() {
        let json = serde_json::to_string(&SyntacticVersion(1, 2)).unwrap();
        assert_eq!(json, "[1,2]");
        let back: SyntacticVersion = serde_json::from_str("[0,3]").unwrap();
        assert_eq!(back, SyntacticVersion(0, 3));
    }

    #[test]
    fn test_syntactic_parse_and_display() {
        let v: SyntacticVersion = "v2.7".parse().unwrap();
        assert_eq!(v, SyntacticVersion(2, 7));
        assert_eq!(v.to_string(), "2.7");
        assert_eq!(v.file_stem(), "v2-7");
        assert!("2".parse::<SyntacticVersion>().is_err());
    }

    #[test]
    fn test_release_parsing() {
        let v = ReleaseVersion::parse("v1.10.0").unwrap();
        assert_eq!(v.version_string(), "1.10.0");
        assert_eq!(v.dir_name(), "1.10.0");
    }

    #[test]
    fn test_release_ordering_is_numeric() {
        let a = ReleaseVersion::parse("1.2.0").unwrap();
        let b = ReleaseVersion::parse("1.10.0").unwrap();
        assert!(a < b);
    }
}
