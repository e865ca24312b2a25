use crate::error::{Result, VintageError};
use semver::Version;
use std::cmp::Ordering;

/// Parses a published or installed version string.
///
/// Release tags are often written as `v1.2.3`, so a single leading `v` is accepted.
/// Anything else that is not a valid semantic version is an error: falling back to
/// string comparison would order `1.10.0` before `1.9.0`.
pub fn parse_version(raw: &str) -> Result<Version> {
    let trimmed = raw.trim();
    let candidate = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    Version::parse(candidate).map_err(|source| VintageError::VersionParse {
        value: raw.to_string(),
        source,
    })
}

pub struct VersionComparator;

impl VersionComparator {
    /// Check if version `a` is newer than version `b`
    pub fn is_newer(a: &Version, b: &Version) -> bool {
        Self::compare(a, b) == Ordering::Greater
    }

    /// Orders by semantic precedence, ignoring build metadata.
    pub fn compare(a: &Version, b: &Version) -> Ordering {
        a.cmp_precedence(b)
    }
}
