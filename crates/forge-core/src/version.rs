//! Tolerant version parsing and ordering.
//!
//! Module manifests are hand-edited and frequently carry versions that are
//! not valid semver (`1.2`, `2.0.0.1`, `1.0-rc1`, `latest`). Ordering must
//! never fail, so parsing degrades in three steps:
//!
//! 1. `<digits>(.<digits>)*` optionally followed by `-<pre-release>`. The
//!    `-` marks the pre-release, so `1.0.0-rc1` sorts below `1.0.0`.
//! 2. Otherwise the leading `[operator]? <digits>(.<digits>)*` run is used
//!    and any trailing garbage is discarded.
//! 3. Otherwise the version is exactly `0`.
//!
//! Releases compare numerically segment by segment with missing segments
//! treated as zero, so `1.0` and `1.0.0` are equal.

use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;

static STRICT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*[vV]?([0-9]+(?:\.[0-9]+)*)(?:-([0-9A-Za-z]+(?:[.-][0-9A-Za-z]+)*))?(?:\+[0-9A-Za-z.-]+)?\s*$",
    )
    .expect("strict version regex is valid")
});

static PREFIX_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[<>=~!^]+\s*)?([0-9]+(?:\.[0-9]+)*)")
        .expect("version prefix regex is valid")
});

/// One dot-separated pre-release identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Identifier {
    Numeric(u64),
    Alpha(String),
}

impl Identifier {
    fn parse(raw: &str) -> Self {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            Self::Numeric(raw.parse().unwrap_or(u64::MAX))
        } else {
            Self::Alpha(raw.to_string())
        }
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Numeric(a), Self::Numeric(b)) => a.cmp(b),
            (Self::Numeric(_), Self::Alpha(_)) => Ordering::Less,
            (Self::Alpha(_), Self::Numeric(_)) => Ordering::Greater,
            (Self::Alpha(a), Self::Alpha(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Alpha(s) => f.write_str(s),
        }
    }
}

/// A version parsed with the tolerant rules above.
///
/// # Examples
///
/// ```
/// use forge_core::version::TolerantVersion;
///
/// let rc = TolerantVersion::parse("1.0.0-rc1");
/// let release = TolerantVersion::parse("1.0.0");
/// assert!(rc < release);
///
/// assert_eq!(TolerantVersion::parse("xyz"), TolerantVersion::parse("0"));
/// assert_eq!(TolerantVersion::parse(">= 2.1 junk").release(), &[2, 1]);
/// ```
#[derive(Debug, Clone)]
pub struct TolerantVersion {
    release: Vec<u64>,
    pre: Vec<Identifier>,
}

impl TolerantVersion {
    /// Parses a version string. Never fails.
    pub fn parse(input: &str) -> Self {
        Self::parse_strict(input)
            .or_else(|| Self::parse_prefix(input))
            .unwrap_or_else(Self::zero)
    }

    /// The version `0`.
    pub fn zero() -> Self {
        Self {
            release: vec![0],
            pre: Vec::new(),
        }
    }

    fn parse_strict(input: &str) -> Option<Self> {
        let captures = STRICT_REGEX.captures(input)?;
        let release = parse_release(captures.get(1)?.as_str());
        let pre = captures
            .get(2)
            .map(|m| m.as_str().split(['.', '-']).map(Identifier::parse).collect())
            .unwrap_or_default();
        Some(Self { release, pre })
    }

    fn parse_prefix(input: &str) -> Option<Self> {
        let captures = PREFIX_REGEX.captures(input)?;
        Some(Self {
            release: parse_release(captures.get(1)?.as_str()),
            pre: Vec::new(),
        })
    }

    /// Numeric release segments.
    pub fn release(&self) -> &[u64] {
        &self.release
    }

    /// Whether the version carries a pre-release part.
    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    /// Projects onto a `semver::Version` for requirement matching.
    ///
    /// Segments past the third are dropped. Pre-release identifiers that
    /// semver rejects (leading zeros) are dropped as a whole.
    pub fn to_semver(&self) -> semver::Version {
        let segment = |i: usize| self.release.get(i).copied().unwrap_or(0);
        let mut version = semver::Version::new(segment(0), segment(1), segment(2));
        if !self.pre.is_empty() {
            let pre = self
                .pre
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(".");
            version.pre = semver::Prerelease::new(&pre).unwrap_or(semver::Prerelease::EMPTY);
        }
        version
    }
}

fn parse_release(raw: &str) -> Vec<u64> {
    raw.split('.')
        .map(|segment| segment.parse().unwrap_or(u64::MAX))
        .collect()
}

impl Ord for TolerantVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.release.len().max(other.release.len());
        for i in 0..len {
            let a = self.release.get(i).copied().unwrap_or(0);
            let b = other.release.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }

        match (self.pre.is_empty(), other.pre.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.pre.cmp(&other.pre),
        }
    }
}

impl PartialOrd for TolerantVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TolerantVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TolerantVersion {}

impl fmt::Display for TolerantVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let release = self
            .release
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".");
        f.write_str(&release)?;
        if !self.pre.is_empty() {
            let pre = self
                .pre
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(".");
            write!(f, "-{pre}")?;
        }
        Ok(())
    }
}

/// Compares two raw version strings with the tolerant ordering.
///
/// # Examples
///
/// ```
/// use forge_core::compare_versions;
/// use std::cmp::Ordering;
///
/// assert_eq!(compare_versions("1.10.0", "1.9.0"), Ordering::Greater);
/// assert_eq!(compare_versions("1.0.0-rc1", "1.0.0"), Ordering::Less);
/// assert_eq!(compare_versions("xyz", "0"), Ordering::Equal);
/// ```
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    TolerantVersion::parse(a).cmp(&TolerantVersion::parse(b))
}

/// Sorts items ascending by the version string returned from `key`.
///
/// The sort is stable, so items with equal versions keep their order.
pub fn sort_by_version<T>(items: &mut [T], key: impl Fn(&T) -> &str) {
    items.sort_by_cached_key(|item| TolerantVersion::parse(key(item)));
}

/// Returns the highest of the given version strings, first one on ties.
pub fn max_version<'a>(versions: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    versions.into_iter().fold(None, |best, candidate| match best {
        Some(current) if compare_versions(candidate, current) != Ordering::Greater => {
            Some(current)
        }
        _ => Some(candidate),
    })
}
