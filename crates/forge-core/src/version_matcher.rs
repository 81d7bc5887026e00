//! Version requirement matching.
//!
//! Requirements come from module manifests and from query parameters, both
//! of which are loosely formatted. The matcher normalizes the common
//! spellings onto `semver::VersionReq` and treats anything it cannot parse
//! as "no constraint".
//!
//! Accepted forms: bare versions (exact match), `=`, `==`, `>`, `>=`, `<`,
//! `<=`, `~`, `~>`, `^`, wildcards (`1.x`, `1.*`, `*`), comparators joined
//! by whitespace or commas (all must hold), and `||` alternatives.

use crate::version::TolerantVersion;
use semver::VersionReq;

/// A parsed, tolerant version constraint.
///
/// # Examples
///
/// ```
/// use forge_core::VersionConstraint;
///
/// let exact = VersionConstraint::parse("2.0.0");
/// assert!(exact.matches("2.0.0"));
/// assert!(!exact.matches("2.0.1"));
///
/// let range = VersionConstraint::parse(">= 1.0.0 < 2.0.0");
/// assert!(range.matches("1.4.2"));
/// assert!(!range.matches("2.0.0"));
///
/// // Unparseable requirements constrain nothing.
/// assert!(VersionConstraint::parse("whatever!!").matches("0.0.1"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct VersionConstraint {
    alternatives: Vec<VersionReq>,
}

impl VersionConstraint {
    /// A constraint that matches every version.
    pub fn any() -> Self {
        Self::default()
    }

    /// Parses a requirement string. Never fails.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            return Self::any();
        }

        let mut alternatives = Vec::new();
        for alternative in input.split("||") {
            let normalized = normalize(alternative);
            if normalized.is_empty() {
                return Self::any();
            }
            match VersionReq::parse(&normalized) {
                Ok(req) => alternatives.push(req),
                Err(e) => {
                    tracing::debug!(
                        requirement = input,
                        error = %e,
                        "unparseable version requirement, treating as unconstrained"
                    );
                    return Self::any();
                }
            }
        }

        Self { alternatives }
    }

    /// Whether this constraint accepts every version.
    pub fn is_any(&self) -> bool {
        self.alternatives.is_empty()
    }

    /// Checks a raw version string against the constraint.
    pub fn matches(&self, version: &str) -> bool {
        if self.is_any() {
            return true;
        }
        let version = TolerantVersion::parse(version).to_semver();
        self.alternatives.iter().any(|req| req.matches(&version))
    }
}

/// Rewrites one `||` alternative into comma-separated semver comparators.
fn normalize(alternative: &str) -> String {
    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op: Option<String> = None;

    for token in alternative
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
    {
        if token.chars().all(is_operator_char) {
            pending_op = Some(token.to_string());
            continue;
        }

        let token = match pending_op.take() {
            Some(op) => format!("{op}{token}"),
            None => token.to_string(),
        };
        comparators.push(normalize_comparator(&token));
    }

    comparators.join(", ")
}

fn normalize_comparator(token: &str) -> String {
    let split = token
        .find(|c: char| !is_operator_char(c))
        .unwrap_or(token.len());
    let (op, version) = token.split_at(split);
    let version = version.trim_start_matches(['v', 'V']);

    let op = match op {
        "" if is_wildcard(version) => "",
        "" | "==" => "=",
        "~>" => "~",
        other => other,
    };

    format!("{op}{version}")
}

fn is_operator_char(c: char) -> bool {
    matches!(c, '<' | '>' | '=' | '~' | '^' | '!')
}

fn is_wildcard(version: &str) -> bool {
    version
        .split('.')
        .any(|part| matches!(part, "x" | "X" | "*"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_bare_version() {
        let constraint = VersionConstraint::parse("1.2.3");
        assert!(constraint.matches("1.2.3"));
        assert!(!constraint.matches("1.2.4"));
        assert!(!constraint.matches("1.3.0"));
    }

    #[test]
    fn test_double_equals() {
        let constraint = VersionConstraint::parse("== 1.2.3");
        assert!(constraint.matches("1.2.3"));
        assert!(!constraint.matches("1.2.2"));
    }

    #[test]
    fn test_space_separated_range() {
        let constraint = VersionConstraint::parse(">= 2.4.0 < 5.0.0");
        assert!(constraint.matches("2.4.0"));
        assert!(constraint.matches("4.9.9"));
        assert!(!constraint.matches("5.0.0"));
        assert!(!constraint.matches("2.3.9"));
    }

    #[test]
    fn test_comma_separated_range() {
        let constraint = VersionConstraint::parse(">=1.0.0,<1.5.0");
        assert!(constraint.matches("1.4.0"));
        assert!(!constraint.matches("1.5.0"));
    }

    #[test]
    fn test_pessimistic_operator() {
        let constraint = VersionConstraint::parse("~> 1.2");
        assert!(constraint.matches("1.2.9"));
        assert!(!constraint.matches("1.3.0"));
    }

    #[test]
    fn test_wildcards() {
        let constraint = VersionConstraint::parse("1.x");
        assert!(constraint.matches("1.0.0"));
        assert!(constraint.matches("1.99.3"));
        assert!(!constraint.matches("2.0.0"));
        assert!(VersionConstraint::parse("*").matches("7.1.0"));
    }

    #[test]
    fn test_alternatives() {
        let constraint = VersionConstraint::parse("1.0.0 || >= 3.0.0");
        assert!(constraint.matches("1.0.0"));
        assert!(constraint.matches("3.1.0"));
        assert!(!constraint.matches("2.0.0"));
    }

    #[test]
    fn test_malformed_version_is_tolerated() {
        let constraint = VersionConstraint::parse(">= 1.0.0");
        assert!(constraint.matches("1.2 (custom build)"));
        assert!(!constraint.matches("garbage"));
    }

    #[test]
    fn test_unparseable_constraint_matches_everything() {
        for raw in ["", "   ", "not a version", ">= banana", "1.0.0 ||"] {
            let constraint = VersionConstraint::parse(raw);
            assert!(constraint.is_any(), "expected {raw:?} to be unconstrained");
            assert!(constraint.matches("0.0.1"));
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(">= 1.0.0 < 2.0.0"), ">=1.0.0, <2.0.0");
        assert_eq!(normalize("1.2.3"), "=1.2.3");
        assert_eq!(normalize("~> 2.1"), "~2.1");
        assert_eq!(normalize("1.x"), "1.x");
        assert_eq!(normalize("v1.0.0"), "=1.0.0");
    }
}
