//! Semver range expressions.
//!
//! Ranges are written node-style, which differs from Cargo requirements:
//! - A bare full version (`1.2.3`, `v1.2.3`) matches exactly that version
//! - A bare partial version is a prefix: `1.2` is `1.2.x`, `1` is `1.x`
//! - Comparators may be separated by whitespace or commas and are intersected
//! - `a - b` is a hyphen range meaning `>=a, <=b`
//! - `||` separates alternatives
//!
//! Each alternative is lowered to a [`semver::VersionReq`], so precedence and
//! pre-release matching follow the semver crate.

use std::fmt;

use semver::{Version, VersionReq};

/// A parsed range that remembers the text it was written as.
#[derive(Debug, Clone)]
pub struct Range {
    source: String,
    alternatives: Vec<VersionReq>,
}

impl Range {
    pub fn parse(range: &str) -> Result<Self, semver::Error> {
        let alternatives = range
            .split("||")
            .map(|alt| VersionReq::parse(&lower_alternative(alt)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            source: range.to_string(),
            alternatives,
        })
    }

    /// The range admitting every version strictly below `version`.
    pub fn below(version: &Version) -> Self {
        let source = format!("<{version}");
        let req = VersionReq {
            comparators: vec![semver::Comparator {
                op: semver::Op::Less,
                major: version.major,
                minor: Some(version.minor),
                patch: Some(version.patch),
                pre: version.pre.clone(),
            }],
        };
        Self {
            source,
            alternatives: vec![req],
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn satisfied_by(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    /// Greatest version in `versions` satisfying this range.
    pub fn max_satisfying(&self, versions: &[Version]) -> Option<Version> {
        versions
            .iter()
            .filter(|v| self.satisfied_by(v))
            .max()
            .cloned()
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Sort versions newest first by semver precedence.
pub fn sort_descending(versions: &mut [Version]) {
    versions.sort_by(|a, b| b.cmp(a));
}

fn lower_alternative(alternative: &str) -> String {
    let tokens = tokenize(alternative);
    if tokens.is_empty() {
        return "*".to_string();
    }

    // a - b
    if tokens.len() == 3 && tokens[1] == "-" {
        return format!(">={}, <={}", strip_v(&tokens[0]), strip_v(&tokens[2]));
    }

    tokens
        .iter()
        .map(|t| lower_comparator(t))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Split on whitespace and commas, gluing a lone operator to the version after it.
fn tokenize(alternative: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;
    for raw in alternative
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
    {
        if is_operator(raw) {
            pending_op = Some(raw);
            continue;
        }
        match pending_op.take() {
            Some(op) => tokens.push(format!("{op}{raw}")),
            None => tokens.push(raw.to_string()),
        }
    }
    if let Some(op) = pending_op {
        tokens.push(op.to_string());
    }
    tokens
}

fn is_operator(token: &str) -> bool {
    matches!(token, "^" | "~" | "=" | ">" | ">=" | "<" | "<=")
}

fn lower_comparator(token: &str) -> String {
    let token = strip_v(token);
    if is_bare_version(&token) {
        // `1.2` means `1.2.x`, not the crate's implicit caret
        format!("={token}")
    } else {
        token
    }
}

/// Full or partial version with no operator and no wildcard parts.
fn is_bare_version(token: &str) -> bool {
    if !token.starts_with(|c: char| c.is_ascii_digit()) {
        return false;
    }
    if Version::parse(token).is_ok() {
        return true;
    }
    let parts: Vec<&str> = token.split('.').collect();
    parts.len() <= 2
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

/// Drop a leading `v` from the version, keeping any operator before it.
fn strip_v(token: &str) -> String {
    let trimmed = token.trim_start_matches(['=', '>', '<', '^', '~']);
    let prefix = &token[..token.len() - trimmed.len()];
    match trimmed.strip_prefix('v') {
        Some(rest) => format!("{prefix}{rest}"),
        None => token.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn range(s: &str) -> Range {
        Range::parse(s).unwrap()
    }

    #[test]
    fn bare_version_is_exact() {
        let r = range("0.1.0");
        assert!(r.satisfied_by(&v("0.1.0")));
        assert!(!r.satisfied_by(&v("0.1.1")));
    }

    #[test]
    fn v_prefix_is_exact() {
        let r = range("v1.2.3");
        assert!(r.satisfied_by(&v("1.2.3")));
        assert!(!r.satisfied_by(&v("1.2.4")));
    }

    #[test]
    fn bare_partial_version_is_prefix() {
        let r = range("1.2");
        assert!(r.satisfied_by(&v("1.2.0")));
        assert!(r.satisfied_by(&v("1.2.5")));
        assert!(!r.satisfied_by(&v("1.9.0")));

        let r = range("1");
        assert!(r.satisfied_by(&v("1.9.0")));
        assert!(!r.satisfied_by(&v("2.0.0")));
    }

    #[test]
    fn v_prefix_after_operator() {
        let r = range(">=v1.0.0");
        assert!(r.satisfied_by(&v("1.0.0")));
        assert!(r.satisfied_by(&v("3.1.0")));
        assert!(!r.satisfied_by(&v("0.9.9")));

        let r = range("=v1.0.0");
        assert!(r.satisfied_by(&v("1.0.0")));
        assert!(!r.satisfied_by(&v("1.0.1")));

        let r = range("v1.0.0 - v1.2.0");
        assert!(r.satisfied_by(&v("1.2.0")));
        assert!(!r.satisfied_by(&v("1.2.1")));
    }

    #[test]
    fn caret_on_zero_major() {
        let r = range("^0.1.0");
        assert!(r.satisfied_by(&v("0.1.0")));
        assert!(r.satisfied_by(&v("0.1.9")));
        assert!(!r.satisfied_by(&v("0.2.0")));
    }

    #[test]
    fn whitespace_comparators_intersect() {
        let r = range(">=1.0.0 <2.0.0");
        assert!(r.satisfied_by(&v("1.5.0")));
        assert!(!r.satisfied_by(&v("2.0.0")));
        assert!(!r.satisfied_by(&v("0.9.0")));
    }

    #[test]
    fn detached_operator() {
        let r = range(">= 1.2.0");
        assert!(r.satisfied_by(&v("1.2.0")));
        assert!(!r.satisfied_by(&v("1.1.9")));
    }

    #[test]
    fn hyphen_range_is_inclusive() {
        let r = range("1.0.0 - 1.4.0");
        assert!(r.satisfied_by(&v("1.0.0")));
        assert!(r.satisfied_by(&v("1.4.0")));
        assert!(!r.satisfied_by(&v("1.4.1")));
    }

    #[test]
    fn alternatives_union() {
        let r = range("0.1.0 || ^2.0.0");
        assert!(r.satisfied_by(&v("0.1.0")));
        assert!(r.satisfied_by(&v("2.3.0")));
        assert!(!r.satisfied_by(&v("1.0.0")));
    }

    #[test]
    fn wildcards() {
        assert!(range("*").satisfied_by(&v("9.9.9")));
        assert!(range("").satisfied_by(&v("0.0.1")));
        let r = range("1.x");
        assert!(r.satisfied_by(&v("1.7.0")));
        assert!(!r.satisfied_by(&v("2.0.0")));
    }

    #[test]
    fn below_excludes_version() {
        let r = Range::below(&v("0.1.1"));
        assert_eq!(r.to_string(), "<0.1.1");
        assert!(r.satisfied_by(&v("0.1.0")));
        assert!(!r.satisfied_by(&v("0.1.1")));
        assert!(!r.satisfied_by(&v("0.2.0")));
    }

    #[test]
    fn display_keeps_source_text() {
        assert_eq!(range("^0.2.0").to_string(), "^0.2.0");
        assert_eq!(range(">= 1.2.0").as_str(), ">= 1.2.0");
    }

    #[test]
    fn max_satisfying_uses_semver_order() {
        let versions = vec![v("0.9.0"), v("0.10.0"), v("0.2.0")];
        assert_eq!(range(">=0.1.0").max_satisfying(&versions), Some(v("0.10.0")));
        assert_eq!(range("<0.10.0").max_satisfying(&versions), Some(v("0.9.0")));
        assert_eq!(range("^1.0.0").max_satisfying(&versions), None);
    }

    #[test]
    fn sort_descending_multi_digit() {
        let mut versions = vec![v("0.9.0"), v("0.10.0"), v("0.1.0")];
        sort_descending(&mut versions);
        assert_eq!(versions, vec![v("0.10.0"), v("0.9.0"), v("0.1.0")]);
    }

    #[test]
    fn invalid_range_is_error() {
        assert!(Range::parse("not-a-range").is_err());
    }
}
