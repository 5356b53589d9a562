//! Docker tag version comparator.
//!
//! A regex — either one of the built-in strategies or a caller-supplied
//! custom pattern — is applied to the tag; exactly one capture group is
//! required. The captured text is then compared either as an integer or
//! as a dotted "semver-ish" string via [`super::verrevcmp`].

use super::{verrevcmp, VersionComparator};
use crate::error::CoreError;
use regex::Regex;
use std::cmp::Ordering;

/// How the single captured group should be ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    /// Parse the capture as an unsigned integer (the "increasing integer"
    /// strategy).
    Integer,
    /// Compare the capture as a dotted numeric string, tolerating a
    /// leading `v`/`V` (the "semver" strategy).
    Semver,
    /// Compare the capture lexically via [`super::verrevcmp`] (used for
    /// branch-qualified tags, e.g. `main.42`).
    Lexical,
}

/// One of the built-in Docker tag strategies, or a caller-supplied regex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DockerTagStrategy {
    IncreasingInteger,
    Semver,
    BranchQualified,
}

impl DockerTagStrategy {
    fn default_pattern(self) -> &'static str {
        match self {
            DockerTagStrategy::IncreasingInteger => r"^(\d+)$",
            DockerTagStrategy::Semver => r"^v?(\d+\.\d+\.\d+(?:-[0-9A-Za-z.]+)?)$",
            DockerTagStrategy::BranchQualified => r"^[\w\-/]+\.(\d+)$",
        }
    }

    pub(crate) fn capture_kind(self) -> CaptureKind {
        match self {
            DockerTagStrategy::IncreasingInteger => CaptureKind::Integer,
            DockerTagStrategy::Semver => CaptureKind::Semver,
            DockerTagStrategy::BranchQualified => CaptureKind::Integer,
        }
    }
}

pub struct DockerTagComparator {
    regex: Regex,
    kind: CaptureKind,
    /// Set when the regex compiled successfully but has zero capture
    /// groups: every tag is then unparseable, logged once at construction.
    always_unparseable: bool,
}

impl DockerTagComparator {
    /// Builds a comparator from one of the built-in strategies.
    pub fn built_in(strategy: DockerTagStrategy) -> Result<Self, CoreError> {
        Self::with_pattern(strategy.default_pattern(), strategy.capture_kind())
    }

    /// Builds a comparator from a caller-supplied regex and ranking kind.
    ///
    /// Fails with [`CoreError::InvalidRegex`] if the pattern has more than
    /// one capture group. A pattern with zero capture groups compiles
    /// successfully but every tag will compare as unparseable (logged
    /// once here).
    pub fn with_pattern(pattern: &str, kind: CaptureKind) -> Result<Self, CoreError> {
        let regex = Regex::new(pattern).map_err(|e| CoreError::InvalidRegex(e.to_string()))?;
        let groups = regex.captures_len() - 1;
        if groups > 1 {
            return Err(CoreError::InvalidRegex(format!(
                "pattern {pattern:?} has {groups} capture groups, expected exactly one"
            )));
        }
        let always_unparseable = groups == 0;
        if always_unparseable {
            log::warn!("docker tag pattern {pattern:?} has no capture group; all tags will be treated as unparseable");
        }
        Ok(Self { regex, kind, always_unparseable })
    }

    fn capture<'a>(&self, tag: &'a str) -> Option<&'a str> {
        if self.always_unparseable {
            return None;
        }
        self.regex.captures(tag)?.get(1).map(|m| m.as_str())
    }

    fn rank(&self, captured: &str) -> Option<RankKey> {
        match self.kind {
            CaptureKind::Integer => captured.parse::<u128>().ok().map(RankKey::Integer),
            CaptureKind::Semver => {
                let trimmed = captured.strip_prefix(['v', 'V']).unwrap_or(captured);
                Some(RankKey::Text(trimmed.to_string()))
            }
            CaptureKind::Lexical => Some(RankKey::Text(captured.to_string())),
        }
    }

    fn parse(&self, tag: &str) -> Option<RankKey> {
        let captured = self.capture(tag)?;
        let rank = self.rank(captured);
        if rank.is_none() {
            log::warn!("unparseable docker tag capture: {captured:?} from tag {tag:?}");
        }
        rank
    }
}

enum RankKey {
    Integer(u128),
    Text(String),
}

fn compare_rank(a: &RankKey, b: &RankKey) -> Ordering {
    match (a, b) {
        (RankKey::Integer(x), RankKey::Integer(y)) => x.cmp(y),
        (RankKey::Text(x), RankKey::Text(y)) => verrevcmp(x, y),
        // Different kinds never arise from the same comparator instance.
        (RankKey::Integer(_), RankKey::Text(_)) => Ordering::Greater,
        (RankKey::Text(_), RankKey::Integer(_)) => Ordering::Less,
    }
}

impl VersionComparator for DockerTagComparator {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        let pa = self.parse(a);
        let pb = self.parse(b);
        match (pa, pb) {
            (Some(x), Some(y)) => compare_rank(&x, &y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increasing_integer_sorts_numerically() {
        let comparator = DockerTagComparator::built_in(DockerTagStrategy::IncreasingInteger).unwrap();
        let mut tags = vec!["9".to_string(), "10".to_string(), "2".to_string()];
        comparator.sort_newest_first(&mut tags);
        assert_eq!(tags, vec!["10", "9", "2"]);
    }

    #[test]
    fn semver_with_leading_v() {
        let comparator = DockerTagComparator::built_in(DockerTagStrategy::Semver).unwrap();
        let mut tags = vec!["v1.2.0".to_string(), "v1.10.0".to_string(), "v1.3.0".to_string()];
        comparator.sort_newest_first(&mut tags);
        assert_eq!(tags, vec!["v1.10.0", "v1.3.0", "v1.2.0"]);
    }

    #[test]
    fn custom_regex_zero_groups_is_unparseable() {
        let comparator = DockerTagComparator::with_pattern(r"^latest$", CaptureKind::Integer).unwrap();
        assert_eq!(comparator.compare("latest", "latest"), Ordering::Equal);
    }

    #[test]
    fn custom_regex_two_groups_is_invalid() {
        let err = DockerTagComparator::with_pattern(r"^(\d+)\.(\d+)$", CaptureKind::Integer).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRegex(_)));
    }

    #[test]
    fn unparseable_tag_sorts_last() {
        let comparator = DockerTagComparator::built_in(DockerTagStrategy::IncreasingInteger).unwrap();
        let mut tags = vec!["latest".to_string(), "3".to_string()];
        comparator.sort_newest_first(&mut tags);
        assert_eq!(tags, vec!["3", "latest"]);
    }

    #[test]
    fn branch_qualified_captures_trailing_counter() {
        let comparator = DockerTagComparator::built_in(DockerTagStrategy::BranchQualified).unwrap();
        let mut tags = vec!["main.5".to_string(), "main.12".to_string()];
        comparator.sort_newest_first(&mut tags);
        assert_eq!(tags, vec!["main.12", "main.5"]);
    }
}
