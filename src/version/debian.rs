//! Debian/semver-style version comparator.
//!
//! Versions take the form `package-version[~suffix][-hHASH]`, e.g.
//! `keeldemo-0.0.1~dev.8-h8.41595c4`. The package-name prefix and its
//! separating `-` are stripped; the remainder is split into
//! `[epoch:]upstream-version[-debian-revision]` and compared by dpkg's
//! documented version-compare rules (see [`super::verrevcmp`]).
//!
//! Unparseable inputs sort last and log a warning — callers still get a
//! total order, just one where garbage floats to the bottom.

use super::{verrevcmp, VersionComparator};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
struct DebianFragments {
    epoch: u64,
    upstream_version: String,
    debian_revision: String,
}

fn parse_fragments(remainder: &str) -> Option<DebianFragments> {
    if remainder.is_empty() {
        return None;
    }

    let (epoch, rest) = match remainder.split_once(':') {
        Some((epoch_str, rest)) => (epoch_str.parse::<u64>().ok()?, rest),
        None => (0, remainder),
    };

    if rest.is_empty() {
        return None;
    }

    let (upstream_version, debian_revision) = match rest.rsplit_once('-') {
        Some((upstream, revision)) => (upstream.to_string(), revision.to_string()),
        None => (rest.to_string(), String::new()),
    };

    if upstream_version.is_empty() {
        return None;
    }

    Some(DebianFragments { epoch, upstream_version, debian_revision })
}

fn compare_fragments(a: &DebianFragments, b: &DebianFragments) -> Ordering {
    a.epoch
        .cmp(&b.epoch)
        .then_with(|| verrevcmp(&a.upstream_version, &b.upstream_version))
        .then_with(|| verrevcmp(&a.debian_revision, &b.debian_revision))
}

/// Strips the `package-` prefix from a raw version string. The package
/// name embedded in the version string is not required to equal the
/// artifact's registered name (real fixtures store debian versions under
/// a short registry key while the version strings themselves carry the
/// full package name, e.g. artifact `foo` with versions prefixed
/// `keeldemo-`) — so the prefix is found structurally: the first `-`
/// immediately followed by a digit marks where the version begins.
fn strip_package_prefix(raw: &str) -> Option<&str> {
    let bytes = raw.as_bytes();
    for i in 0..bytes.len() {
        if bytes[i] == b'-' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
            let remainder = &raw[i + 1..];
            return if remainder.is_empty() { None } else { Some(remainder) };
        }
    }
    None
}

/// Stateless, structurally-equal value object: two `DebianSemverComparator`s
/// for the same package name are interchangeable, so it does not need
/// identity semantics — construct one per call site freely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebianSemverComparator {
    package_name: String,
}

impl DebianSemverComparator {
    pub fn new(package_name: impl Into<String>) -> Self {
        Self { package_name: package_name.into() }
    }

    fn parse(&self, raw: &str) -> Option<DebianFragments> {
        let remainder = strip_package_prefix(raw)?;
        parse_fragments(remainder)
    }
}

impl VersionComparator for DebianSemverComparator {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        let pa = self.parse(a);
        let pb = self.parse(b);

        match (pa, pb) {
            (Some(x), Some(y)) => compare_fragments(&x, &y),
            (Some(_), None) => {
                log::warn!("unparseable debian version for {}: {}", self.package_name, b);
                Ordering::Greater
            }
            (None, Some(_)) => {
                log::warn!("unparseable debian version for {}: {}", self.package_name, a);
                Ordering::Less
            }
            (None, None) => {
                log::warn!(
                    "unparseable debian versions for {}: {} and {}",
                    self.package_name,
                    a,
                    b
                );
                Ordering::Equal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(name: &str) -> DebianSemverComparator {
        DebianSemverComparator::new(name)
    }

    #[test]
    fn sorts_dev_build_chain() {
        let comparator = cmp("keeldemo");
        let mut versions = vec![
            "keeldemo-0.0.1~dev.9-h9.3d2c8ff".to_string(),
            "keeldemo-0.0.1~dev.10-h10.1d2d542".to_string(),
            "keeldemo-0.0.1~dev.8-h8.41595c4".to_string(),
        ];
        comparator.sort_newest_first(&mut versions);
        assert_eq!(
            versions,
            vec![
                "keeldemo-0.0.1~dev.10-h10.1d2d542",
                "keeldemo-0.0.1~dev.9-h9.3d2c8ff",
                "keeldemo-0.0.1~dev.8-h8.41595c4",
            ]
        );
    }

    #[test]
    fn survives_shuffled_input() {
        let comparator = cmp("keeldemo");
        let orderings = [
            vec!["keeldemo-0.0.1~dev.8-h8.41595c4", "keeldemo-0.0.1~dev.10-h10.1d2d542", "keeldemo-0.0.1~dev.9-h9.3d2c8ff"],
            vec!["keeldemo-0.0.1~dev.10-h10.1d2d542", "keeldemo-0.0.1~dev.8-h8.41595c4", "keeldemo-0.0.1~dev.9-h9.3d2c8ff"],
        ];
        for ordering in orderings {
            let mut versions: Vec<String> = ordering.into_iter().map(String::from).collect();
            comparator.sort_newest_first(&mut versions);
            assert_eq!(versions[0], "keeldemo-0.0.1~dev.10-h10.1d2d542");
            assert_eq!(versions[2], "keeldemo-0.0.1~dev.8-h8.41595c4");
        }
    }

    #[test]
    fn unparseable_sorts_last() {
        let comparator = cmp("keeldemo");
        let mut versions = vec![
            "garbage".to_string(),
            "keeldemo-1.0.0-h1.abc".to_string(),
        ];
        comparator.sort_newest_first(&mut versions);
        assert_eq!(versions, vec!["keeldemo-1.0.0-h1.abc", "garbage"]);
    }

    #[test]
    fn epoch_dominates() {
        let comparator = cmp("pkg");
        assert_eq!(
            comparator.compare("pkg-1:0.1-h1.a", "pkg-0:9.9-h1.a"),
            Ordering::Greater
        );
    }
}
