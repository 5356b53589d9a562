//! Artifact registry and version ordering (§4.1, §4.2).

pub mod repository;

use crate::error::CoreError;
use crate::version::debian::DebianSemverComparator;
use crate::version::docker::{CaptureKind, DockerTagComparator, DockerTagStrategy};
use crate::version::VersionComparator;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactType {
    Debian,
    Docker,
}

impl ArtifactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactType::Debian => "debian",
            ArtifactType::Docker => "docker",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "debian" => Some(ArtifactType::Debian),
            "docker" => Some(ArtifactType::Docker),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactStatus {
    Snapshot,
    Candidate,
    Release,
    Final,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Snapshot => "snapshot",
            ArtifactStatus::Candidate => "candidate",
            ArtifactStatus::Release => "release",
            ArtifactStatus::Final => "final",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "snapshot" => Some(ArtifactStatus::Snapshot),
            "candidate" => Some(ArtifactStatus::Candidate),
            "release" => Some(ArtifactStatus::Release),
            "final" => Some(ArtifactStatus::Final),
            _ => None,
        }
    }
}

/// A versioning strategy descriptor, distinct from the comparator it
/// produces (§4.2 design note: "the strategy descriptor and its comparator
/// are distinct values in the data model").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersioningStrategy {
    DebianSemver,
    DockerTag {
        strategy: DockerStrategyKind,
        /// Present only for `Custom`; the exactly-one-capture-group regex.
        custom_regex: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DockerStrategyKind {
    IncreasingInteger,
    Semver,
    BranchQualified,
    Custom,
}

impl VersioningStrategy {
    /// Builds the comparator this strategy describes for `artifact_name`.
    /// This is the `VersionComparator` factory collaborator contract
    /// (§6): given an artifact, returns its comparator.
    pub fn comparator(&self, artifact_name: &str) -> Result<Box<dyn VersionComparator>, CoreError> {
        match self {
            VersioningStrategy::DebianSemver => {
                Ok(Box::new(DebianSemverComparator::new(artifact_name)))
            }
            VersioningStrategy::DockerTag { strategy, custom_regex } => {
                // A caller may attach `custom_regex` to any of the built-in
                // kinds, not just `Custom` — it always wins over the
                // strategy's default pattern when present.
                let built_in = match strategy {
                    DockerStrategyKind::IncreasingInteger => Some(DockerTagStrategy::IncreasingInteger),
                    DockerStrategyKind::Semver => Some(DockerTagStrategy::Semver),
                    DockerStrategyKind::BranchQualified => Some(DockerTagStrategy::BranchQualified),
                    DockerStrategyKind::Custom => None,
                };
                match (built_in, custom_regex) {
                    (Some(built_in), Some(pattern)) => {
                        Ok(Box::new(DockerTagComparator::with_pattern(pattern, built_in.capture_kind())?))
                    }
                    (Some(built_in), None) => Ok(Box::new(DockerTagComparator::built_in(built_in)?)),
                    (None, Some(pattern)) => {
                        Ok(Box::new(DockerTagComparator::with_pattern(pattern, CaptureKind::Semver)?))
                    }
                    (None, None) => Err(CoreError::InvalidRegex(
                        "custom docker tag strategy requires a regex".to_string(),
                    )),
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub artifact_type: ArtifactType,
    pub status_filter: Vec<ArtifactStatus>,
    pub versioning_strategy: VersioningStrategy,
}

impl Artifact {
    pub fn key(&self) -> (String, ArtifactType) {
        (self.name.clone(), self.artifact_type)
    }

    pub fn comparator(&self) -> Result<Box<dyn VersionComparator>, CoreError> {
        self.versioning_strategy.comparator(&self.name)
    }

    pub fn not_found_error(name: &str, artifact_type: ArtifactType) -> CoreError {
        CoreError::NoSuchArtifact { name: name.to_string(), kind: artifact_type.as_str().to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactVersion {
    pub artifact_name: String,
    pub artifact_type: ArtifactType,
    pub version: String,
    pub status: ArtifactStatus,
}

/// The per-`(config, artifact, env)` lifecycle roll-up (§4.2).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionRollup {
    pub pending: Vec<String>,
    pub current: Option<String>,
    pub deploying: Option<String>,
    pub previous: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentArtifactSummary {
    pub environment: String,
    pub artifact_name: String,
    pub artifact_type: ArtifactType,
    pub rollup: PromotionRollup,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_regex_overrides_built_in_pattern_for_increasing_integer() {
        // The built-in `IncreasingInteger` pattern only matches bare digits;
        // a custom pattern should win and parse `build-42` instead.
        let strategy = VersioningStrategy::DockerTag {
            strategy: DockerStrategyKind::IncreasingInteger,
            custom_regex: Some(r"^build-(\d+)$".to_string()),
        };
        let comparator = strategy.comparator("demo").unwrap();
        assert_eq!(comparator.compare("build-9", "build-10"), std::cmp::Ordering::Less);
        assert_eq!(comparator.compare("9", "10"), std::cmp::Ordering::Equal);
    }

    #[test]
    fn custom_regex_overrides_built_in_pattern_for_semver() {
        // The built-in `Semver` pattern requires a leading `v`; a custom
        // pattern without that requirement should still be honored.
        let strategy = VersioningStrategy::DockerTag {
            strategy: DockerStrategyKind::Semver,
            custom_regex: Some(r"^rel-(\d+\.\d+\.\d+)$".to_string()),
        };
        let comparator = strategy.comparator("demo").unwrap();
        assert_eq!(comparator.compare("rel-1.2.0", "rel-1.10.0"), std::cmp::Ordering::Less);
    }

    #[test]
    fn no_custom_regex_falls_back_to_built_in_for_branch_qualified() {
        let strategy = VersioningStrategy::DockerTag {
            strategy: DockerStrategyKind::BranchQualified,
            custom_regex: None,
        };
        let comparator = strategy.comparator("demo").unwrap();
        assert_eq!(comparator.compare("main.5", "main.12"), std::cmp::Ordering::Less);
    }

    #[test]
    fn custom_kind_without_regex_is_an_error() {
        let strategy = VersioningStrategy::DockerTag {
            strategy: DockerStrategyKind::Custom,
            custom_regex: None,
        };
        assert!(strategy.comparator("demo").is_err());
    }
}
