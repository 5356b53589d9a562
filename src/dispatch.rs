//! Polymorphic payload dispatcher (§4.5): given the field names present on
//! an encoded object, pick the concrete variant to decode into. Realized as
//! a priority-ordered rule list plus a default fallback, so the two
//! concrete dispatchers below are data, not duplicated match arms.

use serde_json::Map;
use serde_json::Value;

/// One "if field X present -> variant V" rule.
struct DispatchRule<T> {
    field: &'static str,
    variant: T,
}

/// A first-match-wins dispatcher over a JSON object's field-name set.
pub struct FieldDispatcher<T> {
    rules: Vec<DispatchRule<T>>,
    default: T,
}

impl<T: Clone> FieldDispatcher<T> {
    pub fn new(rules: Vec<(&'static str, T)>, default: T) -> Self {
        Self {
            rules: rules.into_iter().map(|(field, variant)| DispatchRule { field, variant }).collect(),
            default,
        }
    }

    /// Returns the first rule's variant whose field is present in `fields`,
    /// or the default if none match.
    pub fn dispatch(&self, fields: &Map<String, Value>) -> T {
        for rule in &self.rules {
            if fields.contains_key(rule.field) {
                return rule.variant.clone();
            }
        }
        self.default.clone()
    }

    /// Convenience for dispatching directly on a decoded JSON object.
    pub fn dispatch_value(&self, value: &Value) -> T {
        match value.as_object() {
            Some(map) => self.dispatch(map),
            None => self.default.clone(),
        }
    }
}

/// Which versioning strategy an artifact's encoded payload selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersioningStrategyTag {
    Debian,
    Docker,
}

/// `tagVersionStrategy` present -> Docker; else Debian.
pub fn versioning_strategy_dispatcher() -> FieldDispatcher<VersioningStrategyTag> {
    FieldDispatcher::new(
        vec![("tagVersionStrategy", VersioningStrategyTag::Docker)],
        VersioningStrategyTag::Debian,
    )
}

/// Which container spec variant an encoded payload selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKindTag {
    DigestPinned,
    VersionedTag,
}

/// `digest` present -> digest-pinned; else versioned-tag.
pub fn container_kind_dispatcher() -> FieldDispatcher<ContainerKindTag> {
    FieldDispatcher::new(
        vec![("digest", ContainerKindTag::DigestPinned)],
        ContainerKindTag::VersionedTag,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn versioning_strategy_picks_docker_when_field_present() {
        let dispatcher = versioning_strategy_dispatcher();
        let value = json!({"tagVersionStrategy": "semver"});
        assert_eq!(dispatcher.dispatch_value(&value), VersioningStrategyTag::Docker);
    }

    #[test]
    fn versioning_strategy_defaults_to_debian() {
        let dispatcher = versioning_strategy_dispatcher();
        let value = json!({"statuses": ["release"]});
        assert_eq!(dispatcher.dispatch_value(&value), VersioningStrategyTag::Debian);
    }

    #[test]
    fn container_kind_picks_digest_pinned() {
        let dispatcher = container_kind_dispatcher();
        let value = json!({"digest": "sha256:abc"});
        assert_eq!(dispatcher.dispatch_value(&value), ContainerKindTag::DigestPinned);
    }

    #[test]
    fn container_kind_defaults_to_versioned_tag() {
        let dispatcher = container_kind_dispatcher();
        let value = json!({"tag": "v1.0.0"});
        assert_eq!(dispatcher.dispatch_value(&value), ContainerKindTag::VersionedTag);
    }

    #[test]
    fn first_matching_rule_wins() {
        let dispatcher: FieldDispatcher<&'static str> =
            FieldDispatcher::new(vec![("a", "first"), ("b", "second")], "default");
        let value = json!({"a": 1, "b": 2});
        assert_eq!(dispatcher.dispatch_value(&value), "first");
    }
}
