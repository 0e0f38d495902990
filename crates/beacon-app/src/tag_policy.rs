use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

const ENVIRONMENT_LABELS: [&str; 2] = ["environment", "env"];
const TEAM_LABELS: [&str; 2] = ["team", "owner"];
const COMPONENT_LABELS: [&str; 2] = ["component_type", "component"];

/// Which alert labels become service tags, and how.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TagPolicy {
    #[serde(default = "default_allowed_labels")]
    pub allowed_labels: Vec<String>,
    #[serde(default = "default_allowed_prefixes")]
    pub allowed_prefixes: Vec<String>,
    #[serde(default = "default_max_label_tags")]
    pub max_label_tags: usize,
    /// Drop the matched prefix from the label name when building the tag.
    #[serde(default = "default_strip_prefix")]
    pub strip_prefix: bool,
}

impl Default for TagPolicy {
    fn default() -> Self {
        Self {
            allowed_labels: default_allowed_labels(),
            allowed_prefixes: default_allowed_prefixes(),
            max_label_tags: default_max_label_tags(),
            strip_prefix: default_strip_prefix(),
        }
    }
}

fn default_allowed_labels() -> Vec<String> {
    vec!["tier".into(), "region".into(), "cluster".into()]
}
fn default_allowed_prefixes() -> Vec<String> {
    vec!["tag_".into()]
}
fn default_max_label_tags() -> usize {
    10
}
fn default_strip_prefix() -> bool {
    true
}

impl TagPolicy {
    /// `name:value` tags for every admitted label, in label-name order, capped
    /// at `max_label_tags`.
    pub fn label_tags(&self, labels: &BTreeMap<String, String>) -> BTreeSet<String> {
        let mut tags = BTreeSet::new();
        for (name, value) in labels {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let Some(tag_name) = self.tag_name(name) else {
                continue;
            };
            if tags.len() >= self.max_label_tags {
                tracing::debug!(
                    label = name.as_str(),
                    cap = self.max_label_tags,
                    "label tag cap reached, dropping label"
                );
                continue;
            }
            tags.insert(format!("{tag_name}:{value}"));
        }
        tags
    }

    fn tag_name<'a>(&self, label: &'a str) -> Option<&'a str> {
        if self.allowed_labels.iter().any(|allowed| allowed == label) {
            return Some(label);
        }
        let prefix = self
            .allowed_prefixes
            .iter()
            .find(|prefix| !prefix.is_empty() && label.starts_with(prefix.as_str()))?;
        let name = if self.strip_prefix {
            &label[prefix.len()..]
        } else {
            label
        };
        (!name.is_empty()).then_some(name)
    }
}

/// Environment, team and component type as asserted by alert labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelAttributes {
    pub environment: Option<String>,
    pub team: Option<String>,
    pub component_type: Option<String>,
}

impl LabelAttributes {
    pub fn from_labels(labels: &BTreeMap<String, String>) -> Self {
        Self {
            environment: first_label(labels, &ENVIRONMENT_LABELS),
            team: first_label(labels, &TEAM_LABELS),
            component_type: first_label(labels, &COMPONENT_LABELS),
        }
    }
}

/// Value of the first key in `keys` present with a non-blank value.
pub(crate) fn first_label(labels: &BTreeMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| labels.get(*key))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn allowed_labels_and_prefixes_become_tags() {
        let policy = TagPolicy::default();
        let tags = policy.label_tags(&labels(&[
            ("tier", "gold"),
            ("tag_pci", "yes"),
            ("alertname", "DiskFull"),
        ]));
        assert_eq!(
            tags,
            BTreeSet::from(["pci:yes".to_string(), "tier:gold".to_string()])
        );
    }

    #[test]
    fn prefix_kept_when_not_stripping() {
        let policy = TagPolicy {
            strip_prefix: false,
            ..TagPolicy::default()
        };
        let tags = policy.label_tags(&labels(&[("tag_pci", "yes")]));
        assert_eq!(tags, BTreeSet::from(["tag_pci:yes".to_string()]));
    }

    #[test]
    fn cap_limits_tag_count() {
        let policy = TagPolicy {
            max_label_tags: 2,
            ..TagPolicy::default()
        };
        let tags = policy.label_tags(&labels(&[
            ("tag_a", "1"),
            ("tag_b", "2"),
            ("tag_c", "3"),
        ]));
        assert_eq!(
            tags,
            BTreeSet::from(["a:1".to_string(), "b:2".to_string()])
        );
    }

    #[test]
    fn blank_values_and_bare_prefix_skipped() {
        let policy = TagPolicy::default();
        let tags = policy.label_tags(&labels(&[("tier", " "), ("tag_", "x")]));
        assert!(tags.is_empty());
    }

    #[test]
    fn attributes_from_label_aliases() {
        let attrs = LabelAttributes::from_labels(&labels(&[
            ("env", "prod"),
            ("owner", "payments"),
            ("component", "api"),
        ]));
        assert_eq!(attrs.environment.as_deref(), Some("prod"));
        assert_eq!(attrs.team.as_deref(), Some("payments"));
        assert_eq!(attrs.component_type.as_deref(), Some("api"));
    }
}
