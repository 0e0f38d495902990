use std::time::Duration;

use serde::Deserialize;

use crate::tag_policy::TagPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_namespace")]
    pub default_namespace: String,
    /// Upper bound for one batch transaction; unset means no limit.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            default_namespace: default_namespace(),
            timeout_secs: None,
        }
    }
}

impl IngestConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.filter(|s| *s > 0).map(Duration::from_secs)
    }
}

fn default_namespace() -> String {
    "default".into()
}

/// Settings the engine itself consumes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub tags: TagPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let config = EngineConfig::default();
        assert_eq!(config.ingest.default_namespace, "default");
        assert!(config.ingest.timeout().is_none());
        assert_eq!(config.tags.max_label_tags, 10);
    }

    #[test]
    fn zero_timeout_means_unbounded() {
        let config = IngestConfig {
            timeout_secs: Some(0),
            ..IngestConfig::default()
        };
        assert!(config.timeout().is_none());
    }
}
