pub mod merge;
pub mod source;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

pub use merge::{merge, Change, MergeOutcome, ServiceUpdate};
pub use source::TagSource;

/// Sentinel for scalar attributes nobody has asserted yet.
pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceKey {
    pub namespace: String,
    pub service: String,
}

impl ServiceKey {
    pub fn new(namespace: impl Into<String>, service: impl Into<String>) -> Result<Self, DomainError> {
        let namespace = namespace.into();
        let service = service.into();
        if namespace.trim().is_empty() {
            return Err(DomainError::EmptyField("namespace"));
        }
        if service.trim().is_empty() {
            return Err(DomainError::EmptyField("service"));
        }
        Ok(Self { namespace, service })
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.service)
    }
}

/// A scalar attribute together with the source that set it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    value: String,
    source: Option<TagSource>,
}

impl Attribute {
    pub fn unknown() -> Self {
        Self {
            value: UNKNOWN.to_string(),
            source: None,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn source(&self) -> Option<TagSource> {
        self.source
    }

    pub fn is_unknown(&self) -> bool {
        let value = self.value.trim();
        value.is_empty() || value.eq_ignore_ascii_case(UNKNOWN)
    }
}

impl Default for Attribute {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Descriptive metadata for one `(namespace, service)` pair.
///
/// Every entry of `tags` has exactly one entry in `tag_sources` naming the
/// highest-trust contributor currently justifying it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    key: ServiceKey,
    environment: Attribute,
    team: Attribute,
    component_type: Attribute,
    tags: BTreeSet<String>,
    tag_sources: BTreeMap<String, TagSource>,
    last_seen: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl Service {
    pub fn new(key: ServiceKey, now: DateTime<Utc>) -> Self {
        Self {
            key,
            environment: Attribute::unknown(),
            team: Attribute::unknown(),
            component_type: Attribute::unknown(),
            tags: BTreeSet::new(),
            tag_sources: BTreeMap::new(),
            last_seen: now,
            created_at: now,
        }
    }

    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    pub fn namespace(&self) -> &str {
        &self.key.namespace
    }

    pub fn name(&self) -> &str {
        &self.key.service
    }

    pub fn environment(&self) -> &Attribute {
        &self.environment
    }

    pub fn team(&self) -> &Attribute {
        &self.team
    }

    pub fn component_type(&self) -> &Attribute {
        &self.component_type
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn tag_source(&self, tag: &str) -> Option<TagSource> {
        self.tag_sources.get(tag).copied()
    }

    pub fn tag_sources(&self) -> &BTreeMap<String, TagSource> {
        &self.tag_sources
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Tags and their attributions describe exactly the same set.
    pub fn attributions_consistent(&self) -> bool {
        self.tags.len() == self.tag_sources.len()
            && self.tags.iter().all(|t| self.tag_sources.contains_key(t))
    }
}
