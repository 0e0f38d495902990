use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Attribute, Service, TagSource, UNKNOWN};

/// A partial service description from a single source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUpdate {
    pub source: TagSource,
    /// `None` makes no claim about tags, so nothing is retracted.
    pub tags: Option<BTreeSet<String>>,
    pub environment: Option<String>,
    pub team: Option<String>,
    pub component_type: Option<String>,
}

impl ServiceUpdate {
    pub fn new(source: TagSource) -> Self {
        Self {
            source,
            tags: None,
            environment: None,
            team: None,
            component_type: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    pub fn with_component_type(mut self, component_type: impl Into<String>) -> Self {
        self.component_type = Some(component_type.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    TagAdded {
        tag: String,
        source: TagSource,
    },
    TagReattributed {
        tag: String,
        from: TagSource,
        to: TagSource,
    },
    TagRemoved {
        tag: String,
        reason: String,
    },
    AttributeChanged {
        field: &'static str,
        from: String,
        to: String,
        source: TagSource,
    },
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TagAdded { tag, source } => write!(f, "+{tag} ({source})"),
            Self::TagReattributed { tag, from, to } => write!(f, "~{tag} ({from}→{to})"),
            Self::TagRemoved { tag, reason } => write!(f, "-{tag} ({reason})"),
            Self::AttributeChanged {
                field,
                from,
                to,
                source,
            } => write!(f, "{field}: {from}→{to} ({source})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub service: Service,
    pub changes: Vec<Change>,
}

impl MergeOutcome {
    pub fn change_log(&self) -> Vec<String> {
        self.changes.iter().map(ToString::to_string).collect()
    }
}

/// Reconciles one partial update from a trust source into the stored record.
/// Returns the merged record plus a changelog; storage is left to the caller.
pub fn merge(existing: &Service, update: &ServiceUpdate, now: DateTime<Utc>) -> MergeOutcome {
    let mut service = existing.clone();
    let mut changes = Vec::new();

    if let Some(tags) = &update.tags {
        merge_tags(&mut service, tags, update.source, &mut changes);
    }

    merge_attribute(
        &mut service.environment,
        "environment",
        update.environment.as_deref(),
        update.source,
        &mut changes,
    );
    merge_attribute(
        &mut service.team,
        "team",
        update.team.as_deref(),
        update.source,
        &mut changes,
    );
    merge_attribute(
        &mut service.component_type,
        "component_type",
        update.component_type.as_deref(),
        update.source,
        &mut changes,
    );

    service.last_seen = now;
    MergeOutcome { service, changes }
}

fn merge_tags(
    service: &mut Service,
    tags: &BTreeSet<String>,
    source: TagSource,
    changes: &mut Vec<Change>,
) {
    let incoming: BTreeSet<&str> = tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();

    // A source may only retract what it currently owns.
    let retracted: Vec<String> = service
        .tag_sources
        .iter()
        .filter(|(tag, owner)| **owner == source && !incoming.contains(tag.as_str()))
        .map(|(tag, _)| tag.clone())
        .collect();
    for tag in retracted {
        service.tags.remove(&tag);
        service.tag_sources.remove(&tag);
        changes.push(Change::TagRemoved {
            tag,
            reason: format!("no longer reported by {source}"),
        });
    }

    for tag in incoming {
        match service.tag_sources.get(tag).copied() {
            None => {
                service.tags.insert(tag.to_string());
                service.tag_sources.insert(tag.to_string(), source);
                changes.push(Change::TagAdded {
                    tag: tag.to_string(),
                    source,
                });
            }
            Some(owner) if source > owner => {
                service.tag_sources.insert(tag.to_string(), source);
                changes.push(Change::TagReattributed {
                    tag: tag.to_string(),
                    from: owner,
                    to: source,
                });
            }
            Some(_) => {}
        }
    }
}

/// Overwrites only a sentinel value, on operator input, or when the source
/// that set the value reports a new one.
fn merge_attribute(
    current: &mut Attribute,
    field: &'static str,
    incoming: Option<&str>,
    source: TagSource,
    changes: &mut Vec<Change>,
) {
    let Some(value) = incoming
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case(UNKNOWN))
    else {
        return;
    };

    if current.value == value {
        if current.source.map_or(true, |owner| source > owner) {
            current.source = Some(source);
        }
        return;
    }

    let may_overwrite =
        current.is_unknown() || source == TagSource::Operator || current.source == Some(source);
    if !may_overwrite {
        return;
    }

    changes.push(Change::AttributeChanged {
        field,
        from: current.value.clone(),
        to: value.to_string(),
        source,
    });
    *current = Attribute {
        value: value.to_string(),
        source: Some(source),
    };
}
