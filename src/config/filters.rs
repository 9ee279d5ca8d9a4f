//! Filter rule model: retention exceptions for snapshots.
//!
//! A snapshot is only deleted when it matches at least one filter rule and
//! its creation time is past the retention cutoff. Rules combine an optional
//! case-insensitive name prefix with an ordered list of tag matchers.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// A single retention exception rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterRule {
    /// Unique id within the rule set, reported in audit logs when a snapshot
    /// matches. Not a priority: a snapshot may match several rules.
    pub id: u32,

    /// Informational description, never evaluated.
    #[serde(default)]
    pub description: Option<String>,

    /// Case-insensitive prefix the snapshot name must start with.
    /// Empty or absent means no prefix constraint.
    #[serde(default)]
    pub starts_with: Option<String>,

    /// Tag matchers, evaluated in order. May be empty.
    #[serde(default)]
    pub tags: Vec<TagMatcher>,
}

impl FilterRule {
    /// Whether this rule has no constraints and therefore matches every
    /// snapshot. Permitted, but surfaced as a warning during validation.
    pub fn is_match_all(&self) -> bool {
        self.starts_with.as_deref().unwrap_or_default().is_empty() && self.tags.is_empty()
    }
}

/// A single tag predicate within a rule.
///
/// The tag key is looked up case-sensitively; the tag value is compared
/// case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagMatcher {
    /// Tag key to look up on the snapshot (exact case).
    pub name: String,

    /// Expected tag value. Ignored when `match_only_with_name` is set; an
    /// empty or absent value otherwise makes this matcher inconclusive.
    #[serde(default)]
    pub value: Option<String>,

    /// When true, presence of the tag key alone is a match, regardless of
    /// the tag's value.
    #[serde(default)]
    pub match_only_with_name: bool,
}

/// Validate the filter rule set.
///
/// An absent or empty rule set is a fatal configuration error: without rules
/// the cleaner would never delete anything, which almost always means the
/// filters file was not loaded. Duplicate rule ids are rejected because ids
/// are the audit trail for deletion decisions.
pub fn validate_filters(filters: &[FilterRule]) -> Result<(), ConfigError> {
    if filters.is_empty() {
        return Err(ConfigError::Validation(
            "Filters collection is empty. Please check the [[filters]] configuration".into(),
        ));
    }

    let mut seen = std::collections::HashSet::new();
    for rule in filters {
        if !seen.insert(rule.id) {
            return Err(ConfigError::Validation(format!(
                "Duplicate filter id {} in rule set",
                rule.id
            )));
        }

        if rule.is_match_all() {
            tracing::warn!(
                filter_id = rule.id,
                "Filter has no name prefix and no tag matchers; it will match every snapshot"
            );
        }
    }

    Ok(())
}
