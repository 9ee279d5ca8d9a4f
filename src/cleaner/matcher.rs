//! Filter rule evaluation for a single snapshot.

use std::collections::BTreeSet;

use crate::{azure::SnapshotRecord, config::FilterRule};

/// Returns the ids of every rule the snapshot matches, for audit logging.
///
/// All matching rules are collected, not just the first; rule order never
/// affects the result. An empty set means the snapshot is not eligible for
/// deletion regardless of age.
pub fn matched_rule_ids(record: &SnapshotRecord, rules: &[FilterRule]) -> BTreeSet<u32> {
    rules
        .iter()
        .filter(|rule| rule_matches(record, rule))
        .map(|rule| rule.id)
        .collect()
}

fn rule_matches(record: &SnapshotRecord, rule: &FilterRule) -> bool {
    // Name prefixes compare case-insensitively.
    if let Some(prefix) = rule.starts_with.as_deref().filter(|p| !p.is_empty())
        && !record
            .name
            .to_lowercase()
            .starts_with(&prefix.to_lowercase())
    {
        return false;
    }

    if !rule.tags.is_empty() {
        // A tag-bearing rule never matches a snapshot without tags, even if
        // every matcher's expected value is itself empty.
        let Some(tags) = record.tags.as_ref().filter(|tags| !tags.is_empty()) else {
            return false;
        };

        for matcher in &rule.tags {
            // Tag keys are looked up with exact case.
            let Some(actual) = tags.get(&matcher.name) else {
                continue;
            };

            if matcher.match_only_with_name {
                return true;
            }

            // A matcher without an expected value is inconclusive, not a
            // failure; later matchers may still conclude.
            let Some(expected) = matcher.value.as_deref().filter(|v| !v.is_empty()) else {
                continue;
            };

            if actual.to_lowercase() == expected.to_lowercase() {
                return true;
            }
        }

        return false;
    }

    // No prefix constraint and no tag matchers: the rule matches every
    // snapshot (valid catch-all configuration).
    true
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rstest::rstest;

    use super::*;
    use crate::config::TagMatcher;

    fn snapshot(name: &str, tags: Option<&[(&str, &str)]>) -> SnapshotRecord {
        SnapshotRecord {
            id: format!("/subscriptions/s/resourceGroups/rg/providers/Microsoft.Compute/snapshots/{name}"),
            name: name.to_string(),
            resource_type: "Microsoft.Compute/snapshots".to_string(),
            created_on: None,
            tags: tags.map(|pairs| {
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<HashMap<_, _>>()
            }),
        }
    }

    fn prefix_rule(id: u32, prefix: &str) -> FilterRule {
        FilterRule {
            id,
            description: None,
            starts_with: Some(prefix.to_string()),
            tags: Vec::new(),
        }
    }

    fn tag_rule(id: u32, matchers: Vec<TagMatcher>) -> FilterRule {
        FilterRule {
            id,
            description: None,
            starts_with: None,
            tags: matchers,
        }
    }

    fn value_matcher(name: &str, value: &str) -> TagMatcher {
        TagMatcher {
            name: name.to_string(),
            value: Some(value.to_string()),
            match_only_with_name: false,
        }
    }

    fn presence_matcher(name: &str) -> TagMatcher {
        TagMatcher {
            name: name.to_string(),
            value: None,
            match_only_with_name: true,
        }
    }

    #[rstest]
    #[case::exact("daily-", "daily-backup-01", true)]
    #[case::prefix_uppercase("Daily-", "daily-backup-01", true)]
    #[case::name_uppercase("daily-", "DAILY-BACKUP-01", true)]
    #[case::no_match("daily-", "weekly-backup-01", false)]
    #[case::prefix_longer_than_name("daily-backup-01-x", "daily-backup-01", false)]
    fn test_name_prefix_is_case_insensitive(
        #[case] prefix: &str,
        #[case] name: &str,
        #[case] matches: bool,
    ) {
        let rules = [prefix_rule(1, prefix)];
        let ids = matched_rule_ids(&snapshot(name, None), &rules);
        assert_eq!(ids.contains(&1), matches);
    }

    #[test]
    fn test_tag_value_compared_case_insensitively() {
        let rules = [tag_rule(1, vec![value_matcher("env", "PROD")])];
        let snap = snapshot("snap", Some(&[("env", "prod")]));
        assert!(matched_rule_ids(&snap, &rules).contains(&1));
    }

    #[test]
    fn test_tag_key_compared_case_sensitively() {
        let rules = [tag_rule(1, vec![value_matcher("env", "PROD")])];
        let snap = snapshot("snap", Some(&[("Env", "prod")]));
        assert!(matched_rule_ids(&snap, &rules).is_empty());
    }

    #[test]
    fn test_tag_rule_never_matches_untagged_snapshot() {
        let rules = [tag_rule(1, vec![presence_matcher("keep")])];
        assert!(matched_rule_ids(&snapshot("snap", None), &rules).is_empty());
        assert!(matched_rule_ids(&snapshot("snap", Some(&[])), &rules).is_empty());
    }

    #[test]
    fn test_match_only_with_name_ignores_value() {
        let rules = [tag_rule(1, vec![presence_matcher("keep")])];
        assert!(matched_rule_ids(&snapshot("snap", Some(&[("keep", "anything")])), &rules).contains(&1));
        assert!(matched_rule_ids(&snapshot("snap", Some(&[("keep", "")])), &rules).contains(&1));
        assert!(matched_rule_ids(&snapshot("snap", Some(&[("other", "x")])), &rules).is_empty());
    }

    #[test]
    fn test_empty_expected_value_is_inconclusive() {
        // First matcher has the key but no expected value; the second
        // matcher must still be consulted.
        let rules = [tag_rule(
            1,
            vec![
                TagMatcher {
                    name: "tier".to_string(),
                    value: Some(String::new()),
                    match_only_with_name: false,
                },
                value_matcher("env", "prod"),
            ],
        )];
        let snap = snapshot("snap", Some(&[("tier", "gold"), ("env", "prod")]));
        assert!(matched_rule_ids(&snap, &rules).contains(&1));

        let inconclusive_only = snapshot("snap", Some(&[("tier", "gold")]));
        assert!(matched_rule_ids(&inconclusive_only, &rules).is_empty());
    }

    #[test]
    fn test_mismatched_value_moves_to_next_matcher() {
        let rules = [tag_rule(
            1,
            vec![value_matcher("env", "prod"), value_matcher("env", "staging")],
        )];
        let snap = snapshot("snap", Some(&[("env", "staging")]));
        assert!(matched_rule_ids(&snap, &rules).contains(&1));
    }

    #[test]
    fn test_prefix_and_tags_must_both_hold() {
        let mut rule = tag_rule(1, vec![value_matcher("env", "prod")]);
        rule.starts_with = Some("daily-".to_string());
        let rules = [rule];

        let both = snapshot("daily-01", Some(&[("env", "prod")]));
        assert!(matched_rule_ids(&both, &rules).contains(&1));

        let wrong_name = snapshot("weekly-01", Some(&[("env", "prod")]));
        assert!(matched_rule_ids(&wrong_name, &rules).is_empty());

        let wrong_tag = snapshot("daily-01", Some(&[("env", "dev")]));
        assert!(matched_rule_ids(&wrong_tag, &rules).is_empty());
    }

    #[test]
    fn test_match_all_rule_matches_everything() {
        let rules = [tag_rule(9, Vec::new())];
        assert!(matched_rule_ids(&snapshot("anything", None), &rules).contains(&9));
    }

    #[test]
    fn test_all_matching_rule_ids_collected() {
        let rules = [
            prefix_rule(1, "daily-"),
            prefix_rule(2, "weekly-"),
            tag_rule(3, Vec::new()),
            prefix_rule(4, "daily-backup"),
        ];
        let ids = matched_rule_ids(&snapshot("daily-backup-01", None), &rules);
        assert_eq!(ids, BTreeSet::from([1, 3, 4]));
    }
}
