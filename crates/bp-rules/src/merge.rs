//! Merging default catalogs and imports into a store.
//!
//! Missing sites are added wholesale. For sites already present only rules
//! without an equivalent are appended, and the existing site switch and
//! rules are left alone.

use std::collections::btree_map::Entry;

use bp_core::is_equivalent_rule;
use bp_core::types::describe_conditions;

use crate::store::RuleStore;

/// What a merge changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub sites_added: usize,
    pub rules_added: usize,
    pub rules_skipped: usize,
}

impl MergeStats {
    pub fn is_noop(&self) -> bool {
        self.sites_added == 0 && self.rules_added == 0
    }
}

/// Merge `incoming` into `target`.
pub fn merge_into(target: &mut RuleStore, incoming: RuleStore) -> MergeStats {
    let mut stats = MergeStats::default();
    let sites = target.sites_mut();

    for (host, mut site) in incoming.into_sites() {
        for rule in &mut site.rules {
            if rule.description.is_empty() {
                rule.description = describe_conditions(&rule.conditions);
            }
        }

        match sites.entry(host) {
            Entry::Vacant(slot) => {
                stats.sites_added += 1;
                stats.rules_added += site.rules.len();
                log::debug!("adding site {} with {} rules", slot.key(), site.rules.len());
                slot.insert(site);
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                for rule in site.rules {
                    if is_equivalent_rule(&existing.rules, &rule) {
                        stats.rules_skipped += 1;
                        continue;
                    }
                    existing.rules.push(rule);
                    stats.rules_added += 1;
                }
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_import;
    use bp_core::{Condition, Rule};

    fn target() -> RuleStore {
        let mut store = RuleStore::new();
        store.add_site("example.com");
        store
            .replace_rules(
                "example.com",
                vec![Rule::new("mine", vec![Condition::is_popup(), Condition::class("modal")])],
            )
            .unwrap();
        store.toggle_site("example.com").unwrap();
        store
    }

    #[test]
    fn test_merge_adds_missing_sites_and_rules() {
        let mut store = target();
        let incoming = parse_import(
            r#"{
                "example.com": {"enabled": true, "rules": [
                    {"conditions": [{"type": "class", "pattern": "modal"}, {"type": "isPopup", "value": true}]},
                    {"conditions": [{"type": "id", "pattern": "ad"}, {"type": "isLink", "value": true}, {"type": "content", "pattern": "Buy"}]},
                    {"type": "class", "pattern": "modal", "enabled": true}
                ]},
                "new.com": {"enabled": true, "rules": [{"type": "id", "pattern": "x", "description": "ID: x"}]}
            }"#,
        )
        .unwrap();

        let stats = merge_into(&mut store, incoming);
        assert_eq!(
            stats,
            MergeStats {
                sites_added: 1,
                rules_added: 2,
                rules_skipped: 2
            }
        );

        let site = store.get("example.com").unwrap();
        assert!(!site.enabled, "existing site switch is kept");
        assert_eq!(site.rules.len(), 2);
        assert_eq!(site.rules[1].description, "ID: \"ad\" + Link and more");
        assert!(store.get("new.com").unwrap().rules[0].is_legacy());
    }

    #[test]
    fn test_merge_twice_is_noop() {
        let mut store = target();
        let catalog = parse_import(
            r#"{"a.com": {"enabled": true, "rules": [{"conditions": [{"type": "id", "pattern": "x"}]}]}}"#,
        )
        .unwrap();
        assert!(!merge_into(&mut store, catalog.clone()).is_noop());
        assert!(merge_into(&mut store, catalog).is_noop());
    }
}
