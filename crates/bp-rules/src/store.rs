//! Hostname-keyed rule store.

use std::collections::BTreeMap;

use bp_core::{is_duplicate_rule, Rule, RuleError, SiteRuleSet};
use serde::{Deserialize, Serialize};
use url::Url;

/// Error type for store mutations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Site is not in the block list: {0}")]
    SiteNotListed(String),
    #[error("Blocking is disabled for {0}")]
    SiteDisabled(String),
    #[error("Invalid rule: {0}")]
    Invalid(#[from] RuleError),
    #[error("Rule already exists")]
    Duplicate,
    #[error("No rule {index} for {host}")]
    RuleIndex { host: String, index: usize },
    #[error("Cannot derive a hostname from {0}")]
    InvalidUrl(String),
}

/// Store key for a page: the hostname of its URL, exactly as URL parsing
/// produces it.
pub fn site_key(page_url: &str) -> Result<String, StoreError> {
    let parsed = Url::parse(page_url).map_err(|_| StoreError::InvalidUrl(page_url.to_string()))?;
    parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .ok_or_else(|| StoreError::InvalidUrl(page_url.to_string()))
}

/// Mapping from hostname to its rule set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleStore {
    sites: BTreeMap<String, SiteRuleSet>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sites(sites: BTreeMap<String, SiteRuleSet>) -> Self {
        Self { sites }
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn get(&self, host: &str) -> Option<&SiteRuleSet> {
        self.sites.get(host)
    }

    pub fn sites(&self) -> impl Iterator<Item = (&String, &SiteRuleSet)> {
        self.sites.iter()
    }

    pub fn into_sites(self) -> BTreeMap<String, SiteRuleSet> {
        self.sites
    }

    pub(crate) fn sites_mut(&mut self) -> &mut BTreeMap<String, SiteRuleSet> {
        &mut self.sites
    }

    pub fn rule_count(&self) -> usize {
        self.sites.values().map(|site| site.rules.len()).sum()
    }

    /// Blocking runs for `host` only if it is listed and enabled.
    pub fn should_activate(&self, host: &str) -> bool {
        self.sites.get(host).is_some_and(|site| site.enabled)
    }

    /// List `host` with blocking enabled and no rules. Returns false when it
    /// was already listed.
    pub fn add_site(&mut self, host: &str) -> bool {
        if self.sites.contains_key(host) {
            return false;
        }
        self.sites.insert(host.to_string(), SiteRuleSet::new(true));
        true
    }

    pub fn remove_site(&mut self, host: &str) -> Option<SiteRuleSet> {
        self.sites.remove(host)
    }

    /// Flip the site switch. Returns the new state.
    pub fn toggle_site(&mut self, host: &str) -> Result<bool, StoreError> {
        let site = self.site_mut(host)?;
        site.enabled = !site.enabled;
        Ok(site.enabled)
    }

    /// Drop every site.
    pub fn reset(&mut self) {
        self.sites.clear();
    }

    /// Append a rule picked in detection mode. The site must be listed and
    /// enabled, the rule valid and not a duplicate of an existing one.
    pub fn add_rule(&mut self, host: &str, rule: Rule) -> Result<(), StoreError> {
        let site = self.site_mut(host)?;
        if !site.enabled {
            return Err(StoreError::SiteDisabled(host.to_string()));
        }
        rule.validate()?;
        if is_duplicate_rule(&site.rules, &rule) {
            log::debug!("rule already exists for {host}: {}", rule.description);
            return Err(StoreError::Duplicate);
        }
        site.rules.push(rule);
        Ok(())
    }

    pub fn set_rule_enabled(&mut self, host: &str, index: usize, enabled: bool) -> Result<(), StoreError> {
        self.rule_mut(host, index)?.enabled = enabled;
        Ok(())
    }

    /// Flip a rule's switch. Returns the new state.
    pub fn toggle_rule(&mut self, host: &str, index: usize) -> Result<bool, StoreError> {
        let rule = self.rule_mut(host, index)?;
        rule.enabled = !rule.enabled;
        Ok(rule.enabled)
    }

    pub fn remove_rule(&mut self, host: &str, index: usize) -> Result<Rule, StoreError> {
        let site = self.site_mut(host)?;
        if index >= site.rules.len() {
            return Err(StoreError::RuleIndex {
                host: host.to_string(),
                index,
            });
        }
        Ok(site.rules.remove(index))
    }

    /// Replace the whole rule sequence of a listed site.
    pub fn replace_rules(&mut self, host: &str, rules: Vec<Rule>) -> Result<(), StoreError> {
        self.site_mut(host)?.rules = rules;
        Ok(())
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    fn site_mut(&mut self, host: &str) -> Result<&mut SiteRuleSet, StoreError> {
        self.sites
            .get_mut(host)
            .ok_or_else(|| StoreError::SiteNotListed(host.to_string()))
    }

    fn rule_mut(&mut self, host: &str, index: usize) -> Result<&mut Rule, StoreError> {
        self.site_mut(host)?
            .rules
            .get_mut(index)
            .ok_or_else(|| StoreError::RuleIndex {
                host: host.to_string(),
                index,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bp_core::{Condition, ConditionType};

    fn store() -> RuleStore {
        let mut store = RuleStore::new();
        store.add_site("example.com");
        store
    }

    #[test]
    fn test_site_key() {
        assert_eq!(site_key("https://www.Example.com:8080/a?b").unwrap(), "www.example.com");
        assert_eq!(site_key("http://127.0.0.1/").unwrap(), "127.0.0.1");
        assert!(site_key("not a url").is_err());
        assert!(site_key("data:text/plain,hi").is_err());
    }

    #[test]
    fn test_activation() {
        let mut store = store();
        assert!(store.should_activate("example.com"));
        assert!(!store.should_activate("other.com"));
        assert_eq!(store.toggle_site("example.com"), Ok(false));
        assert!(!store.should_activate("example.com"));
        assert!(!store.add_site("example.com"));
    }

    #[test]
    fn test_add_rule_checks() {
        let mut store = store();
        let rule = Rule::new("ID", vec![Condition::id("promo")]);
        assert_eq!(store.add_rule("example.com", rule.clone()), Ok(()));
        assert_eq!(store.add_rule("example.com", rule.clone()), Err(StoreError::Duplicate));

        let legacy = Rule::legacy(ConditionType::Id, "promo", "ID: promo");
        assert_eq!(store.add_rule("example.com", legacy), Err(StoreError::Duplicate));

        assert_eq!(
            store.add_rule("other.com", rule.clone()),
            Err(StoreError::SiteNotListed("other.com".to_string()))
        );

        let invalid = Rule::new("empty", Vec::new());
        assert!(matches!(
            store.add_rule("example.com", invalid),
            Err(StoreError::Invalid(RuleError::NoConditions))
        ));

        store.toggle_site("example.com").unwrap();
        let fresh = Rule::new("Class", vec![Condition::class("modal")]);
        assert_eq!(
            store.add_rule("example.com", fresh),
            Err(StoreError::SiteDisabled("example.com".to_string()))
        );
    }

    #[test]
    fn test_rule_crud() {
        let mut store = store();
        store
            .replace_rules(
                "example.com",
                vec![
                    Rule::new("a", vec![Condition::class("a")]),
                    Rule::new("b", vec![Condition::class("b")]),
                ],
            )
            .unwrap();
        assert_eq!(store.toggle_rule("example.com", 1), Ok(false));
        store.set_rule_enabled("example.com", 1, true).unwrap();
        assert_eq!(store.remove_rule("example.com", 0).unwrap().description, "a");
        assert_eq!(store.rule_count(), 1);
        assert_eq!(
            store.remove_rule("example.com", 5),
            Err(StoreError::RuleIndex {
                host: "example.com".to_string(),
                index: 5
            })
        );

        store.reset();
        assert!(store.is_empty());
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let store = store();
        let json = serde_json::to_value(&store).unwrap();
        assert_eq!(json["example.com"]["enabled"], true);
        assert!(json["example.com"]["rules"].as_array().unwrap().is_empty());
    }
}
