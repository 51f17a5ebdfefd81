//! Rule store JSON parsing and validation.
//!
//! Two entry points with different strictness:
//!
//! - [`parse_rule_store`] reads the persisted store. Entries that cannot be
//!   read as a rule are dropped with a warning; defects inside readable
//!   rules (missing pattern, unknown type) are left for the matcher to
//!   treat as non-matching.
//! - [`parse_import`] reads user-supplied JSON. Every site must carry an
//!   `enabled` flag and a `rules` array, and every rule must be readable.

use std::collections::BTreeMap;

use bp_core::{Rule, RuleError, SiteRuleSet};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::store::RuleStore;

/// Error type for rule store parsing.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid data format: expected an object keyed by hostname")]
    NotAnObject,
    #[error("Invalid data structure for site {host}: {reason}")]
    InvalidSite { host: String, reason: &'static str },
    #[error("Invalid rule {index} for site {host}: {source}")]
    InvalidRule {
        host: String,
        index: usize,
        source: serde_json::Error,
    },
}

/// Parse the persisted store, skipping unreadable rule entries.
pub fn parse_rule_store(text: &str) -> Result<RuleStore, ParseError> {
    let root = parse_root(text)?;
    let mut sites = BTreeMap::new();

    for (host, value) in root {
        match parse_site(&value) {
            Some(site) => {
                sites.insert(host, site);
            }
            None => log::warn!("skipping site {host}: not an object"),
        }
    }

    Ok(RuleStore::from_sites(sites))
}

/// Read one persisted site entry, skipping unreadable rules. `None` when
/// the entry is not an object.
pub fn parse_site(value: &Value) -> Option<SiteRuleSet> {
    let entry = value.as_object()?;
    let enabled = entry.get("enabled").and_then(Value::as_bool).unwrap_or(false);
    let mut site = SiteRuleSet::new(enabled);
    if let Some(rules) = entry.get("rules") {
        site.rules = parse_rules(rules);
    }
    Some(site)
}

/// Read a persisted rule list. Entries that cannot be read as a rule are
/// dropped so their siblings still take part in matching; anything other
/// than an array yields no rules.
pub fn parse_rules(value: &Value) -> Vec<Rule> {
    let Some(raw_rules) = value.as_array() else {
        return Vec::new();
    };
    raw_rules
        .iter()
        .enumerate()
        .filter_map(|(index, raw)| match Rule::deserialize(raw) {
            Ok(rule) => Some(rule),
            Err(err) => {
                log::warn!("skipping rule {index}: {err}");
                None
            }
        })
        .collect()
}

/// Parse and structurally validate an imported store.
pub fn parse_import(text: &str) -> Result<RuleStore, ParseError> {
    let root = parse_root(text)?;

    // Check the shape of every site before reading any rule.
    for (host, value) in &root {
        let entry = value.as_object().ok_or_else(|| invalid_site(host, "not an object"))?;
        if !entry.contains_key("enabled") {
            return Err(invalid_site(host, "missing \"enabled\""));
        }
        if !entry.get("rules").is_some_and(Value::is_array) {
            return Err(invalid_site(host, "\"rules\" must be an array"));
        }
    }

    let mut sites = BTreeMap::new();
    for (host, value) in root {
        let Value::Object(mut entry) = value else {
            continue;
        };
        let enabled = entry.get("enabled").and_then(Value::as_bool).unwrap_or(false);
        let mut site = SiteRuleSet::new(enabled);
        if let Some(Value::Array(rules)) = entry.remove("rules") {
            for (index, raw) in rules.into_iter().enumerate() {
                let rule = serde_json::from_value::<Rule>(raw).map_err(|source| ParseError::InvalidRule {
                    host: host.clone(),
                    index,
                    source,
                })?;
                site.rules.push(rule);
            }
        }
        sites.insert(host, site);
    }

    Ok(RuleStore::from_sites(sites))
}

fn parse_root(text: &str) -> Result<Map<String, Value>, ParseError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(root) => Ok(root),
        _ => Err(ParseError::NotAnObject),
    }
}

fn invalid_site(host: &str, reason: &'static str) -> ParseError {
    ParseError::InvalidSite {
        host: host.to_string(),
        reason,
    }
}

/// An authoring defect found in a stored rule.
#[derive(Debug, Clone, PartialEq)]
pub struct LintIssue {
    pub host: String,
    pub index: usize,
    pub error: RuleError,
}

impl std::fmt::Display for LintIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} rule {}: {}", self.host, self.index, self.error)
    }
}

/// Validate every rule in the store as if it had been authored by hand.
pub fn lint_store(store: &RuleStore) -> Vec<LintIssue> {
    let mut issues = Vec::new();
    for (host, site) in store.sites() {
        for (index, rule) in site.rules.iter().enumerate() {
            if let Err(error) = rule.validate() {
                issues.push(LintIssue {
                    host: host.clone(),
                    index,
                    error,
                });
            }
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use bp_core::{Condition, ConditionType};

    const STORE: &str = r#"{
        "example.com": {
            "enabled": true,
            "rules": [
                {"type": "class", "pattern": "modal", "enabled": true, "description": "Class: modal"},
                {"enabled": false, "description": "Popup", "conditions": [{"type": "isPopup", "value": true}]},
                42
            ]
        },
        "off.example": {"enabled": false},
        "broken.example": "yes"
    }"#;

    #[test]
    fn test_persisted_store_is_lenient() {
        let store = parse_rule_store(STORE).unwrap();
        let site = store.get("example.com").unwrap();
        assert!(site.enabled);
        assert_eq!(site.rules.len(), 2);
        assert!(site.rules[0].is_legacy());
        assert_eq!(site.rules[1].conditions, vec![Condition::is_popup()]);
        assert!(!site.rules[1].enabled);

        let off = store.get("off.example").unwrap();
        assert!(!off.enabled);
        assert!(off.rules.is_empty());
        assert!(store.get("broken.example").is_none());
    }

    #[test]
    fn test_malformed_rule_leaves_siblings_matching() {
        use bp_core::page::PageSnapshot;
        use bp_core::{Matcher, Viewport};

        let site = parse_site(&serde_json::json!({
            "enabled": true,
            "rules": [
                {"conditions": [{"type": "hasPopupParent", "depth": "2"}]},
                {"conditions": [{"type": "class", "pattern": "overlay"}]},
                {"enabled": "yes", "conditions": [{"type": "id", "pattern": "x"}]}
            ]
        }))
        .unwrap();
        assert!(site.enabled);
        assert_eq!(site.rules.len(), 1);

        let page = PageSnapshot::parse(r#"<div class="overlay modal">Sale</div>"#)
            .with_viewport(Viewport::new(1000.0, 800.0));
        let element = page.select_first(".overlay").unwrap();
        assert!(Matcher::default().matches(&element, &site.rules));
    }

    #[test]
    fn test_parse_rules_tolerates_non_arrays() {
        assert!(parse_rules(&Value::Null).is_empty());
        assert!(parse_site(&serde_json::json!("on")).is_none());
        let rules = parse_rules(&serde_json::json!([{"type": "id", "pattern": "a"}, 7]));
        assert_eq!(rules, vec![Rule::legacy(ConditionType::Id, "a", "")]);
    }

    #[test]
    fn test_non_object_root_rejected() {
        assert!(matches!(parse_rule_store("[]"), Err(ParseError::NotAnObject)));
        assert!(matches!(parse_import("{"), Err(ParseError::Json(_))));
    }

    #[test]
    fn test_import_requires_structure() {
        let err = parse_import(r#"{"a.com": {"enabled": true, "rules": []}, "b.com": {"rules": []}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("b.com"));

        let err = parse_import(r#"{"c.com": {"enabled": true}}"#).unwrap_err();
        assert!(matches!(err, ParseError::InvalidSite { ref host, .. } if host == "c.com"));

        let err = parse_import(r#"{"d.com": {"enabled": true, "rules": [{"pattern": "x"}]}}"#)
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidRule { index: 0, .. }));
    }

    #[test]
    fn test_import_reads_rules() {
        let store = parse_import(
            r#"{"a.com": {"enabled": true, "rules": [{"conditions": [{"type": "id", "pattern": "x"}]}]}}"#,
        )
        .unwrap();
        let rule = &store.get("a.com").unwrap().rules[0];
        assert!(rule.enabled);
        assert_eq!(rule.description, "");
    }

    #[test]
    fn test_lint_reports_authoring_defects() {
        let mut store = RuleStore::new();
        store.add_site("a.com");
        store
            .replace_rules(
                "a.com",
                vec![
                    Rule::new("ok", vec![Condition::is_popup()]),
                    Rule::new("bad", vec![Condition::content("")]),
                ],
            )
            .unwrap();
        let issues = lint_store(&store);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].index, 1);
        assert_eq!(
            issues[0].to_string(),
            "a.com rule 1: Condition 1: Enter a pattern for the content condition"
        );
        assert!(matches!(
            &issues[0].error,
            RuleError::Condition { source, .. } if **source == RuleError::MissingPattern(ConditionType::Content)
        ));
    }
}
