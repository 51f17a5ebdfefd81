//! Rule Matcher
//!
//! Every candidate element goes through here. The criticality veto runs
//! first; then each enabled rule is evaluated in order and the first match
//! wins.
//!
//! Within a rule the popup-structural conditions (`isPopup`,
//! `hasPopupParent`, `hasPopupChild`) form an OR group and every other
//! condition must hold. A rule with an empty structural group is decided by
//! the other conditions alone.

use crate::condition::check_condition;
use crate::critical;
use crate::dom::{ComputedStyle, ElementView};
use crate::popup;
use crate::tuning::Tuning;
use crate::types::{Condition, CriticalityVerdict, Rule};

// =============================================================================
// Matcher
// =============================================================================

/// Stateless matching engine parameterized by its thresholds.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    tuning: Tuning,
}

impl Matcher {
    pub fn new(tuning: Tuning) -> Self {
        Self { tuning }
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn is_critical<E: ElementView>(&self, element: &E) -> CriticalityVerdict {
        critical::is_critical(element)
    }

    pub fn is_potential_popup<E: ElementView>(&self, element: &E, style: &ComputedStyle) -> bool {
        popup::is_potential_popup(element, style, &self.tuning.popup)
    }

    /// Popup heuristic on the element's own computed style.
    pub fn is_popup_shaped<E: ElementView>(&self, element: &E) -> bool {
        popup::is_popup_shaped(element, &self.tuning.popup)
    }

    pub fn check_condition<E: ElementView>(&self, element: &E, condition: &Condition) -> bool {
        check_condition(element, condition, &self.tuning.popup)
    }

    /// Evaluate one rule, ignoring its `enabled` flag and the criticality
    /// veto.
    pub fn rule_matches<E: ElementView>(&self, element: &E, rule: &Rule) -> bool {
        if rule.conditions.is_empty() {
            return false;
        }

        // Legacy rules are a single plain condition whatever their type.
        let (structural, other): (Vec<_>, Vec<_>) = if rule.is_legacy() {
            (Vec::new(), rule.conditions.iter().collect())
        } else {
            rule.conditions
                .iter()
                .partition(|condition| condition.kind.is_popup_structural())
        };

        if !structural.is_empty()
            && !structural
                .iter()
                .any(|condition| self.check_condition(element, condition))
        {
            return false;
        }

        other
            .iter()
            .all(|condition| self.check_condition(element, condition))
    }

    /// Decide whether `element` should be hidden under `rules`.
    pub fn matches<E: ElementView>(&self, element: &E, rules: &[Rule]) -> bool {
        self.matching_rule(element, rules).is_some()
    }

    /// The first enabled rule matching `element`, if any.
    pub fn matching_rule<'r, E: ElementView>(&self, element: &E, rules: &'r [Rule]) -> Option<&'r Rule> {
        let verdict = self.is_critical(element);
        if let Some(reason) = verdict.reason {
            log::trace!("skipping {}: {reason}", element.tag_name());
            return None;
        }

        let matched = rules
            .iter()
            .filter(|rule| rule.enabled)
            .find(|rule| self.rule_matches(element, rule));
        if let Some(rule) = matched {
            log::debug!("matched rule: {}", rule.description);
        }
        matched
    }
}
