//! Structural rule comparison.
//!
//! Two notions are used. [`is_duplicate_rule`] is the loose check applied
//! when a rule is added from detection mode: any shared condition is enough.
//! [`is_equivalent_rule`] is the stricter check used when merging catalogs
//! and imports, where whole rules are compared condition by condition.

use crate::types::{Condition, Rule};

/// Conditions of `rule` that take part in duplicate detection. A legacy
/// rule without a pattern takes no part.
fn comparable(rule: &Rule) -> &[Condition] {
    if rule.is_legacy() && rule.conditions.iter().all(|c| pattern_of(c).is_none()) {
        return &[];
    }
    &rule.conditions
}

fn pattern_of(condition: &Condition) -> Option<&str> {
    condition.pattern.as_deref().filter(|pattern| !pattern.is_empty())
}

/// Whether `candidate` overlaps any of `existing`: some condition of each
/// shares both type and pattern. Conditions without a pattern compare equal
/// on type alone, so two rules that both test `isPopup` are duplicates.
pub fn is_duplicate_rule(existing: &[Rule], candidate: &Rule) -> bool {
    let wanted = comparable(candidate);
    existing.iter().any(|rule| {
        comparable(rule).iter().any(|have| {
            wanted
                .iter()
                .any(|want| have.kind == want.kind && have.pattern == want.pattern)
        })
    })
}

/// Whether `existing` already holds a rule equivalent to `candidate`.
///
/// Compound rules are equivalent when they have the same number of
/// conditions and each candidate condition has a counterpart (same type,
/// and same pattern or depth when both sides carry one). A legacy
/// candidate is equivalent to a rule containing its exact type/pattern.
pub fn is_equivalent_rule(existing: &[Rule], candidate: &Rule) -> bool {
    if candidate.is_legacy() {
        let Some(wanted) = candidate.conditions.first().filter(|c| pattern_of(c).is_some()) else {
            return false;
        };
        return existing.iter().any(|rule| {
            rule.conditions
                .iter()
                .any(|have| have.kind == wanted.kind && have.pattern == wanted.pattern)
        });
    }

    existing.iter().any(|rule| {
        !rule.is_legacy()
            && rule.conditions.len() == candidate.conditions.len()
            && candidate
                .conditions
                .iter()
                .all(|want| rule.conditions.iter().any(|have| same_condition(have, want)))
    })
}

fn same_condition(a: &Condition, b: &Condition) -> bool {
    if a.kind != b.kind {
        return false;
    }
    if let (Some(x), Some(y)) = (pattern_of(a), pattern_of(b)) {
        return x == y;
    }
    match (a.depth.filter(|d| *d > 0), b.depth.filter(|d| *d > 0)) {
        (Some(x), Some(y)) => x == y,
        _ => true,
    }
}
