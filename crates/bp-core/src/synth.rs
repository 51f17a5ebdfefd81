//! Rule Synthesizer
//!
//! Turns an element picked in detection mode into candidate rules. The
//! candidates range from narrow single-condition rules (id, class) to a
//! combined rule that stacks every signal the element offers.

use crate::dom::ElementView;
use crate::miner::{find_stable_selector, shortest_class};
use crate::popup::{has_popup_descendant, is_popup_shaped, popup_ancestor_level};
use crate::text::extract_stable_text_pattern;
use crate::tuning::Tuning;
use crate::types::{Condition, Priority, Rule, RuleVariant};

/// Markup keywords that give away promotional blocks, checked in order.
pub const AD_KEYWORDS: &[&str] = &["реклама", "advert", "banner", "promo", "sponsor"];

/// Fallback when nothing about the element can be expressed as a condition.
pub fn default_rule() -> Rule {
    Rule::new(
        "Default rule",
        vec![Condition::selector("div"), Condition::is_popup()],
    )
}

/// All candidate rules for `element`, most specific first.
pub fn generate_rule_variants<E: ElementView>(element: &E, tuning: &Tuning) -> Vec<RuleVariant> {
    let mut variants = Vec::new();

    let id = element.id();
    if !id.is_empty() {
        variants.push(single(Priority::High, Condition::id(id)));
    }

    if let Some(class) = shortest_class(&element.class_name()) {
        variants.push(single(Priority::High, Condition::class(class)));
    }

    if let Some(selector) = find_stable_selector(element, tuning) {
        variants.push(single(Priority::Medium, Condition::selector(selector)));
    }

    if let Some(condition) = text_condition(element, tuning) {
        variants.push(single(Priority::Low, condition));
    }

    variants.push(RuleVariant {
        priority: Priority::Low,
        rule: create_rule_from_element(element, tuning),
    });

    variants.sort_by_key(|variant| variant.priority);
    variants
}

/// Build one rule carrying every usable signal of `element`, topped up with
/// structural or positional conditions until it has at least two.
pub fn create_rule_from_element<E: ElementView>(element: &E, tuning: &Tuning) -> Rule {
    let synthesis = &tuning.synthesis;
    let mut draft = Draft::default();

    if is_popup_shaped(element, &tuning.popup) {
        draft.push(Condition::is_popup());
    }

    if element.tag_name().eq_ignore_ascii_case("A") {
        draft.push(Condition::is_link());
    }

    if let Some(condition) = text_condition(element, tuning) {
        draft.push(condition);
    }

    let html = element.outer_html().to_lowercase();
    if let Some(keyword) = AD_KEYWORDS.iter().find(|keyword| html.contains(*keyword)) {
        draft.push_labeled(Condition::outer_html(*keyword), format!("HTML contains: \"{keyword}\""));
    }

    let id = element.id();
    if !id.is_empty() {
        draft.push(Condition::id(id));
    }

    if let Some(class) = shortest_class(&element.class_name()) {
        draft.push(Condition::class(class));
    }

    if draft.len() < 2 {
        if let Some(level) = popup_ancestor_level(element, synthesis.parent_probe_levels, &tuning.popup) {
            draft.push(Condition::popup_parent(level));
        } else if has_popup_descendant(element, synthesis.child_probe_levels, &tuning.popup) {
            draft.push(Condition::popup_child(synthesis.child_probe_levels));
        }
    }

    if draft.len() < 2 {
        let tag = element.tag_name().to_lowercase();
        if let Some(selector) = find_stable_selector(element, tuning) {
            draft.push(Condition::selector(selector));
        } else if let Some(selector) = nth_of_type(element, &tag) {
            draft.push(Condition::selector(selector));
        } else if !tag.is_empty() {
            draft.push_labeled(Condition::selector(tag.clone()), format!("Tag: \"{tag}\""));
        }
    }

    draft.finish()
}

/// Conditions collected so far, each with its description label.
#[derive(Default)]
struct Draft {
    conditions: Vec<Condition>,
    labels: Vec<String>,
}

impl Draft {
    fn push(&mut self, condition: Condition) {
        let label = condition.describe();
        self.push_labeled(condition, label);
    }

    fn push_labeled(&mut self, condition: Condition, label: String) {
        self.conditions.push(condition);
        self.labels.push(label);
    }

    fn len(&self) -> usize {
        self.conditions.len()
    }

    fn finish(self) -> Rule {
        if self.conditions.is_empty() {
            return default_rule();
        }
        Rule::new(self.labels.join(" + "), self.conditions)
    }
}

fn single(priority: Priority, condition: Condition) -> RuleVariant {
    RuleVariant {
        priority,
        rule: Rule::new(condition.describe(), vec![condition]),
    }
}

/// Text or phrase condition from the element's own text, if it has a
/// usable amount of it.
fn text_condition<E: ElementView>(element: &E, tuning: &Tuning) -> Option<Condition> {
    let text = element.text_content();
    let trimmed = text.trim();
    let len = trimmed.chars().count();
    if len <= tuning.synthesis.min_text_len || len >= tuning.synthesis.max_text_len {
        return None;
    }

    let pattern = extract_stable_text_pattern(trimmed, &tuning.text)?;
    if pattern.split_whitespace().count() > 1 {
        Some(Condition::phrase(pattern))
    } else {
        Some(Condition::content(pattern))
    }
}

/// `tag:nth-of-type(n)` when the element shares its tag with siblings.
fn nth_of_type<E: ElementView>(element: &E, tag: &str) -> Option<String> {
    let parent = element.parent()?;
    let siblings: Vec<E> = parent
        .children()
        .into_iter()
        .filter(|sibling| sibling.tag_name().eq_ignore_ascii_case(tag))
        .collect();
    if siblings.len() < 2 {
        return None;
    }
    let index = siblings.iter().position(|sibling| sibling == element)?;
    Some(format!("{tag}:nth-of-type({})", index + 1))
}
