//! Condition Evaluator
//!
//! Evaluates one atomic condition against one element. Failures never
//! escape: a condition that cannot be evaluated is simply false, and its
//! siblings are evaluated as usual.

use crate::dom::{DomError, ElementView};
use crate::popup::{has_popup_descendant, is_popup_shaped, popup_ancestor_level};
use crate::text::contains_phrase;
use crate::tuning::PopupTuning;
use crate::types::{Condition, ConditionType};

/// Check a single condition. Errors and malformed conditions yield false.
pub fn check_condition<E: ElementView>(element: &E, condition: &Condition, tuning: &PopupTuning) -> bool {
    match evaluate(element, condition, tuning) {
        Ok(result) => result,
        Err(err) => {
            log::debug!("condition {} failed: {err}", condition.kind);
            false
        }
    }
}

fn evaluate<E: ElementView>(
    element: &E,
    condition: &Condition,
    tuning: &PopupTuning,
) -> Result<bool, DomError> {
    let pattern = condition.pattern.as_deref();

    let result = match &condition.kind {
        ConditionType::Content => match pattern {
            Some(pattern) => {
                let text = element.text_content();
                !text.is_empty() && text.to_lowercase().contains(&pattern.to_lowercase())
            }
            None => false,
        },
        ConditionType::OuterHtml => match pattern {
            Some(pattern) => {
                let html = element.outer_html();
                !html.is_empty() && html.to_lowercase().contains(&pattern.to_lowercase())
            }
            None => false,
        },
        ConditionType::Phrase => match pattern {
            Some(pattern) => contains_phrase(&element.text_content(), pattern),
            None => false,
        },
        ConditionType::IsLink => element.tag_name().eq_ignore_ascii_case("A"),
        ConditionType::IsPopup => is_popup_shaped(element, tuning),
        ConditionType::HasPopupParent => {
            popup_ancestor_level(element, condition.effective_depth(), tuning).is_some()
        }
        ConditionType::HasPopupChild => {
            has_popup_descendant(element, condition.effective_depth(), tuning)
        }
        ConditionType::Selector => match pattern {
            Some(pattern) => match element.matches_selector(pattern) {
                Ok(matched) => matched,
                Err(DomError::InvalidSelector(selector)) => {
                    log::debug!("invalid selector: {selector}");
                    false
                }
                Err(err) => return Err(err),
            },
            None => false,
        },
        ConditionType::Class => match pattern {
            Some(pattern) => {
                let class_name = element.class_name();
                !class_name.is_empty() && class_name.contains(pattern)
            }
            None => false,
        },
        ConditionType::Id => match pattern {
            Some(pattern) => {
                let id = element.id();
                !id.is_empty() && id.contains(pattern)
            }
            None => false,
        },
        ConditionType::Unknown(_) => false,
    };

    Ok(result)
}
