//! Selector/Text Miner
//!
//! Finds identifying fragments of an element that are likely to survive a
//! page rebuild: test-automation and accessibility attributes, and the
//! shortest author-written class.

use crate::dom::{DomError, ElementView};
use crate::text::is_random_generated;
use crate::tuning::Tuning;

/// Attributes consulted for a stable selector, in priority order.
pub const STABLE_ATTRIBUTES: &[&str] = &[
    "data-testid",
    "data-test",
    "data-cy",
    "data-automation",
    "role",
    "aria-label",
    "title",
    "alt",
];

/// Marker class added to elements flagged in detection mode.
pub const DETECTED_CLASS: &str = "popup-blocker-detected";
/// Marker class added to elements hidden pending analysis.
pub const ANALYZING_CLASS: &str = "popup-blocker-analyzing";

/// Whether a class token is one of the extension's own markers.
pub fn is_internal_class(class: &str) -> bool {
    class == DETECTED_CLASS || class == ANALYZING_CLASS
}

/// Derive an attribute selector for `element`.
///
/// The element's own attributes are tried first. An element carrying a
/// short run of its own text gets no selector, since a text condition
/// identifies it better. Otherwise up to a few ancestors are searched and
/// the result is scoped to the element's tag.
pub fn find_stable_selector<E: ElementView>(element: &E, tuning: &Tuning) -> Option<String> {
    match mine_selector(element, tuning) {
        Ok(selector) => selector,
        Err(err) => {
            log::debug!("selector mining failed: {err}");
            None
        }
    }
}

fn mine_selector<E: ElementView>(element: &E, tuning: &Tuning) -> Result<Option<String>, DomError> {
    if let Some((attr, value)) = stable_attribute(element, tuning)? {
        return Ok(Some(attribute_selector(attr, &value)));
    }

    let text = element.text_content();
    let text_len = text.trim().chars().count();
    if text_len > tuning.synthesis.min_text_len && text_len < tuning.synthesis.max_selector_text_len {
        return Ok(None);
    }

    let tag = element.tag_name().to_lowercase();
    let mut current = element.parent();
    let mut level = 0;
    while let Some(ancestor) = current {
        if level >= tuning.synthesis.selector_ancestor_levels {
            break;
        }
        if let Some((attr, value)) = stable_attribute(&ancestor, tuning)? {
            return Ok(Some(format!("{} {tag}", attribute_selector(attr, &value))));
        }
        current = ancestor.parent();
        level += 1;
    }

    Ok(None)
}

fn stable_attribute<E: ElementView>(
    element: &E,
    tuning: &Tuning,
) -> Result<Option<(&'static str, String)>, DomError> {
    for &attr in STABLE_ATTRIBUTES {
        if let Some(value) = element.attribute(attr)? {
            if !value.is_empty() && !is_random_generated(&value, &tuning.randomness) {
                return Ok(Some((attr, value)));
            }
        }
    }
    Ok(None)
}

fn attribute_selector(attr: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("[{attr}=\"{escaped}\"]")
}

/// The shortest class token, skipping internal markers. Ties keep
/// document order.
pub fn shortest_class(class_name: &str) -> Option<String> {
    class_name
        .split(' ')
        .map(str::trim)
        .filter(|class| !class.is_empty() && !is_internal_class(class))
        .min_by_key(|class| class.chars().count())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortest_class() {
        assert_eq!(shortest_class("overlay modal  x-dialog"), Some("modal".to_string()));
        assert_eq!(shortest_class("abc xyz"), Some("abc".to_string()));
        assert_eq!(shortest_class("popup-blocker-detected wrap"), Some("wrap".to_string()));
        assert_eq!(shortest_class("popup-blocker-analyzing"), None);
        assert_eq!(shortest_class(""), None);
    }

    #[test]
    fn test_attribute_selector_escapes_quotes() {
        assert_eq!(attribute_selector("title", "Say \"hi\""), r#"[title="Say \"hi\""]"#);
    }
}
