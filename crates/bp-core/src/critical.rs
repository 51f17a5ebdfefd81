//! Criticality classifier
//!
//! Structural page elements are never hidden, whatever the rules say. This
//! check runs before any matching in both enforcement and detection mode.

use crate::dom::{DomError, ElementView};
use crate::types::{CriticalReason, CriticalityVerdict};

pub const CRITICAL_TAGS: &[&str] = &["HTML", "HEAD", "BODY", "SCRIPT", "STYLE", "LINK", "META"];

/// Substrings that mark an id as page chrome (matched case-insensitively).
pub const CRITICAL_IDS: &[&str] = &["root", "app", "main", "header", "footer", "navigation"];

pub const CRITICAL_CLASSES: &[&str] = &[
    "zen-layout",
    "zen-app",
    "zen-header",
    "zen-footer",
    "zen-navigation",
];

pub const CRITICAL_ROLES: &[&str] = &["main", "navigation", "banner"];

/// Classify an element. Any failure while inspecting it counts as critical.
pub fn is_critical<E: ElementView>(element: &E) -> CriticalityVerdict {
    match classify(element) {
        Ok(Some(reason)) => CriticalityVerdict::critical(reason),
        Ok(None) => CriticalityVerdict::safe(),
        Err(err) => {
            log::debug!("criticality check failed, keeping element: {err}");
            CriticalityVerdict::critical(CriticalReason::Error(err.to_string()))
        }
    }
}

fn classify<E: ElementView>(element: &E) -> Result<Option<CriticalReason>, DomError> {
    let tag = element.tag_name().to_ascii_uppercase();
    if CRITICAL_TAGS.contains(&tag.as_str()) {
        return Ok(Some(CriticalReason::Tag(tag)));
    }

    let id = element.id();
    if !id.is_empty() {
        let lowered = id.to_lowercase();
        if let Some(matched) = CRITICAL_IDS.iter().copied().find(|needle| lowered.contains(needle)) {
            return Ok(Some(CriticalReason::Id { id, matched }));
        }
    }

    let classes = element.class_list();
    if let Some(matched) = CRITICAL_CLASSES
        .iter()
        .copied()
        .find(|critical| classes.iter().any(|class| class == critical))
    {
        return Ok(Some(CriticalReason::Class(matched)));
    }

    if let Some(role) = element.attribute("role")? {
        if CRITICAL_ROLES.contains(&role.as_str()) {
            return Ok(Some(CriticalReason::Role(role)));
        }
    }

    Ok(None)
}

#[cfg(all(test, feature = "page"))]
mod tests {
    use super::*;
    use crate::page::PageSnapshot;
    use crate::testing::BrokenElement;

    #[test]
    fn test_critical_tags_ignore_other_attributes() {
        let page = PageSnapshot::parse(
            r#"<html><head><meta charset="utf-8"><style>p{}</style></head>
            <body class="modal overlay"><script id="popup"></script></body></html>"#,
        );
        for selector in ["html", "head", "meta", "style", "body", "script"] {
            let element = page.select_first(selector).unwrap();
            let verdict = is_critical(&element);
            assert!(verdict.is_critical(), "{selector} should be critical");
            assert_eq!(verdict.reason.unwrap().rule_type(), "tag");
        }
    }

    #[test]
    fn test_critical_id_substring_case_insensitive() {
        let page = PageSnapshot::parse(r#"<div id="SiteHeaderWrap"></div><div id="promo"></div>"#);
        let verdict = is_critical(&page.select_first("div").unwrap());
        assert_eq!(
            verdict.reason,
            Some(CriticalReason::Id {
                id: "SiteHeaderWrap".to_string(),
                matched: "header"
            })
        );
        assert!(!is_critical(&page.select_first("#promo").unwrap()).is_critical());
    }

    #[test]
    fn test_critical_class_and_role() {
        let page = PageSnapshot::parse(
            r#"<div class="x zen-app"></div><nav role="navigation"></nav><div role="dialog"></div>"#,
        );
        assert_eq!(
            is_critical(&page.select_first(".x").unwrap()).reason,
            Some(CriticalReason::Class("zen-app"))
        );
        assert_eq!(
            is_critical(&page.select_first("nav").unwrap()).reason,
            Some(CriticalReason::Role("navigation".to_string()))
        );
        assert!(!is_critical(&page.select_first("[role=dialog]").unwrap()).is_critical());
    }

    #[test]
    fn test_class_token_must_match_exactly() {
        let page = PageSnapshot::parse(r#"<div class="zen-app-banner"></div>"#);
        assert!(!is_critical(&page.select_first("div").unwrap()).is_critical());
    }

    #[test]
    fn test_errors_are_critical() {
        let verdict = is_critical(&BrokenElement::new("DIV"));
        assert!(verdict.is_critical());
        assert_eq!(verdict.reason.unwrap().rule_type(), "error");
    }
}
