//! Popup heuristic
//!
//! An element is shaped like a popup when it is taken out of flow
//! (`fixed`/`absolute`), stacked above the page (z-index above the
//! threshold) and covers a non-trivial share of the viewport. All three
//! signals are required, so small fixed widgets such as scroll-to-top
//! buttons stay out.

use crate::dom::{ComputedStyle, DomError, ElementView};
use crate::tuning::PopupTuning;

/// Decide whether `element`, with its already computed `style`, looks like
/// a popup. Geometry failures count as "not a popup".
pub fn is_potential_popup<E: ElementView>(
    element: &E,
    style: &ComputedStyle,
    tuning: &PopupTuning,
) -> bool {
    match evaluate(element, style, tuning) {
        Ok(result) => result,
        Err(err) => {
            log::debug!("popup check failed: {err}");
            false
        }
    }
}

/// Like [`is_potential_popup`], reading the element's own computed style.
pub fn is_popup_shaped<E: ElementView>(element: &E, tuning: &PopupTuning) -> bool {
    match element.computed_style() {
        Ok(style) => is_potential_popup(element, &style, tuning),
        Err(err) => {
            log::debug!("computed style unavailable: {err}");
            false
        }
    }
}

/// Whether an ancestor within `max_depth` levels is popup-shaped. Returns
/// the 1-based level of the nearest one.
pub fn popup_ancestor_level<E: ElementView>(
    element: &E,
    max_depth: u32,
    tuning: &PopupTuning,
) -> Option<u32> {
    let mut current = element.parent();
    let mut level = 1;
    while let Some(ancestor) = current {
        if level > max_depth {
            break;
        }
        if is_popup_shaped(&ancestor, tuning) {
            return Some(level);
        }
        current = ancestor.parent();
        level += 1;
    }
    None
}

/// Depth-first search for a popup-shaped descendant within `max_depth`
/// levels. Stops at the first hit.
pub fn has_popup_descendant<E: ElementView>(element: &E, max_depth: u32, tuning: &PopupTuning) -> bool {
    if max_depth == 0 {
        return false;
    }
    element.children().iter().any(|child| {
        is_popup_shaped(child, tuning) || has_popup_descendant(child, max_depth - 1, tuning)
    })
}

fn evaluate<E: ElementView>(
    element: &E,
    style: &ComputedStyle,
    tuning: &PopupTuning,
) -> Result<bool, DomError> {
    let positioned = matches!(style.position.as_str(), "fixed" | "absolute");
    if !positioned || style.z_index_value() <= tuning.min_z_index {
        return Ok(false);
    }

    let rect = element.bounding_box()?;
    let viewport = element.viewport()?;
    Ok(rect.width > viewport.width * tuning.viewport_fraction
        || rect.height > viewport.height * tuning.viewport_fraction)
}
