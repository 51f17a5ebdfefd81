//! `ElementView` over live DOM elements.

use std::cell::Cell;

use bp_core::{ComputedStyle, DomError, ElementView, NodeIdentity, Rect, Viewport};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::Element;

thread_local! {
    static IDENTITIES: js_sys::WeakMap = js_sys::WeakMap::new();
    static NEXT_IDENTITY: Cell<u32> = const { Cell::new(1) };
}

/// A live element of the page the content script runs in.
#[derive(Debug, Clone, PartialEq)]
pub struct DomElement(Element);

impl DomElement {
    pub fn new(element: Element) -> Self {
        Self(element)
    }

    /// Accepts anything the page hands over; non-elements are dropped.
    pub fn from_js(value: JsValue) -> Option<Self> {
        value.dyn_into::<Element>().ok().map(Self)
    }

    pub fn element(&self) -> &Element {
        &self.0
    }

    pub fn into_element(self) -> Element {
        self.0
    }
}

impl ElementView for DomElement {
    fn tag_name(&self) -> String {
        // SVG and XML elements report their tag in source case
        self.0.tag_name().to_ascii_uppercase()
    }

    fn id(&self) -> String {
        self.0.id()
    }

    fn class_name(&self) -> String {
        self.0.get_attribute("class").unwrap_or_default()
    }

    fn text_content(&self) -> String {
        self.0.text_content().unwrap_or_default()
    }

    fn outer_html(&self) -> String {
        self.0.outer_html()
    }

    fn attribute(&self, name: &str) -> Result<Option<String>, DomError> {
        Ok(self.0.get_attribute(name))
    }

    fn parent(&self) -> Option<Self> {
        self.0.parent_element().map(Self)
    }

    fn children(&self) -> Vec<Self> {
        let children = self.0.children();
        (0..children.length())
            .filter_map(|index| children.item(index))
            .map(Self)
            .collect()
    }

    fn bounding_box(&self) -> Result<Rect, DomError> {
        if !self.0.is_connected() {
            return Err(DomError::Detached);
        }
        let rect = self.0.get_bounding_client_rect();
        Ok(Rect::new(rect.width(), rect.height()))
    }

    fn computed_style(&self) -> Result<ComputedStyle, DomError> {
        let window = web_sys::window().ok_or(DomError::NoWindow)?;
        let declaration = window
            .get_computed_style(&self.0)
            .map_err(|err| DomError::Style(js_message(&err)))?
            .ok_or_else(|| DomError::Style("no style declaration".to_string()))?;
        let read = |property: &str| {
            declaration
                .get_property_value(property)
                .map_err(|err| DomError::Style(js_message(&err)))
        };

        Ok(ComputedStyle {
            position: read("position")?,
            z_index: read("z-index")?,
            display: read("display")?,
        })
    }

    fn viewport(&self) -> Result<Viewport, DomError> {
        let window = web_sys::window().ok_or(DomError::NoWindow)?;
        let dimension = |value: Result<JsValue, JsValue>| {
            value
                .ok()
                .and_then(|value| value.as_f64())
                .ok_or(DomError::NoWindow)
        };
        Ok(Viewport::new(
            dimension(window.inner_width())?,
            dimension(window.inner_height())?,
        ))
    }

    fn matches_selector(&self, selector: &str) -> Result<bool, DomError> {
        self.0
            .matches(selector)
            .map_err(|_| DomError::InvalidSelector(selector.to_string()))
    }

    fn is_connected(&self) -> bool {
        self.0.is_connected()
    }
}

impl NodeIdentity for DomElement {
    type Key = u32;

    /// Identities are handed out lazily and kept in a weak map, so removed
    /// elements do not pin memory.
    fn identity(&self) -> u32 {
        let object: &js_sys::Object = self.0.as_ref();
        IDENTITIES.with(|identities| {
            if let Some(known) = identities.get(object).as_f64() {
                return known as u32;
            }
            let id = NEXT_IDENTITY.with(|next| {
                let id = next.get();
                next.set(id.wrapping_add(1));
                id
            });
            identities.set(object, &JsValue::from(id));
            id
        })
    }
}

/// Best-effort text of a thrown JS value.
pub(crate) fn js_message(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|err| String::from(err.message()))
        })
        .unwrap_or_else(|| format!("{value:?}"))
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn create(tag: &str) -> DomElement {
        let document = web_sys::window().unwrap().document().unwrap();
        DomElement::new(document.create_element(tag).unwrap())
    }

    #[wasm_bindgen_test]
    fn test_identity_is_stable() {
        let a = create("div");
        let b = create("div");
        assert_eq!(a.identity(), a.clone().identity());
        assert_ne!(a.identity(), b.identity());
    }

    #[wasm_bindgen_test]
    fn test_detached_element() {
        let element = create("div");
        assert!(!element.is_connected());
        assert_eq!(element.bounding_box(), Err(DomError::Detached));
        assert!(matches!(
            element.matches_selector("div[["),
            Err(DomError::InvalidSelector(_))
        ));
    }
}
