//! Static page snapshots
//!
//! A parsed HTML document with a fixed viewport, implementing
//! [`ElementView`] so the engine can run outside a browser. There is no
//! layout engine: computed style and geometry are read from inline `style`
//! attributes only.
//!
//! - `width`/`height` accept `px`, `%`, `vw` and `vh` (percentages are taken
//!   against the viewport).
//! - Without an explicit size, `inset` or a `left`/`right` pair stretches an
//!   element across the viewport width, and `inset` or a `top`/`bottom`
//!   pair across its height.
//! - `display: none` collapses the box to zero.

use scraper::{ElementRef, Html, Selector};

use crate::dom::{ComputedStyle, DomError, ElementView, Rect, Viewport};
use crate::session::NodeIdentity;

// =============================================================================
// Snapshot
// =============================================================================

/// A parsed document plus the viewport it is laid out in.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    html: Html,
    viewport: Viewport,
}

impl PageSnapshot {
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
            viewport: Viewport::default(),
        }
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// The `<html>` element.
    pub fn root(&self) -> PageElement<'_> {
        PageElement::new(self, self.html.root_element())
    }

    /// First element matching `selector`, `None` for no match or bad syntax.
    pub fn select_first(&self, selector: &str) -> Option<PageElement<'_>> {
        let selector = Selector::parse(selector).ok()?;
        self.html
            .select(&selector)
            .next()
            .map(|node| PageElement::new(self, node))
    }

    pub fn select_all(&self, selector: &str) -> Vec<PageElement<'_>> {
        match Selector::parse(selector) {
            Ok(selector) => self
                .html
                .select(&selector)
                .map(|node| PageElement::new(self, node))
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Every element in document order.
    pub fn elements(&self) -> Vec<PageElement<'_>> {
        self.html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .map(|node| PageElement::new(self, node))
            .collect()
    }
}

// =============================================================================
// Element
// =============================================================================

/// One element of a [`PageSnapshot`].
#[derive(Debug, Clone, Copy)]
pub struct PageElement<'a> {
    page: &'a PageSnapshot,
    node: ElementRef<'a>,
}

impl<'a> PageElement<'a> {
    fn new(page: &'a PageSnapshot, node: ElementRef<'a>) -> Self {
        Self { page, node }
    }

    fn inline_style(&self) -> InlineStyle {
        InlineStyle::parse(self.node.value().attr("style").unwrap_or(""))
    }
}

impl PartialEq for PageElement<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl ElementView for PageElement<'_> {
    fn tag_name(&self) -> String {
        self.node.value().name().to_ascii_uppercase()
    }

    fn id(&self) -> String {
        self.node.value().id().unwrap_or_default().to_string()
    }

    fn class_name(&self) -> String {
        self.node.value().attr("class").unwrap_or_default().to_string()
    }

    fn text_content(&self) -> String {
        self.node.text().collect()
    }

    fn outer_html(&self) -> String {
        self.node.html()
    }

    fn attribute(&self, name: &str) -> Result<Option<String>, DomError> {
        Ok(self.node.value().attr(name).map(str::to_string))
    }

    fn parent(&self) -> Option<Self> {
        self.node
            .parent()
            .and_then(ElementRef::wrap)
            .map(|node| Self::new(self.page, node))
    }

    fn children(&self) -> Vec<Self> {
        self.node
            .children()
            .filter_map(ElementRef::wrap)
            .map(|node| Self::new(self.page, node))
            .collect()
    }

    fn bounding_box(&self) -> Result<Rect, DomError> {
        let style = self.inline_style();
        if style.get("display") == Some("none") {
            return Ok(Rect::default());
        }

        let viewport = self.page.viewport;
        let stretched = style.get("inset").is_some();
        let width = style
            .length("width", viewport.width, viewport)
            .or_else(|| {
                (stretched || (style.get("left").is_some() && style.get("right").is_some()))
                    .then_some(viewport.width)
            })
            .unwrap_or(0.0);
        let height = style
            .length("height", viewport.height, viewport)
            .or_else(|| {
                (stretched || (style.get("top").is_some() && style.get("bottom").is_some()))
                    .then_some(viewport.height)
            })
            .unwrap_or(0.0);

        Ok(Rect::new(width, height))
    }

    fn computed_style(&self) -> Result<ComputedStyle, DomError> {
        let style = self.inline_style();
        let mut computed = ComputedStyle::default();
        if let Some(position) = style.get("position") {
            computed.position = position.to_string();
        }
        if let Some(z_index) = style.get("z-index") {
            computed.z_index = z_index.to_string();
        }
        if let Some(display) = style.get("display") {
            computed.display = display.to_string();
        }
        Ok(computed)
    }

    fn viewport(&self) -> Result<Viewport, DomError> {
        Ok(self.page.viewport)
    }

    fn matches_selector(&self, selector: &str) -> Result<bool, DomError> {
        let parsed = Selector::parse(selector)
            .map_err(|_| DomError::InvalidSelector(selector.to_string()))?;
        Ok(parsed.matches(&self.node))
    }
}

impl NodeIdentity for PageElement<'_> {
    /// Child-index path from the document root. Stable because snapshots
    /// never change.
    type Key = Vec<usize>;

    fn identity(&self) -> Self::Key {
        let mut path = Vec::new();
        let mut current = Some(*self.node);
        while let Some(node) = current {
            path.push(node.prev_siblings().count());
            current = node.parent();
        }
        path.reverse();
        path
    }
}

// =============================================================================
// Inline style
// =============================================================================

/// Declarations of a `style` attribute, last one wins.
struct InlineStyle {
    declarations: Vec<(String, String)>,
}

impl InlineStyle {
    fn parse(source: &str) -> Self {
        let declarations = source
            .split(';')
            .filter_map(|declaration| declaration.split_once(':'))
            .map(|(name, value)| {
                let value = value.trim();
                let value = value.strip_suffix("!important").unwrap_or(value).trim();
                (name.trim().to_ascii_lowercase(), value.to_ascii_lowercase())
            })
            .filter(|(name, value)| !name.is_empty() && !value.is_empty())
            .collect();
        Self { declarations }
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.declarations
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// A length in pixels. `%` resolves against `extent`.
    fn length(&self, name: &str, extent: f64, viewport: Viewport) -> Option<f64> {
        let value = self.get(name)?;
        let (number, scale) = if let Some(number) = value.strip_suffix("px") {
            (number, 1.0)
        } else if let Some(number) = value.strip_suffix('%') {
            (number, extent / 100.0)
        } else if let Some(number) = value.strip_suffix("vw") {
            (number, viewport.width / 100.0)
        } else if let Some(number) = value.strip_suffix("vh") {
            (number, viewport.height / 100.0)
        } else {
            (value, 1.0)
        };
        number.trim().parse::<f64>().ok().map(|n| n * scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(html: &str) -> PageSnapshot {
        PageSnapshot::parse(html).with_viewport(Viewport::new(1000.0, 500.0))
    }

    #[test]
    fn test_element_accessors() {
        let page = page(r#"<div id="box" class="a  b" data-x="1"><span>Hi</span> there</div>"#);
        let element = page.select_first("#box").unwrap();
        assert_eq!(element.tag_name(), "DIV");
        assert_eq!(element.id(), "box");
        assert_eq!(element.class_list(), vec!["a", "b"]);
        assert_eq!(element.text_content(), "Hi there");
        assert_eq!(element.attribute("data-x").unwrap().as_deref(), Some("1"));
        assert_eq!(element.attribute("missing").unwrap(), None);
        assert_eq!(element.children().len(), 1);
        assert_eq!(element.parent().unwrap().tag_name(), "BODY");
        assert!(element.outer_html().starts_with("<div"));
    }

    #[test]
    fn test_root_has_no_parent() {
        let page = page("<p></p>");
        assert_eq!(page.root().tag_name(), "HTML");
        assert!(page.root().parent().is_none());
    }

    #[test]
    fn test_geometry_from_inline_style() {
        let page = page(
            r#"
            <div id="px" style="width: 200px; height: 50%"></div>
            <div id="vw" style="width: 10vw; height: 20vh !important"></div>
            <div id="inset" style="position: fixed; inset: 0"></div>
            <div id="sides" style="left: 0; right: 0; height: 40px"></div>
            <div id="none" style="width: 100px; display: none"></div>
            <div id="bare"></div>
            "#,
        );
        let rect = |id: &str| page.select_first(id).unwrap().bounding_box().unwrap();
        assert_eq!(rect("#px"), Rect::new(200.0, 250.0));
        assert_eq!(rect("#vw"), Rect::new(100.0, 100.0));
        assert_eq!(rect("#inset"), Rect::new(1000.0, 500.0));
        assert_eq!(rect("#sides"), Rect::new(1000.0, 40.0));
        assert_eq!(rect("#none"), Rect::default());
        assert_eq!(rect("#bare"), Rect::default());
    }

    #[test]
    fn test_computed_style_defaults() {
        let page = page(r#"<div id="a" style="POSITION: Fixed; z-index: 10"></div><div id="b"></div>"#);
        let style = page.select_first("#a").unwrap().computed_style().unwrap();
        assert_eq!(style.position, "fixed");
        assert_eq!(style.z_index_value(), 10);
        let style = page.select_first("#b").unwrap().computed_style().unwrap();
        assert_eq!(style, ComputedStyle::default());
    }

    #[test]
    fn test_selector_matching() {
        let page = page(r#"<div class="wrap"><a class="x">y</a></div>"#);
        let link = page.select_first("a").unwrap();
        assert_eq!(link.matches_selector(".wrap > a.x"), Ok(true));
        assert_eq!(link.matches_selector("span"), Ok(false));
        assert!(matches!(
            link.matches_selector("a[["),
            Err(DomError::InvalidSelector(_))
        ));
    }

    #[test]
    fn test_identity_distinguishes_siblings() {
        let page = page("<ul><li></li><li></li></ul>");
        let items = page.select_all("li");
        assert_ne!(items[0].identity(), items[1].identity());
        assert_eq!(items[1].identity(), page.select_all("li")[1].identity());
        assert_eq!(page.elements().len(), page.select_all("*").len());
    }
}
