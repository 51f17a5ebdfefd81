//! Element access interface
//!
//! The engine never touches a live document directly. Everything it needs
//! from an element goes through [`ElementView`], which is implemented over
//! `web_sys::Element` in the extension and over parsed HTML snapshots in
//! tests and the CLI.

/// Error type for element access.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomError {
    #[error("Element is detached from the document")]
    Detached,
    #[error("No window available")]
    NoWindow,
    #[error("Computed style unavailable: {0}")]
    Style(String),
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
    #[error("Attribute lookup failed: {0}")]
    Attribute(String),
}

/// Bounding box size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Viewport size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 800.0)
    }
}

/// The subset of computed style the heuristics read. Values are kept as the
/// raw strings a browser reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedStyle {
    pub position: String,
    pub z_index: String,
    pub display: String,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            position: "static".to_string(),
            z_index: "auto".to_string(),
            display: "block".to_string(),
        }
    }
}

impl ComputedStyle {
    /// Numeric z-index, parsed the lenient way browsers script it:
    /// leading integer prefix, anything unparseable is 0.
    pub fn z_index_value(&self) -> i64 {
        parse_int_prefix(&self.z_index).unwrap_or(0)
    }
}

/// Capability interface over one element of a flat document.
pub trait ElementView: Clone + PartialEq {
    /// Upper-case tag name (`DIV`, `A`, ...).
    fn tag_name(&self) -> String;

    /// The id attribute, empty when absent.
    fn id(&self) -> String;

    /// The raw class attribute, empty when absent.
    fn class_name(&self) -> String;

    fn text_content(&self) -> String;

    fn outer_html(&self) -> String;

    fn attribute(&self, name: &str) -> Result<Option<String>, DomError>;

    fn parent(&self) -> Option<Self>;

    fn children(&self) -> Vec<Self>;

    fn bounding_box(&self) -> Result<Rect, DomError>;

    fn computed_style(&self) -> Result<ComputedStyle, DomError>;

    fn viewport(&self) -> Result<Viewport, DomError>;

    /// Whether the element matches a selector. Syntax errors are reported as
    /// [`DomError::InvalidSelector`].
    fn matches_selector(&self, selector: &str) -> Result<bool, DomError>;

    /// Whether the element is still attached to its document.
    fn is_connected(&self) -> bool {
        true
    }

    /// Whitespace-separated class tokens.
    fn class_list(&self) -> Vec<String> {
        self.class_name()
            .split_whitespace()
            .map(|class| class.to_string())
            .collect()
    }
}

/// Parse a leading integer the way `parseInt(value, 10)` does.
pub fn parse_int_prefix(value: &str) -> Option<i64> {
    let trimmed = value.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'-') | Some(b'+')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    trimmed[..end].parse().ok()
}
