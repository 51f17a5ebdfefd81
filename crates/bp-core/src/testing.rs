//! Element stubs for failure paths.

use crate::dom::{ComputedStyle, DomError, ElementView, Rect, Viewport};
use crate::session::NodeIdentity;

/// An element whose attribute, style, geometry and selector access all fail.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokenElement {
    tag: String,
    connected: bool,
}

impl BrokenElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            connected: true,
        }
    }

    /// Same stub, already removed from its document.
    pub fn detached(tag: &str) -> Self {
        Self {
            connected: false,
            ..Self::new(tag)
        }
    }
}

impl NodeIdentity for BrokenElement {
    type Key = String;

    fn identity(&self) -> String {
        self.tag.clone()
    }
}

impl ElementView for BrokenElement {
    fn tag_name(&self) -> String {
        self.tag.clone()
    }

    fn id(&self) -> String {
        String::new()
    }

    fn class_name(&self) -> String {
        String::new()
    }

    fn text_content(&self) -> String {
        String::new()
    }

    fn outer_html(&self) -> String {
        String::new()
    }

    fn attribute(&self, name: &str) -> Result<Option<String>, DomError> {
        Err(DomError::Attribute(name.to_string()))
    }

    fn parent(&self) -> Option<Self> {
        None
    }

    fn children(&self) -> Vec<Self> {
        Vec::new()
    }

    fn bounding_box(&self) -> Result<Rect, DomError> {
        Err(DomError::Detached)
    }

    fn computed_style(&self) -> Result<ComputedStyle, DomError> {
        Err(DomError::Style("stub".to_string()))
    }

    fn viewport(&self) -> Result<Viewport, DomError> {
        Err(DomError::NoWindow)
    }

    fn matches_selector(&self, _selector: &str) -> Result<bool, DomError> {
        Err(DomError::Detached)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
