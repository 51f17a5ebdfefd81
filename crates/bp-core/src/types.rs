//! Core type definitions for Block Popup
//!
//! These types map directly to the persisted rule JSON and are used
//! throughout the matching engine.

use serde::{Deserialize, Serialize};

// =============================================================================
// Condition Types (persisted `type` string)
// =============================================================================

/// Kind of an atomic rule condition.
///
/// Unknown strings are kept verbatim so that rules written by a newer
/// version survive a load/save cycle; they never match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConditionType {
    /// Case-insensitive substring of the text content
    Content,
    /// Whitespace-normalized substring of the text content
    Phrase,
    /// Case-insensitive substring of the serialized markup
    OuterHtml,
    /// Substring of the raw class attribute
    Class,
    /// Substring of the id attribute
    Id,
    /// Structural selector query
    Selector,
    /// Element is an anchor
    IsLink,
    /// Element itself is popup-shaped
    IsPopup,
    /// An ancestor within `depth` levels is popup-shaped
    HasPopupParent,
    /// A descendant within `depth` levels is popup-shaped
    HasPopupChild,
    /// Unrecognized type, preserved on round-trip
    Unknown(String),
}

impl ConditionType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Content => "content",
            Self::Phrase => "phrase",
            Self::OuterHtml => "outerHTML",
            Self::Class => "class",
            Self::Id => "id",
            Self::Selector => "selector",
            Self::IsLink => "isLink",
            Self::IsPopup => "isPopup",
            Self::HasPopupParent => "hasPopupParent",
            Self::HasPopupChild => "hasPopupChild",
            Self::Unknown(raw) => raw,
        }
    }

    /// Structural "shaped like a popup" conditions. Within a rule these are
    /// alternatives; every other kind must hold jointly.
    pub fn is_popup_structural(&self) -> bool {
        matches!(self, Self::IsPopup | Self::HasPopupParent | Self::HasPopupChild)
    }

    /// Kinds whose `pattern` field carries the condition.
    pub fn requires_pattern(&self) -> bool {
        matches!(
            self,
            Self::Content | Self::Phrase | Self::OuterHtml | Self::Class | Self::Id | Self::Selector
        )
    }

    /// Kinds whose `depth` field carries the condition.
    pub fn uses_depth(&self) -> bool {
        matches!(self, Self::HasPopupParent | Self::HasPopupChild)
    }

    /// Human-readable label used in generated descriptions.
    pub fn label(&self) -> &str {
        match self {
            Self::Content => "Text",
            Self::Phrase => "Phrase",
            Self::OuterHtml => "HTML",
            Self::Class => "Class",
            Self::Id => "ID",
            Self::Selector => "Selector",
            Self::IsLink => "Link",
            Self::IsPopup => "Popup",
            Self::HasPopupParent => "Popup parent",
            Self::HasPopupChild => "Popup child",
            Self::Unknown(raw) => raw,
        }
    }
}

impl From<String> for ConditionType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "content" => Self::Content,
            "phrase" => Self::Phrase,
            "outerHTML" => Self::OuterHtml,
            "class" => Self::Class,
            "id" => Self::Id,
            "selector" => Self::Selector,
            "isLink" => Self::IsLink,
            "isPopup" => Self::IsPopup,
            "hasPopupParent" => Self::HasPopupParent,
            "hasPopupChild" => Self::HasPopupChild,
            _ => Self::Unknown(value),
        }
    }
}

impl From<&str> for ConditionType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<ConditionType> for String {
    fn from(value: ConditionType) -> Self {
        match value {
            ConditionType::Unknown(raw) => raw,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Condition
// =============================================================================

pub const DEFAULT_PARENT_DEPTH: u32 = 2;
pub const DEFAULT_CHILD_DEPTH: u32 = 3;

/// One atomic test contributing to a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: ConditionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<bool>,
}

impl Condition {
    fn with_pattern(kind: ConditionType, pattern: impl Into<String>) -> Self {
        Self {
            kind,
            pattern: Some(pattern.into()),
            depth: None,
            value: None,
        }
    }

    fn marker(kind: ConditionType) -> Self {
        Self {
            kind,
            pattern: None,
            depth: None,
            value: Some(true),
        }
    }

    fn with_depth(kind: ConditionType, depth: u32) -> Self {
        Self {
            kind,
            pattern: None,
            depth: Some(depth),
            value: None,
        }
    }

    pub fn content(pattern: impl Into<String>) -> Self {
        Self::with_pattern(ConditionType::Content, pattern)
    }

    pub fn phrase(pattern: impl Into<String>) -> Self {
        Self::with_pattern(ConditionType::Phrase, pattern)
    }

    pub fn outer_html(pattern: impl Into<String>) -> Self {
        Self::with_pattern(ConditionType::OuterHtml, pattern)
    }

    pub fn class(pattern: impl Into<String>) -> Self {
        Self::with_pattern(ConditionType::Class, pattern)
    }

    pub fn id(pattern: impl Into<String>) -> Self {
        Self::with_pattern(ConditionType::Id, pattern)
    }

    pub fn selector(pattern: impl Into<String>) -> Self {
        Self::with_pattern(ConditionType::Selector, pattern)
    }

    pub fn is_link() -> Self {
        Self::marker(ConditionType::IsLink)
    }

    pub fn is_popup() -> Self {
        Self::marker(ConditionType::IsPopup)
    }

    pub fn popup_parent(depth: u32) -> Self {
        Self::with_depth(ConditionType::HasPopupParent, depth)
    }

    pub fn popup_child(depth: u32) -> Self {
        Self::with_depth(ConditionType::HasPopupChild, depth)
    }

    /// Depth limit for ancestor/descendant kinds. A missing or zero depth
    /// falls back to the per-kind default.
    pub fn effective_depth(&self) -> u32 {
        match self.depth {
            Some(depth) if depth > 0 => depth,
            _ if self.kind == ConditionType::HasPopupChild => DEFAULT_CHILD_DEPTH,
            _ => DEFAULT_PARENT_DEPTH,
        }
    }

    /// Validate a condition coming from manual authoring.
    pub fn validate(&self) -> Result<(), RuleError> {
        if let ConditionType::Unknown(raw) = &self.kind {
            return Err(RuleError::UnknownType(raw.clone()));
        }
        if self.pattern.is_some() && self.depth.is_some() {
            return Err(RuleError::ConflictingFields(self.kind.clone()));
        }
        if self.kind.requires_pattern()
            && self.pattern.as_deref().map_or(true, |p| p.trim().is_empty())
        {
            return Err(RuleError::MissingPattern(self.kind.clone()));
        }
        if self.kind.uses_depth() && self.depth == Some(0) {
            return Err(RuleError::InvalidDepth(self.kind.clone()));
        }
        Ok(())
    }

    /// Label of this condition as shown in rule descriptions.
    pub fn describe(&self) -> String {
        match self.kind {
            ConditionType::IsPopup | ConditionType::IsLink => self.kind.label().to_string(),
            ConditionType::HasPopupParent | ConditionType::HasPopupChild => {
                format!("{} (up to level {})", self.kind.label(), self.effective_depth())
            }
            _ => match &self.pattern {
                Some(pattern) => format!("{}: \"{}\"", self.kind.label(), pattern),
                None => self.kind.label().to_string(),
            },
        }
    }
}

/// Short description of a condition list: the first two labels joined with
/// " + ", followed by "and more" when there are further conditions.
pub fn describe_conditions(conditions: &[Condition]) -> String {
    if conditions.is_empty() {
        return "New rule".to_string();
    }
    let head: Vec<String> = conditions.iter().take(2).map(Condition::describe).collect();
    let mut description = head.join(" + ");
    if conditions.len() > 2 {
        description.push_str(" and more");
    }
    description
}

// =============================================================================
// Rule
// =============================================================================

/// Persisted shape a rule was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleShape {
    /// `{ enabled, description, conditions: [...] }`
    #[default]
    Compound,
    /// `{ type, pattern, enabled, description }`
    Legacy,
}

/// A named, toggleable set of conditions that together decide whether to
/// hide an element.
///
/// Both persisted shapes deserialize into this one form; a legacy rule
/// becomes a single-condition rule and is written back in its legacy shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RuleRepr", into = "RuleRepr")]
pub struct Rule {
    pub enabled: bool,
    pub description: String,
    pub conditions: Vec<Condition>,
    pub shape: RuleShape,
}

impl Rule {
    pub fn new(description: impl Into<String>, conditions: Vec<Condition>) -> Self {
        Self {
            enabled: true,
            description: description.into(),
            conditions,
            shape: RuleShape::Compound,
        }
    }

    /// Single-condition rule in the flat legacy shape.
    pub fn legacy(kind: ConditionType, pattern: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            enabled: true,
            description: description.into(),
            conditions: vec![Condition::with_pattern(kind, pattern)],
            shape: RuleShape::Legacy,
        }
    }

    pub fn is_legacy(&self) -> bool {
        self.shape == RuleShape::Legacy
    }

    /// Validate a rule coming from manual authoring.
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.conditions.is_empty() {
            return Err(RuleError::NoConditions);
        }
        for (index, condition) in self.conditions.iter().enumerate() {
            condition
                .validate()
                .map_err(|source| RuleError::Condition {
                    index,
                    source: Box::new(source),
                })?;
        }
        Ok(())
    }
}

fn default_description(description: Option<String>) -> String {
    description.unwrap_or_default()
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RuleRepr {
    Compound {
        #[serde(default)]
        enabled: Option<bool>,
        #[serde(default)]
        description: Option<String>,
        conditions: Vec<Condition>,
    },
    Legacy {
        #[serde(rename = "type")]
        kind: ConditionType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
        #[serde(default)]
        enabled: Option<bool>,
        #[serde(default)]
        description: Option<String>,
    },
}

impl From<RuleRepr> for Rule {
    fn from(repr: RuleRepr) -> Self {
        match repr {
            RuleRepr::Compound {
                enabled,
                description,
                conditions,
            } => Self {
                enabled: enabled != Some(false),
                description: default_description(description),
                conditions,
                shape: RuleShape::Compound,
            },
            RuleRepr::Legacy {
                kind,
                pattern,
                enabled,
                description,
            } => Self {
                enabled: enabled != Some(false),
                description: default_description(description),
                conditions: vec![Condition {
                    kind,
                    pattern,
                    depth: None,
                    value: None,
                }],
                shape: RuleShape::Legacy,
            },
        }
    }
}

impl From<Rule> for RuleRepr {
    fn from(rule: Rule) -> Self {
        let Rule {
            enabled,
            description,
            mut conditions,
            shape,
        } = rule;

        if shape == RuleShape::Legacy && conditions.len() == 1 {
            let condition = conditions.remove(0);
            return RuleRepr::Legacy {
                kind: condition.kind,
                pattern: condition.pattern,
                enabled: Some(enabled),
                description: Some(description),
            };
        }

        RuleRepr::Compound {
            enabled: Some(enabled),
            description: Some(description),
            conditions,
        }
    }
}

// =============================================================================
// Site Rule Set
// =============================================================================

/// Per-hostname record: global switch for the site plus its rules.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SiteRuleSet {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl SiteRuleSet {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            rules: Vec::new(),
        }
    }

    /// Rules that take part in matching.
    pub fn enabled_rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|rule| rule.enabled)
    }
}

// =============================================================================
// Rule Variants (detection mode)
// =============================================================================

/// Presentation priority of a synthesized rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// A candidate rule offered to the user for one detected element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleVariant {
    pub priority: Priority,
    #[serde(flatten)]
    pub rule: Rule,
}

// =============================================================================
// Criticality Verdict
// =============================================================================

/// Why an element must never be hidden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CriticalReason {
    Tag(String),
    Id { id: String, matched: &'static str },
    Class(&'static str),
    Role(String),
    /// Evaluation failed; treated as critical.
    Error(String),
}

impl CriticalReason {
    /// Diagnostic category of the veto.
    pub fn rule_type(&self) -> &'static str {
        match self {
            Self::Tag(_) => "tag",
            Self::Id { .. } => "id",
            Self::Class(_) => "class",
            Self::Role(_) => "role",
            Self::Error(_) => "error",
        }
    }

    /// The value that triggered the veto.
    pub fn value(&self) -> &str {
        match self {
            Self::Tag(tag) => tag,
            Self::Id { matched, .. } => matched,
            Self::Class(class) => class,
            Self::Role(role) => role,
            Self::Error(message) => message,
        }
    }
}

impl std::fmt::Display for CriticalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tag(tag) => write!(f, "critical tag: {tag}"),
            Self::Id { id, matched } => write!(f, "critical id: {id} (contains \"{matched}\")"),
            Self::Class(class) => write!(f, "critical class: {class}"),
            Self::Role(role) => write!(f, "critical role: {role}"),
            Self::Error(message) => write!(f, "classification failed: {message}"),
        }
    }
}

/// Result of the criticality check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CriticalityVerdict {
    pub reason: Option<CriticalReason>,
}

impl CriticalityVerdict {
    pub fn safe() -> Self {
        Self { reason: None }
    }

    pub fn critical(reason: CriticalReason) -> Self {
        Self {
            reason: Some(reason),
        }
    }

    pub fn is_critical(&self) -> bool {
        self.reason.is_some()
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Validation failure for a manually authored rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("Rule has no conditions")]
    NoConditions,
    #[error("Condition {}: {source}", .index + 1)]
    Condition {
        index: usize,
        source: Box<RuleError>,
    },
    #[error("Enter a pattern for the {0} condition")]
    MissingPattern(ConditionType),
    #[error("Depth of the {0} condition must be a positive number")]
    InvalidDepth(ConditionType),
    #[error("Condition {0} sets both a pattern and a depth")]
    ConflictingFields(ConditionType),
    #[error("Unknown condition type: {0}")]
    UnknownType(String),
}
