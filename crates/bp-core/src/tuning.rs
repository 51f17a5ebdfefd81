//! Tunable thresholds for the heuristics.
//!
//! The defaults are empirically chosen values. Every field is optional in the
//! JSON form so a tuning file only needs to name what it overrides.

use serde::{Deserialize, Serialize};

/// All thresholds used by the engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Tuning {
    pub popup: PopupTuning,
    pub randomness: RandomnessTuning,
    pub text: TextTuning,
    pub synthesis: SynthesisTuning,
}

impl Tuning {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Popup heuristic thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PopupTuning {
    /// z-index must be strictly greater than this
    pub min_z_index: i64,
    /// Width or height must exceed this share of the viewport
    pub viewport_fraction: f64,
}

impl Default for PopupTuning {
    fn default() -> Self {
        Self {
            min_z_index: 1,
            viewport_fraction: 0.05,
        }
    }
}

/// Thresholds for flagging machine-generated tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RandomnessTuning {
    /// Tokens shorter than this are never flagged
    pub min_len: usize,
    /// Tokens longer than this look generated
    pub long_len: usize,
    /// Tokens up to this length count as short meaningful names
    pub short_len: usize,
    /// Shannon entropy in bits per char
    pub entropy_threshold: f64,
}

impl Default for RandomnessTuning {
    fn default() -> Self {
        Self {
            min_len: 6,
            long_len: 12,
            short_len: 8,
            entropy_threshold: 3.5,
        }
    }
}

/// Text pattern extraction limits. Lengths count characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextTuning {
    pub min_word_len: usize,
    pub max_words: usize,
    pub max_digit_ratio: f64,
    pub min_pattern_len: usize,
    pub max_pattern_len: usize,
}

impl Default for TextTuning {
    fn default() -> Self {
        Self {
            min_word_len: 2,
            max_words: 3,
            max_digit_ratio: 0.3,
            min_pattern_len: 4,
            max_pattern_len: 30,
        }
    }
}

/// Limits used while deriving rules from an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SynthesisTuning {
    /// Trimmed text must be longer than this to yield a text condition
    pub min_text_len: usize,
    /// ... and shorter than this
    pub max_text_len: usize,
    /// Elements with trimmed text in (min_text_len, this) prefer a text
    /// condition over an ancestor selector
    pub max_selector_text_len: usize,
    /// Ancestor levels searched for a stable attribute
    pub selector_ancestor_levels: u32,
    /// Ancestor levels probed for a popup-shaped parent
    pub parent_probe_levels: u32,
    /// Descendant levels probed for a popup-shaped child
    pub child_probe_levels: u32,
}

impl Default for SynthesisTuning {
    fn default() -> Self {
        Self {
            min_text_len: 3,
            max_text_len: 100,
            max_selector_text_len: 50,
            selector_ancestor_levels: 3,
            parent_probe_levels: 2,
            child_probe_levels: 3,
        }
    }
}
