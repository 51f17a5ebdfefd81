//! Block Popup Core Library
//!
//! This crate provides the rule-matching and popup-detection engine of the
//! Block Popup extension. Given one element and a site's rules it decides
//! whether the element is off-limits, whether it is shaped like a popup and
//! whether any rule matches it. In detection mode it also derives candidate
//! rules from an element the user picked.
//!
//! # Architecture
//!
//! The engine never touches a live document. Elements are reached through
//! the [`ElementView`] trait, implemented over `web_sys::Element` by the wasm
//! bindings and over parsed HTML by [`page::PageSnapshot`]. Matching is
//! synchronous and stateless; per-page state lives in [`Session`].
//!
//! # Modules
//!
//! - `types`: Persisted rule shapes and engine result types
//! - `dom`: Element capability trait
//! - `critical`: Criticality veto
//! - `popup`: Popup heuristic
//! - `condition`: Single-condition evaluation
//! - `matcher`: Rule and rule-set matching
//! - `text`: Randomness detection and text pattern extraction
//! - `miner`: Stable selector mining
//! - `synth`: Rule synthesis for detection mode
//! - `dedupe`: Structural duplicate detection
//! - `session`: Enforcement session and staggered detection scans
//! - `tuning`: Heuristic thresholds
//! - `page`: Static HTML snapshots (`page` feature)

pub mod condition;
pub mod critical;
pub mod dedupe;
pub mod dom;
pub mod matcher;
pub mod miner;
pub mod popup;
pub mod session;
pub mod synth;
pub mod text;
pub mod tuning;
pub mod types;

#[cfg(feature = "page")]
pub mod page;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use dedupe::{is_duplicate_rule, is_equivalent_rule};
pub use dom::{ComputedStyle, DomError, ElementView, Rect, Viewport};
pub use matcher::Matcher;
pub use miner::find_stable_selector;
pub use session::{Mode, NodeIdentity, Outcome, ScanQueue, ScanTask, Session, SkipReason};
pub use synth::{create_rule_from_element, generate_rule_variants};
pub use text::{extract_stable_text_pattern, is_random_generated};
pub use tuning::Tuning;
pub use types::{
    Condition, ConditionType, CriticalReason, CriticalityVerdict, Priority, Rule, RuleError,
    RuleShape, RuleVariant, SiteRuleSet,
};
