//! Block Popup Rule Store
//!
//! This crate owns the persisted side of the rules: the hostname-keyed
//! store, its JSON form, validation of imports and authored rules, and
//! merging of bundled default catalogs and user imports.

pub mod merge;
pub mod parser;
pub mod store;

pub use merge::{merge_into, MergeStats};
pub use parser::{
    lint_store, parse_import, parse_rule_store, parse_rules, parse_site, LintIssue, ParseError,
};
pub use store::{site_key, RuleStore, StoreError};
