//! WebAssembly bindings for Block Popup
//!
//! The content script drives a [`PageSession`] per page; the options and
//! background pages use the free functions for rule authoring and store
//! maintenance. Rules and stores cross the boundary as plain JS objects in
//! their persisted shape.

mod console;
mod element;

use std::cell::RefCell;

use bp_core::miner::{ANALYZING_CLASS, DETECTED_CLASS};
use bp_core::session::{Outcome, ScanQueue, ScanTask, Session, SkipReason};
use bp_core::types::describe_conditions;
use bp_core::{Condition, Matcher, Rule, SiteRuleSet, Tuning};
use bp_rules::{merge_into, parse_import, parse_rule_store, parse_rules, parse_site, RuleStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;
use web_sys::Element;

pub use element::DomElement;

thread_local! {
    static MATCHER: RefCell<Matcher> = RefCell::new(Matcher::default());
}

fn with_matcher<R>(f: impl FnOnce(&Matcher) -> R) -> R {
    MATCHER.with(|matcher| f(&matcher.borrow()))
}

fn current_matcher() -> Matcher {
    with_matcher(Matcher::clone)
}

// =============================================================================
// Setup
// =============================================================================

/// Install console logging and configure thresholds. `tuning` is an
/// optional object overriding any subset of the defaults.
#[wasm_bindgen]
pub fn init(debug: bool, tuning: JsValue) -> Result<(), JsValue> {
    console::install(debug);
    configure(tuning)
}

#[wasm_bindgen]
pub fn set_debug_mode(enabled: bool) {
    console::set_debug(enabled);
    log::debug!("debug mode {}", if enabled { "on" } else { "off" });
}

/// Replace the engine thresholds. `null` or `undefined` restores defaults.
#[wasm_bindgen]
pub fn configure(tuning: JsValue) -> Result<(), JsValue> {
    let tuning = if tuning.is_null() || tuning.is_undefined() {
        Tuning::default()
    } else {
        from_js::<Tuning>(&tuning)?
    };
    MATCHER.with(|matcher| *matcher.borrow_mut() = Matcher::new(tuning));
    Ok(())
}

#[wasm_bindgen]
pub fn detected_class() -> String {
    DETECTED_CLASS.to_string()
}

#[wasm_bindgen]
pub fn analyzing_class() -> String {
    ANALYZING_CLASS.to_string()
}

// =============================================================================
// Engine
// =============================================================================

/// Criticality verdict as `{ isCritical, ruleType?, value?, reason? }`.
#[wasm_bindgen]
pub fn is_critical(element: Element) -> JsValue {
    let verdict = with_matcher(|matcher| matcher.is_critical(&DomElement::new(element)));

    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"isCritical".into(), &JsValue::from(verdict.is_critical()));
    if let Some(reason) = verdict.reason {
        let _ = js_sys::Reflect::set(&result, &"ruleType".into(), &JsValue::from_str(reason.rule_type()));
        let _ = js_sys::Reflect::set(&result, &"value".into(), &JsValue::from_str(reason.value()));
        let _ = js_sys::Reflect::set(&result, &"reason".into(), &JsValue::from_str(&reason.to_string()));
    }
    result.into()
}

/// Popup heuristic over the element's live computed style.
#[wasm_bindgen]
pub fn is_potential_popup(element: Element) -> bool {
    with_matcher(|matcher| matcher.is_popup_shaped(&DomElement::new(element)))
}

#[wasm_bindgen]
pub fn check_condition(element: Element, condition: JsValue) -> Result<bool, JsValue> {
    let condition = from_js::<Condition>(&condition)?;
    Ok(with_matcher(|matcher| {
        matcher.check_condition(&DomElement::new(element), &condition)
    }))
}

/// Whether any enabled rule in `rules` matches. Critical elements never do.
#[wasm_bindgen]
pub fn matches_rules(element: Element, rules: JsValue) -> Result<bool, JsValue> {
    let rules = read_rules(&rules)?;
    Ok(with_matcher(|matcher| matcher.matches(&DomElement::new(element), &rules)))
}

/// The first enabled rule matching the element, or `null`.
#[wasm_bindgen]
pub fn matching_rule(element: Element, rules: JsValue) -> Result<JsValue, JsValue> {
    let rules = read_rules(&rules)?;
    let element = DomElement::new(element);
    match with_matcher(|matcher| matcher.matching_rule(&element, &rules).cloned()) {
        Some(rule) => to_js(&rule),
        None => Ok(JsValue::NULL),
    }
}

/// Candidate rules for a detected element, highest priority first.
#[wasm_bindgen]
pub fn generate_rule_variants(element: Element) -> Result<JsValue, JsValue> {
    let element = DomElement::new(element);
    let variants = with_matcher(|matcher| bp_core::generate_rule_variants(&element, matcher.tuning()));
    to_js(&variants)
}

/// One combined rule describing the element.
#[wasm_bindgen]
pub fn create_rule_from_element(element: Element) -> Result<JsValue, JsValue> {
    let element = DomElement::new(element);
    let rule = with_matcher(|matcher| bp_core::create_rule_from_element(&element, matcher.tuning()));
    to_js(&rule)
}

#[wasm_bindgen]
pub fn find_stable_selector(element: Element) -> Option<String> {
    let element = DomElement::new(element);
    with_matcher(|matcher| bp_core::find_stable_selector(&element, matcher.tuning()))
}

#[wasm_bindgen]
pub fn extract_stable_text_pattern(text: &str) -> Option<String> {
    with_matcher(|matcher| bp_core::extract_stable_text_pattern(text, &matcher.tuning().text))
}

#[wasm_bindgen]
pub fn is_random_generated(token: &str) -> bool {
    with_matcher(|matcher| bp_core::is_random_generated(token, &matcher.tuning().randomness))
}

// =============================================================================
// Rule authoring
// =============================================================================

/// Validate a hand-authored rule. Rejects with a user-facing message.
#[wasm_bindgen]
pub fn validate_rule(rule: JsValue) -> Result<(), JsValue> {
    from_js::<Rule>(&rule)?
        .validate()
        .map_err(|err| JsValue::from_str(&err.to_string()))
}

#[wasm_bindgen]
pub fn is_duplicate_rule(existing: JsValue, candidate: JsValue) -> Result<bool, JsValue> {
    let existing = read_rules(&existing)?;
    let candidate = from_js::<Rule>(&candidate)?;
    Ok(bp_core::is_duplicate_rule(&existing, &candidate))
}

#[wasm_bindgen]
pub fn describe_rule_conditions(conditions: JsValue) -> Result<String, JsValue> {
    let conditions = from_js::<Vec<Condition>>(&conditions)?;
    Ok(describe_conditions(&conditions))
}

// =============================================================================
// Rule store
// =============================================================================

/// Store key for a page URL.
#[wasm_bindgen]
pub fn site_key(url: &str) -> Result<String, JsValue> {
    bp_rules::site_key(url).map_err(to_js_error)
}

/// Read a persisted store, dropping unreadable rule entries.
#[wasm_bindgen]
pub fn normalize_store(store: JsValue) -> Result<JsValue, JsValue> {
    let store = read_store(&store)?;
    to_js(&store)
}

/// Whether blocking should run on `host` with this store.
#[wasm_bindgen]
pub fn should_activate(store: JsValue, host: &str) -> Result<bool, JsValue> {
    Ok(read_store(&store)?.should_activate(host))
}

/// Append a rule picked in detection mode. Resolves to the updated store.
#[wasm_bindgen]
pub fn add_rule_to_store(store: JsValue, host: &str, rule: JsValue) -> Result<JsValue, JsValue> {
    let mut store = read_store(&store)?;
    let rule = from_js::<Rule>(&rule)?;
    store.add_rule(host, rule).map_err(to_js_error)?;
    log::debug!("added rule for {host}");
    to_js(&store)
}

/// Merge the bundled default catalog into a store.
#[wasm_bindgen]
pub fn merge_default_rules(store: JsValue, defaults: JsValue) -> Result<JsValue, JsValue> {
    let mut store = read_store(&store)?;
    let defaults = parse_rule_store(&json_text(&defaults)?).map_err(to_js_error)?;
    let stats = merge_into(&mut store, defaults);
    merge_result(&store, stats)
}

/// Merge a user import into a store. The import is validated first and
/// rejected as a whole when malformed.
#[wasm_bindgen]
pub fn import_rules(store: JsValue, imported: &str) -> Result<JsValue, JsValue> {
    let mut store = read_store(&store)?;
    let imported = parse_import(imported).map_err(to_js_error)?;
    let stats = merge_into(&mut store, imported);
    merge_result(&store, stats)
}

/// The store as pretty-printed JSON for export.
#[wasm_bindgen]
pub fn export_rules(store: JsValue) -> Result<String, JsValue> {
    read_store(&store)?.to_json_pretty().map_err(to_js_error)
}

fn merge_result(store: &RuleStore, stats: bp_rules::MergeStats) -> Result<JsValue, JsValue> {
    log::debug!(
        "merged {} sites and {} rules ({} skipped)",
        stats.sites_added,
        stats.rules_added,
        stats.rules_skipped
    );
    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"store".into(), &to_js(store)?);
    let _ = js_sys::Reflect::set(&result, &"sitesAdded".into(), &JsValue::from(stats.sites_added as u32));
    let _ = js_sys::Reflect::set(&result, &"rulesAdded".into(), &JsValue::from(stats.rules_added as u32));
    let _ = js_sys::Reflect::set(&result, &"rulesSkipped".into(), &JsValue::from(stats.rules_skipped as u32));
    Ok(result.into())
}

fn read_store(value: &JsValue) -> Result<RuleStore, JsValue> {
    if value.is_null() || value.is_undefined() {
        return Ok(RuleStore::new());
    }
    parse_rule_store(&json_text(value)?).map_err(to_js_error)
}

// =============================================================================
// Page session
// =============================================================================

/// Blocking state for one page.
#[wasm_bindgen]
pub struct PageSession {
    inner: Session<u32>,
}

#[wasm_bindgen]
impl PageSession {
    /// `site` is the store entry for `host`, or `null` when it has none.
    #[wasm_bindgen(constructor)]
    pub fn new(host: String, site: JsValue) -> Result<PageSession, JsValue> {
        let site = read_site(&site)?;
        Ok(Self {
            inner: Session::new(host, site, current_matcher()),
        })
    }

    pub fn host(&self) -> String {
        self.inner.host().to_string()
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    pub fn is_detecting(&self) -> bool {
        self.inner.mode() == bp_core::Mode::Detect
    }

    pub fn blocked_count(&self) -> u32 {
        self.inner.blocked_count() as u32
    }

    /// Analyze an element once and name the outcome.
    pub fn analyze(&mut self, element: Element) -> String {
        outcome_name(self.inner.analyze(&DomElement::new(element))).to_string()
    }

    /// Returns whether the element was newly blocked.
    pub fn on_element_added(&mut self, element: Element) -> bool {
        self.inner.on_element_added(&DomElement::new(element))
    }

    pub fn on_mutation(&mut self, element: Element, class_changed: bool) -> bool {
        self.inner.on_mutation(&DomElement::new(element), class_changed)
    }

    /// Returns how many elements were newly blocked.
    pub fn check_existing(&mut self, elements: js_sys::Array) -> u32 {
        let elements = elements.iter().filter_map(DomElement::from_js);
        self.inner.check_existing(elements) as u32
    }

    pub fn unblock(&mut self, element: Element) -> bool {
        self.inner.unblock(&DomElement::new(element))
    }

    /// Enter detection mode and schedule every element for analysis.
    pub fn start_detection(&mut self, elements: js_sys::Array) -> DetectionScan {
        let elements = elements.iter().filter_map(DomElement::from_js);
        DetectionScan {
            queue: self.inner.start_detection(elements),
        }
    }

    /// Leave detection mode. Returns how many elements carried the
    /// detected marker.
    pub fn stop_detection(&mut self) -> u32 {
        self.inner.stop_detection().len() as u32
    }

    /// Run one scheduled analysis and name the outcome.
    pub fn run_task(&mut self, step: &ScanStep) -> String {
        outcome_name(self.inner.run_task(&step.task)).to_string()
    }

    /// Swap in a new snapshot of the site's rules.
    pub fn replace_rules(&mut self, site: JsValue) -> Result<(), JsValue> {
        let site = read_site(&site)?;
        self.inner.replace_rules(site);
        Ok(())
    }
}

/// Analyses scheduled by one detection scan.
#[wasm_bindgen]
pub struct DetectionScan {
    queue: ScanQueue<DomElement>,
}

#[wasm_bindgen]
impl DetectionScan {
    pub fn len(&self) -> u32 {
        self.queue.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// The next analysis in firing order.
    pub fn next(&mut self) -> Option<ScanStep> {
        self.queue.pop().map(|task| ScanStep { task })
    }
}

/// One scheduled analysis, to be passed back to [`PageSession::run_task`]
/// after `delayMs`.
#[wasm_bindgen]
pub struct ScanStep {
    task: ScanTask<DomElement>,
}

#[wasm_bindgen]
impl ScanStep {
    #[wasm_bindgen(getter, js_name = delayMs)]
    pub fn delay_ms(&self) -> u32 {
        self.task.delay_ms
    }

    #[wasm_bindgen(getter)]
    pub fn element(&self) -> Element {
        self.task.item.element().clone()
    }
}

/// Persisted site entry. Unreadable rules are dropped one by one so the
/// rest of the site's rules still apply.
fn read_site(value: &JsValue) -> Result<Option<SiteRuleSet>, JsValue> {
    if value.is_null() || value.is_undefined() {
        return Ok(None);
    }
    parse_site(&from_js::<Value>(value)?)
        .map(Some)
        .ok_or_else(|| JsValue::from_str("Site entry must be an object"))
}

/// Persisted rule list, read leniently like [`read_site`].
fn read_rules(value: &JsValue) -> Result<Vec<Rule>, JsValue> {
    let rules = from_js::<Value>(value)?;
    if !rules.is_array() {
        return Err(JsValue::from_str("Rules must be an array"));
    }
    Ok(parse_rules(&rules))
}

fn outcome_name(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Skipped(SkipReason::Detached) => "detached",
        Outcome::Skipped(SkipReason::Critical) => "critical",
        Outcome::Skipped(SkipReason::AlreadyProcessed) => "processed",
        Outcome::Skipped(SkipReason::Stale) => "stale",
        Outcome::Blocked => "blocked",
        Outcome::Allowed => "allowed",
        Outcome::Detected => "detected",
        Outcome::Ignored => "ignored",
    }
}

// =============================================================================
// Conversions
// =============================================================================

fn json_text(value: &JsValue) -> Result<String, JsValue> {
    js_sys::JSON::stringify(value).map(String::from)
}

fn from_js<T: DeserializeOwned>(value: &JsValue) -> Result<T, JsValue> {
    serde_json::from_str(&json_text(value)?).map_err(to_js_error)
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    let text = serde_json::to_string(value).map_err(to_js_error)?;
    js_sys::JSON::parse(&text)
}

fn to_js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_names() {
        assert_eq!(outcome_name(Outcome::Blocked), "blocked");
        assert_eq!(outcome_name(Outcome::Skipped(SkipReason::Stale)), "stale");
        assert_eq!(outcome_name(Outcome::Skipped(SkipReason::AlreadyProcessed)), "processed");
    }
}
