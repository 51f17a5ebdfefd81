//! Enforcement session
//!
//! Per-page state around the stateless [`Matcher`]: the current host and
//! its rule snapshot, the detection/enforcement mode, identity sets of
//! blocked, processed and detected elements, and the staggered detection
//! scan.
//!
//! The session never touches the page. Callers apply the outcomes (hide an
//! element, add the detected marker) and feed elements back in as the
//! document changes.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

use crate::dom::ElementView;
use crate::matcher::Matcher;
use crate::miner::is_internal_class;
use crate::types::{Rule, SiteRuleSet};

/// Delay before the first scheduled analysis.
pub const SCAN_BASE_DELAY_MS: u32 = 10;
/// Extra delay per scheduled element.
pub const SCAN_STEP_DELAY_MS: u32 = 2;

/// Stable identity of an element for the session's bookkeeping.
pub trait NodeIdentity {
    type Key: Hash + Eq + Clone;

    fn identity(&self) -> Self::Key;
}

// =============================================================================
// Scan queue
// =============================================================================

/// One scheduled analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanTask<T> {
    pub item: T,
    /// Delay from scan start, in milliseconds
    pub delay_ms: u32,
    /// Session generation the task was scheduled in
    pub generation: u64,
}

/// Analyses scheduled by one detection scan, in firing order.
#[derive(Debug, Clone)]
pub struct ScanQueue<T> {
    tasks: VecDeque<ScanTask<T>>,
    generation: u64,
}

impl<T> ScanQueue<T> {
    pub fn new(generation: u64) -> Self {
        Self {
            tasks: VecDeque::new(),
            generation,
        }
    }

    /// Schedule `item` after everything already queued.
    pub fn push(&mut self, item: T) {
        let delay_ms = SCAN_BASE_DELAY_MS + SCAN_STEP_DELAY_MS * self.tasks.len() as u32;
        self.tasks.push_back(ScanTask {
            item,
            delay_ms,
            generation: self.generation,
        });
    }

    pub fn pop(&mut self) -> Option<ScanTask<T>> {
        self.tasks.pop_front()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScanTask<T>> {
        self.tasks.iter()
    }
}

impl<T> IntoIterator for ScanQueue<T> {
    type Item = ScanTask<T>;
    type IntoIter = std::collections::vec_deque::IntoIter<ScanTask<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.into_iter()
    }
}

// =============================================================================
// Session
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Hide elements matching the site's rules
    Enforce,
    /// Flag popup-shaped elements so the user can derive rules from them
    Detect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Detached,
    Critical,
    AlreadyProcessed,
    /// Scheduled by a detection scan that has since ended
    Stale,
}

/// What the session decided for one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Skipped(SkipReason),
    /// Matched a rule; the caller hides it
    Blocked,
    /// No rule matched; the caller shows it
    Allowed,
    /// Popup-shaped in detection mode; the caller marks it
    Detected,
    /// Not popup-shaped in detection mode
    Ignored,
}

/// Per-page blocking state.
#[derive(Debug)]
pub struct Session<K> {
    host: String,
    site: Option<SiteRuleSet>,
    matcher: Matcher,
    mode: Mode,
    generation: u64,
    blocked: HashSet<K>,
    processed: HashSet<K>,
    detected: HashSet<K>,
    blocked_count: usize,
}

impl<K: Hash + Eq + Clone> Session<K> {
    /// `site` is the store entry for `host`, if any.
    pub fn new(host: impl Into<String>, site: Option<SiteRuleSet>, matcher: Matcher) -> Self {
        Self {
            host: host.into(),
            site,
            matcher,
            mode: Mode::Enforce,
            generation: 0,
            blocked: HashSet::new(),
            processed: HashSet::new(),
            detected: HashSet::new(),
            blocked_count: 0,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Blocking runs only for hosts listed and enabled in the store.
    pub fn is_active(&self) -> bool {
        self.site.as_ref().is_some_and(|site| site.enabled)
    }

    pub fn rules(&self) -> &[Rule] {
        match &self.site {
            Some(site) => &site.rules,
            None => &[],
        }
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked_count
    }

    pub fn is_blocked<E: NodeIdentity<Key = K>>(&self, element: &E) -> bool {
        self.blocked.contains(&element.identity())
    }

    pub fn is_detected<E: NodeIdentity<Key = K>>(&self, element: &E) -> bool {
        self.detected.contains(&element.identity())
    }

    /// Analyze an element once. Repeated calls for the same element are
    /// skipped until the rules are replaced.
    pub fn analyze<E>(&mut self, element: &E) -> Outcome
    where
        E: ElementView + NodeIdentity<Key = K>,
    {
        if !element.is_connected() {
            return Outcome::Skipped(SkipReason::Detached);
        }
        if self.matcher.is_critical(element).is_critical() {
            return Outcome::Skipped(SkipReason::Critical);
        }

        let key = element.identity();
        if !self.processed.insert(key.clone()) {
            return Outcome::Skipped(SkipReason::AlreadyProcessed);
        }

        match self.mode {
            Mode::Detect => {
                if self.matcher.is_popup_shaped(element) {
                    if self.detected.insert(key) {
                        log::debug!("detected popup: {}", element.tag_name());
                    }
                    Outcome::Detected
                } else {
                    Outcome::Ignored
                }
            }
            Mode::Enforce => {
                if self.enforce(element, key) {
                    Outcome::Blocked
                } else {
                    Outcome::Allowed
                }
            }
        }
    }

    /// React to an element inserted into the document. Returns whether it
    /// was newly blocked.
    pub fn on_element_added<E>(&mut self, element: &E) -> bool
    where
        E: ElementView + NodeIdentity<Key = K>,
    {
        if !element.is_connected() || self.matcher.is_critical(element).is_critical() {
            return false;
        }
        let key = element.identity();
        self.enforce(element, key)
    }

    /// React to an attribute change. Class changes that only toggled the
    /// extension's own markers are ignored.
    pub fn on_mutation<E>(&mut self, element: &E, class_changed: bool) -> bool
    where
        E: ElementView + NodeIdentity<Key = K>,
    {
        if class_changed && element.class_list().iter().any(|class| is_internal_class(class)) {
            log::trace!("ignoring marker class change");
            return false;
        }
        self.on_element_added(element)
    }

    /// Check every element already in the document. Returns how many were
    /// newly blocked.
    pub fn check_existing<E, I>(&mut self, elements: I) -> usize
    where
        E: ElementView + NodeIdentity<Key = K>,
        I: IntoIterator<Item = E>,
    {
        if !self.is_active() || !self.rules().iter().any(|rule| rule.enabled) {
            log::debug!("no enabled rules for {}", self.host);
            return 0;
        }

        let mut newly_blocked = 0;
        for element in elements {
            if self.on_element_added(&element) {
                newly_blocked += 1;
            }
        }
        log::debug!("blocked {newly_blocked} existing elements on {}", self.host);
        newly_blocked
    }

    /// Enter detection mode and schedule every non-critical element for
    /// analysis.
    pub fn start_detection<E, I>(&mut self, elements: I) -> ScanQueue<E>
    where
        E: ElementView + NodeIdentity<Key = K>,
        I: IntoIterator<Item = E>,
    {
        self.mode = Mode::Detect;
        self.generation += 1;
        self.detected.clear();

        let mut queue = ScanQueue::new(self.generation);
        for element in elements {
            if element.is_connected() && !self.matcher.is_critical(&element).is_critical() {
                queue.push(element);
            }
        }
        log::debug!("scheduled {} elements for detection", queue.len());
        queue
    }

    /// Leave detection mode. Returns the identities whose marker should be
    /// removed. Tasks still queued become no-ops.
    pub fn stop_detection(&mut self) -> Vec<K> {
        self.mode = Mode::Enforce;
        self.generation += 1;
        self.detected.drain().collect()
    }

    /// Run a scheduled analysis, unless its scan has ended.
    pub fn run_task<E>(&mut self, task: &ScanTask<E>) -> Outcome
    where
        E: ElementView + NodeIdentity<Key = K>,
    {
        if task.generation != self.generation || self.mode != Mode::Detect {
            return Outcome::Skipped(SkipReason::Stale);
        }
        self.analyze(&task.item)
    }

    /// Forget that an element is blocked. Returns whether it was.
    pub fn unblock<E: NodeIdentity<Key = K>>(&mut self, element: &E) -> bool {
        self.blocked.remove(&element.identity())
    }

    /// Swap in a new rule snapshot. All identity sets are cleared and
    /// detection stops.
    pub fn replace_rules(&mut self, site: Option<SiteRuleSet>) {
        self.site = site;
        self.blocked.clear();
        self.processed.clear();
        self.stop_detection();
    }

    fn enforce<E>(&mut self, element: &E, key: K) -> bool
    where
        E: ElementView,
    {
        let Some(site) = self.site.as_ref().filter(|site| site.enabled) else {
            return false;
        };
        if !self.matcher.matches(element, &site.rules) {
            return false;
        }
        if self.blocked.insert(key) {
            self.blocked_count += 1;
            true
        } else {
            false
        }
    }
}


#[cfg(all(test, feature = "page"))]
mod page_tests {
    use super::*;
    use crate::dom::Viewport;
    use crate::page::PageSnapshot;
    use crate::types::Condition;

    const HTML: &str = r#"
        <div id="promo" class="overlay" style="position: fixed; z-index: 1000; width: 50vw; height: 300px">Sale</div>
        <div id="card" class="card">Article</div>
        <div id="app-shell" class="overlay" style="position: fixed; z-index: 1000; inset: 0"></div>
    "#;

    fn page() -> PageSnapshot {
        PageSnapshot::parse(HTML).with_viewport(Viewport::new(1000.0, 800.0))
    }

    fn site(enabled: bool) -> SiteRuleSet {
        SiteRuleSet {
            enabled,
            rules: vec![Rule::new(
                "Class + Popup",
                vec![Condition::class("overlay"), Condition::is_popup()],
            )],
        }
    }

    fn session(site: Option<SiteRuleSet>) -> Session<Vec<usize>> {
        Session::new("example.com", site, Matcher::default())
    }

    #[test]
    fn test_activation_requires_enabled_entry() {
        assert!(!session(None).is_active());
        assert!(!session(Some(site(false))).is_active());
        assert!(session(Some(site(true))).is_active());
    }

    #[test]
    fn test_analyze_blocks_once() {
        let page = page();
        let mut session = session(Some(site(true)));
        let promo = page.select_first("#promo").unwrap();
        let card = page.select_first("#card").unwrap();

        assert_eq!(session.analyze(&promo), Outcome::Blocked);
        assert_eq!(session.analyze(&promo), Outcome::Skipped(SkipReason::AlreadyProcessed));
        assert_eq!(session.analyze(&card), Outcome::Allowed);
        assert!(session.is_blocked(&promo));
        assert_eq!(session.blocked_count(), 1);
    }

    #[test]
    fn test_critical_elements_are_skipped() {
        let page = page();
        let mut session = session(Some(site(true)));
        let shell = page.select_first("#app-shell").unwrap();
        assert_eq!(session.analyze(&shell), Outcome::Skipped(SkipReason::Critical));
        assert!(!session.on_element_added(&shell));
    }

    #[test]
    fn test_disabled_site_blocks_nothing() {
        let page = page();
        let mut session = session(Some(site(false)));
        assert_eq!(session.check_existing(page.elements()), 0);
        assert_eq!(session.analyze(&page.select_first("#promo").unwrap()), Outcome::Allowed);
    }

    #[test]
    fn test_check_existing_counts_new_blocks() {
        let page = page();
        let mut session = session(Some(site(true)));
        assert_eq!(session.check_existing(page.elements()), 1);
        assert_eq!(session.check_existing(page.elements()), 0);
        assert_eq!(session.blocked_count(), 1);

        let promo = page.select_first("#promo").unwrap();
        assert!(session.unblock(&promo));
        assert!(!session.unblock(&promo));
        assert!(session.on_mutation(&promo, false));
        assert_eq!(session.blocked_count(), 2);
    }

    #[test]
    fn test_marker_class_changes_are_ignored() {
        let page = PageSnapshot::parse(
            r#"<div class="overlay popup-blocker-analyzing" style="position: fixed; z-index: 5; width: 90vw"></div>"#,
        );
        let mut session = session(Some(site(true)));
        let element = page.select_first("div").unwrap();
        assert!(!session.on_mutation(&element, true));
        assert!(session.on_mutation(&element, false));
    }

    #[test]
    fn test_detection_scan() {
        let page = page();
        let mut session = session(Some(site(true)));
        let queue = session.start_detection(page.elements());
        assert_eq!(session.mode(), Mode::Detect);
        // html, head and body are critical, as is the app shell
        assert_eq!(queue.len(), 2);

        let outcomes: Vec<Outcome> = queue.iter().map(|task| session.run_task(task)).collect();
        assert_eq!(outcomes, vec![Outcome::Detected, Outcome::Ignored]);
        assert!(session.is_detected(&page.select_first("#promo").unwrap()));
        assert_eq!(session.blocked_count(), 0);
    }

    #[test]
    fn test_stopped_scan_tasks_are_stale() {
        let page = page();
        let mut session = session(Some(site(true)));
        let queue = session.start_detection(page.elements());
        let task = queue.iter().next().unwrap().clone();

        let cleared = session.stop_detection();
        assert!(cleared.is_empty());
        assert_eq!(session.run_task(&task), Outcome::Skipped(SkipReason::Stale));

        // a new scan invalidates the previous one as well
        let old = session.start_detection(page.elements());
        let _new = session.start_detection(page.elements());
        let task = old.iter().next().unwrap();
        assert_eq!(session.run_task(task), Outcome::Skipped(SkipReason::Stale));
    }

    #[test]
    fn test_replace_rules_resets_state() {
        let page = page();
        let mut session = session(Some(site(true)));
        let promo = page.select_first("#promo").unwrap();
        assert_eq!(session.analyze(&promo), Outcome::Blocked);
        session.start_detection(page.elements());

        session.replace_rules(Some(SiteRuleSet::new(true)));
        assert_eq!(session.mode(), Mode::Enforce);
        assert!(!session.is_blocked(&promo));
        assert_eq!(session.analyze(&promo), Outcome::Allowed);
    }
}
