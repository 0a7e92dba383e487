//! Match-and-start orchestration for one document context
//!
//! The controller owns at most one live session. On attach it snapshots
//! the options, walks the ranked rules for the current URL, and starts the
//! first one the engine accepts. A detected URL-path change tears the
//! session down so the host can re-attach against the fresh document;
//! pagination state never survives a path change.

use std::rc::Rc;

use tracing::{debug, info};
use url::Url;

use crate::domain::{EventSink, PagerOptions, Rule, RuleMatcher};
use crate::engine::scheduler::{GeometryProvider, ScrollMetrics};
use crate::engine::session::PaginationSession;
use crate::infrastructure::dom::{NodeHandle, PageDocument};
use crate::infrastructure::http_client::PageFetcher;

/// Supplies the ranked rule list for a URL (longest pattern first).
pub trait RuleProvider {
    fn lookup_rules(&self, url: &Url) -> Vec<Rule>;
}

/// Supplies the option snapshot read at session start.
pub trait OptionsProvider {
    fn options(&self) -> PagerOptions;
}

impl OptionsProvider for PagerOptions {
    fn options(&self) -> PagerOptions {
        self.clone()
    }
}

/// In-memory rule provider: sorts by pattern length (specificity
/// tie-break) and appends the microformats fallback, the way the external
/// catalog prepares its list.
#[derive(Debug, Clone, Default)]
pub struct StaticRuleProvider {
    rules: Vec<Rule>,
}

impl StaticRuleProvider {
    pub fn new(mut rules: Vec<Rule>) -> Self {
        rules.sort_by(|a, b| b.url_pattern.len().cmp(&a.url_pattern.len()));
        rules.push(Rule::microformats_fallback());
        Self { rules }
    }
}

impl RuleProvider for StaticRuleProvider {
    fn lookup_rules(&self, _url: &Url) -> Vec<Rule> {
        self.rules.clone()
    }
}

/// Event sink that rewrites link targets on spliced content, sending
/// followed links to the configured window instead of replacing the
/// auto-extended page.
pub struct TargetWindowRewriter {
    doc: Rc<PageDocument>,
    window_name: String,
}

impl TargetWindowRewriter {
    pub fn new(doc: Rc<PageDocument>, window_name: impl Into<String>) -> Self {
        Self {
            doc,
            window_name: window_name.into(),
        }
    }
}

impl EventSink for TargetWindowRewriter {
    fn node_inserted(&self, _parent: NodeHandle, node: NodeHandle, _source_url: &Url) {
        let mut anchors = self.doc.query_all(node, "a");
        if self.doc.node_name(node).as_deref() == Some("a") {
            anchors.insert(0, node);
        }
        for anchor in anchors {
            let Some(href) = self.doc.attr(anchor, "href") else {
                continue;
            };
            if href.is_empty() || href.starts_with("javascript:") || href.starts_with('#') {
                continue;
            }
            if self.doc.attr(anchor, "target").is_none() {
                self.doc.set_attr(anchor, "target", &self.window_name);
            }
        }
    }
}

/// Drives sessions for a host document.
pub struct PagerController {
    rules: Rc<dyn RuleProvider>,
    options: Rc<dyn OptionsProvider>,
    fetcher: Rc<dyn PageFetcher>,
    geometry: Rc<dyn GeometryProvider>,
    sinks: Vec<Rc<dyn EventSink>>,
    matcher: RuleMatcher,
    session: Option<PaginationSession>,
    remembered_path: Option<String>,
    detect_url_change: bool,
}

impl PagerController {
    pub fn new(
        rules: Rc<dyn RuleProvider>,
        options: Rc<dyn OptionsProvider>,
        fetcher: Rc<dyn PageFetcher>,
        geometry: Rc<dyn GeometryProvider>,
    ) -> Self {
        Self {
            rules,
            options,
            fetcher,
            geometry,
            sinks: Vec::new(),
            matcher: RuleMatcher::new(),
            session: None,
            remembered_path: None,
            detect_url_change: true,
        }
    }

    /// Sink registered on every session this controller creates.
    pub fn subscribe(&mut self, sink: Rc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// Run the match-and-start cycle for `doc` at `url`. Tries each
    /// matching rule in provider order until one starts; returns whether a
    /// session is now live.
    pub fn attach(&mut self, doc: Rc<PageDocument>, url: Url) -> bool {
        self.teardown();

        let options = self.options.options();
        self.detect_url_change = options.detect_url_change;
        self.remembered_path = Some(Self::path_and_query(&url));

        let rules = self.rules.lookup_rules(&url);
        let mut session = PaginationSession::new(
            doc.clone(),
            url.clone(),
            options.clone(),
            self.fetcher.clone(),
            self.geometry.clone(),
        );
        for sink in &self.sinks {
            session.subscribe(sink.clone());
        }
        if let Some(window_name) = &options.target_window_name {
            session.subscribe(Rc::new(TargetWindowRewriter::new(doc, window_name.clone())));
        }

        for rule in self.matcher.matching(&url, &rules) {
            if session.start(rule.clone()) {
                info!(session = %session.id(), rule = rule.id, %url, "controller attached");
                self.session = Some(session);
                return true;
            }
            debug!(rule = rule.id, "rule matched but did not start, trying next");
        }
        false
    }

    /// Forward a scroll/resize snapshot to the live session.
    pub async fn on_scroll(&mut self, metrics: ScrollMetrics) {
        if let Some(session) = &mut self.session {
            session.on_scroll(metrics).await;
        }
    }

    /// Inbound toggle command: flips gating when a session is started.
    pub async fn toggle(&mut self) {
        if let Some(session) = &mut self.session {
            session.toggle().await;
        }
    }

    /// Compare the URL's path+query against the remembered value. On a
    /// change the session is torn down and `true` returned; the host then
    /// re-attaches with the freshly navigated document.
    pub fn poll_url_change(&mut self, current: &Url) -> bool {
        if !self.detect_url_change {
            return false;
        }
        let path = Self::path_and_query(current);
        match &self.remembered_path {
            Some(remembered) if *remembered == path => false,
            None => {
                self.remembered_path = Some(path);
                false
            }
            Some(_) => {
                info!(%current, "url path changed, tearing session down");
                self.remembered_path = Some(path);
                self.teardown();
                true
            }
        }
    }

    /// Drop the live session, terminating it if still running.
    pub fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.shutdown();
        }
    }

    pub fn session(&self) -> Option<&PaginationSession> {
        self.session.as_ref()
    }

    fn path_and_query(url: &Url) -> String {
        match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        }
    }
}
