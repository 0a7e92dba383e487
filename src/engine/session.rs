//! Pagination session state machine
//!
//! One session per document context orchestrates the whole engine: it
//! resolves the initial next link and insertion point, reacts to scroll
//! events, serializes fetches, splices fetched content, and reports every
//! state change through its subscribed event sinks. All failure is
//! communicated as status reports; nothing escapes the session boundary.
//!
//! Single-threaded and cooperative: the fetch is the only suspension
//! point, and `Activity::Loading` is the mutual-exclusion flag that keeps
//! loads strictly sequential.

use std::collections::HashSet;
use std::rc::Rc;

use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::domain::events::EventDispatcher;
use crate::domain::{EventSink, PagerOptions, PagerStatus, Rule};
use crate::engine::appender::PageAppender;
use crate::engine::extractor::ContentExtractor;
use crate::engine::insertion::InsertionTracker;
use crate::engine::next_link::NextLinkResolver;
use crate::engine::origin::SameOriginGuard;
use crate::engine::scheduler::{GeometryProvider, LoadScheduler, ScrollMetrics};
use crate::infrastructure::dom::{NodeHandle, PageDocument};
use crate::infrastructure::http_client::{FetchedPage, PageFetcher};

/// Where the session is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Started,
    Terminated,
}

/// Whether a fetch is in flight. Valid only while `Started`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Idle,
    Loading,
}

/// Whether the session may trigger loads. Independent of `Activity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gating {
    Enabled,
    Disabled,
}

/// Result of one load attempt, used to decide whether the scroll pump may
/// immediately evaluate another load.
enum LoadOutcome {
    Appended,
    Errored,
    Terminated,
}

/// The single mutable unit of the engine.
pub struct PaginationSession {
    id: Uuid,
    doc: Rc<PageDocument>,
    page_url: Url,
    options: PagerOptions,
    fetcher: Rc<dyn PageFetcher>,
    geometry: Rc<dyn GeometryProvider>,
    dispatcher: EventDispatcher,
    scheduler: LoadScheduler,

    lifecycle: Lifecycle,
    activity: Activity,
    gating: Gating,
    rule: Option<Rule>,
    loaded_urls: HashSet<String>,
    page_count: u32,
    next_url: Option<Url>,
    insert_point: Option<NodeHandle>,
    last_metrics: Option<ScrollMetrics>,
}

impl PaginationSession {
    pub fn new(
        doc: Rc<PageDocument>,
        page_url: Url,
        options: PagerOptions,
        fetcher: Rc<dyn PageFetcher>,
        geometry: Rc<dyn GeometryProvider>,
    ) -> Self {
        let scheduler = LoadScheduler::new(&options);
        Self {
            id: Uuid::new_v4(),
            doc,
            page_url,
            options,
            fetcher,
            geometry,
            dispatcher: EventDispatcher::default(),
            scheduler,
            lifecycle: Lifecycle::Uninitialized,
            activity: Activity::Idle,
            gating: Gating::Disabled,
            rule: None,
            loaded_urls: HashSet::new(),
            page_count: 0,
            next_url: None,
            insert_point: None,
            last_metrics: None,
        }
    }

    /// Register an observer for status and insertion notifications.
    pub fn subscribe(&mut self, sink: Rc<dyn EventSink>) {
        self.dispatcher.subscribe(sink);
    }

    /// Try to start the session with `rule`.
    ///
    /// Success requires both an initial next URL and an insertion point;
    /// failing either leaves the session `Uninitialized` so the caller may
    /// retry with a less specific rule. Starting an already started
    /// session is a successful no-op; a terminated session never restarts.
    pub fn start(&mut self, rule: Rule) -> bool {
        match self.lifecycle {
            Lifecycle::Started => return true,
            Lifecycle::Terminated => return false,
            Lifecycle::Uninitialized => {}
        }

        let root = self.doc.root();
        let Some(next_url) = NextLinkResolver::resolve(&self.doc, root, &rule, &self.page_url)
        else {
            debug!(session = %self.id, rule = rule.id, "no initial next link, not starting");
            return false;
        };
        let Some(insert_point) = InsertionTracker::compute_insertion_point(&self.doc, root, &rule)
        else {
            debug!(session = %self.id, rule = rule.id, "no insertion point, not starting");
            return false;
        };

        info!(session = %self.id, rule = rule.id, url = %self.page_url, "pagination session started");

        self.lifecycle = Lifecycle::Started;
        self.activity = Activity::Idle;
        self.rule = Some(rule);
        self.next_url = Some(next_url);
        self.insert_point = Some(insert_point);
        self.loaded_urls.clear();
        self.loaded_urls.insert(self.page_url.as_str().to_string());
        self.page_count = 1;

        if self.options.enabled {
            self.gating = Gating::Enabled;
            self.dispatcher.emit_status(PagerStatus::Enabled);
        } else {
            self.gating = Gating::Disabled;
            self.dispatcher.emit_status(PagerStatus::Disabled);
        }
        true
    }

    /// Permit loads and immediately re-evaluate the scroll trigger.
    pub async fn enable(&mut self) {
        if self.lifecycle != Lifecycle::Started {
            return;
        }
        self.gating = Gating::Enabled;
        self.dispatcher.emit_status(PagerStatus::Enabled);
        self.pump().await;
    }

    /// Forbid further loads. An in-flight fetch still completes.
    pub fn disable(&mut self) {
        if self.lifecycle != Lifecycle::Started {
            return;
        }
        self.gating = Gating::Disabled;
        self.dispatcher.emit_status(PagerStatus::Disabled);
    }

    /// Flip gating. No-op unless started.
    pub async fn toggle(&mut self) {
        if self.lifecycle != Lifecycle::Started {
            return;
        }
        match self.gating {
            Gating::Enabled => self.disable(),
            Gating::Disabled => self.enable().await,
        }
    }

    /// Scroll/resize entry point: remember the viewport snapshot and load
    /// as long as the trigger condition holds.
    pub async fn on_scroll(&mut self, metrics: ScrollMetrics) {
        self.last_metrics = Some(metrics);
        self.pump().await;
    }

    /// Tear the session down from outside (navigation-path change).
    pub fn shutdown(&mut self) {
        if self.lifecycle == Lifecycle::Started {
            self.terminate();
        }
    }

    async fn pump(&mut self) {
        loop {
            if self.lifecycle != Lifecycle::Started
                || self.gating != Gating::Enabled
                || self.activity != Activity::Idle
            {
                return;
            }
            let (Some(metrics), Some(point)) = (self.last_metrics, self.insert_point) else {
                return;
            };
            if !self
                .scheduler
                .should_load(&self.doc, point, self.geometry.as_ref(), &metrics)
            {
                return;
            }
            match self.load().await {
                LoadOutcome::Appended => continue,
                LoadOutcome::Errored | LoadOutcome::Terminated => return,
            }
        }
    }

    /// One load cycle: revalidate the insertion point, guard against
    /// missing/cyclic next URLs, fetch under the cadence floor, then
    /// append or report the error.
    async fn load(&mut self) -> LoadOutcome {
        let Some(rule) = self.rule.clone() else {
            self.terminate();
            return LoadOutcome::Terminated;
        };

        // The host page may have rewritten the tree under us; a lost
        // insertion point invalidates everything anchored to it.
        let attached = self
            .insert_point
            .map(|point| InsertionTracker::is_attached(&self.doc, point))
            .unwrap_or(false);
        if !attached {
            debug!(session = %self.id, "insertion point detached, recomputing");
            let Some(point) =
                InsertionTracker::compute_insertion_point(&self.doc, self.doc.root(), &rule)
            else {
                info!(session = %self.id, "insertion point lost for good, terminating");
                self.terminate();
                return LoadOutcome::Terminated;
            };
            self.insert_point = Some(point);
            self.loaded_urls.clear();
            self.loaded_urls.insert(self.page_url.as_str().to_string());
            self.page_count = 1;
        }

        let Some(next_url) = self.next_url.clone() else {
            self.terminate();
            return LoadOutcome::Terminated;
        };

        if self.loaded_urls.contains(next_url.as_str()) {
            info!(session = %self.id, url = %next_url, "next url already loaded, terminating");
            self.terminate();
            return LoadOutcome::Terminated;
        }
        self.loaded_urls.insert(next_url.as_str().to_string());

        self.activity = Activity::Loading;
        self.dispatcher.emit_status(PagerStatus::Loading);
        debug!(session = %self.id, url = %next_url, "loading next page");

        self.scheduler.throttle().await;
        let result = self.fetcher.fetch(&next_url).await;

        // A response for a session that terminated while the fetch was in
        // flight must be discarded, not spliced.
        if self.lifecycle != Lifecycle::Started {
            debug!(session = %self.id, url = %next_url, "discarding stale response");
            return LoadOutcome::Terminated;
        }

        match result {
            Ok(page) => {
                if SameOriginGuard::is_safe(&page, &self.page_url) {
                    self.append(&rule, page)
                } else {
                    warn!(session = %self.id, url = %next_url, "unsafe response rejected");
                    self.error();
                    LoadOutcome::Errored
                }
            }
            Err(e) => {
                warn!(session = %self.id, url = %next_url, error = %e, "fetch failed");
                self.error();
                LoadOutcome::Errored
            }
        }
    }

    /// Splice a fetched page before the insertion point and advance the
    /// session to the following next URL.
    fn append(&mut self, rule: &Rule, page: FetchedPage) -> LoadOutcome {
        let source_url = page.request_url.clone();
        let appender = PageAppender::new(&self.doc, &self.options);

        let staging = appender.stage(&page.body);
        let content = ContentExtractor::extract(&self.doc, staging, rule);
        if content.is_empty() {
            debug!(session = %self.id, url = %source_url, "fetched page has no content");
            appender.discard(staging);
            self.activity = Activity::Idle;
            self.terminate();
            return LoadOutcome::Terminated;
        }

        // Resolved against the still-intact staging subtree; splicing
        // moves the content nodes out of it.
        let upcoming = NextLinkResolver::resolve(&self.doc, staging, rule, &source_url);

        let Some(insert_point) = self.insert_point else {
            appender.discard(staging);
            self.activity = Activity::Idle;
            self.terminate();
            return LoadOutcome::Terminated;
        };

        self.page_count += 1;
        let inserted = appender.splice(insert_point, &content, self.page_count, &source_url);
        appender.discard(staging);

        for (parent, node) in &inserted {
            self.dispatcher.emit_inserted(*parent, *node, &source_url);
        }

        info!(
            session = %self.id,
            url = %source_url,
            nodes = inserted.len(),
            page = self.page_count,
            "page appended"
        );

        self.activity = Activity::Idle;
        match upcoming {
            None => {
                self.terminate();
                LoadOutcome::Terminated
            }
            Some(url) => {
                self.next_url = Some(url);
                let status = match self.gating {
                    Gating::Enabled => PagerStatus::Enabled,
                    Gating::Disabled => PagerStatus::Disabled,
                };
                self.dispatcher.emit_status(status);
                LoadOutcome::Appended
            }
        }
    }

    /// Fetch failure or unsafe-origin rejection: recoverable. The session
    /// returns to idle with gating untouched and retries on the next
    /// qualifying scroll event.
    fn error(&mut self) {
        self.activity = Activity::Idle;
        self.dispatcher.emit_status(PagerStatus::Error);
    }

    /// Terminal transition; a fresh `start()` elsewhere is a new session,
    /// never a resurrection of this one.
    fn terminate(&mut self) {
        info!(session = %self.id, pages = self.page_count, "pagination session terminated");
        self.dispatcher.emit_status(PagerStatus::Terminated);
        self.lifecycle = Lifecycle::Terminated;
        self.activity = Activity::Idle;
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn activity(&self) -> Activity {
        self.activity
    }

    pub fn gating(&self) -> Gating {
        self.gating
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn next_url(&self) -> Option<&Url> {
        self.next_url.as_ref()
    }

    pub fn page_url(&self) -> &Url {
        &self.page_url
    }

    pub fn document(&self) -> &Rc<PageDocument> {
        &self.doc
    }
}

impl std::fmt::Debug for PaginationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginationSession")
            .field("id", &self.id)
            .field("lifecycle", &self.lifecycle)
            .field("activity", &self.activity)
            .field("gating", &self.gating)
            .field("page_count", &self.page_count)
            .field("next_url", &self.next_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::scheduler::NoGeometry;
    use crate::infrastructure::http_client::FetchError;
    use async_trait::async_trait;
    use std::cell::RefCell;

    const PAGE_ONE: &str = r#"<html><body>
        <div id="list">
            <div class="entry">one</div>
            <div class="entry">two</div>
        </div>
        <a class="next" href="/list?page=2">next</a>
    </body></html>"#;

    fn rule() -> Rule {
        Rule {
            url_pattern: "^https?://.".to_string(),
            next_link_query: "a.next".to_string(),
            page_element_query: "div.entry".to_string(),
            insert_before_query: None,
            id: 1,
        }
    }

    fn page_url() -> Url {
        Url::parse("https://example.com/list").unwrap()
    }

    struct StubFetcher {
        responses: RefCell<Vec<Result<FetchedPage, FetchError>>>,
    }

    impl StubFetcher {
        fn with_bodies(bodies: Vec<&str>) -> Self {
            let responses = bodies
                .into_iter()
                .map(|body| {
                    Ok(FetchedPage {
                        request_url: page_url(),
                        final_url: page_url(),
                        cross_origin_allow: None,
                        body: body.to_string(),
                    })
                })
                .collect();
            Self {
                responses: RefCell::new(responses),
            }
        }
    }

    #[async_trait(?Send)]
    impl PageFetcher for StubFetcher {
        async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
            let mut responses = self.responses.borrow_mut();
            assert!(!responses.is_empty(), "unexpected fetch of {url}");
            responses.remove(0).map(|mut page| {
                page.request_url = url.clone();
                page
            })
        }
    }

    fn session_with(fetcher: StubFetcher, html: &str) -> PaginationSession {
        PaginationSession::new(
            Rc::new(PageDocument::parse(html)),
            page_url(),
            PagerOptions {
                min_request_interval_ms: 0,
                ..PagerOptions::default()
            },
            Rc::new(fetcher),
            Rc::new(NoGeometry),
        )
    }

    #[test]
    fn start_requires_next_link_and_content() {
        let mut session = session_with(
            StubFetcher::with_bodies(vec![]),
            "<html><body><p>no pagination</p></body></html>",
        );
        assert!(!session.start(rule()));
        assert_eq!(session.lifecycle(), Lifecycle::Uninitialized);
    }

    #[test]
    fn start_seeds_state_and_is_idempotent() {
        let mut session = session_with(StubFetcher::with_bodies(vec![]), PAGE_ONE);
        assert!(session.start(rule()));
        assert_eq!(session.lifecycle(), Lifecycle::Started);
        assert_eq!(session.gating(), Gating::Enabled);
        assert_eq!(session.page_count(), 1);
        assert_eq!(
            session.next_url().map(Url::as_str),
            Some("https://example.com/list?page=2")
        );

        // Second start is a successful no-op.
        assert!(session.start(rule()));
        assert_eq!(session.page_count(), 1);
    }

    #[test]
    fn options_can_start_sessions_disabled() {
        let mut session = PaginationSession::new(
            Rc::new(PageDocument::parse(PAGE_ONE)),
            page_url(),
            PagerOptions {
                enabled: false,
                min_request_interval_ms: 0,
                ..PagerOptions::default()
            },
            Rc::new(StubFetcher::with_bodies(vec![])),
            Rc::new(NoGeometry),
        );
        assert!(session.start(rule()));
        assert_eq!(session.gating(), Gating::Disabled);
    }

    #[tokio::test]
    async fn scroll_far_from_bottom_does_not_load() {
        let mut session = session_with(StubFetcher::with_bodies(vec![]), PAGE_ONE);
        assert!(session.start(rule()));

        // Heuristic remain = 0.2 * 10000 + 400 = 2400; distance = 5000.
        session
            .on_scroll(ScrollMetrics {
                scroll_y: 1000.0,
                viewport_height: 4000.0,
                scroll_height: 10000.0,
            })
            .await;

        assert_eq!(session.activity(), Activity::Idle);
        assert_eq!(session.page_count(), 1);
    }

    #[tokio::test]
    async fn toggle_flips_gating_only_while_started() {
        let mut session = session_with(StubFetcher::with_bodies(vec![]), PAGE_ONE);
        session.toggle().await;
        assert_eq!(session.lifecycle(), Lifecycle::Uninitialized);

        assert!(session.start(rule()));
        session.toggle().await;
        assert_eq!(session.gating(), Gating::Disabled);
        session.toggle().await;
        assert_eq!(session.gating(), Gating::Enabled);
    }

    #[tokio::test]
    async fn detached_insert_point_is_recomputed_before_loading() {
        let fetcher = StubFetcher::with_bodies(vec![
            "<div class=\"entry\">three</div>", // no next link: terminates after append
        ]);
        let mut session = session_with(fetcher, PAGE_ONE);
        assert!(session.start(rule()));

        // Simulate the host page removing the node after the last entry,
        // which is exactly where the insertion point was computed.
        let doc = session.document().clone();
        let entries = doc.query_all(doc.root(), "div.entry");
        if let Some(point) = doc.next_sibling(entries[1]) {
            doc.detach(point);
        }

        session
            .on_scroll(ScrollMetrics {
                scroll_y: 900.0,
                viewport_height: 600.0,
                scroll_height: 1000.0,
            })
            .await;

        // Recovery happened: the fetched page was spliced and counted from
        // the fresh anchor.
        assert_eq!(session.page_count(), 2);
        assert_eq!(session.lifecycle(), Lifecycle::Terminated);
        assert_eq!(doc.query_all(doc.root(), "div.entry").len(), 3);
    }

    #[tokio::test]
    async fn empty_fetched_page_terminates() {
        let fetcher = StubFetcher::with_bodies(vec!["<p>nothing matching</p>"]);
        let mut session = session_with(fetcher, PAGE_ONE);
        assert!(session.start(rule()));

        session
            .on_scroll(ScrollMetrics {
                scroll_y: 900.0,
                viewport_height: 600.0,
                scroll_height: 1000.0,
            })
            .await;

        assert_eq!(session.lifecycle(), Lifecycle::Terminated);
        assert_eq!(session.page_count(), 1);
    }
}
