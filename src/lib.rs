//! Pagerize - auto-pagination engine for paginated web content
//!
//! Detects a "next page" affordance on the current page using a
//! site-matched rule, fetches that next page, splices its relevant content
//! into the current view, and repeats until no further page is found or a
//! terminal condition is hit.
//!
//! The engine is document-model agnostic: queries and splices go through
//! [`infrastructure::dom::PageDocument`], fetching through the
//! [`infrastructure::http_client::PageFetcher`] trait, and viewport
//! geometry through [`engine::scheduler::GeometryProvider`], so hosts
//! range from a real browser bridge to an in-memory test fixture.

pub mod application;
pub mod domain;
pub mod engine;
pub mod infrastructure;

pub use application::{OptionsProvider, PagerController, RuleProvider, StaticRuleProvider};
pub use domain::{EventSink, PagerEvent, PagerOptions, PagerStatus, Rule, RuleMatcher};
pub use engine::{
    Activity, Gating, GeometryProvider, Lifecycle, NoGeometry, PaginationSession, ScrollMetrics,
};
pub use infrastructure::{
    ConfigManager, FetchError, FetchedPage, HttpPageFetcher, NodeHandle, PageDocument, PageFetcher,
};
