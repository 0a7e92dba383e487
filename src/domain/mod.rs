//! Core domain types for the pagination engine
//!
//! Contains the site rule model, user options, and the event types
//! emitted by a running pagination session.

pub mod events;
pub mod options;
pub mod rule;

pub use events::{EventSink, PagerEvent, PagerStatus};
pub use options::PagerOptions;
pub use rule::{Rule, RuleMatcher};
