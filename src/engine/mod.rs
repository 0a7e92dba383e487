//! The per-page pagination engine
//!
//! Everything between "a rule matched this URL" and "the next page's
//! content is in the document": next-link resolution, content extraction,
//! insertion-point tracking, origin guarding, load scheduling, splicing,
//! and the session state machine tying them together.

pub mod appender;
pub mod extractor;
pub mod insertion;
pub mod next_link;
pub mod origin;
pub mod scheduler;
pub mod session;

pub use appender::PageAppender;
pub use extractor::ContentExtractor;
pub use insertion::InsertionTracker;
pub use next_link::NextLinkResolver;
pub use origin::SameOriginGuard;
pub use scheduler::{GeometryProvider, LoadScheduler, NoGeometry, ScrollMetrics};
pub use session::{Activity, Gating, Lifecycle, PaginationSession};
