//! Load scheduling: scroll-proximity triggering and request cadence
//!
//! Decides when the scroll position is close enough to the insertion point
//! to warrant fetching the next page, and enforces a floor on the interval
//! between consecutive requests.
//!
//! The crate has no layout engine, so node geometry is a host capability:
//! a [`GeometryProvider`] maps a node to the absolute bottom edge of its
//! box when the host can compute one. Hosts without layout information use
//! [`NoGeometry`] and get the 80%-of-scroll-height heuristic.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::domain::PagerOptions;
use crate::infrastructure::dom::{NodeHandle, PageDocument};

/// Snapshot of the host viewport at the time of a scroll/resize event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    /// Current vertical scroll offset
    pub scroll_y: f64,
    /// Height of the visible viewport
    pub viewport_height: f64,
    /// Total scrollable height of the document
    pub scroll_height: f64,
}

/// Host-supplied node geometry.
pub trait GeometryProvider {
    /// Absolute bottom edge of the node's box, when the host can lay it
    /// out. `None` for nodes without geometry (text nodes, detached or
    /// display-none subtrees, or hosts without a renderer).
    fn bottom_of(&self, node: NodeHandle) -> Option<f64>;
}

/// Geometry provider for hosts without layout information.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGeometry;

impl GeometryProvider for NoGeometry {
    fn bottom_of(&self, _node: NodeHandle) -> Option<f64> {
        None
    }
}

/// Fraction of the scrollable height assumed already consumed when no
/// geometry is available for the insertion point or its surroundings.
const HEURISTIC_BOTTOM_FRACTION: f64 = 0.8;

/// Rate-limits and triggers fetch attempts based on scroll proximity to
/// the insertion point.
#[derive(Debug)]
pub struct LoadScheduler {
    base_remain_height: f64,
    min_request_interval: Duration,
    last_load_at: Option<Instant>,
}

impl LoadScheduler {
    pub fn new(options: &PagerOptions) -> Self {
        Self {
            base_remain_height: options.base_remain_height,
            min_request_interval: Duration::from_millis(options.min_request_interval_ms),
            last_load_at: None,
        }
    }

    /// Whether the current scroll position qualifies for loading the next
    /// page: the distance to the document bottom has shrunk below the
    /// remaining height of content after the insertion point.
    pub fn should_load(
        &self,
        doc: &PageDocument,
        insert_point: NodeHandle,
        geometry: &dyn GeometryProvider,
        metrics: &ScrollMetrics,
    ) -> bool {
        let remain = self.remaining_height(doc, insert_point, geometry, metrics);
        metrics.scroll_height - metrics.viewport_height - metrics.scroll_y < remain
    }

    fn remaining_height(
        &self,
        doc: &PageDocument,
        insert_point: NodeHandle,
        geometry: &dyn GeometryProvider,
        metrics: &ScrollMetrics,
    ) -> f64 {
        let bottom = self
            .point_bottom(doc, insert_point, geometry)
            .unwrap_or_else(|| (metrics.scroll_height * HEURISTIC_BOTTOM_FRACTION).round());
        metrics.scroll_height - bottom + self.base_remain_height
    }

    /// Bottom edge of the insertion point: its own geometry if available,
    /// else the first following sibling with geometry, else its parent's.
    fn point_bottom(
        &self,
        doc: &PageDocument,
        insert_point: NodeHandle,
        geometry: &dyn GeometryProvider,
    ) -> Option<f64> {
        let mut candidate = Some(insert_point);
        while let Some(node) = candidate {
            if let Some(bottom) = geometry.bottom_of(node) {
                return Some(bottom);
            }
            candidate = doc.next_sibling(node);
        }
        doc.parent(insert_point)
            .and_then(|parent| geometry.bottom_of(parent))
    }

    /// Enforce the request cadence floor, then stamp the load time.
    ///
    /// Sleeps for whatever remains of the minimum interval since the
    /// previous load; the stamp is taken after the delay, so consecutive
    /// stamps are at least the interval apart.
    pub async fn throttle(&mut self) {
        if let Some(last) = self.last_load_at {
            let elapsed = last.elapsed();
            if elapsed < self.min_request_interval {
                let wait = self.min_request_interval - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "holding for request cadence");
                sleep(wait).await;
            }
        }
        self.last_load_at = Some(Instant::now());
    }

    /// Timestamp of the most recent load, if any.
    pub fn last_load_at(&self) -> Option<Instant> {
        self.last_load_at
    }
}
