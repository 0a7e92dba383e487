//! Insertion point computation and validation
//!
//! The insertion point is the live-document node immediately before which
//! new page content is spliced. It is held as a weak handle: the page's
//! own scripts may rewrite the tree at any time, so attachment is
//! re-checked before every load and the point recomputed when lost.

use crate::domain::Rule;
use crate::engine::extractor::ContentExtractor;
use crate::infrastructure::dom::{NodeHandle, PageDocument};

#[derive(Debug, Default, Clone, Copy)]
pub struct InsertionTracker;

impl InsertionTracker {
    /// Compute the splice target for `rule` within `scope`.
    ///
    /// A rule may name the point directly via its insert-before query;
    /// otherwise it is the sibling immediately following the last content
    /// node, or a fresh placeholder appended to that node's parent when no
    /// such sibling exists. Returns `None` when the page has no content
    /// nodes at all.
    pub fn compute_insertion_point(
        doc: &PageDocument,
        scope: NodeHandle,
        rule: &Rule,
    ) -> Option<NodeHandle> {
        if let Some(query) = &rule.insert_before_query {
            if let Some(point) = doc.query_first(scope, query) {
                return Some(point);
            }
        }

        let elements = ContentExtractor::extract(doc, scope, rule);
        let last = *elements.last()?;

        if let Some(sibling) = doc.next_sibling(last) {
            return Some(sibling);
        }

        let parent = doc.parent(last)?;
        let placeholder = doc.create_element("span");
        doc.append_child(parent, placeholder);
        Some(placeholder)
    }

    /// Whether `point` still hangs off the document root.
    pub fn is_attached(doc: &PageDocument, point: NodeHandle) -> bool {
        doc.is_attached(point)
    }
}
