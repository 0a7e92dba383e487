//! Content extraction from a document subtree

use crate::domain::Rule;
use crate::infrastructure::dom::{NodeHandle, PageDocument};

/// Extracts the ordered content nodes a rule describes.
///
/// An empty result is a valid, meaningful outcome: the page has no
/// extractable content, which the session treats as a terminal condition.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentExtractor;

impl ContentExtractor {
    /// Ordered matches of the rule's page-element query under `scope`.
    pub fn extract(doc: &PageDocument, scope: NodeHandle, rule: &Rule) -> Vec<NodeHandle> {
        doc.query_all(scope, &rule.page_element_query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> Rule {
        Rule {
            url_pattern: "^https?://.".to_string(),
            next_link_query: "a.next".to_string(),
            page_element_query: "div.entry".to_string(),
            insert_before_query: None,
            id: 1,
        }
    }

    #[test]
    fn extraction_is_ordered_and_idempotent() {
        let doc = PageDocument::parse(
            "<html><body><div class=\"entry\">a</div><p>x</p><div class=\"entry\">b</div></body></html>",
        );

        let first = ContentExtractor::extract(&doc, doc.root(), &rule());
        let second = ContentExtractor::extract(&doc, doc.root(), &rule());

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(doc.text(first[0]), "a");
        assert_eq!(doc.text(first[1]), "b");
    }

    #[test]
    fn no_content_is_an_empty_result() {
        let doc = PageDocument::parse("<html><body><p>nothing here</p></body></html>");
        assert!(ContentExtractor::extract(&doc, doc.root(), &rule()).is_empty());
    }
}
