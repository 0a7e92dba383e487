//! Content splicing into the live document
//!
//! Stages a fetched page inside the live document's arena, sanitizes it,
//! and splices the extracted content ahead of the insertion point together
//! with a page-break marker. Structurally special containers get adapted
//! wrappers: table bodies receive the marker inside a full-width row, lists
//! inside a list item.

use tracing::debug;
use url::Url;

use crate::domain::PagerOptions;
use crate::infrastructure::dom::{NodeHandle, PageDocument};

/// Class names carried by the spliced separator/marker nodes. These are
/// the long-standing names user styles and scripts key off.
const PAGE_INFO_CLASS: &str = "autopagerize_page_info";
const PAGE_LINK_CLASS: &str = "autopagerize_link";
const SEPARATOR_CLASS: &str = "autopagerize_page_separator";

/// Lazy-loading attributes promoted to `src` by the image fixup.
const LAZY_SRC_ATTRIBUTES: [&str; 3] = ["data-src", "data-original", "data-lazy-src"];

/// A node spliced into the live document, paired with its parent, in
/// document order. Reported to event sinks one by one.
pub type InsertedNode = (NodeHandle, NodeHandle);

pub struct PageAppender<'a> {
    doc: &'a PageDocument,
    options: &'a PagerOptions,
}

impl<'a> PageAppender<'a> {
    pub fn new(doc: &'a PageDocument, options: &'a PagerOptions) -> Self {
        Self { doc, options }
    }

    /// Parse a fetched body into a detached staging subtree of the live
    /// document and sanitize it: executable script nodes are stripped
    /// (fetched content is inert data), and lazily-loaded images are made
    /// eager when the option is set.
    pub fn stage(&self, body: &str) -> NodeHandle {
        let staging = self.doc.create_element("div");
        self.doc.set_inner_html(staging, body);

        let stripped = self.doc.remove_all(staging, "script");
        if stripped > 0 {
            debug!(count = stripped, "stripped script nodes from fetched page");
        }

        if self.options.image_loading_fixup {
            self.fixup_lazy_images(staging);
        }

        staging
    }

    /// Drop a staging subtree once its content has been consumed.
    pub fn discard(&self, staging: NodeHandle) {
        self.doc.detach(staging);
    }

    fn fixup_lazy_images(&self, staging: NodeHandle) {
        for img in self.doc.query_all(staging, "img") {
            let src_missing = self
                .doc
                .attr(img, "src")
                .map(|src| src.is_empty())
                .unwrap_or(true);
            if src_missing {
                for name in LAZY_SRC_ATTRIBUTES {
                    if let Some(value) = self.doc.attr(img, name).filter(|v| !v.is_empty()) {
                        self.doc.set_attr(img, "src", &value);
                        break;
                    }
                }
            }
            self.doc.remove_attr(img, "loading");
        }
    }

    /// Splice a page-break marker and the content nodes immediately before
    /// `insert_point`. Returns the spliced content nodes in document order
    /// for insertion notifications.
    pub fn splice(
        &self,
        insert_point: NodeHandle,
        content: &[NodeHandle],
        page_number: u32,
        source_url: &Url,
    ) -> Vec<InsertedNode> {
        let Some(parent) = self.doc.parent(insert_point) else {
            return Vec::new();
        };

        self.insert_marker(parent, insert_point, page_number, source_url);

        let mut inserted = Vec::with_capacity(content.len());
        for &node in content {
            self.doc.insert_before(node, insert_point);
            inserted.push((parent, node));
        }
        inserted
    }

    /// Build and place the labeled page-break marker, adapting it to the
    /// insertion parent: a full-width row for table bodies, a list item
    /// for lists, a horizontal rule plus paragraph otherwise.
    fn insert_marker(
        &self,
        parent: NodeHandle,
        insert_point: NodeHandle,
        page_number: u32,
        source_url: &Url,
    ) {
        let marker = self.build_marker(page_number, source_url);

        match self.doc.node_name(parent).as_deref() {
            Some("tbody") => {
                let row = self.doc.create_element("tr");
                let cell = self.doc.create_element("td");
                let spans = self.first_row_column_spans(parent);
                self.doc.set_attr(cell, "colspan", &spans.to_string());
                self.doc.append_child(cell, marker);
                self.doc.append_child(row, cell);
                self.doc.insert_before(row, insert_point);
            }
            Some("ul") | Some("ol") => {
                let item = self.doc.create_element("li");
                if let Some(style) = self.first_item_float_style(parent) {
                    self.doc.set_attr(item, "style", &style);
                }
                self.doc.append_child(item, marker);
                self.doc.insert_before(item, insert_point);
            }
            _ => {
                let separator = self.doc.create_element("hr");
                self.doc.set_attr(separator, "class", SEPARATOR_CLASS);
                self.doc.insert_before(separator, insert_point);
                self.doc.insert_before(marker, insert_point);
            }
        }
    }

    fn build_marker(&self, page_number: u32, source_url: &Url) -> NodeHandle {
        let info = self.doc.create_element("p");
        self.doc.set_attr(info, "class", PAGE_INFO_CLASS);

        let link = self.doc.create_element("a");
        self.doc.set_attr(link, "class", PAGE_LINK_CLASS);
        self.doc.set_attr(link, "href", source_url.as_str());
        self.doc
            .set_inner_html(link, &format!("page: {page_number}"));

        self.doc.append_child(info, link);
        info
    }

    /// Sum of the column spans of the first row, so the marker cell spans
    /// the full table width.
    fn first_row_column_spans(&self, tbody: NodeHandle) -> u32 {
        let first_row = self
            .doc
            .child_elements(tbody)
            .into_iter()
            .find(|node| self.doc.node_name(*node).as_deref() == Some("tr"));

        let Some(row) = first_row else {
            return 1;
        };

        let spans: u32 = self
            .doc
            .child_elements(row)
            .into_iter()
            .filter(|cell| {
                matches!(self.doc.node_name(*cell).as_deref(), Some("td") | Some("th"))
            })
            .map(|cell| {
                self.doc
                    .attr(cell, "colspan")
                    .and_then(|value| value.trim().parse::<u32>().ok())
                    .unwrap_or(1)
            })
            .sum();
        spans.max(1)
    }

    /// Float/clear style of the list's first item, inherited by the marker
    /// item so floated galleries keep flowing.
    fn first_item_float_style(&self, list: NodeHandle) -> Option<String> {
        let first_item = self
            .doc
            .child_elements(list)
            .into_iter()
            .find(|node| self.doc.node_name(*node).as_deref() == Some("li"))?;
        self.doc
            .attr(first_item, "style")
            .filter(|style| style.contains("float") || style.contains("clear"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PagerOptions;

    fn options() -> PagerOptions {
        PagerOptions::default()
    }

    fn source_url() -> Url {
        Url::parse("https://example.com/list?page=2").unwrap()
    }

    #[test]
    fn staging_strips_scripts() {
        let doc = PageDocument::parse("<html><body></body></html>");
        let opts = options();
        let appender = PageAppender::new(&doc, &opts);

        let staging = appender.stage(
            "<div class=\"entry\">a</div><script>evil()</script><div class=\"entry\">b</div>",
        );

        assert!(doc.query_first(staging, "script").is_none());
        assert_eq!(doc.query_all(staging, "div.entry").len(), 2);
    }

    #[test]
    fn image_fixup_promotes_lazy_sources() {
        let doc = PageDocument::parse("<html><body></body></html>");
        let opts = PagerOptions {
            image_loading_fixup: true,
            ..options()
        };
        let appender = PageAppender::new(&doc, &opts);

        let staging = appender.stage(
            "<img data-src=\"/a.png\" loading=\"lazy\"><img src=\"/b.png\" loading=\"lazy\">",
        );

        let images = doc.query_all(staging, "img");
        assert_eq!(doc.attr(images[0], "src").as_deref(), Some("/a.png"));
        assert_eq!(doc.attr(images[1], "src").as_deref(), Some("/b.png"));
        assert!(doc.attr(images[0], "loading").is_none());
        assert!(doc.attr(images[1], "loading").is_none());
    }

    #[test]
    fn image_fixup_is_off_by_default() {
        let doc = PageDocument::parse("<html><body></body></html>");
        let opts = options();
        let appender = PageAppender::new(&doc, &opts);

        let staging = appender.stage("<img data-src=\"/a.png\" loading=\"lazy\">");

        let images = doc.query_all(staging, "img");
        assert!(doc.attr(images[0], "src").is_none());
        assert_eq!(doc.attr(images[0], "loading").as_deref(), Some("lazy"));
    }

    #[test]
    fn plain_container_gets_separator_marker_then_content() {
        let doc = PageDocument::parse(
            "<html><body><div class=\"entry\">one</div><p id=\"tail\"></p></body></html>",
        );
        let opts = options();
        let appender = PageAppender::new(&doc, &opts);
        let point = doc.query_first(doc.root(), "#tail").unwrap();

        let staging = appender.stage("<div class=\"entry\">two</div>");
        let content = doc.query_all(staging, "div.entry");
        let inserted = appender.splice(point, &content, 2, &source_url());
        appender.discard(staging);

        assert_eq!(inserted.len(), 1);
        assert!(doc.is_attached(inserted[0].1));

        let marker = doc.query_first(doc.root(), "p.autopagerize_page_info").unwrap();
        assert!(doc.is_attached(marker));
        assert_eq!(doc.text(marker), "page: 2");

        let link = doc.query_first(marker, "a.autopagerize_link").unwrap();
        assert_eq!(
            doc.attr(link, "href").as_deref(),
            Some("https://example.com/list?page=2")
        );

        assert!(doc
            .query_first(doc.root(), "hr.autopagerize_page_separator")
            .is_some());
        assert_eq!(doc.query_all(doc.root(), "div.entry").len(), 2);
    }

    #[test]
    fn tbody_parent_wraps_marker_in_full_width_row() {
        let doc = PageDocument::parse(
            "<html><body><table><tbody id=\"b\">\
             <tr><td colspan=\"2\">a</td><td>b</td></tr>\
             <tr id=\"tail\"><td>x</td><td>y</td><td>z</td></tr>\
             </tbody></table></body></html>",
        );
        let opts = options();
        let appender = PageAppender::new(&doc, &opts);
        let point = doc.query_first(doc.root(), "#tail").unwrap();

        let inserted = appender.splice(point, &[], 2, &source_url());
        assert!(inserted.is_empty());

        let cell = doc
            .query_first(doc.root(), "td > p.autopagerize_page_info")
            .map(|marker| doc.parent(marker).unwrap())
            .unwrap();
        assert_eq!(doc.attr(cell, "colspan").as_deref(), Some("3"));
        assert_eq!(doc.node_name(doc.parent(cell).unwrap()).as_deref(), Some("tr"));
    }

    #[test]
    fn list_parent_wraps_marker_in_item_with_inherited_float() {
        let doc = PageDocument::parse(
            "<html><body><ul>\
             <li style=\"float: left\">a</li>\
             <li id=\"tail\">b</li>\
             </ul></body></html>",
        );
        let opts = options();
        let appender = PageAppender::new(&doc, &opts);
        let point = doc.query_first(doc.root(), "#tail").unwrap();

        appender.splice(point, &[], 2, &source_url());

        let item = doc
            .query_first(doc.root(), "li > p.autopagerize_page_info")
            .map(|marker| doc.parent(marker).unwrap())
            .unwrap();
        assert_eq!(doc.attr(item, "style").as_deref(), Some("float: left"));
    }

    #[test]
    fn spliced_nodes_precede_the_insertion_point_in_order() {
        let doc = PageDocument::parse(
            "<html><body><div class=\"entry\">one</div><p id=\"tail\"></p></body></html>",
        );
        let opts = options();
        let appender = PageAppender::new(&doc, &opts);
        let point = doc.query_first(doc.root(), "#tail").unwrap();

        let staging = appender.stage(
            "<div class=\"entry\">two</div><div class=\"entry\">three</div>",
        );
        let content = doc.query_all(staging, "div.entry");
        let inserted = appender.splice(point, &content, 2, &source_url());
        appender.discard(staging);

        let entries = doc.query_all(doc.root(), "div.entry");
        let texts: Vec<String> = entries.iter().map(|&e| doc.text(e)).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
        assert_eq!(inserted.len(), 2);
        assert_eq!(inserted[0].1, entries[1]);
        assert_eq!(inserted[1].1, entries[2]);
    }
}
