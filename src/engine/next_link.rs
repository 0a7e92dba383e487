//! Next-page URL resolution
//!
//! Finds the rule's next-link node and turns it into an absolute URL.
//! Sites that label pagination with `href="#"` carry the page number in
//! the link text instead; for those the base URL's `page=` query component
//! is rewritten. Resolution never mutates the document and is idempotent
//! for identical inputs.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::domain::Rule;
use crate::infrastructure::dom::{NodeHandle, PageDocument};

static HAS_PAGE_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?&]page=\d+").expect("valid regex"));
static PAGE_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([?&]page=)\d+").expect("valid regex"));

/// Attributes consulted for the link target, in priority order.
const TARGET_ATTRIBUTES: [&str; 3] = ["href", "action", "value"];

#[derive(Debug, Default, Clone, Copy)]
pub struct NextLinkResolver;

impl NextLinkResolver {
    /// Resolve the next-page URL from the subtree at `scope`, relative to
    /// `base`, the URL the document was loaded from.
    pub fn resolve(
        doc: &PageDocument,
        scope: NodeHandle,
        rule: &Rule,
        base: &Url,
    ) -> Option<Url> {
        let node = doc.query_first(scope, &rule.next_link_query)?;

        if doc.attr(node, "href").as_deref() == Some("#") {
            return Self::rewrite_page_param(base, doc.text(node).trim());
        }

        let raw = TARGET_ATTRIBUTES
            .iter()
            .find_map(|name| doc.attr(node, name).filter(|value| !value.is_empty()))?;

        match base.join(&raw) {
            Ok(url) => Some(url),
            Err(e) => {
                debug!(target = %raw, error = %e, "next link does not resolve to a url");
                None
            }
        }
    }

    /// Rewrite for numeric-paged sites: the link text is the page number,
    /// substituted into the base URL's `page=` query component (appended
    /// as `page=0` first when missing).
    fn rewrite_page_param(base: &Url, page_number: &str) -> Option<Url> {
        let mut url = base.to_string();
        if !HAS_PAGE_PARAM.is_match(&url) {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str("page=0");
        }
        let rewritten = PAGE_PARAM.replace(&url, |caps: &regex::Captures<'_>| {
            format!("{}{}", &caps[1], page_number)
        });
        Url::parse(&rewritten).ok()
    }
}
