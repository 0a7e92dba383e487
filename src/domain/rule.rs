//! Site rule model and URL-based rule matching
//!
//! A rule describes, for a family of URLs, how to find the next-page link
//! and which nodes constitute the page content. Rules are produced and
//! ranked (longest URL pattern first) by an external provider; this module
//! only performs the match test against the current URL.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// Site-specific pagination descriptor.
///
/// `url_pattern` is a regular expression source tested against the full
/// page URL. The query fields are CSS selector groups evaluated against
/// the document tree. Rules are immutable once matched; the engine never
/// mutates them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rule {
    /// Regex source matched against the current URL
    #[serde(rename = "url")]
    pub url_pattern: String,

    /// Selector locating the next-page link node
    #[serde(rename = "nextLink")]
    pub next_link_query: String,

    /// Selector locating the content nodes to splice
    #[serde(rename = "pageElement")]
    pub page_element_query: String,

    /// Optional selector overriding the computed insertion point
    #[serde(rename = "insertBefore", default, skip_serializing_if = "Option::is_none")]
    pub insert_before_query: Option<String>,

    /// Catalog identifier of this rule
    #[serde(default)]
    pub id: u64,
}

impl Rule {
    /// Catch-all fallback rule for sites annotated with the microformat
    /// classes (`rel="next"` links plus `autopagerize_page_element`
    /// containers). Providers append this after their ranked site rules.
    pub fn microformats_fallback() -> Self {
        Self {
            url_pattern: "^https?://.".to_string(),
            next_link_query: "a[rel~=next], link[rel~=next]".to_string(),
            page_element_query: ".autopagerize_page_element".to_string(),
            insert_before_query: Some(".autopagerize_insert_before".to_string()),
            id: 0,
        }
    }
}

/// Performs the match test between a URL and a ranked rule list.
///
/// The provider supplies rules sorted longest-pattern-first, which acts as
/// the specificity tie-break: when several patterns match the same URL the
/// more specific (longer) one wins by coming first.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleMatcher;

impl RuleMatcher {
    pub fn new() -> Self {
        Self
    }

    /// First rule whose pattern matches `url`, or `None`.
    ///
    /// Malformed patterns are validated away upstream; if one slips
    /// through it fails closed (treated as a non-match), never panics.
    pub fn first_match<'r>(&self, url: &Url, rules: &'r [Rule]) -> Option<&'r Rule> {
        self.matching(url, rules).next()
    }

    /// All matching rules in provider order, lazily evaluated. Used by the
    /// controller to fall through to less specific rules when a more
    /// specific one fails to start a session.
    pub fn matching<'r, 's>(
        &'s self,
        url: &'s Url,
        rules: &'r [Rule],
    ) -> impl Iterator<Item = &'r Rule> + 's
    where
        'r: 's,
    {
        let target = url.as_str().to_string();
        rules.iter().filter(move |rule| {
            match Regex::new(&rule.url_pattern) {
                Ok(re) => re.is_match(&target),
                Err(e) => {
                    debug!(pattern = %rule.url_pattern, error = %e, "skipping malformed rule pattern");
                    false
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, id: u64) -> Rule {
        Rule {
            url_pattern: pattern.to_string(),
            next_link_query: "a.next".to_string(),
            page_element_query: ".item".to_string(),
            insert_before_query: None,
            id,
        }
    }

    #[test]
    fn longest_matching_pattern_wins() {
        let url = Url::parse("https://example.com/forum/thread/42").unwrap();
        // Provider order: longest pattern text first.
        let rules = vec![
            rule("^https://example\\.com/forum/thread/", 2),
            rule("^https://example\\.com/", 1),
            rule("^https?://.", 0),
        ];

        let matched = RuleMatcher::new().first_match(&url, &rules).unwrap();
        assert_eq!(matched.id, 2);
    }

    #[test]
    fn no_match_yields_none() {
        let url = Url::parse("https://other.net/").unwrap();
        let rules = vec![rule("^https://example\\.com/", 1)];
        assert!(RuleMatcher::new().first_match(&url, &rules).is_none());
    }

    #[test]
    fn malformed_pattern_fails_closed() {
        let url = Url::parse("https://example.com/").unwrap();
        let rules = vec![rule("([unclosed", 9), rule("^https://example\\.com/", 1)];

        let matched = RuleMatcher::new().first_match(&url, &rules).unwrap();
        assert_eq!(matched.id, 1);
    }

    #[test]
    fn matching_preserves_provider_order() {
        let url = Url::parse("https://example.com/a").unwrap();
        let rules = vec![
            rule("^https://example\\.com/a", 3),
            rule("^https://example\\.com/", 2),
            rule("^https?://.", 0),
        ];

        let ids: Vec<u64> = RuleMatcher::new().matching(&url, &rules).map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2, 0]);
    }

    #[test]
    fn fallback_rule_deserializes_from_catalog_shape() {
        let raw = r#"{
            "url": "^https://example\\.com/list",
            "nextLink": "a.pager-next",
            "pageElement": "div.entry",
            "id": 77
        }"#;
        let parsed: Rule = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.id, 77);
        assert!(parsed.insert_before_query.is_none());
    }
}
