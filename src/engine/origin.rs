//! Same-origin guard for fetched pages
//!
//! A fetched document may be spliced only when it carries content and is
//! either free of the cross-origin-deny signal or came from the same host
//! as the current page. Anything else is treated as untrusted splice
//! material and rejected.

use tracing::debug;
use url::Url;

use crate::infrastructure::http_client::FetchedPage;

#[derive(Debug, Default, Clone, Copy)]
pub struct SameOriginGuard;

impl SameOriginGuard {
    /// Whether `page` is usable as splice content for a session running on
    /// `page_url`.
    pub fn is_safe(page: &FetchedPage, page_url: &Url) -> bool {
        if !page.has_content() {
            debug!(url = %page.request_url, "rejecting empty response");
            return false;
        }

        if page.cross_origin_allow.is_none() {
            return true;
        }

        let same_host = page.final_url.host_str() == page_url.host_str();
        if !same_host {
            debug!(
                final_url = %page.final_url,
                page_url = %page_url,
                "rejecting cross-origin response"
            );
        }
        same_host
    }
}
