//! User-facing engine options
//!
//! Options are read once when a session starts and never re-read; changing
//! them requires tearing the session down and starting a fresh one.

use serde::{Deserialize, Serialize};

/// Read-only option snapshot for one pagination session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PagerOptions {
    /// Whether freshly started sessions begin with loading enabled
    pub enabled: bool,

    /// Tear the session down and re-match rules when the URL path changes
    pub detect_url_change: bool,

    /// `target` attribute value written onto links inside spliced content;
    /// `None` leaves links untouched
    pub target_window_name: Option<String>,

    /// Extra distance (px) added to the computed remaining height before a
    /// scroll position qualifies for loading the next page
    pub base_remain_height: f64,

    /// Floor on the interval between consecutive page requests
    pub min_request_interval_ms: u64,

    /// Verbose engine logging
    pub debug: bool,

    /// Promote lazy-loading image attributes (`data-src` and friends) to
    /// eager `src` attributes on spliced content
    pub image_loading_fixup: bool,
}

impl Default for PagerOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            detect_url_change: true,
            target_window_name: Some("_blank".to_string()),
            base_remain_height: 400.0,
            min_request_interval_ms: 2000,
            debug: false,
            image_loading_fixup: false,
        }
    }
}
