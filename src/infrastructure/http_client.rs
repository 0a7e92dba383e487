//! Page fetching for the pagination engine
//!
//! Defines the narrow fetch contract the session depends on and a
//! reqwest-backed implementation. A fetched page carries everything the
//! origin guard needs: the resolved response URL and the cross-origin
//! response header, alongside the body text.
//!
//! The client sets no request timeout; the engine serializes loads, so a
//! hung connection blocks further loading until it resolves.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;
use url::Url;

const USER_AGENT: &str = concat!("pagerize/", env!("CARGO_PKG_VERSION"));

/// Header treated as the cross-origin-deny signal: a server that sets it
/// is serving the document for cross-origin consumption, not as a
/// continuation of the current page.
pub const CROSS_ORIGIN_HEADER: &str = "access-control-allow-origin";

/// Errors surfaced by a [`PageFetcher`].
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}")]
    Status { url: String, status: StatusCode },

    #[error("failed to read body of {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// A successfully fetched next page, before the origin guard has ruled on
/// whether it may be spliced.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL the request was issued for
    pub request_url: Url,
    /// URL the response actually came from, after redirects
    pub final_url: Url,
    /// Value of the cross-origin response header, when present
    pub cross_origin_allow: Option<String>,
    /// Response body text
    pub body: String,
}

impl FetchedPage {
    /// Whether the response carried any content at all.
    pub fn has_content(&self) -> bool {
        !self.body.is_empty()
    }
}

/// Fetch capability consumed by the session.
///
/// `?Send` because the engine is single-threaded and cooperative: a session
/// holds `Rc`-shared state across the (single) suspension point anyway.
#[async_trait(?Send)]
pub trait PageFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;
}

/// reqwest-backed fetcher used against real sites.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait(?Send)]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        debug!(%url, "fetching next page");

        let response =
            self.client
                .get(url.clone())
                .send()
                .await
                .map_err(|source| FetchError::Request {
                    url: url.to_string(),
                    source,
                })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let final_url = response.url().clone();
        let cross_origin_allow = response
            .headers()
            .get(CROSS_ORIGIN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = response.text().await.map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })?;

        debug!(%final_url, bytes = body.len(), "next page fetched");
        Ok(FetchedPage {
            request_url: url.clone(),
            final_url,
            cross_origin_allow,
            body,
        })
    }
}
