//! Infrastructure layer: document tree access, HTTP fetching,
//! configuration, and logging.

pub mod config;
pub mod dom;
pub mod http_client;
pub mod logging;

pub use config::{AppConfig, ConfigManager, FileOptionsProvider, LoggingConfig};
pub use dom::{NodeHandle, PageDocument};
pub use http_client::{FetchError, FetchedPage, HttpPageFetcher, PageFetcher};
