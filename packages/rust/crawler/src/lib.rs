//! Authenticated page acquisition and content extraction.
//!
//! This crate provides:
//! - [`session`] — builds browser cookies from a raw cookie string
//! - [`extract`] — pulls article text out of embedded page-data JSON
//! - [`browser`] — the browser driver seam and its Chromium implementation
//! - [`engine`] — the sequential, session-preserving page acquirer

pub mod browser;
pub mod engine;
pub mod extract;
pub mod session;

pub use browser::{BrowserLauncher, BrowserSession, ChromiumLauncher};
pub use engine::{Acquisition, NavigationFailure, PageAcquirer};
pub use extract::{ContentExtractor, ExtractedArticle, ExtractionFailure, TITLE_NOT_FOUND};
pub use session::build_credentials;
