//! Utility functions for common operations.
//!
//! - **Text processing**: HTML-to-plain-text cleaning of feed fields and
//!   Unicode-aware truncation for console output
//! - **URL validation**: source URL checks and item link normalization
//!
//! # Examples
//!
//! ```
//! use briefing::util::{clean_html, truncate_to_width, validate_url};
//!
//! let url = validate_url("https://example.com/feed.xml").unwrap();
//! let summary = clean_html("<p>New model released &mdash; details inside</p>");
//! let title = truncate_to_width("A fairly long article title", 15);
//! ```

mod text;
mod url_validator;

pub use text::{clean_html, truncate_to_width, MAX_TEXT_CHARS};
pub use url_validator::{normalize_link, validate_url, UrlValidationError};
