//! Utility functions for common operations.
//!
//! - **Link validation**: feed links must be absolute http(s) URLs
//! - **Text processing**: HTML stripping for entry text, control character
//!   removal for terminal output

mod text;
mod url_validator;

pub use text::{clean_text, strip_control_chars, strip_html_tags};
pub use url_validator::{validate_feed_link, UrlValidationError};
