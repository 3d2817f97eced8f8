//! Small helpers shared by the API client and the UI.
//!
//! - **URL validation**: feed URLs typed by the user and the server base URL
//! - **Text**: width-aware truncation and label sanitizing for terminal rows

mod text;
mod url_validator;

pub use text::{display_width, sanitize_label, truncate_to_width};
pub use url_validator::{validate_feed_url, validate_server_url, UrlValidationError};

/// Maximum length of any text typed into a popup input.
pub const MAX_INPUT_LENGTH: usize = 256;
