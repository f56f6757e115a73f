//! Utility functions shared by the command handlers.

mod url_validator;

pub use url_validator::{validate_url, UrlValidationError};
