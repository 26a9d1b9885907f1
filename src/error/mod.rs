//! Error Handling Module
//!
//! This module provides the error types shared by every request path:
//! - Core error type (`ApiError`) and its coarse `ErrorCategory`
//! - Type conversions from `reqwest` and `serde_json` errors
//!
//! # Example
//!
//! ```rust,ignore
//! use api_helper::error::{ApiError, ErrorCategory};
//!
//! let error = ApiError::api_error(404, "Not Found", "");
//! assert_eq!(error.category(), ErrorCategory::Status);
//! assert!(!error.is_auth_error());
//! ```

mod conversions;
pub mod types;

pub use types::*;
