#![forbid(unsafe_code)]

pub mod convert;
pub mod dto;
pub mod error_mapping;
pub mod errors;

pub use error_mapping::{map_error, ApiErrorMapping};
pub use errors::{ApiError, ApiErrorCode};

pub const CRATE_NAME: &str = "formforge-api";
pub const API_VERSION: &str = "v1";
