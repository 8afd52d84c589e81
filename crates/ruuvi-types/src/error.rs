//! Error types for parsing in ruuvi-types.

use thiserror::Error;

/// Errors that can occur when parsing query parameters into typed values.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// The range token is not one of the supported lookback windows.
    #[error("Invalid range '{0}': expected one of 1h, 6h, 24h, 7d, 30d, all")]
    InvalidRange(String),
}

/// Result type alias using ruuvi-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
